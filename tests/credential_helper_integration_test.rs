//! Integration tests for keychain resolution from Docker config files

use anyhow::Result;
use imgindex::auth::{DefaultKeychain, Keychain};
use oci_distribution::secrets::RegistryAuth;
use parking_lot::Mutex;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// Tests in this file mutate process-wide environment variables
static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

const VARS: [&str; 4] = ["DOCKER_CONFIG", "REGISTRY_AUTH_FILE", "XDG_RUNTIME_DIR", "HOME"];

/// Point every config location at `dir`, run `f`, then restore the environment
fn with_config_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK.lock();
    let saved: Vec<(&str, Option<String>)> = VARS.iter().map(|v| (*v, env::var(v).ok())).collect();

    env::set_var("DOCKER_CONFIG", dir);
    env::remove_var("REGISTRY_AUTH_FILE");
    env::remove_var("XDG_RUNTIME_DIR");
    env::set_var("HOME", dir);

    let result = f();

    for (name, value) in saved {
        match value {
            Some(value) => env::set_var(name, value),
            None => env::remove_var(name),
        }
    }
    result
}

#[test]
fn test_resolve_anonymous_without_config() -> Result<()> {
    let tmp_dir = TempDir::new()?;

    let auth = with_config_dir(tmp_dir.path(), || DefaultKeychain::new().resolve("docker.io"))?;
    assert!(auth.authorization()?.is_anonymous());
    Ok(())
}

#[test]
fn test_resolve_from_config() -> Result<()> {
    let tmp_dir = TempDir::new()?;
    fs::write(
        tmp_dir.path().join("config.json"),
        r#"{
            "auths": {
                "test.registry.io": {
                    "username": "testuser",
                    "password": "testpass"
                },
                "ghcr.io": {
                    "registrytoken": "test-bearer-token"
                }
            }
        }"#,
    )?;

    let (basic, bearer) = with_config_dir(tmp_dir.path(), || {
        let keychain = DefaultKeychain::new();
        (keychain.resolve("test.registry.io"), keychain.resolve("ghcr.io"))
    });

    let basic = basic?.authorization()?;
    assert_eq!(basic.username.as_deref(), Some("testuser"));
    assert_eq!(basic.password.as_deref(), Some("testpass"));
    assert!(matches!(
        basic.to_registry_auth(),
        RegistryAuth::Basic(user, _) if user == "testuser"
    ));

    let bearer = bearer?.authorization()?;
    assert_eq!(bearer.registry_token.as_deref(), Some("test-bearer-token"));
    // the registry client only takes basic credentials
    assert!(matches!(bearer.to_registry_auth(), RegistryAuth::Anonymous));
    Ok(())
}

#[test]
fn test_unreadable_config_falls_back_to_anonymous() -> Result<()> {
    let tmp_dir = TempDir::new()?;
    fs::write(tmp_dir.path().join("config.json"), "not json")?;

    let auth = with_config_dir(tmp_dir.path(), || DefaultKeychain::new().resolve("quay.io"))?;
    assert!(auth.authorization()?.is_anonymous());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_resolve_with_credential_helper() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let tmp_dir = TempDir::new()?;
    let bin = tmp_dir.path().join("bin");
    fs::create_dir_all(&bin)?;

    let helper = bin.join("docker-credential-fake");
    fs::write(
        &helper,
        "#!/bin/sh\nread server\nprintf '{\"ServerURL\":\"%s\",\"Username\":\"helper-user\",\"Secret\":\"helper-secret\"}' \"$server\"\n",
    )?;
    fs::set_permissions(&helper, fs::Permissions::from_mode(0o755))?;

    fs::write(
        tmp_dir.path().join("config.json"),
        r#"{"credHelpers": {"helper.example.com": "fake"}}"#,
    )?;

    let path = env::var("PATH").unwrap_or_default();
    let auth = with_config_dir(tmp_dir.path(), || {
        env::set_var("PATH", format!("{}:{}", bin.display(), path));
        let result = DefaultKeychain::new().resolve("helper.example.com");
        env::set_var("PATH", &path);
        result
    })?;

    let config = auth.authorization()?;
    assert_eq!(config.username.as_deref(), Some("helper-user"));
    assert_eq!(config.password.as_deref(), Some("helper-secret"));
    Ok(())
}
