//! Tests for the auth module

use super::*;

fn encode(value: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(value)
}

#[test]
fn test_docker_config_parsing() {
    let config = DockerConfig::from_slice(
        br#"{
            "auths": {
                "docker.io": {"auth": "dXNlcjpwYXNz"},
                "gcr.io": {
                    "username": "oauth2accesstoken",
                    "password": "ya29.token",
                    "registrytoken": "bearer-token"
                }
            },
            "credHelpers": {"123456789.dkr.ecr.us-east-1.amazonaws.com": "ecr-login"},
            "credsStore": "desktop"
        }"#,
    )
    .unwrap();

    assert_eq!(config.auths.len(), 2);
    assert_eq!(config.auths["docker.io"].auth.as_deref(), Some("dXNlcjpwYXNz"));
    assert_eq!(
        config.auths["gcr.io"].registry_token.as_deref(),
        Some("bearer-token")
    );
    assert_eq!(
        config.cred_helpers["123456789.dkr.ecr.us-east-1.amazonaws.com"],
        "ecr-login"
    );
    assert_eq!(config.creds_store.as_deref(), Some("desktop"));
}

#[test]
fn test_docker_config_from_slice_rejects_garbage() {
    let err = DockerConfig::from_slice(b"{not json").unwrap_err();
    assert!(err.to_string().starts_with("authentication failed: invalid docker config"));

    let empty = DockerConfig::from_slice(b"{}").unwrap();
    assert!(empty.auths.is_empty());
    assert!(empty.creds_store.is_none());
}

#[test]
fn test_auth_entry_conversion() {
    let entry = DockerAuthEntry {
        auth: Some(encode("user:pass")),
        identity_token: Some("refresh".to_string()),
        ..Default::default()
    };

    let config = AuthConfig::from(&entry);
    assert_eq!(config.auth, entry.auth);
    assert_eq!(config.identity_token.as_deref(), Some("refresh"));
    assert!(config.username.is_none());
    assert!(!config.is_anonymous());

    assert!(AuthConfig::from(&DockerAuthEntry::default()).is_anonymous());
}

#[test]
fn test_to_registry_auth_prefers_explicit_credentials() {
    let config = AuthConfig {
        auth: Some(encode("encoded:secret")),
        ..AuthConfig::new("explicit".to_string(), "pw".to_string())
    };
    assert!(matches!(
        config.to_registry_auth(),
        RegistryAuth::Basic(user, pass) if user == "explicit" && pass == "pw"
    ));
}

#[test]
fn test_to_registry_auth_decodes_auth_field() {
    let config = AuthConfig {
        auth: Some(encode("robot:s3:cret")),
        ..Default::default()
    };
    // only the first colon separates user from password
    assert!(matches!(
        config.to_registry_auth(),
        RegistryAuth::Basic(user, pass) if user == "robot" && pass == "s3:cret"
    ));

    let garbage = AuthConfig {
        auth: Some("not-base64!".to_string()),
        ..Default::default()
    };
    assert!(matches!(garbage.to_registry_auth(), RegistryAuth::Anonymous));
}

#[test]
fn test_to_registry_auth_token_only_is_anonymous() {
    let config = AuthConfig {
        registry_token: Some("token123".to_string()),
        ..Default::default()
    };
    assert!(!config.is_anonymous());
    assert!(matches!(config.to_registry_auth(), RegistryAuth::Anonymous));
    assert!(matches!(
        AuthConfig::anonymous().to_registry_auth(),
        RegistryAuth::Anonymous
    ));
}
