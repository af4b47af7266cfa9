//! Keychain implementation for credential management

use super::{Anonymous, AuthConfig, Authenticator, DockerAuthEntry, DockerConfig};
use crate::error::{IndexError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Trait for types that can resolve authentication for a registry host
pub trait Keychain: Send + Sync {
    /// Resolve authentication for a registry host such as `ghcr.io` or `localhost:5000`
    fn resolve(&self, registry: &str) -> Result<Box<dyn Authenticator>>;
}

/// Default keychain implementation that checks Docker config files
pub struct DefaultKeychain {
    /// Cached config to avoid re-reading files
    config_cache: Arc<Mutex<Option<DockerConfig>>>,
}

impl DefaultKeychain {
    /// Create a new DefaultKeychain
    pub fn new() -> Self {
        Self {
            config_cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Keychain backed by an already parsed Docker config
    pub fn with_config(config: DockerConfig) -> Self {
        Self {
            config_cache: Arc::new(Mutex::new(Some(config))),
        }
    }

    /// Get paths to check for Docker config
    fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(docker_config) = std::env::var("DOCKER_CONFIG") {
            paths.push(PathBuf::from(docker_config).join("config.json"));
        }

        if let Ok(auth_file) = std::env::var("REGISTRY_AUTH_FILE") {
            paths.push(PathBuf::from(auth_file));
        }

        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            paths.push(PathBuf::from(xdg_runtime).join("containers/auth.json"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".docker/config.json"));
        }

        paths
    }

    /// Load Docker config from disk
    fn load_config(&self) -> DockerConfig {
        let mut cache = self.config_cache.lock();
        if let Some(config) = cache.as_ref() {
            return config.clone();
        }

        for path in Self::config_paths() {
            if !path.exists() {
                continue;
            }
            debug!("Checking Docker config at: {}", path.display());
            match std::fs::read(&path) {
                Ok(content) => match DockerConfig::from_slice(&content) {
                    Ok(config) => {
                        debug!("Loaded Docker config from: {}", path.display());
                        *cache = Some(config.clone());
                        return config;
                    }
                    Err(e) => {
                        warn!("Failed to parse Docker config at {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Failed to read Docker config at {}: {}", path.display(), e);
                }
            }
        }

        DockerConfig::default()
    }

    /// Normalize registry host for matching config keys
    fn normalize_registry(registry: &str) -> Vec<String> {
        let mut variants = vec![registry.to_string()];

        if registry == "docker.io" || registry == "index.docker.io" {
            variants.push("docker.io".to_string());
            variants.push("index.docker.io".to_string());
            variants.push("https://index.docker.io/v1/".to_string());
            variants.push("https://index.docker.io/v2/".to_string());
        } else if !registry.starts_with("http://") && !registry.starts_with("https://") {
            variants.push(format!("https://{}", registry));
            variants.push(format!("http://{}", registry));
            variants.push(format!("https://{}/v1/", registry));
            variants.push(format!("https://{}/v2/", registry));
        }

        variants
    }

    fn find_auth_entry(config: &DockerConfig, registry: &str) -> Option<DockerAuthEntry> {
        Self::normalize_registry(registry)
            .into_iter()
            .find_map(|variant| config.auths.get(&variant).cloned())
    }

    fn get_credential_helper(config: &DockerConfig, registry: &str) -> Option<String> {
        if let Some(helper) = config.cred_helpers.get(registry) {
            return Some(helper.clone());
        }

        config.creds_store.clone()
    }

    /// Execute credential helper to get credentials
    fn execute_credential_helper(helper: &str, registry: &str) -> Result<AuthConfig> {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let helper_name = format!("docker-credential-{}", helper);

        debug!(
            "Executing credential helper: {} for {}",
            helper_name, registry
        );

        let mut child = Command::new(&helper_name)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                IndexError::Auth(format!(
                    "failed to spawn credential helper {}: {}",
                    helper_name, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IndexError::Auth(format!(
                "credential helper {} failed: {}",
                helper_name,
                stderr.trim()
            )));
        }

        #[derive(serde::Deserialize)]
        struct HelperResponse {
            #[serde(rename = "Username")]
            username: Option<String>,
            #[serde(rename = "Secret")]
            secret: Option<String>,
        }

        let response: HelperResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            IndexError::Auth(format!("invalid credential helper response: {}", e))
        })?;

        Ok(AuthConfig {
            username: response.username,
            password: response.secret,
            ..Default::default()
        })
    }
}

impl Default for DefaultKeychain {
    fn default() -> Self {
        Self::new()
    }
}

impl Keychain for DefaultKeychain {
    fn resolve(&self, registry: &str) -> Result<Box<dyn Authenticator>> {
        let config = self.load_config();

        debug!("Resolving auth for registry: {}", registry);

        if let Some(auth_entry) = Self::find_auth_entry(&config, registry) {
            debug!("Found auth entry for {}", registry);
            let auth_config = AuthConfig::from(&auth_entry);

            if auth_config.is_anonymous() {
                return Ok(Box::new(Anonymous));
            }

            return Ok(Box::new(ConfigAuthenticator {
                config: auth_config,
            }));
        }

        if let Some(helper) = Self::get_credential_helper(&config, registry) {
            debug!("Trying credential helper: {} for {}", helper, registry);
            match Self::execute_credential_helper(&helper, registry) {
                Ok(auth_config) => {
                    return Ok(Box::new(ConfigAuthenticator {
                        config: auth_config,
                    }));
                }
                Err(e) => {
                    warn!("Credential helper failed: {}", e);
                }
            }
        }

        debug!("No credentials found for {}, using anonymous", registry);
        Ok(Box::new(Anonymous))
    }
}

/// Authenticator that returns a fixed AuthConfig
struct ConfigAuthenticator {
    config: AuthConfig,
}

impl Authenticator for ConfigAuthenticator {
    fn authorization(&self) -> Result<AuthConfig> {
        Ok(self.config.clone())
    }
}

/// Keychain with fixed credentials per registry host
#[derive(Default)]
pub struct StaticKeychain {
    entries: HashMap<String, AuthConfig>,
}

impl StaticKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, registry: impl Into<String>, config: AuthConfig) -> Self {
        self.entries.insert(registry.into(), config);
        self
    }
}

impl Keychain for StaticKeychain {
    fn resolve(&self, registry: &str) -> Result<Box<dyn Authenticator>> {
        match self.entries.get(registry) {
            Some(config) => Ok(Box::new(ConfigAuthenticator {
                config: config.clone(),
            })),
            None => Ok(Box::new(Anonymous)),
        }
    }
}

/// Multi-keychain that tries multiple keychains in order
pub struct MultiKeychain {
    keychains: Vec<Box<dyn Keychain>>,
}

impl MultiKeychain {
    pub fn new(keychains: Vec<Box<dyn Keychain>>) -> Self {
        Self { keychains }
    }
}

impl Keychain for MultiKeychain {
    fn resolve(&self, registry: &str) -> Result<Box<dyn Authenticator>> {
        for keychain in &self.keychains {
            match keychain.resolve(registry) {
                Ok(auth) => {
                    if let Ok(config) = auth.authorization() {
                        if !config.is_anonymous() {
                            return Ok(auth);
                        }
                    }
                }
                Err(e) => {
                    debug!("Keychain failed: {}", e);
                }
            }
        }

        Ok(Box::new(Anonymous))
    }
}
