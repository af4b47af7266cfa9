use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::defaults;
use crate::error::{IndexError, Result};
use crate::manifest::IndexFormat;


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for on-disk index layouts
    #[serde(default = "default_xdg_path")]
    pub xdg_path: PathBuf,

    /// Registries reached over plain HTTP or without TLS verification
    #[serde(default)]
    pub insecure_registries: Vec<String>,

    /// Format of newly created indexes, `oci` or `docker`
    #[serde(default = "default_format")]
    pub format: String,

    /// Upper bound on concurrent fetches while walking nested indexes
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

fn default_xdg_path() -> PathBuf {
    if let Some(runtime) = std::env::var_os("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime).join(defaults::MANIFESTS_DIR);
    }
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("imgindex")
        .join(defaults::MANIFESTS_DIR)
}

fn default_format() -> String {
    "oci".to_string()
}

fn default_max_concurrent_fetches() -> usize {
    defaults::MAX_CONCURRENT_FETCHES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            xdg_path: default_xdg_path(),
            insecure_registries: Vec::new(),
            format: default_format(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("imgindex").join("config.toml");
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)?;
                return Self::from_toml(&content);
            }
        }
        Ok(Config::default())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IndexError::InvalidConfig(e.to_string()))
    }

    pub fn index_format(&self) -> Result<IndexFormat> {
        self.format.parse()
    }
}
