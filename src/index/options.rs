use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{DefaultKeychain, Keychain};
use crate::config::Config;
use crate::error::Result;
use crate::image::Image;
use crate::manifest::{IndexFormat, Platform};
use crate::registry::{Registry, RemoteRegistry};

/// Options for constructing an [`ImageIndex`](super::ImageIndex)
#[derive(Clone)]
pub struct IndexOptions {
    pub(crate) xdg_path: PathBuf,
    pub(crate) keychain: Arc<dyn Keychain>,
    pub(crate) registry: Option<Arc<dyn Registry>>,
    pub(crate) insecure: bool,
    pub(crate) insecure_registries: Vec<String>,
    pub(crate) format: IndexFormat,
    pub(crate) base_index_path: Option<PathBuf>,
    pub(crate) max_concurrent_fetches: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        let config = Config::default();
        Self {
            xdg_path: config.xdg_path,
            keychain: Arc::new(DefaultKeychain::new()),
            registry: None,
            insecure: false,
            insecure_registries: config.insecure_registries,
            format: IndexFormat::default(),
            base_index_path: None,
            max_concurrent_fetches: config.max_concurrent_fetches,
        }
    }
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            xdg_path: config.xdg_path.clone(),
            insecure_registries: config.insecure_registries.clone(),
            format: config.index_format()?,
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
            ..Self::default()
        })
    }

    /// Root directory for the index's on-disk layout
    pub fn with_xdg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.xdg_path = path.into();
        self
    }

    pub fn with_keychain(mut self, keychain: Arc<dyn Keychain>) -> Self {
        self.keychain = keychain;
        self
    }

    /// Use `registry` instead of a client built from the keychain
    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn pull_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_format(mut self, format: IndexFormat) -> Self {
        self.format = format;
        self
    }

    /// Load the base manifest from the layout at `path`
    pub fn from_base_index(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_index_path = Some(path.into());
        self
    }

    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit.max(1);
        self
    }

    pub fn xdg_path(&self) -> &Path {
        &self.xdg_path
    }

    pub(crate) fn registry(&self) -> Arc<dyn Registry> {
        match &self.registry {
            Some(registry) => registry.clone(),
            None => Arc::new(RemoteRegistry::new(
                self.keychain.clone(),
                self.insecure_registries.clone(),
            )),
        }
    }
}

/// Options for [`ImageIndex::add`](super::ImageIndex::add)
#[derive(Clone, Default)]
pub struct AddOptions {
    pub(crate) all: bool,
    pub(crate) platform: Platform,
    pub(crate) annotations: BTreeMap<String, String>,
    pub(crate) local_image: Option<Arc<dyn Image>>,
}

impl AddOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every image of a referenced index, descending into nested indexes
    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.platform.os = os.into();
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.platform.architecture = architecture.into();
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.platform.variant = variant.into();
        self
    }

    pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
        self.platform.os_version = os_version.into();
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.platform.features = features;
        self
    }

    pub fn with_os_features(mut self, os_features: Vec<String>) -> Self {
        self.platform.os_features = os_features;
        self
    }

    pub fn with_annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Attach an image already in memory instead of fetching one
    pub fn with_local_image(mut self, image: Arc<dyn Image>) -> Self {
        self.local_image = Some(image);
        self
    }
}

/// Options for [`ImageIndex::push`](super::ImageIndex::push)
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    pub(crate) tags: Vec<String>,
    pub(crate) insecure: bool,
    pub(crate) format: Option<IndexFormat>,
    pub(crate) purge: bool,
}

impl PushOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additional tags written alongside the index's own reference
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Rewrite the index media type before pushing
    pub fn with_format(mut self, format: IndexFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Delete the local layout after a successful push
    pub fn with_purge(mut self, purge: bool) -> Self {
        self.purge = purge;
        self
    }
}
