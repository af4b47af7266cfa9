//! Mutable multi-platform image index
//!
//! An [`ImageIndex`] layers pending descriptor edits over a base index
//! manifest. Getters read the overlay first and fall back to the base;
//! setters copy a base descriptor into the overlay on first change. `save`
//! writes the overlay into the OCI layout under
//! `<xdg_path>/<file-safe repository name>`, and `push` publishes the saved
//! manifest to a registry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::digest::Digest;
use crate::error::{IndexError, Result};
use crate::layout::LayoutPath;
use crate::manifest::{IndexManifest, Manifest};
use crate::registry::{make_file_safe_name, parse_reference, Registry};

mod accessors;
mod add;
mod options;
mod persist;
mod store;

pub use options::{AddOptions, IndexOptions, PushOptions};
pub use store::DescriptorStore;


/// Image index with an in-memory overlay of pending edits
pub struct ImageIndex {
    repo_name: String,
    manifest: IndexManifest,
    store: DescriptorStore,
    removed: HashSet<Digest>,
    layout_dir: PathBuf,
    registry: Arc<dyn Registry>,
    insecure: bool,
    max_concurrent_fetches: usize,
}

impl ImageIndex {
    /// Empty index in the format chosen by `options`
    pub fn new(repo_name: &str, options: IndexOptions) -> Result<Self> {
        let manifest = IndexManifest::empty(options.format);
        Self::from_manifest(repo_name, manifest, options)
    }

    /// Index over an existing manifest
    pub fn from_manifest(
        repo_name: &str,
        manifest: IndexManifest,
        options: IndexOptions,
    ) -> Result<Self> {
        parse_reference(repo_name)?;

        Ok(Self {
            repo_name: repo_name.to_string(),
            layout_dir: options.xdg_path.join(make_file_safe_name(repo_name)),
            manifest,
            store: DescriptorStore::new(),
            removed: HashSet::new(),
            registry: options.registry(),
            insecure: options.insecure,
            max_concurrent_fetches: options.max_concurrent_fetches.max(1),
        })
    }

    /// Index loaded from disk
    ///
    /// Reads `options.base_index_path` when set, otherwise the index's own
    /// layout directory.
    pub fn from_layout(repo_name: &str, options: IndexOptions) -> Result<Self> {
        let path = match &options.base_index_path {
            Some(path) => path.clone(),
            None => options.xdg_path.join(make_file_safe_name(repo_name)),
        };
        let manifest = LayoutPath::from_path(&path)?.index_manifest()?;
        debug!(
            "Loaded index {} with {} manifests from {}",
            repo_name,
            manifest.manifests.len(),
            path.display()
        );
        Self::from_manifest(repo_name, manifest, options)
    }

    /// Index fetched from the registry `repo_name` points at
    pub async fn from_remote(repo_name: &str, options: IndexOptions) -> Result<Self> {
        parse_reference(repo_name)?;
        let registry = options.registry();
        let raw = registry.fetch_manifest(repo_name, options.insecure).await?;
        match raw.parse()? {
            Manifest::Index(manifest) => {
                debug!(
                    "Fetched index {} ({}) with {} manifests",
                    repo_name,
                    raw.digest,
                    manifest.manifests.len()
                );
                Self::from_manifest(repo_name, manifest, options.with_registry(registry))
            }
            Manifest::Image(_) => Err(IndexError::UnknownMediaType(raw.media_type)),
        }
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// Base manifest, without pending edits
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn media_type(&self) -> &str {
        self.manifest.media_type()
    }

    /// Directory holding the index's OCI layout
    pub fn layout_path(&self) -> &Path {
        &self.layout_dir
    }

    /// Number of descriptors waiting for `save`
    pub fn pending(&self) -> usize {
        self.store.len()
    }

    fn check_removed(&self, digest: &Digest) -> Result<()> {
        if self.removed.contains(digest) {
            return Err(IndexError::DigestNotFound(digest.to_string()));
        }
        Ok(())
    }
}
