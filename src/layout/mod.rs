//! On-disk OCI image layout holding one index
//!
//! A layout directory contains the `oci-layout` marker, an `index.json` and a
//! `blobs/` tree. Every change to `index.json` goes through a temporary file in
//! the same directory followed by a rename, so readers never see a partial index.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::constants::layout::{BLOBS_DIR, INDEX_FILE, OCI_LAYOUT_FILE, OCI_LAYOUT_VERSION};
use crate::digest::Digest;
use crate::error::{IndexError, Result};
use crate::manifest::{Descriptor, IndexManifest};


/// Handle to an existing OCI layout directory
#[derive(Debug, Clone)]
pub struct LayoutPath {
    root: PathBuf,
}

impl LayoutPath {
    /// Create (or overwrite) a layout at `path` holding `index`
    pub fn write(path: impl AsRef<Path>, index: &IndexManifest) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(BLOBS_DIR))?;
        std::fs::write(root.join(OCI_LAYOUT_FILE), OCI_LAYOUT_VERSION)?;

        let layout = Self { root };
        layout.write_index(index)?;
        debug!("Initialized OCI layout at {}", layout.root.display());
        Ok(layout)
    }

    /// Open the layout at `path`, failing when it has no `index.json`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !Self::exists(&root) {
            return Err(IndexError::LayoutNotFound(root));
        }
        Ok(Self { root })
    }

    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().join(INDEX_FILE).is_file()
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn index_manifest(&self) -> Result<IndexManifest> {
        let data = std::fs::read(self.root.join(INDEX_FILE))?;
        IndexManifest::from_slice(&data)
    }

    /// Replace `index.json` atomically
    pub fn write_index(&self, index: &IndexManifest) -> Result<()> {
        let data = serde_json::to_vec(index)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.root.join(INDEX_FILE))
            .map_err(|e| IndexError::Io(e.error))?;
        Ok(())
    }

    /// Read, modify and rewrite `index.json` as one step
    pub fn update<F>(&self, mutate: F) -> Result<IndexManifest>
    where
        F: FnOnce(&mut IndexManifest),
    {
        let mut index = self.index_manifest()?;
        mutate(&mut index);
        self.write_index(&index)?;
        Ok(index)
    }

    pub fn append_descriptor(&self, descriptor: &Descriptor) -> Result<()> {
        debug!("Appending {} to {}", descriptor.digest, self.root.display());
        self.update(|index| index.manifests.push(descriptor.clone()))?;
        Ok(())
    }

    /// Drop every descriptor with `digest`, returning how many were removed
    pub fn remove_descriptors(&self, digest: &Digest) -> Result<usize> {
        let mut removed = 0;
        self.update(|index| {
            let before = index.manifests.len();
            index.manifests.retain(|d| &d.digest != digest);
            removed = before - index.manifests.len();
        })?;
        debug!("Removed {} descriptor(s) for {}", removed, digest);
        Ok(removed)
    }

    /// Replace the descriptor with the same digest, appending when absent
    pub fn replace_descriptor(&self, descriptor: &Descriptor) -> Result<()> {
        self.update(|index| {
            index.manifests.retain(|d| d.digest != descriptor.digest);
            index.manifests.push(descriptor.clone());
        })?;
        Ok(())
    }

    /// Store `data` under `blobs/<algorithm>/<hex>`
    pub fn write_blob(&self, data: &[u8]) -> Result<Digest> {
        let digest = Digest::sha256_of(data);
        let path = self.blob_path(&digest);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut tmp = NamedTempFile::new_in(&self.root)?;
            tmp.write_all(data)?;
            tmp.persist(&path).map_err(|e| IndexError::Io(e.error))?;
        }
        Ok(digest)
    }

    pub fn read_blob(&self, digest: &Digest) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.blob_path(digest))?)
    }

    fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root
            .join(BLOBS_DIR)
            .join(digest.algorithm())
            .join(digest.hex())
    }

    /// Delete the whole layout directory
    pub fn remove(self) -> Result<()> {
        std::fs::remove_dir_all(&self.root)?;
        debug!("Deleted OCI layout at {}", self.root.display());
        Ok(())
    }
}
