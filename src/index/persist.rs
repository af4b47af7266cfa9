//! Saving, publishing and removing the index

use serde::Serialize;
use tracing::{debug, info};

use super::{ImageIndex, PushOptions};
use crate::digest::Digest;
use crate::error::{IndexError, Result, SaveDiagnostic, SaveError};
use crate::layout::LayoutPath;
use crate::manifest::{IndexFormat, IndexManifest, TaggableIndex};
use crate::registry::tag_reference;

impl ImageIndex {
    /// Open the on-disk layout, creating it from the base manifest if needed
    pub(crate) fn init_layout(&self) -> Result<LayoutPath> {
        if LayoutPath::exists(&self.layout_dir) {
            return LayoutPath::from_path(&self.layout_dir);
        }

        let format = IndexFormat::from_media_type(self.manifest.media_type()).unwrap_or_default();
        let layout = LayoutPath::write(&self.layout_dir, &IndexManifest::empty(format))?;
        layout.update(|index| {
            index.manifests.extend(self.manifest.manifests.iter().cloned());
            index.annotations = self.manifest.annotations.clone();
            index.subject = self.manifest.subject.clone();
        })?;
        Ok(layout)
    }

    /// Write pending edits and removals to the on-disk layout
    ///
    /// Each pending descriptor replaces any descriptor with the same digest.
    /// Afterwards the overlay is empty and the base manifest is the saved one.
    pub fn save(&mut self) -> Result<()> {
        let layout = self.init_layout()?;

        for digest in &self.removed {
            layout.remove_descriptors(digest)?;
        }
        for descriptor in self.store.snapshot() {
            layout.remove_descriptors(&descriptor.digest)?;
            layout.append_descriptor(&descriptor)?;
        }

        let media_type = self.manifest.media_type().to_string();
        let saved = layout.update(|index| index.media_type = Some(media_type))?;

        info!(
            "Saved index {} ({} manifests) to {}",
            self.repo_name,
            saved.manifests.len(),
            layout.path().display()
        );
        self.manifest = saved;
        self.store.clear();
        Ok(())
    }

    /// Publish the saved index under its own reference and every extra tag
    ///
    /// Only the index manifest is written; the images it lists must already
    /// exist in the target repository.
    pub async fn push(&mut self, options: PushOptions) -> Result<Digest> {
        if !self.store.is_empty() {
            return Err(IndexError::IndexNeedToBeSaved);
        }

        if let Some(format) = options.format {
            if format.media_type() != self.manifest.media_type() {
                debug!("Converting {} to {}", self.repo_name, format);
                self.manifest.media_type = Some(format.media_type().to_string());
                self.save()?;
            }
        }

        let mut targets = vec![self.repo_name.clone()];
        for tag in &options.tags {
            targets.push(tag_reference(&self.repo_name, tag)?);
        }

        let taggable = TaggableIndex::new(self.manifest.clone());
        let raw = taggable.raw_manifest()?;
        let insecure = options.insecure || self.insecure;

        let mut errors = Vec::new();
        for target in targets {
            if let Err(cause) = self
                .registry
                .write_manifest(&target, &raw, taggable.media_type(), insecure)
                .await
            {
                errors.push(SaveDiagnostic {
                    image_name: target,
                    cause,
                });
            }
        }
        if !errors.is_empty() {
            return Err(SaveError { errors }.into());
        }

        let digest = taggable.digest()?;
        info!("Pushed index {} ({})", self.repo_name, digest);

        if options.purge {
            self.delete()?;
        }
        Ok(digest)
    }

    /// Saved manifest as tab-indented JSON
    pub fn inspect(&self) -> Result<String> {
        if !self.store.is_empty() {
            return Err(IndexError::IndexNeedToBeSaved);
        }

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.manifest.serialize(&mut serializer)?;
        String::from_utf8(out).map_err(|_| IndexError::ManifestUndefined)
    }

    /// Digest `reference` names, asking the registry for tags
    pub async fn resolve(&self, reference: &str) -> Result<Digest> {
        let is_digest = reference.contains('@')
            || reference.starts_with("sha256:")
            || reference.starts_with("sha512:");

        let digest = if is_digest {
            reference.parse::<Digest>()?
        } else {
            self.registry.digest(reference, self.insecure).await?
        };

        self.check_removed(&digest)?;
        Ok(digest)
    }

    /// Drop the image `reference` names from the index
    ///
    /// The digest stays unknown to getters and setters until it is added again.
    pub async fn remove(&mut self, reference: &str) -> Result<()> {
        let digest = self.resolve(reference).await?;

        let pending = self.store.remove(&digest).is_some();
        let before = self.manifest.manifests.len();
        self.manifest.manifests.retain(|d| d.digest != digest);
        if !pending && before == self.manifest.manifests.len() {
            return Err(IndexError::DigestNotFound(digest.to_string()));
        }

        debug!("Removed {} from {}", digest, self.repo_name);
        self.removed.insert(digest);
        Ok(())
    }

    /// Delete the index's on-disk layout
    pub fn delete(&self) -> Result<()> {
        LayoutPath::from_path(&self.layout_dir)?.remove()?;
        info!("Deleted index {}", self.repo_name);
        Ok(())
    }
}
