//! Ingestion of images and indexes into the overlay

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use super::{AddOptions, ImageIndex};
use crate::digest::Digest;
use crate::error::{IndexError, Result};
use crate::image::{has_config, Image, ImageConfig};
use crate::layout::LayoutPath;
use crate::manifest::{is_docker_media_type, Descriptor, Manifest, ManifestKind, Platform};
use crate::registry::{digest_reference, RawManifest};

impl ImageIndex {
    /// Add the image or index `reference` points at
    ///
    /// A single image is added as is. For an index, either every image in the
    /// tree is added (`with_all`) or the one image matching the requested
    /// platform, the host platform when none is given.
    pub async fn add(&mut self, reference: &str, options: AddOptions) -> Result<()> {
        if let Some(image) = &options.local_image {
            return self.add_local(image.as_ref(), &options.annotations);
        }

        let head = self.registry.head(reference, self.insecure).await?;
        let fetched = match head.kind() {
            ManifestKind::Image => {
                vec![self.fetch_image(reference, None, &options.annotations).await?]
            }
            ManifestKind::Index if options.all => {
                self.fetch_all(reference, &head.digest, &options.annotations)
                    .await?
            }
            ManifestKind::Index => {
                let filter = if options.platform.is_empty() {
                    Platform::host()
                } else {
                    options.platform.clone()
                };
                if filter.os.is_empty() || filter.architecture.is_empty() {
                    return Err(IndexError::InvalidPlatform);
                }
                vec![
                    self.fetch_for_platform(reference, &filter, &options.annotations)
                        .await?,
                ]
            }
            ManifestKind::Other => return Err(IndexError::UnknownMediaType(head.media_type)),
        };

        // nothing is staged until every fetch has succeeded
        self.init_layout()?;
        let added = fetched.len();
        for descriptor in fetched {
            self.removed.remove(&descriptor.digest);
            self.store.insert(descriptor);
        }
        info!(
            "Added {} image(s) from {} to {}",
            added,
            reference,
            self.repo_name
        );
        Ok(())
    }

    fn add_local(
        &mut self,
        image: &dyn Image,
        annotations: &BTreeMap<String, String>,
    ) -> Result<()> {
        if !LayoutPath::exists(&self.layout_dir) {
            return Err(IndexError::IndexNeedToBeSaved);
        }
        let layout = LayoutPath::from_path(&self.layout_dir)?;

        let mut descriptor = image.descriptor()?;
        if !is_docker_media_type(&descriptor.media_type) {
            descriptor.merge_annotations(annotations);
        }

        layout.write_blob(image.raw_manifest())?;
        if let Some(config) = image.raw_config() {
            layout.write_blob(config)?;
        }
        layout.replace_descriptor(&descriptor)?;

        self.removed.remove(&descriptor.digest);
        self.manifest
            .manifests
            .retain(|d| d.digest != descriptor.digest);
        info!("Added local image {} to {}", descriptor.digest, self.repo_name);
        self.manifest.manifests.push(descriptor);
        Ok(())
    }

    /// Descriptor of the image at `reference`
    ///
    /// `listed` is the entry the image had in a parent index; its platform,
    /// URLs and annotations are kept. Without a listed platform the image
    /// config is fetched to fill one in.
    async fn fetch_image(
        &self,
        reference: &str,
        listed: Option<&Descriptor>,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Descriptor> {
        let raw = self.registry.fetch_manifest(reference, self.insecure).await?;
        let mut descriptor = raw.descriptor();
        if descriptor.kind() != ManifestKind::Image {
            return Err(IndexError::UnknownMediaType(raw.media_type));
        }

        if let Some(listed) = listed {
            if listed.digest != raw.digest {
                return Err(IndexError::registry(
                    reference,
                    format!("expected {} but got {}", listed.digest, raw.digest),
                ));
            }
            descriptor.platform = listed.platform.clone();
            descriptor.urls = listed.urls.clone();
            descriptor.annotations = listed.annotations.clone();
        }

        let has_platform = descriptor.platform.as_ref().is_some_and(|p| !p.is_empty());
        if !has_platform {
            if let Some(platform) = self.config_platform(reference, &raw).await? {
                descriptor.platform = Some(platform);
            }
        }

        if !is_docker_media_type(&descriptor.media_type) {
            descriptor.merge_annotations(annotations);
        }
        debug!("Resolved image {} ({})", descriptor.digest, descriptor.media_type);
        Ok(descriptor)
    }

    async fn config_platform(
        &self,
        reference: &str,
        raw: &RawManifest,
    ) -> Result<Option<Platform>> {
        if !has_config(&raw.media_type) {
            return Ok(None);
        }
        let Manifest::Image(manifest) = raw.parse()? else {
            return Ok(None);
        };

        let data = self
            .registry
            .fetch_blob(reference, &manifest.config.digest, self.insecure)
            .await?;
        let platform = ImageConfig::from_slice(&data)?.platform();
        Ok(Some(platform).filter(|p| !p.is_empty()))
    }

    async fn fetch_for_platform(
        &self,
        reference: &str,
        filter: &Platform,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Descriptor> {
        let raw = self.registry.fetch_manifest(reference, self.insecure).await?;
        let Manifest::Index(index) = raw.parse()? else {
            return Err(IndexError::UnknownMediaType(raw.media_type));
        };

        let listed = index
            .manifests
            .iter()
            .find(|d| {
                d.kind() == ManifestKind::Image
                    && d.platform.as_ref().is_some_and(|p| p.satisfies(filter))
            })
            .ok_or_else(|| IndexError::NoImageForPlatform(filter.to_string()))?;

        let child = digest_reference(reference, &listed.digest)?;
        self.fetch_image(&child, Some(listed), annotations).await
    }

    /// Walk the index tree under `reference` and fetch every image in it
    ///
    /// Indexes are fetched level by level with at most
    /// `max_concurrent_fetches` requests in flight; a digest is visited once.
    async fn fetch_all(
        &self,
        reference: &str,
        root: &Digest,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Vec<Descriptor>> {
        let limit = self.max_concurrent_fetches;
        let insecure = self.insecure;

        let mut visited = HashSet::from([root.clone()]);
        let mut indexes = vec![reference.to_string()];
        let mut images: Vec<Descriptor> = Vec::new();

        while !indexes.is_empty() {
            let fetched: Vec<RawManifest> = stream::iter(std::mem::take(&mut indexes))
                .map(|r| async move { self.registry.fetch_manifest(&r, insecure).await })
                .buffer_unordered(limit)
                .try_collect()
                .await?;

            for raw in fetched {
                let Manifest::Index(index) = raw.parse()? else {
                    return Err(IndexError::UnknownMediaType(raw.media_type));
                };
                for child in index.manifests {
                    if !visited.insert(child.digest.clone()) {
                        continue;
                    }
                    match child.kind() {
                        ManifestKind::Index => {
                            indexes.push(digest_reference(reference, &child.digest)?)
                        }
                        ManifestKind::Image => images.push(child),
                        ManifestKind::Other => {
                            return Err(IndexError::UnknownMediaType(child.media_type))
                        }
                    }
                }
            }
        }

        debug!("Found {} image(s) under {}", images.len(), reference);
        stream::iter(images)
            .map(|listed| async move {
                let child = digest_reference(reference, &listed.digest)?;
                self.fetch_image(&child, Some(&listed), annotations).await
            })
            .buffer_unordered(limit)
            .try_collect()
            .await
    }
}
