//! Single images that can be attached to an index

use serde::{Deserialize, Serialize};

use crate::constants::media_type;
use crate::digest::Digest;
use crate::error::{IndexError, Result};
use crate::manifest::{sniff_media_type, Descriptor, ManifestKind, Platform};


/// Platform fields of an image config blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(rename = "os.version", default, skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(rename = "os.features", default, skip_serializing_if = "Vec::is_empty")]
    pub os_features: Vec<String>,
}

impl ImageConfig {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn platform(&self) -> Platform {
        Platform {
            architecture: self.architecture.clone(),
            os: self.os.clone(),
            variant: self.variant.clone(),
            os_version: self.os_version.clone(),
            os_features: self.os_features.clone(),
            features: Vec::new(),
        }
    }
}

/// Read-only view of an image
pub trait Image: Send + Sync {
    /// Descriptor the image gets when listed in an index
    fn descriptor(&self) -> Result<Descriptor>;

    fn raw_manifest(&self) -> &[u8];

    fn raw_config(&self) -> Option<&[u8]>;
}

/// Image built from its raw manifest and optional config
#[derive(Debug, Clone)]
pub struct ManifestImage {
    manifest: Vec<u8>,
    media_type: String,
    config: Option<Vec<u8>>,
}

impl ManifestImage {
    /// Wrap raw manifest bytes; the media type is read from the body when absent
    pub fn from_raw(
        manifest: Vec<u8>,
        media_type: Option<&str>,
        config: Option<Vec<u8>>,
    ) -> Result<Self> {
        let media_type = match media_type {
            Some(mt) => mt.to_string(),
            None => sniff_media_type(&manifest).ok_or(IndexError::ManifestUndefined)?,
        };
        if ManifestKind::of(&media_type) != ManifestKind::Image {
            return Err(IndexError::UnknownMediaType(media_type));
        }

        Ok(Self {
            manifest,
            media_type,
            config,
        })
    }

    pub fn config(&self) -> Result<Option<ImageConfig>> {
        self.config
            .as_deref()
            .map(ImageConfig::from_slice)
            .transpose()
    }
}

impl Image for ManifestImage {
    fn descriptor(&self) -> Result<Descriptor> {
        let mut descriptor = Descriptor::new(
            self.media_type.clone(),
            self.manifest.len() as i64,
            Digest::sha256_of(&self.manifest),
        );
        if let Some(config) = self.config()? {
            let platform = config.platform();
            if !platform.is_empty() {
                descriptor.platform = Some(platform);
            }
        }
        Ok(descriptor)
    }

    fn raw_manifest(&self) -> &[u8] {
        &self.manifest
    }

    fn raw_config(&self) -> Option<&[u8]> {
        self.config.as_deref()
    }
}

/// Whether a manifest of this media type references a config blob
pub fn has_config(manifest_media_type: &str) -> bool {
    matches!(
        manifest_media_type,
        media_type::OCI_IMAGE_MANIFEST | media_type::DOCKER_MANIFEST_SCHEMA2
    )
}
