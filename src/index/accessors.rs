//! Per-field getters and setters over the overlay and the base manifest

use std::collections::BTreeMap;

use super::ImageIndex;
use crate::digest::Digest;
use crate::error::{IndexError, PlatformField, Result};
use crate::manifest::{is_docker_media_type, is_oci_media_type, union, Descriptor, Platform};

fn non_empty<T>(value: T, is_empty: impl FnOnce(&T) -> bool) -> Option<T> {
    if is_empty(&value) {
        None
    } else {
        Some(value)
    }
}

fn platform_string(
    descriptor: &Descriptor,
    read: impl FnOnce(&Platform) -> &String,
) -> Option<String> {
    let value = read(descriptor.platform.as_ref()?).clone();
    non_empty(value, String::is_empty)
}

fn platform_list(
    descriptor: &Descriptor,
    read: impl FnOnce(&Platform) -> &Vec<String>,
) -> Option<Vec<String>> {
    let value = read(descriptor.platform.as_ref()?).clone();
    non_empty(value, Vec::is_empty)
}

impl ImageIndex {
    /// Current descriptor for `digest`, overlay first
    pub fn descriptor(&self, digest: &Digest) -> Result<Descriptor> {
        self.check_removed(digest)?;
        if let Some(descriptor) = self.store.get(digest) {
            return Ok(descriptor);
        }
        self.manifest
            .find(digest)
            .cloned()
            .ok_or_else(|| IndexError::DigestNotFound(digest.to_string()))
    }

    fn field<T>(
        &self,
        digest: &Digest,
        field: PlatformField,
        read: impl FnOnce(&Descriptor) -> Option<T>,
    ) -> Result<T> {
        let descriptor = self.descriptor(digest)?;
        read(&descriptor)
            .ok_or_else(|| IndexError::platform_undefined(field, &descriptor.media_type, digest))
    }

    fn update(&self, digest: &Digest, mutate: impl FnOnce(&mut Descriptor)) -> Result<()> {
        self.check_removed(digest)?;
        let found = self
            .store
            .update(digest, || self.manifest.find(digest).cloned(), mutate);
        if !found {
            return Err(IndexError::DigestNotFound(digest.to_string()));
        }
        Ok(())
    }

    pub fn os(&self, digest: &Digest) -> Result<String> {
        self.field(digest, PlatformField::Os, |d| platform_string(d, |p| &p.os))
    }

    pub fn architecture(&self, digest: &Digest) -> Result<String> {
        self.field(digest, PlatformField::Architecture, |d| {
            platform_string(d, |p| &p.architecture)
        })
    }

    pub fn variant(&self, digest: &Digest) -> Result<String> {
        self.field(digest, PlatformField::Variant, |d| {
            platform_string(d, |p| &p.variant)
        })
    }

    pub fn os_version(&self, digest: &Digest) -> Result<String> {
        self.field(digest, PlatformField::OsVersion, |d| {
            platform_string(d, |p| &p.os_version)
        })
    }

    pub fn features(&self, digest: &Digest) -> Result<Vec<String>> {
        self.field(digest, PlatformField::Features, |d| {
            platform_list(d, |p| &p.features)
        })
    }

    pub fn os_features(&self, digest: &Digest) -> Result<Vec<String>> {
        self.field(digest, PlatformField::OsFeatures, |d| {
            platform_list(d, |p| &p.os_features)
        })
    }

    pub fn urls(&self, digest: &Digest) -> Result<Vec<String>> {
        self.field(digest, PlatformField::Urls, |d| {
            non_empty(d.urls.clone(), Vec::is_empty)
        })
    }

    /// Annotations of an OCI descriptor; Docker formats never have any
    pub fn annotations(&self, digest: &Digest) -> Result<BTreeMap<String, String>> {
        self.field(digest, PlatformField::Annotations, |d| {
            if !is_oci_media_type(&d.media_type) {
                return None;
            }
            non_empty(d.annotations.clone(), BTreeMap::is_empty)
        })
    }

    pub fn set_os(&self, digest: &Digest, os: &str) -> Result<()> {
        self.update(digest, |d| d.platform_mut().os = os.to_string())
    }

    pub fn set_architecture(&self, digest: &Digest, architecture: &str) -> Result<()> {
        self.update(digest, |d| {
            d.platform_mut().architecture = architecture.to_string()
        })
    }

    pub fn set_variant(&self, digest: &Digest, variant: &str) -> Result<()> {
        self.update(digest, |d| d.platform_mut().variant = variant.to_string())
    }

    pub fn set_os_version(&self, digest: &Digest, os_version: &str) -> Result<()> {
        self.update(digest, |d| {
            d.platform_mut().os_version = os_version.to_string()
        })
    }

    /// Adds `features` to the existing set
    pub fn set_features(&self, digest: &Digest, features: &[String]) -> Result<()> {
        self.update(digest, |d| {
            let platform = d.platform_mut();
            platform.features = union(&platform.features, features);
        })
    }

    /// Adds `os_features` to the existing set
    pub fn set_os_features(&self, digest: &Digest, os_features: &[String]) -> Result<()> {
        self.update(digest, |d| {
            let platform = d.platform_mut();
            platform.os_features = union(&platform.os_features, os_features);
        })
    }

    /// Adds `urls` to the existing set
    pub fn set_urls(&self, digest: &Digest, urls: &[String]) -> Result<()> {
        self.update(digest, |d| d.urls = union(&d.urls, urls))
    }

    /// Merges `annotations` key by key
    ///
    /// Descriptors of Docker media types are left untouched.
    pub fn set_annotations(
        &self,
        digest: &Digest,
        annotations: &BTreeMap<String, String>,
    ) -> Result<()> {
        let descriptor = self.descriptor(digest)?;
        if is_docker_media_type(&descriptor.media_type) {
            return Ok(());
        }
        self.update(digest, |d| d.merge_annotations(annotations))
    }
}
