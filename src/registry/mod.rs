//! Registry access behind the [`Registry`] trait
//!
//! [`RemoteRegistry`] talks the distribution protocol through
//! `oci-distribution`; [`InMemoryRegistry`] keeps everything in process.

use async_trait::async_trait;
use oci_distribution::Reference;
use std::str::FromStr;

use crate::digest::Digest;
use crate::error::{IndexError, Result};
use crate::manifest::{sniff_media_type, Descriptor, Manifest};

mod memory;
mod remote;

pub use memory::InMemoryRegistry;
pub use remote::RemoteRegistry;


/// A manifest as served by a registry
#[derive(Debug, Clone)]
pub struct RawManifest {
    pub data: Vec<u8>,
    pub media_type: String,
    pub digest: Digest,
}

impl RawManifest {
    /// Wrap fetched bytes, falling back to the body's own media type
    pub fn new(data: Vec<u8>, media_type: Option<String>) -> Result<Self> {
        let media_type = media_type
            .filter(|mt| !mt.is_empty())
            .or_else(|| sniff_media_type(&data))
            .ok_or(IndexError::ManifestUndefined)?;
        let digest = Digest::sha256_of(&data);
        Ok(Self {
            data,
            media_type,
            digest,
        })
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(self.media_type.clone(), self.data.len() as i64, self.digest.clone())
    }

    pub fn parse(&self) -> Result<Manifest> {
        Manifest::parse(&self.media_type, &self.data)
    }
}

/// Operations the index needs from a registry
///
/// `insecure` asks for plain HTTP or unverified TLS for that call.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Descriptor of the manifest `reference` points at
    async fn head(&self, reference: &str, insecure: bool) -> Result<Descriptor>;

    /// Digest `reference` resolves to, without reading the manifest body
    async fn digest(&self, reference: &str, insecure: bool) -> Result<Digest>;

    async fn fetch_manifest(&self, reference: &str, insecure: bool) -> Result<RawManifest>;

    /// Blob `digest` from the repository of `reference`
    async fn fetch_blob(&self, reference: &str, digest: &Digest, insecure: bool)
        -> Result<Vec<u8>>;

    /// Store `data` under `reference`, returning its digest
    async fn write_manifest(
        &self,
        reference: &str,
        data: &[u8],
        media_type: &str,
        insecure: bool,
    ) -> Result<Digest>;
}

pub fn parse_reference(reference: &str) -> Result<Reference> {
    Reference::from_str(reference).map_err(|e| IndexError::InvalidReference {
        reference: reference.to_string(),
        message: e.to_string(),
    })
}

/// `registry/repository@digest` in the repository of `reference`
pub fn digest_reference(reference: &str, digest: &Digest) -> Result<String> {
    let reference = parse_reference(reference)?;
    Ok(format!(
        "{}/{}@{}",
        reference.registry(),
        reference.repository(),
        digest
    ))
}

/// `registry/repository:tag` in the repository of `reference`
pub fn tag_reference(reference: &str, tag: &str) -> Result<String> {
    let reference = parse_reference(reference)?;
    let tagged = format!("{}/{}:{}", reference.registry(), reference.repository(), tag);
    parse_reference(&tagged)?;
    Ok(tagged)
}

/// Directory name for a repository reference
pub fn make_file_safe_name(reference: &str) -> String {
    reference.replace(':', "-").replace('/', "_")
}
