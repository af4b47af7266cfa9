use async_trait::async_trait;
use oci_distribution::Reference;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{parse_reference, RawManifest, Registry};
use crate::constants::defaults;
use crate::digest::Digest;
use crate::error::{IndexError, Result};
use crate::manifest::Descriptor;

#[derive(Default)]
struct Repository {
    manifests: HashMap<Digest, RawManifest>,
    tags: HashMap<String, Digest>,
}

#[derive(Default)]
struct State {
    repositories: HashMap<String, Repository>,
    blobs: HashMap<Digest, Vec<u8>>,
    rejected: HashSet<String>,
    insecure_calls: usize,
}

/// Registry kept entirely in memory
///
/// References are normalized the same way as for a remote registry, so
/// `busybox` and `docker.io/library/busybox:latest` name the same manifest.
#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

fn repository_key(reference: &Reference) -> String {
    format!("{}/{}", reference.registry(), reference.repository())
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a manifest and point the reference's tag (if any) at it
    pub fn insert_manifest(&self, reference: &str, data: &[u8], media_type: &str) -> Result<Digest> {
        let parsed = parse_reference(reference)?;
        let raw = RawManifest::new(data.to_vec(), Some(media_type.to_string()))?;
        let digest = raw.digest.clone();

        let mut state = self.state.lock();
        let repository = state
            .repositories
            .entry(repository_key(&parsed))
            .or_default();
        repository.manifests.insert(digest.clone(), raw);
        if parsed.digest().is_none() {
            let tag = parsed.tag().unwrap_or(defaults::TAG).to_string();
            repository.tags.insert(tag, digest.clone());
        }
        Ok(digest)
    }

    pub fn insert_blob(&self, data: &[u8]) -> Digest {
        let digest = Digest::sha256_of(data);
        self.state.lock().blobs.insert(digest.clone(), data.to_vec());
        digest
    }

    /// Make every write to `reference` fail
    pub fn reject_writes_to(&self, reference: &str) -> Result<()> {
        let parsed = parse_reference(reference)?;
        self.state.lock().rejected.insert(parsed.whole());
        Ok(())
    }

    /// Tags currently defined in the repository of `reference`
    pub fn tags(&self, reference: &str) -> Result<Vec<String>> {
        let parsed = parse_reference(reference)?;
        let state = self.state.lock();
        let mut tags: Vec<String> = state
            .repositories
            .get(&repository_key(&parsed))
            .map(|r| r.tags.keys().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        Ok(tags)
    }

    /// Number of calls made with the insecure flag set
    pub fn insecure_calls(&self) -> usize {
        self.state.lock().insecure_calls
    }

    fn lookup(&self, reference: &str, insecure: bool) -> Result<RawManifest> {
        let parsed = parse_reference(reference)?;
        let mut state = self.state.lock();
        if insecure {
            state.insecure_calls += 1;
        }

        let repository = state
            .repositories
            .get(&repository_key(&parsed))
            .ok_or_else(|| IndexError::registry(reference, "repository not found"))?;

        let digest = match parsed.digest() {
            Some(digest) => digest.parse::<Digest>()?,
            None => {
                let tag = parsed.tag().unwrap_or(defaults::TAG);
                repository
                    .tags
                    .get(tag)
                    .cloned()
                    .ok_or_else(|| IndexError::registry(reference, "manifest unknown"))?
            }
        };

        repository
            .manifests
            .get(&digest)
            .cloned()
            .ok_or_else(|| IndexError::registry(reference, "manifest unknown"))
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn head(&self, reference: &str, insecure: bool) -> Result<Descriptor> {
        Ok(self.lookup(reference, insecure)?.descriptor())
    }

    async fn digest(&self, reference: &str, insecure: bool) -> Result<Digest> {
        Ok(self.lookup(reference, insecure)?.digest)
    }

    async fn fetch_manifest(&self, reference: &str, insecure: bool) -> Result<RawManifest> {
        debug!("Fetching manifest {} from memory", reference);
        self.lookup(reference, insecure)
    }

    async fn fetch_blob(
        &self,
        reference: &str,
        digest: &Digest,
        insecure: bool,
    ) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        if insecure {
            state.insecure_calls += 1;
        }
        state
            .blobs
            .get(digest)
            .cloned()
            .ok_or_else(|| IndexError::registry(reference, format!("blob unknown: {}", digest)))
    }

    async fn write_manifest(
        &self,
        reference: &str,
        data: &[u8],
        media_type: &str,
        insecure: bool,
    ) -> Result<Digest> {
        let parsed = parse_reference(reference)?;
        {
            let mut state = self.state.lock();
            if insecure {
                state.insecure_calls += 1;
            }
            if state.rejected.contains(&parsed.whole()) {
                return Err(IndexError::registry(reference, "write denied"));
            }
        }
        self.insert_manifest(reference, data, media_type)
    }
}
