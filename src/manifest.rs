use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::constants::media_type;
use crate::digest::Digest;
use crate::error::{IndexError, Result};

/// What a descriptor points at, decided by its media type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Image,
    Index,
    Other,
}

impl ManifestKind {
    pub fn of(media_type: &str) -> Self {
        match media_type {
            media_type::OCI_IMAGE_INDEX | media_type::DOCKER_MANIFEST_LIST => ManifestKind::Index,
            media_type::OCI_IMAGE_MANIFEST
            | media_type::DOCKER_MANIFEST_SCHEMA2
            | media_type::DOCKER_MANIFEST_SCHEMA1
            | media_type::DOCKER_MANIFEST_SCHEMA1_SIGNED => ManifestKind::Image,
            _ => ManifestKind::Other,
        }
    }
}

/// Docker manifest formats carry no annotations
pub fn is_docker_media_type(media_type: &str) -> bool {
    matches!(
        media_type,
        media_type::DOCKER_MANIFEST_LIST
            | media_type::DOCKER_MANIFEST_SCHEMA2
            | media_type::DOCKER_MANIFEST_SCHEMA1
            | media_type::DOCKER_MANIFEST_SCHEMA1_SIGNED
    )
}

pub fn is_oci_media_type(media_type: &str) -> bool {
    matches!(
        media_type,
        media_type::OCI_IMAGE_INDEX | media_type::OCI_IMAGE_MANIFEST
    )
}

/// Wire format of an index manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexFormat {
    #[default]
    Oci,
    Docker,
}

impl IndexFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            IndexFormat::Oci => media_type::OCI_IMAGE_INDEX,
            IndexFormat::Docker => media_type::DOCKER_MANIFEST_LIST,
        }
    }

    pub fn from_media_type(value: &str) -> Result<Self> {
        match value {
            media_type::OCI_IMAGE_INDEX => Ok(IndexFormat::Oci),
            media_type::DOCKER_MANIFEST_LIST => Ok(IndexFormat::Docker),
            other => Err(IndexError::InvalidFormat(other.to_string())),
        }
    }
}

impl FromStr for IndexFormat {
    type Err = IndexError;

    /// Accepts `oci`, `docker` or a full index media type
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "oci" => Ok(IndexFormat::Oci),
            "docker" => Ok(IndexFormat::Docker),
            _ => Self::from_media_type(s),
        }
    }
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Platform information for a manifest
///
/// Empty strings and empty lists mean the field is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(rename = "os.version", default, skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(rename = "os.features", default, skip_serializing_if = "Vec::is_empty")]
    pub os_features: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Platform {
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            ..Default::default()
        }
    }

    /// Platform of the running host, using registry naming
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "powerpc64" => "ppc64le",
            other => other,
        };
        Self::new(os, arch)
    }

    pub fn is_empty(&self) -> bool {
        *self == Platform::default()
    }

    /// Whether `self` can run where `filter` is required.
    ///
    /// OS and architecture must be equal; variant and OS version only when the
    /// filter sets them; the filter's feature lists must be subsets.
    pub fn satisfies(&self, filter: &Platform) -> bool {
        fn subset(have: &[String], want: &[String]) -> bool {
            want.iter().all(|w| have.contains(w))
        }

        self.os == filter.os
            && self.architecture == filter.architecture
            && (filter.variant.is_empty() || self.variant == filter.variant)
            && (filter.os_version.is_empty() || self.os_version == filter.os_version)
            && subset(&self.features, &filter.features)
            && subset(&self.os_features, &filter.os_features)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if !self.variant.is_empty() {
            write!(f, "/{}", self.variant)?;
        }
        if !self.os_version.is_empty() {
            write!(f, ":{}", self.os_version)?;
        }
        Ok(())
    }
}

/// Descriptor for a platform-specific manifest in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub size: i64,
    pub digest: Digest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, size: i64, digest: Digest) -> Self {
        Self {
            media_type: media_type.into(),
            size,
            digest,
            urls: Vec::new(),
            annotations: BTreeMap::new(),
            platform: None,
            artifact_type: None,
        }
    }

    pub fn kind(&self) -> ManifestKind {
        ManifestKind::of(&self.media_type)
    }

    /// Platform record, allocated on first use
    pub fn platform_mut(&mut self) -> &mut Platform {
        self.platform.get_or_insert_with(Platform::default)
    }

    /// Merge annotations key by key; new values win
    pub fn merge_annotations(&mut self, annotations: &BTreeMap<String, String>) {
        for (key, value) in annotations {
            self.annotations.insert(key.clone(), value.clone());
        }
    }
}

/// Set union of two string lists, without duplicates
pub fn union(existing: &[String], added: &[String]) -> Vec<String> {
    let set: BTreeSet<&String> = existing.iter().chain(added.iter()).collect();
    set.into_iter().cloned().collect()
}

/// OCI Image Index (manifest list) for multi-arch support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    pub schema_version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
}

impl IndexManifest {
    pub fn new(format: IndexFormat, manifests: Vec<Descriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(format.media_type().to_string()),
            manifests,
            annotations: BTreeMap::new(),
            subject: None,
        }
    }

    pub fn empty(format: IndexFormat) -> Self {
        Self::new(format, Vec::new())
    }

    /// Media type, treating an unset field as an OCI index
    pub fn media_type(&self) -> &str {
        self.media_type
            .as_deref()
            .unwrap_or(media_type::OCI_IMAGE_INDEX)
    }

    pub fn find(&self, digest: &Digest) -> Option<&Descriptor> {
        self.manifests.iter().find(|d| &d.digest == digest)
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.find(digest).is_some()
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Image manifest; only the fields the index needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A fetched manifest, discriminated by media type
#[derive(Debug, Clone)]
pub enum Manifest {
    Image(ImageManifest),
    Index(IndexManifest),
}

impl Manifest {
    /// Parse raw bytes served under `media_type`
    pub fn parse(media_type: &str, data: &[u8]) -> Result<Self> {
        match ManifestKind::of(media_type) {
            ManifestKind::Index => Ok(Manifest::Index(serde_json::from_slice(data)?)),
            ManifestKind::Image => Ok(Manifest::Image(serde_json::from_slice(data)?)),
            ManifestKind::Other => Err(IndexError::UnknownMediaType(media_type.to_string())),
        }
    }
}

/// Media type declared inside a manifest body, if any
///
/// Bodies without a `mediaType` field are classified by shape.
pub fn sniff_media_type(data: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        schema_version: Option<i32>,
        media_type: Option<String>,
        manifests: Option<serde_json::Value>,
        config: Option<serde_json::Value>,
        signatures: Option<serde_json::Value>,
    }

    let probe: Probe = serde_json::from_slice(data).ok()?;
    if let Some(mt) = probe.media_type {
        return Some(mt);
    }
    let sniffed = match probe {
        Probe {
            schema_version: Some(1),
            signatures: Some(_),
            ..
        } => media_type::DOCKER_MANIFEST_SCHEMA1_SIGNED,
        Probe {
            schema_version: Some(1),
            ..
        } => media_type::DOCKER_MANIFEST_SCHEMA1,
        Probe {
            manifests: Some(_), ..
        } => media_type::OCI_IMAGE_INDEX,
        Probe { config: Some(_), .. } => media_type::OCI_IMAGE_MANIFEST,
        _ => return None,
    };
    Some(sniffed.to_string())
}

/// Index manifest wrapped so it can be written to a registry under a tag
#[derive(Debug, Clone)]
pub struct TaggableIndex {
    manifest: IndexManifest,
}

impl TaggableIndex {
    pub fn new(manifest: IndexManifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn raw_manifest(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.manifest)?)
    }

    /// Digest of the subject when one is embedded, otherwise of the raw manifest
    pub fn digest(&self) -> Result<Digest> {
        if let Some(subject) = &self.manifest.subject {
            return Ok(subject.digest.clone());
        }
        Ok(Digest::sha256_of(&self.raw_manifest()?))
    }

    pub fn size(&self) -> Result<i64> {
        if let Some(subject) = self.manifest.subject.as_ref().filter(|s| s.size != 0) {
            return Ok(subject.size);
        }
        Ok(self.raw_manifest()?.len() as i64)
    }

    pub fn media_type(&self) -> &str {
        self.manifest.media_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(seed: &str) -> Digest {
        Digest::sha256_of(seed.as_bytes())
    }

    #[test]
    fn test_manifest_kind() {
        assert_eq!(
            ManifestKind::of(media_type::DOCKER_MANIFEST_LIST),
            ManifestKind::Index
        );
        assert_eq!(
            ManifestKind::of(media_type::DOCKER_MANIFEST_SCHEMA1_SIGNED),
            ManifestKind::Image
        );
        assert_eq!(
            ManifestKind::of(media_type::OCI_IMAGE_CONFIG),
            ManifestKind::Other
        );
    }

    #[test]
    fn test_index_format_parsing() {
        assert_eq!("oci".parse::<IndexFormat>().unwrap(), IndexFormat::Oci);
        assert_eq!("Docker".parse::<IndexFormat>().unwrap(), IndexFormat::Docker);
        assert_eq!(
            media_type::DOCKER_MANIFEST_LIST
                .parse::<IndexFormat>()
                .unwrap(),
            IndexFormat::Docker
        );
        assert!(matches!(
            media_type::OCI_IMAGE_MANIFEST.parse::<IndexFormat>(),
            Err(IndexError::InvalidFormat(_))
        ));
        assert!(media_type::DOCKER_CONFIG.parse::<IndexFormat>().is_err());
    }

    #[test]
    fn test_platform_satisfies() {
        let candidate = Platform {
            os: "linux".to_string(),
            architecture: "arm".to_string(),
            variant: "v7".to_string(),
            os_version: "1.2.3".to_string(),
            features: vec!["feature-3".to_string(), "feature-4".to_string()],
            os_features: vec!["os-feature-3".to_string()],
        };

        assert!(candidate.satisfies(&Platform::new("linux", "arm")));

        let mut filter = Platform::new("linux", "arm");
        filter.variant = "v7".to_string();
        filter.features = vec!["feature-4".to_string()];
        assert!(candidate.satisfies(&filter));

        filter.variant = "v6".to_string();
        assert!(!candidate.satisfies(&filter));

        let mut filter = Platform::new("linux", "arm");
        filter.os_features = vec!["os-feature-9".to_string()];
        assert!(!candidate.satisfies(&filter));

        assert!(!candidate.satisfies(&Platform::new("linux", "arm64")));
    }

    #[test]
    fn test_platform_serde_field_names() {
        let json = r#"{"architecture":"arm","os":"linux","os.version":"1.2.3","os.features":["a"],"variant":"v7"}"#;
        let platform: Platform = serde_json::from_str(json).unwrap();
        assert_eq!(platform.os_version, "1.2.3");
        assert_eq!(platform.os_features, vec!["a"]);
        assert!(platform.features.is_empty());

        let back = serde_json::to_string(&platform).unwrap();
        assert!(back.contains("\"os.version\":\"1.2.3\""));
        assert!(!back.contains("\"features\""));
    }

    #[test]
    fn test_union_deduplicates() {
        let existing = vec!["a".to_string(), "b".to_string()];
        let added = vec!["b".to_string(), "c".to_string(), "a".to_string()];
        assert_eq!(union(&existing, &added), vec!["a", "b", "c"]);
        assert_eq!(union(&union(&existing, &existing), &existing).len(), 2);
    }

    #[test]
    fn test_sniff_media_type() {
        let index = br#"{"schemaVersion":2,"manifests":[]}"#;
        assert_eq!(
            sniff_media_type(index).as_deref(),
            Some(media_type::OCI_IMAGE_INDEX)
        );

        let docker = format!(
            r#"{{"schemaVersion":2,"mediaType":"{}","manifests":[]}}"#,
            media_type::DOCKER_MANIFEST_LIST
        );
        assert_eq!(
            sniff_media_type(docker.as_bytes()).as_deref(),
            Some(media_type::DOCKER_MANIFEST_LIST)
        );

        let schema1 = br#"{"schemaVersion":1,"name":"busybox","signatures":[]}"#;
        assert_eq!(
            sniff_media_type(schema1).as_deref(),
            Some(media_type::DOCKER_MANIFEST_SCHEMA1_SIGNED)
        );

        assert_eq!(sniff_media_type(b"not json"), None);
    }

    #[test]
    fn test_taggable_index_digest_and_size() {
        let manifest = IndexManifest::new(
            IndexFormat::Docker,
            vec![Descriptor::new(
                media_type::DOCKER_MANIFEST_SCHEMA2,
                525,
                digest("amd64"),
            )],
        );
        let taggable = TaggableIndex::new(manifest.clone());
        let raw = taggable.raw_manifest().unwrap();

        assert_eq!(taggable.digest().unwrap(), Digest::sha256_of(&raw));
        assert_eq!(taggable.size().unwrap(), raw.len() as i64);
        assert_eq!(taggable.media_type(), media_type::DOCKER_MANIFEST_LIST);

        let mut with_subject = manifest;
        with_subject.subject = Some(Descriptor::new(
            media_type::OCI_IMAGE_INDEX,
            42,
            digest("subject"),
        ));
        let taggable = TaggableIndex::new(with_subject);
        assert_eq!(taggable.digest().unwrap(), digest("subject"));
        assert_eq!(taggable.size().unwrap(), 42);
    }

    #[test]
    fn test_index_manifest_default_media_type() {
        let manifest: IndexManifest =
            serde_json::from_str(r#"{"schemaVersion":2,"manifests":[]}"#).unwrap();
        assert_eq!(manifest.media_type(), media_type::OCI_IMAGE_INDEX);
    }
}
