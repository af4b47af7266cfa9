//! Error types for index operations

use std::fmt;
use std::path::PathBuf;

use crate::constants::media_type;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, IndexError>;

/// Descriptor field that may be missing from an index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformField {
    Os,
    Architecture,
    Variant,
    OsVersion,
    Features,
    OsFeatures,
    Urls,
    Annotations,
}

impl fmt::Display for PlatformField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformField::Os => "os",
            PlatformField::Architecture => "architecture",
            PlatformField::Variant => "variant",
            PlatformField::OsVersion => "os-version",
            PlatformField::Features => "features",
            PlatformField::OsFeatures => "os-features",
            PlatformField::Urls => "urls",
            PlatformField::Annotations => "annotations",
        };
        f.write_str(name)
    }
}

/// Errors returned by index operations
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no image or image index found for digest \"{0}\"")]
    DigestNotFound(String),

    #[error("image {field} is undefined for {} ImageIndex (digest: {digest})", format_family(.media_type))]
    PlatformFieldUndefined {
        field: PlatformField,
        media_type: String,
        digest: String,
    },

    #[error("unable to determine image platform: platform's 'OS' or 'Architecture' field is empty")]
    InvalidPlatform,

    #[error("no image found for specified platform {0}")]
    NoImageForPlatform(String),

    #[error("unsupported media type encountered in image: '{0}'")]
    UnknownMediaType(String),

    #[error("encountered unexpected error while parsing image: manifest or index manifest is missing")]
    ManifestUndefined,

    #[error("unable to perform action: ImageIndex requires local storage before proceeding, save the index first")]
    IndexNeedToBeSaved,

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("invalid digest '{0}'")]
    InvalidDigest(String),

    #[error("invalid reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    #[error("'{0}' is not an image index format")]
    InvalidFormat(String),

    #[error("registry error for {reference}: {message}")]
    Registry { reference: String, message: String },

    #[error("no OCI layout found at {}", .0.display())]
    LayoutNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    pub(crate) fn platform_undefined(
        field: PlatformField,
        media_type: &str,
        digest: impl fmt::Display,
    ) -> Self {
        IndexError::PlatformFieldUndefined {
            field,
            media_type: media_type.to_string(),
            digest: digest.to_string(),
        }
    }

    pub(crate) fn registry(reference: impl fmt::Display, message: impl fmt::Display) -> Self {
        IndexError::Registry {
            reference: reference.to_string(),
            message: message.to_string(),
        }
    }

    /// True for errors meaning the digest is unknown to the index
    pub fn is_digest_not_found(&self) -> bool {
        matches!(self, IndexError::DigestNotFound(_))
    }
}

fn format_family(format: &str) -> &'static str {
    match format {
        media_type::DOCKER_MANIFEST_LIST | media_type::DOCKER_MANIFEST_SCHEMA2 => "Docker",
        media_type::OCI_IMAGE_INDEX | media_type::OCI_IMAGE_MANIFEST => "OCI",
        _ => "UNKNOWN",
    }
}

/// One failed write among several named targets
#[derive(Debug)]
pub struct SaveDiagnostic {
    pub image_name: String,
    pub cause: IndexError,
}

/// Aggregate of every failed target in a multi-target write
#[derive(Debug)]
pub struct SaveError {
    pub errors: Vec<SaveDiagnostic>,
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let causes: Vec<String> = self
            .errors
            .iter()
            .map(|d| format!("[{}: {}]", d.image_name, d.cause))
            .collect();
        write!(
            f,
            "failed to write image to the following tags: {}",
            causes.join(",")
        )
    }
}

impl std::error::Error for SaveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_undefined_message() {
        let err = IndexError::platform_undefined(
            PlatformField::Annotations,
            media_type::DOCKER_MANIFEST_SCHEMA2,
            "sha256:abc",
        );
        assert_eq!(
            err.to_string(),
            "image annotations is undefined for Docker ImageIndex (digest: sha256:abc)"
        );

        let err = IndexError::platform_undefined(
            PlatformField::OsVersion,
            "application/octet-stream",
            "sha256:abc",
        );
        assert!(err.to_string().contains("os-version is undefined for UNKNOWN"));
    }

    #[test]
    fn test_save_error_lists_every_target() {
        let err = SaveError {
            errors: vec![
                SaveDiagnostic {
                    image_name: "registry.io/repo:a".to_string(),
                    cause: IndexError::ManifestUndefined,
                },
                SaveDiagnostic {
                    image_name: "registry.io/repo:b".to_string(),
                    cause: IndexError::registry("registry.io/repo:b", "denied"),
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("failed to write image to the following tags: "));
        assert!(message.contains("[registry.io/repo:a: "));
        assert!(message.contains("[registry.io/repo:b: registry error for registry.io/repo:b: denied]"));
    }
}
