use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imgindex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding local index layouts
    #[arg(long, global = true, env = "IMGINDEX_XDG_PATH")]
    pub xdg_path: Option<PathBuf>,

    /// Allow plain HTTP and unverified TLS when talking to registries
    #[arg(long, global = true)]
    pub insecure: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty local index
    Create {
        /// Index reference (e.g., ghcr.io/username/app:v1)
        index: String,

        /// Index format: oci or docker
        #[arg(long)]
        format: Option<String>,
    },

    /// Add an image, or images of another index, to a local index
    Add {
        /// Index reference
        index: String,

        /// Image or index reference to add
        image: String,

        /// Add every image when IMAGE is an index
        #[arg(long)]
        all: bool,

        #[command(flatten)]
        platform: PlatformArgs,
    },

    /// Set platform fields, URLs or annotations of one entry
    Annotate {
        /// Index reference
        index: String,

        /// Digest of the entry (e.g., sha256:... or repo@sha256:...)
        digest: String,

        #[command(flatten)]
        platform: PlatformArgs,

        /// URLs to add to the entry
        #[arg(long, value_delimiter = ',')]
        urls: Vec<String>,
    },

    /// Remove an image from a local index
    Remove {
        /// Index reference
        index: String,

        /// Image reference or digest to remove
        image: String,
    },

    /// Print the saved index manifest
    Inspect {
        /// Index reference
        index: String,
    },

    /// Push a local index to its registry
    Push {
        /// Index reference
        index: String,

        /// Additional tags to push
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Convert the index to this format before pushing: oci or docker
        #[arg(long)]
        format: Option<String>,

        /// Delete the local index after pushing
        #[arg(long)]
        purge: bool,
    },

    /// Delete a local index
    Delete {
        /// Index reference
        index: String,
    },

    /// Show version information
    Version,
}

/// Platform and annotation flags shared by `add` and `annotate`
#[derive(Args, Debug, Default)]
pub struct PlatformArgs {
    /// Operating system (e.g., linux)
    #[arg(long)]
    pub os: Option<String>,

    /// CPU architecture (e.g., amd64, arm64)
    #[arg(long)]
    pub arch: Option<String>,

    /// Architecture variant (e.g., v7)
    #[arg(long)]
    pub variant: Option<String>,

    /// Operating system version
    #[arg(long)]
    pub os_version: Option<String>,

    /// Platform features, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Operating system features, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub os_features: Vec<String>,

    /// Annotations as key=value, comma-separated or repeated
    #[arg(long = "annotations", value_delimiter = ',', value_parser = parse_annotation)]
    pub annotations: Vec<(String, String)>,
}

impl PlatformArgs {
    pub fn annotation_map(&self) -> BTreeMap<String, String> {
        self.annotations.iter().cloned().collect()
    }
}

fn parse_annotation(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("invalid annotation '{}', expected key=value", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotation() {
        assert_eq!(
            parse_annotation("org.opencontainers.image.version=1.0").unwrap(),
            (
                "org.opencontainers.image.version".to_string(),
                "1.0".to_string()
            )
        );
        assert_eq!(parse_annotation("empty=").unwrap().1, "");
        assert!(parse_annotation("novalue").is_err());
        assert!(parse_annotation("=value").is_err());
    }

    #[test]
    fn test_parse_annotate_command() {
        let cli = Cli::try_parse_from([
            "imgindex",
            "annotate",
            "registry.example.com/app:v1",
            "sha256:8a4415fb43600953cbdac6ec03c2d96d900bb21f8d78964837dad7f73b9afcdc",
            "--os",
            "linux",
            "--features",
            "a,b",
            "--annotations",
            "k1=v1,k2=v2",
        ])
        .unwrap();

        match cli.command {
            Commands::Annotate { platform, urls, .. } => {
                assert_eq!(platform.os.as_deref(), Some("linux"));
                assert_eq!(platform.features, vec!["a", "b"]);
                assert_eq!(platform.annotation_map().len(), 2);
                assert!(urls.is_empty());
            }
            _ => panic!("expected annotate"),
        }
    }
}
