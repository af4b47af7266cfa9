//! Build, annotate and publish multi-platform OCI image indexes
//!
//! ```no_run
//! # async fn run() -> imgindex::Result<()> {
//! use imgindex::{AddOptions, ImageIndex, IndexOptions, PushOptions};
//!
//! let mut index = ImageIndex::new("ghcr.io/example/app:v1", IndexOptions::new())?;
//! index
//!     .add("docker.io/library/busybox:latest", AddOptions::new().with_all(true))
//!     .await?;
//! index.save()?;
//! index.push(PushOptions::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod digest;
pub mod error;
pub mod image;
pub mod index;
pub mod layout;
pub mod manifest;
pub mod registry;

pub use digest::Digest;
pub use error::{IndexError, Result};
pub use index::{AddOptions, ImageIndex, IndexOptions, PushOptions};
pub use manifest::{Descriptor, IndexFormat, IndexManifest, Platform};
