//! A3S Image - Container image manifest engine.
//!
//! This module parses Docker schema 1, Docker schema 2, Docker manifest list
//! and OCI image manifests behind a single [`ParsedManifest`] type, and
//! converts images between the single-image formats.

#![allow(clippy::result_large_err)]

pub mod config;
pub mod convert;
pub mod descriptor;
pub mod image;
pub mod inspect;
pub mod jws;
pub mod list;
pub mod manifest;
pub mod media_type;
pub mod memory;
pub mod oci;
pub mod ports;
pub mod schema1;
pub mod schema2;

// Re-export common types
pub use config::{HistoryEntry, RootFs, Schema2Config};
pub use convert::{GZIPPED_EMPTY_LAYER, GZIPPED_EMPTY_LAYER_DIGEST};
pub use descriptor::{BlobInfo, Descriptor, ManifestPlatform};
pub use image::{Image, SourcedImage};
pub use inspect::ImageInspectInfo;
pub use list::{ManifestList, ManifestListEntry};
pub use manifest::{manifest_digest, matches_digest, ParsedManifest, UpdateInformation, UpdateOptions};
pub use media_type::{guess_mime_type, ManifestDialect};
pub use memory::MemoryImage;
pub use oci::OciManifest;
pub use ports::{read_blob, BlobStream, ImageDestination, ImageSource};
pub use schema1::Schema1Manifest;
pub use schema2::Schema2Manifest;

/// A3S Image version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
