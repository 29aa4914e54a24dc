//! Blob descriptors and the blob-info currency used for layer updates.

use std::collections::BTreeMap;

use a3s_image_core::Digest;
use serde::{Deserialize, Serialize};

/// A manifest record pointing at a blob.
///
/// On the wire `size` is the true blob length and `digest` matches the
/// bytes the blob fetch returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub size: i64,
    pub digest: Digest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// Only carried by OCI manifests
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, size: i64, digest: Digest) -> Self {
        Self {
            media_type: media_type.into(),
            size,
            digest,
            ..Default::default()
        }
    }

    /// Descriptor for `data`, hashed with sha256.
    pub fn for_blob(media_type: impl Into<String>, data: &[u8]) -> Self {
        Self::new(media_type, data.len() as i64, Digest::from_bytes(data))
    }

    /// Overwrite location fields from `info`, keeping the media type.
    pub(crate) fn apply(&mut self, info: &BlobInfo, with_annotations: bool) {
        self.digest = info.digest.clone();
        self.size = info.size;
        self.urls = info.urls.clone();
        if with_annotations {
            self.annotations = info.annotations.clone();
        }
    }
}

/// Blob location exchanged with callers and transports.
///
/// `size` may be `-1` when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobInfo {
    pub digest: Digest,
    pub size: i64,
    pub urls: Vec<String>,
    pub annotations: BTreeMap<String, String>,
}

impl BlobInfo {
    pub fn new(digest: Digest, size: i64) -> Self {
        Self {
            digest,
            size,
            ..Default::default()
        }
    }

    /// A blob whose size is not known.
    pub fn unknown_size(digest: Digest) -> Self {
        Self::new(digest, -1)
    }
}

impl From<&Descriptor> for BlobInfo {
    fn from(descriptor: &Descriptor) -> Self {
        Self {
            digest: descriptor.digest.clone(),
            size: descriptor.size,
            urls: descriptor.urls.clone(),
            annotations: descriptor.annotations.clone(),
        }
    }
}

/// Platform record of a manifest list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPlatform {
    pub architecture: String,
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
