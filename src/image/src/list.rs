//! Docker manifest lists.
//!
//! A list is never an image on its own; it is resolved to the entry for one
//! platform, whose manifest is fetched and verified against the list.

use a3s_image_core::{ImageError, Platform, Result};
use serde::{Deserialize, Serialize};

use crate::descriptor::{Descriptor, ManifestPlatform};
use crate::manifest::matches_digest;
use crate::ports::ImageSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestListEntry {
    #[serde(flatten)]
    pub descriptor: Descriptor,
    #[serde(default)]
    pub platform: ManifestPlatform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestList {
    #[serde(rename = "schemaVersion")]
    pub schema_version: i64,
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    #[serde(default)]
    pub manifests: Vec<ManifestListEntry>,
}

impl ManifestList {
    pub fn from_bytes(manifest: &[u8]) -> Result<Self> {
        serde_json::from_slice(manifest)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid manifest list: {}", e)))
    }

    /// First entry whose architecture and OS both match.
    ///
    /// Variant and OS version are not consulted.
    pub fn select(&self, platform: &Platform) -> Result<&ManifestListEntry> {
        self.manifests
            .iter()
            .find(|entry| {
                entry.platform.architecture == platform.architecture
                    && entry.platform.os == platform.os
            })
            .ok_or_else(|| ImageError::NoPlatformMatch {
                os: platform.os.clone(),
                architecture: platform.architecture.clone(),
            })
    }

    /// Fetch the manifest selected for `platform` and verify it.
    pub async fn resolve(
        &self,
        source: &dyn ImageSource,
        platform: &Platform,
    ) -> Result<(Vec<u8>, String)> {
        let entry = self.select(platform)?;
        let digest = &entry.descriptor.digest;
        tracing::debug!(%digest, %platform, "Selected manifest list entry");

        let (manifest, mime_type) = source.get_target_manifest(digest).await?;
        if !matches_digest(&manifest, digest)? {
            return Err(ImageError::DigestMismatch {
                subject: "manifest list entry".to_string(),
                expected: digest.to_string(),
                actual: crate::manifest::manifest_digest(&manifest)?.to_string(),
            });
        }
        Ok((manifest, mime_type))
    }
}
