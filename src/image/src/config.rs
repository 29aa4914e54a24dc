//! Image configuration blob model and the lazily fetched config cache.
//!
//! Only the fields the engine reads are typed here. Conversions that rewrite
//! a configuration go through raw JSON maps so unknown fields survive.

use std::collections::BTreeMap;

use a3s_image_core::{Digest, ImageError, Result};
use chrono::{DateTime, Utc};
use oci_spec::image::ImageConfiguration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::descriptor::{BlobInfo, Descriptor};
use crate::ports::{read_blob, SourceHandle};

fn is_false(value: &bool) -> bool {
    !*value
}

/// One build step in an image configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Set for steps that changed configuration but not the filesystem
    #[serde(default, skip_serializing_if = "is_false")]
    pub empty_layer: bool,
}

/// Layer content identities of an image configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type")]
    pub fs_type: String,
    #[serde(default)]
    pub diff_ids: Vec<Digest>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_layer: String,
}

impl RootFs {
    /// An empty `layers` rootfs.
    pub fn layers() -> Self {
        Self {
            fs_type: "layers".to_string(),
            ..Default::default()
        }
    }
}

/// The slice of a container config the engine reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerConfig {
    #[serde(rename = "Cmd", default)]
    pub cmd: Option<Vec<String>>,
    #[serde(rename = "Labels", default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Image metadata shared by v1 records and schema 2 configs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct V1Image {
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub docker_version: String,
    #[serde(default)]
    pub config: Option<ContainerConfig>,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
}

impl V1Image {
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.config
            .as_ref()
            .and_then(|c| c.labels.clone())
            .unwrap_or_default()
    }
}

/// Schema 2 image configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schema2Config {
    #[serde(flatten)]
    pub image: V1Image,
    #[serde(default)]
    pub rootfs: Option<RootFs>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Schema2Config {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid image config: {}", e)))
    }
}

/// Decode a config blob into the OCI shape.
///
/// `architecture`, `os`, `rootfs` and `history` may be absent or null in a
/// valid config; they are filled with empty values before decoding.
pub fn decode_oci_config(blob: &[u8]) -> Result<ImageConfiguration> {
    let mut fields: Map<String, Value> = serde_json::from_slice(blob)
        .map_err(|e| ImageError::MalformedManifest(format!("invalid image config: {}", e)))?;
    let defaults = [
        ("architecture", Value::String(String::new())),
        ("os", Value::String(String::new())),
        ("rootfs", serde_json::json!({"type": "layers", "diff_ids": []})),
        ("history", Value::Array(Vec::new())),
    ];
    for (key, default) in defaults {
        match fields.get(key) {
            Some(value) if !value.is_null() => {}
            _ => {
                fields.insert(key.to_string(), default);
            }
        }
    }
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ImageError::MalformedManifest(format!("invalid image config: {}", e)))
}

/// Assign-once cache for a config blob.
///
/// The first successful fetch is verified against the descriptor digest and
/// then fixed for the lifetime of the owning manifest.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigBlobCache(OnceCell<Vec<u8>>);

impl ConfigBlobCache {
    /// A cache that already holds `blob`.
    pub(crate) fn with_blob(blob: Vec<u8>) -> Self {
        Self(OnceCell::new_with(Some(blob)))
    }

    pub(crate) async fn get_or_fetch(
        &self,
        source: &SourceHandle,
        descriptor: &Descriptor,
    ) -> Result<&[u8]> {
        let blob = self
            .0
            .get_or_try_init(|| async {
                let source = source.get().ok_or_else(|| {
                    ImageError::MissingPrecondition(
                        "config blob requested without a source or a cached blob".to_string(),
                    )
                })?;
                let blob = read_blob(source.as_ref(), &BlobInfo::from(descriptor)).await?;
                descriptor.digest.verify("config blob", &blob)?;
                tracing::debug!(digest = %descriptor.digest, size = blob.len(), "Fetched config blob");
                Ok::<_, ImageError>(blob)
            })
            .await?;
        Ok(blob.as_slice())
    }
}
