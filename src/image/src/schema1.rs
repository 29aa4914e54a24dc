//! Docker schema 1 manifests.
//!
//! Layers are stored newest first, each paired with a `v1Compatibility`
//! JSON string carrying a v1 image ID chain. Parsing normalizes that chain
//! the way `docker pull` does.

use std::collections::HashSet;

use a3s_image_core::{Digest, ImageError, ImageReference, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::V1Image;
use crate::descriptor::{BlobInfo, Descriptor};
use crate::inspect::ImageInspectInfo;
use crate::jws;
use crate::media_type::DOCKER_V2_SCHEMA1_SIGNED;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsLayer {
    #[serde(rename = "blobSum")]
    pub blob_sum: Digest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema1History {
    #[serde(rename = "v1Compatibility")]
    pub v1_compatibility: String,
}

/// A schema 1 manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema1Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(rename = "fsLayers", default)]
    pub fs_layers: Vec<FsLayer>,
    #[serde(default)]
    pub history: Vec<Schema1History>,
    #[serde(rename = "schemaVersion")]
    pub schema_version: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct V1ContainerConfig {
    #[serde(rename = "Cmd", default)]
    pub cmd: Option<Vec<String>>,
}

/// Decode `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decoded `v1Compatibility` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct V1Compatibility {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub container_config: V1ContainerConfig,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub throwaway: bool,
}

impl V1Compatibility {
    pub(crate) fn decode(raw: &str, index: usize) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            ImageError::MalformedManifest(format!("error decoding history entry {}: {}", index, e))
        })
    }
}

impl Schema1Manifest {
    /// Decode and validate a schema 1 manifest, normalizing its ID chain.
    pub fn from_bytes(manifest: &[u8]) -> Result<Self> {
        let mut m: Self = serde_json::from_slice(manifest)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid schema 1 manifest: {}", e)))?;
        if m.schema_version != 1 {
            return Err(ImageError::MalformedManifest(format!(
                "unsupported schema version {}",
                m.schema_version
            )));
        }
        if m.fs_layers.len() != m.history.len() {
            return Err(ImageError::MalformedManifest(
                "length of history not equal to number of layers".to_string(),
            ));
        }
        if m.fs_layers.is_empty() {
            return Err(ImageError::MalformedManifest(
                "no FSLayers in manifest".to_string(),
            ));
        }
        m.fix_layers()?;
        Ok(m)
    }

    /// Assemble a manifest; `reference` supplies the embedded name and tag.
    pub fn from_components(
        reference: Option<&ImageReference>,
        fs_layers: Vec<FsLayer>,
        history: Vec<Schema1History>,
        architecture: String,
    ) -> Self {
        let (name, tag) = match reference {
            Some(r) => (r.path().to_string(), r.tag().unwrap_or_default().to_string()),
            None => (String::new(), String::new()),
        };
        Self {
            name,
            tag,
            architecture,
            fs_layers,
            history,
            schema_version: 1,
        }
    }

    /// Drop adjacent duplicate IDs and check the parent chain.
    ///
    /// The resulting layer list may still repeat blob digests; images that
    /// only change configuration legitimately do that.
    fn fix_layers(&mut self) -> Result<()> {
        #[derive(Deserialize)]
        struct IdLink {
            #[serde(default)]
            id: String,
            #[serde(default)]
            parent: String,
        }

        let mut links = Vec::with_capacity(self.history.len());
        for (index, entry) in self.history.iter().enumerate() {
            let link: IdLink = serde_json::from_str(&entry.v1_compatibility).map_err(|e| {
                ImageError::MalformedManifest(format!("error decoding history entry {}: {}", index, e))
            })?;
            validate_v1_id(&link.id)?;
            links.push(link);
        }

        if links.last().map_or(false, |base| !base.parent.is_empty()) {
            return Err(ImageError::MalformedManifest(
                "invalid parent ID in the base layer of the image".to_string(),
            ));
        }

        // A repeat that is not adjacent would never be collapsed below.
        let mut seen = HashSet::new();
        let mut last_id: Option<&str> = None;
        for link in &links {
            if last_id != Some(link.id.as_str()) && seen.contains(link.id.as_str()) {
                return Err(ImageError::MalformedManifest(format!(
                    "ID {} appears multiple times in manifest",
                    link.id
                )));
            }
            last_id = Some(link.id.as_str());
            seen.insert(link.id.as_str());
        }

        for i in (0..links.len().saturating_sub(1)).rev() {
            if links[i].id == links[i + 1].id {
                self.fs_layers.remove(i);
                self.history.remove(i);
            } else if links[i].parent != links[i + 1].id {
                return Err(ImageError::MalformedManifest(format!(
                    "invalid parent ID: expected {}, got {}",
                    links[i + 1].id,
                    links[i].parent
                )));
            }
        }
        Ok(())
    }

    /// JSON with a dummy signature appended.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let unsigned = serde_json::to_vec(self)?;
        jws::add_dummy_signature(&unsigned)
    }

    pub fn mime_type(&self) -> &'static str {
        DOCKER_V2_SCHEMA1_SIGNED
    }

    /// Schema 1 has no separate config object.
    pub fn config_info(&self) -> Descriptor {
        Descriptor::default()
    }

    /// Layers root first; sizes are unknown.
    pub fn layer_infos(&self) -> Vec<BlobInfo> {
        self.fs_layers
            .iter()
            .rev()
            .map(|layer| BlobInfo::unknown_size(layer.blob_sum.clone()))
            .collect()
    }

    pub fn embedded_reference_conflicts(&self, reference: &ImageReference) -> bool {
        self.name != reference.path() || self.tag != reference.tag().unwrap_or_default()
    }

    /// Summary taken from the newest history entry.
    pub fn inspect(&self) -> Result<ImageInspectInfo> {
        let raw = self.history.first().map(|h| h.v1_compatibility.as_str()).ok_or_else(|| {
            ImageError::MalformedManifest("schema 1 manifest has no history".to_string())
        })?;
        let v1: V1Image = serde_json::from_str(raw)
            .map_err(|e| ImageError::MalformedManifest(format!("error decoding history entry 0: {}", e)))?;
        Ok(ImageInspectInfo {
            tag: self.tag.clone(),
            created: v1.created,
            docker_version: v1.docker_version.clone(),
            labels: v1.labels(),
            architecture: v1.architecture,
            os: v1.os,
            layers: Vec::new(),
        })
    }

    /// Replace layer digests. `infos` is root first and includes empty layers.
    pub(crate) fn apply_layer_infos(&mut self, infos: &[BlobInfo]) -> Result<()> {
        if infos.len() != self.fs_layers.len() {
            return Err(ImageError::LayerCountMismatch {
                expected: self.fs_layers.len(),
                actual: infos.len(),
            });
        }
        let last = infos.len() - 1;
        for (i, info) in infos.iter().enumerate() {
            // v1 IDs are left alone; pull only checks their linkage.
            self.fs_layers[last - i].blob_sum = info.digest.clone();
        }
        Ok(())
    }

    /// Copy path and tag from `reference`; an untagged reference clears the tag.
    pub(crate) fn set_embedded_reference(&mut self, reference: &ImageReference) {
        self.name = reference.path().to_string();
        self.tag = reference.tag().unwrap_or_default().to_string();
    }
}

/// v1 IDs are 64 lowercase hex characters.
fn validate_v1_id(id: &str) -> Result<()> {
    let valid = id.len() == 64 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if valid {
        Ok(())
    } else {
        Err(ImageError::MalformedManifest(format!(
            "image ID \"{}\" is invalid",
            id
        )))
    }
}
