//! OCI image manifests.
//!
//! Structurally the same as schema 2; descriptors may carry annotations.

use std::collections::BTreeMap;
use std::sync::Arc;

use a3s_image_core::{ImageError, Result};
use chrono::{DateTime, Utc};
use oci_spec::image::ImageConfiguration;
use serde::{Deserialize, Serialize};

use crate::config::{decode_oci_config, ConfigBlobCache};
use crate::descriptor::{BlobInfo, Descriptor};
use crate::inspect::ImageInspectInfo;
use crate::media_type::OCI_IMAGE_MANIFEST;
use crate::ports::{ImageSource, SourceHandle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OciManifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: i64,
    #[serde(rename = "mediaType", default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(skip)]
    pub(crate) source: SourceHandle,
    #[serde(skip)]
    pub(crate) config_blob: ConfigBlobCache,
}

impl OciManifest {
    pub fn from_bytes(manifest: &[u8], source: Option<Arc<dyn ImageSource>>) -> Result<Self> {
        let mut m: Self = serde_json::from_slice(manifest)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid OCI manifest: {}", e)))?;
        m.source = SourceHandle::new(source);
        Ok(m)
    }

    pub fn from_components(
        config: Descriptor,
        source: Option<Arc<dyn ImageSource>>,
        config_blob: Option<Vec<u8>>,
        layers: Vec<Descriptor>,
    ) -> Self {
        Self::with_state(
            config,
            SourceHandle::new(source),
            config_blob.map(ConfigBlobCache::with_blob).unwrap_or_default(),
            layers,
        )
    }

    pub(crate) fn with_state(
        config: Descriptor,
        source: SourceHandle,
        config_blob: ConfigBlobCache,
        layers: Vec<Descriptor>,
    ) -> Self {
        Self {
            schema_version: 2,
            media_type: OCI_IMAGE_MANIFEST.to_string(),
            config,
            layers,
            annotations: BTreeMap::new(),
            source,
            config_blob,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn mime_type(&self) -> &'static str {
        OCI_IMAGE_MANIFEST
    }

    pub fn config_info(&self) -> Descriptor {
        self.config.clone()
    }

    pub async fn config_blob(&self) -> Result<&[u8]> {
        self.config_blob.get_or_fetch(&self.source, &self.config).await
    }

    pub async fn oci_config(&self) -> Result<ImageConfiguration> {
        decode_oci_config(self.config_blob().await?)
    }

    pub fn layer_infos(&self) -> Vec<BlobInfo> {
        self.layers.iter().map(BlobInfo::from).collect()
    }

    pub async fn inspect(&self) -> Result<ImageInspectInfo> {
        let config = self.oci_config().await?;
        let created = match config.created() {
            Some(created) => Some(
                DateTime::parse_from_rfc3339(created)
                    .map_err(|e| {
                        ImageError::MalformedManifest(format!("invalid created time '{}': {}", created, e))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        let labels = config
            .config()
            .as_ref()
            .and_then(|c| c.labels().clone())
            .map(|labels| labels.into_iter().collect())
            .unwrap_or_default();
        Ok(ImageInspectInfo {
            tag: String::new(),
            created,
            docker_version: String::new(),
            labels,
            architecture: config.architecture().to_string(),
            os: config.os().to_string(),
            layers: Vec::new(),
        })
    }

    pub(crate) fn apply_layer_infos(&mut self, infos: &[BlobInfo]) -> Result<()> {
        if infos.len() != self.layers.len() {
            return Err(ImageError::LayerCountMismatch {
                expected: self.layers.len(),
                actual: infos.len(),
            });
        }
        for (layer, info) in self.layers.iter_mut().zip(infos) {
            layer.apply(info, true);
        }
        Ok(())
    }
}
