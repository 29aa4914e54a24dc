//! Docker schema 2 image manifests.

use std::sync::Arc;

use a3s_image_core::{ImageError, Result};
use oci_spec::image::ImageConfiguration;
use serde::{Deserialize, Serialize};

use crate::config::{decode_oci_config, ConfigBlobCache, Schema2Config};
use crate::descriptor::{BlobInfo, Descriptor};
use crate::inspect::ImageInspectInfo;
use crate::media_type::DOCKER_V2_SCHEMA2;
use crate::ports::{ImageSource, SourceHandle};

/// A schema 2 manifest plus the state needed to fetch its config lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema2Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: i64,
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,

    #[serde(skip)]
    pub(crate) source: SourceHandle,
    #[serde(skip)]
    pub(crate) config_blob: ConfigBlobCache,
}

impl Schema2Manifest {
    pub fn from_bytes(manifest: &[u8], source: Option<Arc<dyn ImageSource>>) -> Result<Self> {
        let mut m: Self = serde_json::from_slice(manifest)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid schema 2 manifest: {}", e)))?;
        m.source = SourceHandle::new(source);
        Ok(m)
    }

    /// Assemble a manifest. A known `config_blob` is cached up front.
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
            media_type: DOCKER_V2_SCHEMA2.to_string(),
            config,
            layers,
            source,
            config_blob,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn mime_type(&self) -> &'static str {
        DOCKER_V2_SCHEMA2
    }

    pub fn config_info(&self) -> Descriptor {
        self.config.clone()
    }

    /// The config blob, fetched and verified on first use.
    pub async fn config_blob(&self) -> Result<&[u8]> {
        self.config_blob.get_or_fetch(&self.source, &self.config).await
    }

    /// The config blob decoded into the OCI shape.
    pub async fn oci_config(&self) -> Result<ImageConfiguration> {
        decode_oci_config(self.config_blob().await?)
    }

    pub fn layer_infos(&self) -> Vec<BlobInfo> {
        self.layers
            .iter()
            .map(|layer| BlobInfo {
                digest: layer.digest.clone(),
                size: layer.size,
                urls: layer.urls.clone(),
                annotations: Default::default(),
            })
            .collect()
    }

    pub async fn inspect(&self) -> Result<ImageInspectInfo> {
        let config = Schema2Config::from_slice(self.config_blob().await?)?;
        let labels = config.image.labels();
        Ok(ImageInspectInfo {
            tag: String::new(),
            created: config.image.created,
            docker_version: config.image.docker_version,
            labels,
            architecture: config.image.architecture,
            os: config.image.os,
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
            layer.apply(info, false);
        }
        Ok(())
    }
}
