//! Conversions between manifest dialects.
//!
//! schema 1 <-> schema 2 rebuilds history, layers and the v1 ID chain.
//! schema 2 <-> OCI only relabels media types; blobs are untouched.

use std::collections::BTreeMap;

use a3s_image_core::{Digest, ImageError, Result};
use serde::Serialize;
use serde_json::value::RawValue;
use sha2::{Digest as _, Sha256};

use crate::config::{HistoryEntry, RootFs, Schema2Config};
use crate::descriptor::{BlobInfo, Descriptor};
use crate::media_type::{
    DOCKER_V2_SCHEMA1_SIGNED, DOCKER_V2_SCHEMA2, DOCKER_V2_SCHEMA2_CONFIG,
    DOCKER_V2_SCHEMA2_FOREIGN_LAYER, DOCKER_V2_SCHEMA2_LAYER, OCI_IMAGE_CONFIG,
    OCI_IMAGE_LAYER_GZIP, OCI_IMAGE_LAYER_NON_DISTRIBUTABLE,
};
use crate::oci::OciManifest;
use crate::ports::ImageDestination;
use crate::schema1::{FsLayer, Schema1History, Schema1Manifest, V1Compatibility, V1ContainerConfig};
use crate::schema2::Schema2Manifest;

/// A gzipped empty tar, as produced by Docker.
///
/// The bytes carry a non-zero gzip timestamp; they must not be regenerated
/// or registries end up storing a second blob for the same empty layer.
pub const GZIPPED_EMPTY_LAYER: &[u8] = &[
    31, 139, 8, 0, 0, 9, 110, 136, 0, 255, 98, 24, 5, 163, 96, 20, 140, 88, 0, 8, 0, 0, 255, 255,
    46, 175, 181, 239, 0, 4, 0, 0,
];

/// Digest of [`GZIPPED_EMPTY_LAYER`].
pub const GZIPPED_EMPTY_LAYER_DIGEST: &str =
    "sha256:a3ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";

/// Config JSON decoded only one level deep.
type RawConfig = BTreeMap<String, Box<RawValue>>;

fn to_raw<T: Serialize + ?Sized>(value: &T) -> Result<Box<RawValue>> {
    Ok(serde_json::value::to_raw_value(value)?)
}

fn decode_raw(data: &[u8], what: &str) -> Result<RawConfig> {
    serde_json::from_slice(data)
        .map_err(|e| ImageError::MalformedManifest(format!("invalid {}: {}", what, e)))
}

/// schema 1 -> schema 2.
///
/// `uploaded` and `diff_ids` are indexed root first and include empty
/// layers; missing sizes become 0 and missing diff IDs stay empty.
pub(crate) fn schema1_to_schema2(
    m: &Schema1Manifest,
    uploaded: Option<&[BlobInfo]>,
    diff_ids: Option<&[Digest]>,
) -> Result<Schema2Manifest> {
    let count = m.history.len();
    if count == 0 {
        return Err(ImageError::MalformedManifest(format!(
            "cannot convert an image with 0 history entries to {}",
            DOCKER_V2_SCHEMA2
        )));
    }
    if count != m.fs_layers.len() {
        return Err(ImageError::MalformedManifest(format!(
            "inconsistent schema 1 manifest: {} history entries, {} fsLayers entries",
            count,
            m.fs_layers.len()
        )));
    }
    if let Some(uploaded) = uploaded {
        if uploaded.len() != count {
            return Err(ImageError::InconsistentUpdate(format!(
                "uploaded {} blobs, but schema 1 manifest has {} fsLayers",
                uploaded.len(),
                count
            )));
        }
    }
    if let Some(diff_ids) = diff_ids {
        if diff_ids.len() != count {
            return Err(ImageError::InconsistentUpdate(format!(
                "collected {} diff IDs, but schema 1 manifest has {} fsLayers",
                diff_ids.len(),
                count
            )));
        }
    }

    let mut rootfs = RootFs::layers();
    let mut layers = Vec::new();
    let mut history = Vec::with_capacity(count);
    for v1_index in (0..count).rev() {
        let v2_index = count - 1 - v1_index;
        let v1 = V1Compatibility::decode(&m.history[v1_index].v1_compatibility, v1_index)?;
        let throwaway = v1.throwaway;

        history.push(HistoryEntry {
            created: v1.created,
            author: v1.author,
            created_by: v1.container_config.cmd.unwrap_or_default().join(" "),
            comment: v1.comment,
            empty_layer: throwaway,
        });

        if !throwaway {
            let size = uploaded.map_or(0, |u| u[v2_index].size);
            layers.push(Descriptor::new(
                DOCKER_V2_SCHEMA2_LAYER,
                size,
                m.fs_layers[v1_index].blob_sum.clone(),
            ));
            rootfs
                .diff_ids
                .push(diff_ids.map(|d| d[v2_index].clone()).unwrap_or_default());
        }
    }

    let config = config_json_from_v1_config(&m.history[0].v1_compatibility, &rootfs, &history)?;
    let descriptor = Descriptor::for_blob(DOCKER_V2_SCHEMA2_CONFIG, &config);
    tracing::info!(
        layers = layers.len(),
        history = history.len(),
        config = %descriptor.digest,
        "Converted schema 1 manifest to schema 2"
    );
    Ok(Schema2Manifest::from_components(descriptor, None, Some(config), layers))
}

/// schema 2 -> schema 1.
///
/// Empty history entries are backed by [`GZIPPED_EMPTY_LAYER`], uploaded to
/// `destination` at most once. The embedded name and tag come from the
/// destination reference.
pub(crate) async fn schema2_to_schema1(
    m: &Schema2Manifest,
    destination: &dyn ImageDestination,
) -> Result<Schema1Manifest> {
    let config_bytes = m.config_blob().await?;
    let config = Schema2Config::from_slice(config_bytes)?;
    let count = config.history.len();
    if count == 0 {
        return Err(ImageError::MalformedManifest(format!(
            "cannot convert an image with 0 history entries to {}",
            DOCKER_V2_SCHEMA1_SIGNED
        )));
    }

    let mut fs_layers = Vec::with_capacity(count);
    let mut history = Vec::with_capacity(count);
    let mut non_empty_index = 0;
    let mut parent_id = String::new();
    let mut v1_id = String::new();
    let mut empty_layer_uploaded = false;

    for (v2_index, entry) in config.history.iter().enumerate() {
        parent_id = std::mem::take(&mut v1_id);

        let blob_digest = if entry.empty_layer {
            if !empty_layer_uploaded {
                upload_empty_layer(destination).await?;
                empty_layer_uploaded = true;
            }
            Digest::new(GZIPPED_EMPTY_LAYER_DIGEST)
        } else {
            let layer = m.layers.get(non_empty_index).ok_or_else(|| {
                ImageError::MalformedManifest(format!(
                    "invalid image configuration, needs more than the {} distributed layers",
                    m.layers.len()
                ))
            })?;
            non_empty_index += 1;
            layer.digest.clone()
        };

        // The top ID also covers the config, so it changes whenever the config does.
        v1_id = if v2_index == count - 1 {
            v1_id_from_components(&blob_digest, &[parent_id.as_bytes(), config_bytes])?
        } else {
            v1_id_from_components(&blob_digest, &[parent_id.as_bytes()])?
        };

        let record = V1Compatibility {
            id: v1_id.clone(),
            parent: parent_id.clone(),
            comment: entry.comment.clone(),
            created: entry.created,
            container_config: V1ContainerConfig {
                cmd: Some(vec![entry.created_by.clone()]),
            },
            author: entry.author.clone(),
            throwaway: entry.empty_layer,
        };
        fs_layers.push(FsLayer {
            blob_sum: blob_digest,
        });
        history.push(Schema1History {
            v1_compatibility: serde_json::to_string(&record)?,
        });
    }

    fs_layers.reverse();
    history.reverse();

    let top_is_empty = config.history.last().map_or(false, |h| h.empty_layer);
    history[0].v1_compatibility =
        v1_config_from_config_json(config_bytes, &v1_id, &parent_id, top_is_empty)?;

    tracing::info!(
        layers = fs_layers.len(),
        reference = %destination.reference(),
        "Converted schema 2 manifest to schema 1"
    );
    Ok(Schema1Manifest::from_components(
        Some(destination.reference()),
        fs_layers,
        history,
        config.image.architecture,
    ))
}

/// schema 2 -> OCI. Only media types change.
pub(crate) fn schema2_to_oci(m: Schema2Manifest) -> OciManifest {
    let mut config = m.config;
    config.media_type = OCI_IMAGE_CONFIG.to_string();
    let layers = m
        .layers
        .into_iter()
        .map(|mut layer| {
            layer.media_type = if layer.media_type == DOCKER_V2_SCHEMA2_FOREIGN_LAYER {
                OCI_IMAGE_LAYER_NON_DISTRIBUTABLE
            } else {
                OCI_IMAGE_LAYER_GZIP
            }
            .to_string();
            layer
        })
        .collect();
    OciManifest::with_state(config, m.source, m.config_blob, layers)
}

/// OCI -> schema 2. Only media types change; annotations are dropped.
pub(crate) fn oci_to_schema2(m: OciManifest) -> Schema2Manifest {
    let mut config = m.config;
    config.media_type = DOCKER_V2_SCHEMA2_CONFIG.to_string();
    config.annotations.clear();
    let layers = m
        .layers
        .into_iter()
        .map(|mut layer| {
            // schema 2 only knows gzip layers.
            layer.media_type = if layer.media_type == OCI_IMAGE_LAYER_NON_DISTRIBUTABLE {
                DOCKER_V2_SCHEMA2_FOREIGN_LAYER
            } else {
                DOCKER_V2_SCHEMA2_LAYER
            }
            .to_string();
            layer.annotations.clear();
            layer
        })
        .collect();
    Schema2Manifest::with_state(config, m.source, m.config_blob, layers)
}

async fn upload_empty_layer(destination: &dyn ImageDestination) -> Result<()> {
    tracing::debug!("Uploading empty layer during conversion to schema 1");
    let info = BlobInfo::new(
        Digest::new(GZIPPED_EMPTY_LAYER_DIGEST),
        GZIPPED_EMPTY_LAYER.len() as i64,
    );
    let uploaded = destination
        .put_blob(Box::new(GZIPPED_EMPTY_LAYER), &info)
        .await?;
    if uploaded.digest != info.digest {
        return Err(ImageError::DigestMismatch {
            subject: "uploaded empty layer".to_string(),
            expected: info.digest.to_string(),
            actual: uploaded.digest.to_string(),
        });
    }
    Ok(())
}

/// sha256 of the blob hex and `others`, space separated.
fn v1_id_from_components(blob_digest: &Digest, others: &[&[u8]]) -> Result<String> {
    blob_digest.validate()?;
    let mut hasher = Sha256::new();
    hasher.update(blob_digest.hex().as_bytes());
    for part in others {
        hasher.update(b" ");
        hasher.update(part);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Top v1 record: the full config with history bookkeeping swapped for v1 IDs.
fn v1_config_from_config_json(
    config: &[u8],
    v1_id: &str,
    parent_id: &str,
    throwaway: bool,
) -> Result<String> {
    let mut raw = decode_raw(config, "image config")?;
    raw.remove("rootfs");
    raw.remove("history");
    raw.insert("id".to_string(), to_raw(v1_id)?);
    if !parent_id.is_empty() {
        raw.insert("parent".to_string(), to_raw(parent_id)?);
    }
    if throwaway {
        raw.insert("throwaway".to_string(), to_raw(&true)?);
    }
    Ok(serde_json::to_string(&raw)?)
}

/// schema 2 config built from the top v1 record.
fn config_json_from_v1_config(
    v1_config: &str,
    rootfs: &RootFs,
    history: &[HistoryEntry],
) -> Result<Vec<u8>> {
    let mut raw = decode_raw(v1_config.as_bytes(), "history entry 0")?;
    // Size is computed from data on disk and differs between hosts.
    for key in ["id", "parent", "Size", "parent_id", "layer_id", "throwaway"] {
        raw.remove(key);
    }
    raw.insert("rootfs".to_string(), to_raw(rootfs)?);
    raw.insert("history".to_string(), to_raw(history)?);
    Ok(serde_json::to_vec(&raw)?)
}
