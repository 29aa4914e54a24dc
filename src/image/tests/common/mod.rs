//! In-memory image source and destination shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;

use a3s_image::{BlobInfo, BlobStream, ImageDestination, ImageSource};
use a3s_image_core::{Digest, ImageError, ImageReference, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Serves one manifest, manifests by digest, and blobs by digest.
#[derive(Default)]
pub struct MemorySource {
    reference: Option<ImageReference>,
    manifest: Vec<u8>,
    mime_type: String,
    targets: HashMap<String, (Vec<u8>, String)>,
    blobs: HashMap<String, Vec<u8>>,
    signatures: Vec<Vec<u8>>,
    pub target_requests: Mutex<Vec<Digest>>,
    pub blob_requests: Mutex<Vec<Digest>>,
    pub signature_requests: Mutex<usize>,
}

impl MemorySource {
    pub fn new(manifest: impl Into<Vec<u8>>, mime_type: &str) -> Self {
        Self {
            manifest: manifest.into(),
            mime_type: mime_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(ImageReference::parse(reference).unwrap());
        self
    }

    pub fn with_blob(mut self, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        self.blobs.insert(Digest::from_bytes(&data).to_string(), data);
        self
    }

    /// Serve `data` under `digest` regardless of its content.
    pub fn with_blob_at(mut self, digest: &Digest, data: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(digest.to_string(), data.into());
        self
    }

    pub fn with_target(mut self, digest: &Digest, manifest: impl Into<Vec<u8>>, mime_type: &str) -> Self {
        self.targets
            .insert(digest.to_string(), (manifest.into(), mime_type.to_string()));
        self
    }

    pub fn with_signature(mut self, signature: &[u8]) -> Self {
        self.signatures.push(signature.to_vec());
        self
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    fn reference(&self) -> Option<&ImageReference> {
        self.reference.as_ref()
    }

    async fn get_manifest(&self) -> Result<(Vec<u8>, String)> {
        Ok((self.manifest.clone(), self.mime_type.clone()))
    }

    async fn get_target_manifest(&self, digest: &Digest) -> Result<(Vec<u8>, String)> {
        self.target_requests.lock().push(digest.clone());
        self.targets
            .get(digest.as_str())
            .cloned()
            .ok_or_else(|| ImageError::TransportError(format!("manifest {} not found", digest)))
    }

    async fn get_blob(&self, info: &BlobInfo) -> Result<(BlobStream, i64)> {
        self.blob_requests.lock().push(info.digest.clone());
        let data = self
            .blobs
            .get(info.digest.as_str())
            .cloned()
            .ok_or_else(|| ImageError::TransportError(format!("blob {} not found", info.digest)))?;
        let size = data.len() as i64;
        Ok((Box::new(Cursor::new(data)), size))
    }

    async fn get_signatures(&self, _cancel: &CancellationToken) -> Result<Vec<Vec<u8>>> {
        *self.signature_requests.lock() += 1;
        Ok(self.signatures.clone())
    }
}

/// Records every blob written to it.
pub struct MemoryDestination {
    reference: ImageReference,
    pub uploads: Mutex<Vec<(Digest, Vec<u8>)>>,
}

impl MemoryDestination {
    pub fn new(reference: &str) -> Self {
        Self {
            reference: ImageReference::parse(reference).unwrap(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().len()
    }
}

#[async_trait]
impl ImageDestination for MemoryDestination {
    fn reference(&self) -> &ImageReference {
        &self.reference
    }

    async fn put_blob(&self, mut stream: BlobStream, _info: &BlobInfo) -> Result<BlobInfo> {
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await?;
        let digest = Digest::from_bytes(&data);
        let size = data.len() as i64;
        self.uploads.lock().push((digest.clone(), data));
        Ok(BlobInfo::new(digest, size))
    }
}

/// 64-character v1 ID made of `c`.
pub fn v1_id(c: char) -> String {
    std::iter::repeat(c).take(64).collect()
}

/// sha256 digest made of `c`.
pub fn fake_digest(c: char) -> Digest {
    Digest::new(format!("sha256:{}", v1_id(c)))
}

/// Schema 1 manifest from `(id, parent, blob, throwaway)` entries, newest first.
pub fn schema1_manifest(entries: &[(String, String, Digest, bool)]) -> Vec<u8> {
    let fs_layers: Vec<_> = entries
        .iter()
        .map(|(_, _, blob, _)| serde_json::json!({ "blobSum": blob }))
        .collect();
    let history: Vec<_> = entries
        .iter()
        .enumerate()
        .map(|(i, (id, parent, _, throwaway))| {
            let mut v1 = serde_json::json!({
                "id": id,
                "created": format!("2020-01-0{}T00:00:00Z", entries.len() - i),
                "container_config": { "Cmd": [format!("step {}", entries.len() - i)] },
            });
            if !parent.is_empty() {
                v1["parent"] = serde_json::json!(parent);
            }
            if *throwaway {
                v1["throwaway"] = serde_json::json!(true);
            }
            if i == 0 {
                v1["architecture"] = serde_json::json!("amd64");
                v1["os"] = serde_json::json!("linux");
                v1["docker_version"] = serde_json::json!("1.13.1");
                v1["config"] = serde_json::json!({ "Labels": { "maintainer": "a3s" } });
            }
            serde_json::json!({ "v1Compatibility": v1.to_string() })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "schemaVersion": 1,
        "name": "library/busybox",
        "tag": "latest",
        "architecture": "amd64",
        "fsLayers": fs_layers,
        "history": history,
    }))
    .unwrap()
}

/// Schema 2 config blob with the given `(created_by, empty_layer)` history, oldest first.
pub fn schema2_config(history: &[(&str, bool)]) -> Vec<u8> {
    let history: Vec<_> = history
        .iter()
        .map(|(created_by, empty)| {
            let mut entry = serde_json::json!({
                "created": "2021-06-01T12:00:00Z",
                "created_by": created_by,
            });
            if *empty {
                entry["empty_layer"] = serde_json::json!(true);
            }
            entry
        })
        .collect();
    let diff_ids: Vec<_> = history.iter().map(|_| Digest::from_bytes(b"diff")).collect();
    serde_json::to_vec(&serde_json::json!({
        "architecture": "amd64",
        "os": "linux",
        "created": "2021-06-01T12:00:00Z",
        "docker_version": "20.10.7",
        "config": { "Cmd": ["/bin/sh"], "Labels": { "org.example": "yes" } },
        "rootfs": { "type": "layers", "diff_ids": diff_ids },
        "history": history,
        "x-unknown": { "kept": [1, 2, 3] },
    }))
    .unwrap()
}

/// Schema 2 manifest referencing `config` and `layers` as `(digest, size)`.
pub fn schema2_manifest(config: &[u8], layers: &[(Digest, i64)]) -> Vec<u8> {
    let layers: Vec<_> = layers
        .iter()
        .map(|(digest, size)| {
            serde_json::json!({
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "size": size,
                "digest": digest,
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "size": config.len(),
            "digest": Digest::from_bytes(config),
        },
        "layers": layers,
    }))
    .unwrap()
}
