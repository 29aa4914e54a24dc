//! Image directories on local disk.
//!
//! Layout:
//! - `manifest.json`: the manifest
//! - `manifest.mime`: its MIME type (optional, guessed when absent)
//! - `blobs/<algorithm>/<hex>`: config and layer blobs, and list entries
//! - `signature-<n>`: signatures, numbered from 1

use std::io::Cursor;
use std::path::{Path, PathBuf};

use a3s_image::{BlobInfo, BlobStream, ImageDestination, ImageSource};
use a3s_image_core::{Digest, ImageError, ImageReference, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MIME_TYPE_FILE: &str = "manifest.mime";
const BLOBS_DIR: &str = "blobs";

/// Path of the blob `digest` under `root`. The digest is validated first so
/// it cannot escape the blob directory.
pub fn blob_path(root: &Path, digest: &Digest) -> Result<PathBuf> {
    digest.validate()?;
    Ok(root
        .join(BLOBS_DIR)
        .join(digest.algorithm())
        .join(digest.hex()))
}

fn signature_path(root: &Path, index: usize) -> PathBuf {
    root.join(format!("signature-{}", index))
}

/// Reads an image directory.
pub struct DirectorySource {
    root: PathBuf,
    reference: Option<ImageReference>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, reference: Option<ImageReference>) -> Self {
        Self {
            root: root.into(),
            reference,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        ImageError::TransportError(format!("Failed to read {} {}: {}", what, path.display(), e))
    })
}

#[async_trait]
impl ImageSource for DirectorySource {
    fn reference(&self) -> Option<&ImageReference> {
        self.reference.as_ref()
    }

    async fn get_manifest(&self) -> Result<(Vec<u8>, String)> {
        let manifest = read_file(&self.root.join(MANIFEST_FILE), "manifest").await?;
        let mime_type = match tokio::fs::read_to_string(self.root.join(MIME_TYPE_FILE)).await {
            Ok(mime_type) => mime_type.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok((manifest, mime_type))
    }

    async fn get_target_manifest(&self, digest: &Digest) -> Result<(Vec<u8>, String)> {
        let manifest = read_file(&blob_path(&self.root, digest)?, "manifest").await?;
        Ok((manifest, String::new()))
    }

    async fn get_blob(&self, info: &BlobInfo) -> Result<(BlobStream, i64)> {
        let path = blob_path(&self.root, &info.digest)?;
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            ImageError::TransportError(format!("Failed to open blob {}: {}", path.display(), e))
        })?;
        let size = file.metadata().await?.len() as i64;
        tracing::debug!(digest = %info.digest, size, "Opened blob");
        Ok((Box::new(file), size))
    }

    async fn get_signatures(&self, cancel: &CancellationToken) -> Result<Vec<Vec<u8>>> {
        let mut signatures = Vec::new();
        for index in 1.. {
            if cancel.is_cancelled() {
                return Err(ImageError::TransportError(
                    "Signature read cancelled".to_string(),
                ));
            }
            match tokio::fs::read(signature_path(&self.root, index)).await {
                Ok(signature) => signatures.push(signature),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(signatures)
    }
}

/// Writes an image directory.
pub struct DirectoryDestination {
    root: PathBuf,
    reference: ImageReference,
}

impl DirectoryDestination {
    /// Create `root` if needed.
    pub async fn create(root: impl Into<PathBuf>, reference: ImageReference) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, reference })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn put_manifest(&self, manifest: &[u8], mime_type: &str) -> Result<()> {
        tokio::fs::write(self.root.join(MANIFEST_FILE), manifest).await?;
        tokio::fs::write(self.root.join(MIME_TYPE_FILE), mime_type).await?;
        Ok(())
    }

    /// Store in-memory bytes as a blob.
    pub async fn put_bytes(&self, data: &[u8]) -> Result<BlobInfo> {
        let info = BlobInfo::new(Digest::from_bytes(data), data.len() as i64);
        self.put_blob(Box::new(Cursor::new(data.to_vec())), &info).await
    }
}

#[async_trait]
impl ImageDestination for DirectoryDestination {
    fn reference(&self) -> &ImageReference {
        &self.reference
    }

    async fn put_blob(&self, mut stream: BlobStream, info: &BlobInfo) -> Result<BlobInfo> {
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await?;

        // Stored under the digest of what was actually received.
        let algorithm = if info.digest.is_empty() {
            a3s_image_core::digest::SHA256
        } else {
            info.digest.algorithm()
        };
        let digest = Digest::compute(algorithm, &data)?;
        let path = blob_path(&self.root, &digest)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        tracing::debug!(%digest, size = data.len(), "Stored blob");

        Ok(BlobInfo {
            digest,
            size: data.len() as i64,
            urls: info.urls.clone(),
            annotations: info.annotations.clone(),
        })
    }
}
