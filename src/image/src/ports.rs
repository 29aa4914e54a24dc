//! Transport ports.
//!
//! The engine never talks to a registry or a disk directly. Manifests,
//! blobs and signatures come from an [`ImageSource`]; synthetic blobs
//! produced during conversion go to an [`ImageDestination`].

use std::fmt;
use std::sync::Arc;

use a3s_image_core::{Digest, ImageReference, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::descriptor::BlobInfo;

/// Byte stream of one blob. Dropping it closes the underlying handle.
pub type BlobStream = Box<dyn AsyncRead + Send + Unpin>;

/// Where an image is read from.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Reference the source was opened with, if any.
    fn reference(&self) -> Option<&ImageReference>;

    /// The primary manifest and its MIME type (may be empty if unknown).
    async fn get_manifest(&self) -> Result<(Vec<u8>, String)>;

    /// A manifest addressed by digest, used for manifest list entries.
    async fn get_target_manifest(&self, digest: &Digest) -> Result<(Vec<u8>, String)>;

    /// A blob stream and its size (`-1` if unknown).
    async fn get_blob(&self, info: &BlobInfo) -> Result<(BlobStream, i64)>;

    /// Signature blobs attached to the image.
    async fn get_signatures(&self, cancel: &CancellationToken) -> Result<Vec<Vec<u8>>>;
}

/// Where converted images are written to.
#[async_trait]
pub trait ImageDestination: Send + Sync {
    /// Reference of the image being written.
    fn reference(&self) -> &ImageReference;

    /// Store a blob; returns its real digest and size.
    async fn put_blob(&self, stream: BlobStream, info: &BlobInfo) -> Result<BlobInfo>;
}

/// Fetch a whole blob into memory. The stream is closed before returning.
pub async fn read_blob(source: &dyn ImageSource, info: &BlobInfo) -> Result<Vec<u8>> {
    let (mut stream, size) = source.get_blob(info).await?;
    let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    stream.read_to_end(&mut data).await?;
    Ok(data)
}

/// Shared handle to an optional source, kept by parsed manifests for lazy fetches.
#[derive(Clone, Default)]
pub(crate) struct SourceHandle(Option<Arc<dyn ImageSource>>);

impl SourceHandle {
    pub(crate) fn new(source: Option<Arc<dyn ImageSource>>) -> Self {
        Self(source)
    }

    pub(crate) fn get(&self) -> Option<&Arc<dyn ImageSource>> {
        self.0.as_ref()
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(source) => match source.reference() {
                Some(reference) => write!(f, "SourceHandle({})", reference),
                None => f.write_str("SourceHandle(<unnamed>)"),
            },
            None => f.write_str("SourceHandle(None)"),
        }
    }
}
