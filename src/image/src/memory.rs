//! Images that exist only as an updated parsed manifest.

use a3s_image_core::{ImageError, ImageReference, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::image::Image;
use crate::inspect::ImageInspectInfo;
use crate::manifest::ParsedManifest;

/// Result of an update. Has no reference, and signatures cannot be read
/// since the manifest no longer matches any that were made.
#[derive(Debug)]
pub struct MemoryImage {
    parsed: ParsedManifest,
    serialized: OnceCell<Vec<u8>>,
}

impl MemoryImage {
    pub fn new(parsed: ParsedManifest) -> Self {
        Self {
            parsed,
            serialized: OnceCell::new(),
        }
    }

    pub fn into_parsed_manifest(self) -> ParsedManifest {
        self.parsed
    }
}

#[async_trait]
impl Image for MemoryImage {
    fn reference(&self) -> Option<&ImageReference> {
        None
    }

    async fn manifest(&self) -> Result<(Vec<u8>, String)> {
        let bytes = self
            .serialized
            .get_or_try_init(|| async { self.parsed.serialize() })
            .await?;
        Ok((bytes.clone(), self.parsed.mime_type().to_string()))
    }

    async fn signatures(&self, _cancel: &CancellationToken) -> Result<Vec<Vec<u8>>> {
        Err(ImageError::SignaturesNotSupported)
    }

    fn size(&self) -> i64 {
        -1
    }

    async fn inspect(&self) -> Result<ImageInspectInfo> {
        self.parsed.inspect().await
    }

    fn is_multi_image(&self) -> bool {
        false
    }

    fn parsed_manifest(&self) -> &ParsedManifest {
        &self.parsed
    }
}
