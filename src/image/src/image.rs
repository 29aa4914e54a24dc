//! Consumer-facing images.
//!
//! An [`Image`] pairs a parsed manifest with where it came from. Images read
//! from a source are [`SourcedImage`]s; updates produce
//! [`MemoryImage`](crate::memory::MemoryImage)s.

use std::sync::Arc;

use a3s_image_core::{ImageError, ImageReference, Platform, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::descriptor::{BlobInfo, Descriptor};
use crate::inspect::ImageInspectInfo;
use crate::manifest::{manifest_digest, matches_digest, ParsedManifest, UpdateOptions};
use crate::media_type::{guess_mime_type, ManifestDialect};
use crate::memory::MemoryImage;
use crate::ports::ImageSource;

/// Read access to a single image.
#[async_trait]
pub trait Image: Send + Sync {
    /// Reference of the originating source; `None` for in-memory images.
    fn reference(&self) -> Option<&ImageReference>;

    /// Manifest bytes and MIME type.
    async fn manifest(&self) -> Result<(Vec<u8>, String)>;

    /// Signature blobs. `cancel` is handed to the source unchanged.
    async fn signatures(&self, cancel: &CancellationToken) -> Result<Vec<Vec<u8>>>;

    /// Stored size in bytes, `-1` if unknown.
    fn size(&self) -> i64;

    async fn inspect(&self) -> Result<ImageInspectInfo>;

    /// Whether the source manifest was a manifest list.
    fn is_multi_image(&self) -> bool;

    fn parsed_manifest(&self) -> &ParsedManifest;

    fn layer_infos(&self) -> Vec<BlobInfo> {
        self.parsed_manifest().layer_infos()
    }

    fn config_info(&self) -> Descriptor {
        self.parsed_manifest().config_info()
    }

    async fn config_blob(&self) -> Result<Option<&[u8]>> {
        self.parsed_manifest().config_blob().await
    }

    /// Apply `options`, producing an image that carries no reference or signatures.
    async fn updated_image(&self, options: &UpdateOptions) -> Result<MemoryImage> {
        let parsed = self.parsed_manifest().updated_image(options).await?;
        Ok(MemoryImage::new(parsed))
    }
}

/// An image read through an [`ImageSource`].
pub struct SourcedImage {
    source: Arc<dyn ImageSource>,
    manifest: Vec<u8>,
    mime_type: String,
    is_multi_image: bool,
    parsed: ParsedManifest,
    signatures: OnceCell<Vec<Vec<u8>>>,
}

impl SourcedImage {
    /// Open the image, resolving manifest lists for the host platform.
    pub async fn from_source(source: Arc<dyn ImageSource>) -> Result<Self> {
        Self::from_source_for_platform(source, &Platform::host()).await
    }

    /// Open the image, resolving manifest lists for `platform`.
    ///
    /// A digest in the source reference is checked before the manifest is parsed.
    pub async fn from_source_for_platform(
        source: Arc<dyn ImageSource>,
        platform: &Platform,
    ) -> Result<Self> {
        let (manifest, mime_type) = source.get_manifest().await?;

        if let Some(expected) = source.reference().and_then(|r| r.digest()) {
            if !matches_digest(&manifest, expected)? {
                return Err(ImageError::DigestMismatch {
                    subject: "manifest".to_string(),
                    expected: expected.to_string(),
                    actual: manifest_digest(&manifest)?.to_string(),
                });
            }
        }

        let mime_type = if mime_type.is_empty() {
            let guessed = guess_mime_type(&manifest);
            tracing::debug!(mime_type = %guessed, "Source did not report a manifest type, guessed one");
            guessed
        } else {
            mime_type
        };
        let is_multi_image = ManifestDialect::from_mime_type(&mime_type) == ManifestDialect::Index;

        let parsed =
            ParsedManifest::parse_for_platform(Some(source.clone()), &manifest, &mime_type, platform)
                .await?;

        Ok(Self {
            source,
            manifest,
            mime_type,
            is_multi_image,
            parsed,
            signatures: OnceCell::new(),
        })
    }
}

#[async_trait]
impl Image for SourcedImage {
    fn reference(&self) -> Option<&ImageReference> {
        self.source.reference()
    }

    /// The manifest as fetched; for a list this is the list itself.
    async fn manifest(&self) -> Result<(Vec<u8>, String)> {
        Ok((self.manifest.clone(), self.mime_type.clone()))
    }

    async fn signatures(&self, cancel: &CancellationToken) -> Result<Vec<Vec<u8>>> {
        let signatures = self
            .signatures
            .get_or_try_init(|| async { self.source.get_signatures(cancel).await })
            .await?;
        Ok(signatures.clone())
    }

    fn size(&self) -> i64 {
        -1
    }

    async fn inspect(&self) -> Result<ImageInspectInfo> {
        let mut info = self.parsed.inspect().await?;
        info.layers = self
            .parsed
            .layer_infos()
            .into_iter()
            .map(|layer| layer.digest.to_string())
            .collect();
        Ok(info)
    }

    fn is_multi_image(&self) -> bool {
        self.is_multi_image
    }

    fn parsed_manifest(&self) -> &ParsedManifest {
        &self.parsed
    }
}
