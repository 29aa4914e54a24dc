//! Dialect-independent view of a parsed manifest.
//!
//! [`ParsedManifest`] dispatches every query to the dialect it was parsed
//! from, and [`ParsedManifest::updated_image`] routes conversions between
//! dialects.

use std::borrow::Cow;
use std::sync::Arc;

use a3s_image_core::{Digest, ImageError, ImageReference, Platform, Result};
use oci_spec::image::ImageConfiguration;

use crate::convert;
use crate::descriptor::{BlobInfo, Descriptor};
use crate::inspect::ImageInspectInfo;
use crate::jws;
use crate::list::ManifestList;
use crate::media_type::{guess_mime_type, ManifestDialect, DOCKER_V2_SCHEMA1_SIGNED};
use crate::oci::OciManifest;
use crate::ports::{ImageDestination, ImageSource};
use crate::schema1::Schema1Manifest;
use crate::schema2::Schema2Manifest;

/// Digest of a manifest as registries compute it.
///
/// Signed schema 1 manifests are digested without their signatures.
pub fn manifest_digest(manifest: &[u8]) -> Result<Digest> {
    Ok(Digest::from_bytes(&digest_input(manifest)?))
}

/// Whether `manifest` hashes to `expected`, using the algorithm of `expected`.
pub fn matches_digest(manifest: &[u8], expected: &Digest) -> Result<bool> {
    Ok(expected.matches(&digest_input(manifest)?))
}

fn digest_input(manifest: &[u8]) -> Result<Cow<'_, [u8]>> {
    if guess_mime_type(manifest) == DOCKER_V2_SCHEMA1_SIGNED {
        Ok(Cow::Owned(jws::signed_payload(manifest)?))
    } else {
        Ok(Cow::Borrowed(manifest))
    }
}

/// Side information that only matters for some conversions.
#[derive(Clone, Default)]
pub struct UpdateInformation {
    /// Receives blobs synthesized during conversion (schema 1 empty layers)
    pub destination: Option<Arc<dyn ImageDestination>>,
    /// Blobs as actually uploaded, root first
    pub layer_infos: Option<Vec<BlobInfo>>,
    /// Uncompressed layer digests, root first
    pub layer_diff_ids: Option<Vec<Digest>>,
}

/// Requested changes for [`ParsedManifest::updated_image`].
#[derive(Clone, Default)]
pub struct UpdateOptions {
    /// Replacement layer locations, root first
    pub layer_infos: Option<Vec<BlobInfo>>,
    /// Reference to embed (schema 1 only)
    pub embedded_reference: Option<ImageReference>,
    /// Target MIME type; `None` keeps the current dialect
    pub manifest_mime_type: Option<String>,
    pub information_only: UpdateInformation,
}

/// A parsed single-image manifest.
#[derive(Debug, Clone)]
pub enum ParsedManifest {
    Legacy(Schema1Manifest),
    Modern(Schema2Manifest),
    OpenStandard(OciManifest),
}

impl ParsedManifest {
    /// Parse `manifest`, resolving manifest lists for the host platform.
    pub async fn parse(
        source: Option<Arc<dyn ImageSource>>,
        manifest: &[u8],
        mime_type: &str,
    ) -> Result<Self> {
        Self::parse_for_platform(source, manifest, mime_type, &Platform::host()).await
    }

    /// Parse `manifest`, resolving manifest lists for `platform`.
    ///
    /// `source` serves list entries and later config fetches.
    pub async fn parse_for_platform(
        source: Option<Arc<dyn ImageSource>>,
        manifest: &[u8],
        mime_type: &str,
        platform: &Platform,
    ) -> Result<Self> {
        let dialect = ManifestDialect::from_mime_type(mime_type);
        if dialect.is_leaf() {
            return Self::parse_leaf(dialect, source, manifest);
        }

        let source = source.ok_or_else(|| {
            ImageError::MissingPrecondition(
                "manifest list cannot be resolved without an image source".to_string(),
            )
        })?;
        let list = ManifestList::from_bytes(manifest)?;
        let (child, child_mime_type) = list.resolve(source.as_ref(), platform).await?;
        let child_mime_type = if child_mime_type.is_empty() {
            guess_mime_type(&child)
        } else {
            child_mime_type
        };

        let child_dialect = ManifestDialect::from_mime_type(&child_mime_type);
        if !child_dialect.is_leaf() {
            return Err(ImageError::MalformedManifest(
                "manifest list entry refers to another manifest list".to_string(),
            ));
        }
        Self::parse_leaf(child_dialect, Some(source), &child)
    }

    fn parse_leaf(
        dialect: ManifestDialect,
        source: Option<Arc<dyn ImageSource>>,
        manifest: &[u8],
    ) -> Result<Self> {
        match dialect {
            ManifestDialect::Legacy => Ok(Self::Legacy(Schema1Manifest::from_bytes(manifest)?)),
            ManifestDialect::Modern => Ok(Self::Modern(Schema2Manifest::from_bytes(manifest, source)?)),
            ManifestDialect::OpenStandard => {
                Ok(Self::OpenStandard(OciManifest::from_bytes(manifest, source)?))
            }
            ManifestDialect::Index => Err(ImageError::MalformedManifest(
                "manifest list is not a single image".to_string(),
            )),
        }
    }

    pub fn dialect(&self) -> ManifestDialect {
        match self {
            Self::Legacy(_) => ManifestDialect::Legacy,
            Self::Modern(_) => ManifestDialect::Modern,
            Self::OpenStandard(_) => ManifestDialect::OpenStandard,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            Self::Legacy(m) => m.serialize(),
            Self::Modern(m) => m.serialize(),
            Self::OpenStandard(m) => m.serialize(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Legacy(m) => m.mime_type(),
            Self::Modern(m) => m.mime_type(),
            Self::OpenStandard(m) => m.mime_type(),
        }
    }

    /// Config descriptor; the digest is empty for schema 1.
    pub fn config_info(&self) -> Descriptor {
        match self {
            Self::Legacy(m) => m.config_info(),
            Self::Modern(m) => m.config_info(),
            Self::OpenStandard(m) => m.config_info(),
        }
    }

    /// Config blob, `None` for schema 1. Cached after the first fetch.
    pub async fn config_blob(&self) -> Result<Option<&[u8]>> {
        match self {
            Self::Legacy(_) => Ok(None),
            Self::Modern(m) => m.config_blob().await.map(Some),
            Self::OpenStandard(m) => m.config_blob().await.map(Some),
        }
    }

    /// Image configuration in the OCI shape.
    pub async fn oci_config(&self) -> Result<ImageConfiguration> {
        match self {
            Self::Legacy(m) => {
                let converted = convert::schema1_to_schema2(m, None, None)?;
                converted.oci_config().await
            }
            Self::Modern(m) => m.oci_config().await,
            Self::OpenStandard(m) => m.oci_config().await,
        }
    }

    /// Layers, root first. For schema 1 this includes empty layers.
    pub fn layer_infos(&self) -> Vec<BlobInfo> {
        match self {
            Self::Legacy(m) => m.layer_infos(),
            Self::Modern(m) => m.layer_infos(),
            Self::OpenStandard(m) => m.layer_infos(),
        }
    }

    /// Whether the embedded name or tag disagrees with `reference` (schema 1 only).
    pub fn embedded_reference_conflicts(&self, reference: &ImageReference) -> bool {
        match self {
            Self::Legacy(m) => m.embedded_reference_conflicts(reference),
            Self::Modern(_) | Self::OpenStandard(_) => false,
        }
    }

    pub async fn inspect(&self) -> Result<ImageInspectInfo> {
        match self {
            Self::Legacy(m) => m.inspect(),
            Self::Modern(m) => m.inspect().await,
            Self::OpenStandard(m) => m.inspect().await,
        }
    }

    /// Whether `options` needs `layer_diff_ids` to be filled in.
    ///
    /// True for schema 1 converted to schema 2. Schema 1 converted to OCI
    /// goes through schema 2 here, so it needs them as well.
    pub fn update_needs_diff_ids(&self, options: &UpdateOptions) -> bool {
        let target = options
            .manifest_mime_type
            .as_deref()
            .and_then(ManifestDialect::from_target_mime_type);
        matches!(self, Self::Legacy(_))
            && matches!(
                target,
                Some(ManifestDialect::Modern) | Some(ManifestDialect::OpenStandard)
            )
    }

    /// A copy with `options` applied. `self` is left untouched.
    pub async fn updated_image(&self, options: &UpdateOptions) -> Result<ParsedManifest> {
        let mut updated = self.clone();

        if let Some(infos) = &options.layer_infos {
            match &mut updated {
                Self::Legacy(m) => m.apply_layer_infos(infos)?,
                Self::Modern(m) => m.apply_layer_infos(infos)?,
                Self::OpenStandard(m) => m.apply_layer_infos(infos)?,
            }
        }

        if let Some(reference) = &options.embedded_reference {
            match &mut updated {
                Self::Legacy(m) => m.set_embedded_reference(reference),
                _ => tracing::debug!(
                    %reference,
                    dialect = updated.mime_type(),
                    "Ignoring embedded reference for manifest without one"
                ),
            }
        }

        let Some(target) = options.manifest_mime_type.as_deref() else {
            return Ok(updated);
        };
        let unsupported = || ImageError::UnsupportedConversion {
            from: self.mime_type().to_string(),
            to: target.to_string(),
        };
        let target_dialect = ManifestDialect::from_target_mime_type(target).ok_or_else(unsupported)?;

        let info = &options.information_only;
        match (updated, target_dialect) {
            (Self::Legacy(m), ManifestDialect::Legacy) => Ok(Self::Legacy(m)),
            (Self::Legacy(m), ManifestDialect::Modern) => Ok(Self::Modern(
                convert::schema1_to_schema2(&m, info.layer_infos.as_deref(), info.layer_diff_ids.as_deref())?,
            )),
            (Self::Legacy(m), ManifestDialect::OpenStandard) => {
                let modern = convert::schema1_to_schema2(
                    &m,
                    info.layer_infos.as_deref(),
                    info.layer_diff_ids.as_deref(),
                )?;
                Ok(Self::OpenStandard(convert::schema2_to_oci(modern)))
            }
            (Self::Modern(m), ManifestDialect::Legacy) => {
                let destination = info.destination.as_ref().ok_or_else(|| {
                    ImageError::MissingPrecondition(
                        "converting to schema 1 requires a destination for empty layers".to_string(),
                    )
                })?;
                Ok(Self::Legacy(
                    convert::schema2_to_schema1(&m, destination.as_ref()).await?,
                ))
            }
            (Self::Modern(m), ManifestDialect::Modern) => Ok(Self::Modern(m)),
            (Self::Modern(m), ManifestDialect::OpenStandard) => {
                Ok(Self::OpenStandard(convert::schema2_to_oci(m)))
            }
            (Self::OpenStandard(m), ManifestDialect::Modern) => {
                Ok(Self::Modern(convert::oci_to_schema2(m)))
            }
            (Self::OpenStandard(m), ManifestDialect::OpenStandard) => Ok(Self::OpenStandard(m)),
            (Self::OpenStandard(_), _) | (_, ManifestDialect::Index) => Err(unsupported()),
        }
    }
}
