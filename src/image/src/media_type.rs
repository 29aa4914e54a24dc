//! Manifest and blob media types, and dialect routing.

use serde::Deserialize;

/// Schema 1 manifest carrying a JWS signature.
pub const DOCKER_V2_SCHEMA1_SIGNED: &str = "application/vnd.docker.distribution.manifest.v1+prettyjws";
/// Schema 1 manifest without signature (registries still require one).
pub const DOCKER_V2_SCHEMA1: &str = "application/vnd.docker.distribution.manifest.v1+json";
/// Schema 2 image manifest.
pub const DOCKER_V2_SCHEMA2: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// Schema 2 manifest list.
pub const DOCKER_V2_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
/// Schema 2 image configuration blob.
pub const DOCKER_V2_SCHEMA2_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
/// Schema 2 gzipped layer.
pub const DOCKER_V2_SCHEMA2_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
/// Schema 2 layer that must not be pushed to other registries.
pub const DOCKER_V2_SCHEMA2_FOREIGN_LAYER: &str =
    "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";

/// OCI image manifest.
pub const OCI_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// OCI image configuration blob.
pub const OCI_IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
/// OCI uncompressed layer.
pub const OCI_IMAGE_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
/// OCI gzipped layer.
pub const OCI_IMAGE_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
/// OCI gzipped non-distributable layer.
pub const OCI_IMAGE_LAYER_NON_DISTRIBUTABLE: &str =
    "application/vnd.oci.image.layer.nondistributable.v1.tar+gzip";

/// Stray type some servers use for schema 1 manifests.
pub const APPLICATION_JSON: &str = "application/json";

/// The on-the-wire manifest formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestDialect {
    /// Docker schema 1 (signed or not)
    Legacy,
    /// Docker schema 2
    Modern,
    /// OCI image manifest
    OpenStandard,
    /// Docker manifest list
    Index,
}

impl ManifestDialect {
    /// Route a MIME type to its dialect.
    ///
    /// Anything unrecognized is treated as schema 1: some CDNs rewrite the
    /// Content-Type of manifests based on the URL extension.
    pub fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            DOCKER_V2_SCHEMA1_SIGNED | DOCKER_V2_SCHEMA1 | APPLICATION_JSON => Self::Legacy,
            DOCKER_V2_SCHEMA2 => Self::Modern,
            OCI_IMAGE_MANIFEST => Self::OpenStandard,
            DOCKER_V2_LIST => Self::Index,
            other => {
                tracing::debug!(mime_type = %other, "Unrecognized manifest type, assuming schema 1");
                Self::Legacy
            }
        }
    }

    /// Dialect of a conversion target. Only exact single-image types qualify.
    pub fn from_target_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            DOCKER_V2_SCHEMA1_SIGNED | DOCKER_V2_SCHEMA1 => Some(Self::Legacy),
            DOCKER_V2_SCHEMA2 => Some(Self::Modern),
            OCI_IMAGE_MANIFEST => Some(Self::OpenStandard),
            _ => None,
        }
    }

    /// Whether this dialect describes a single image (can be a conversion target).
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::Index)
    }
}

#[derive(Deserialize)]
struct GuessFields {
    #[serde(rename = "mediaType", default)]
    media_type: String,
    #[serde(rename = "schemaVersion", default)]
    schema_version: i64,
    #[serde(default)]
    signatures: Option<serde_json::Value>,
    #[serde(default)]
    config: Option<ConfigProbe>,
    #[serde(default)]
    layers: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ConfigProbe {
    #[serde(rename = "mediaType", default)]
    media_type: String,
}

/// Guess the MIME type of a manifest from its contents.
///
/// Returns an empty string when the bytes are not a recognizable manifest.
pub fn guess_mime_type(manifest: &[u8]) -> String {
    let fields: GuessFields = match serde_json::from_slice(manifest) {
        Ok(fields) => fields,
        Err(_) => return String::new(),
    };

    match fields.media_type.as_str() {
        DOCKER_V2_SCHEMA2 | DOCKER_V2_LIST => return fields.media_type,
        _ => {}
    }

    match fields.schema_version {
        // Telling signed from unsigned apart matters: only the signed form
        // has its JWS stripped before digesting.
        1 if fields.signatures.is_some() => DOCKER_V2_SCHEMA1_SIGNED.to_string(),
        1 => DOCKER_V2_SCHEMA1.to_string(),
        2 => {
            let is_oci = fields
                .config
                .as_ref()
                .map_or(false, |c| c.media_type == OCI_IMAGE_CONFIG)
                && !fields.layers.is_empty();
            if is_oci {
                OCI_IMAGE_MANIFEST.to_string()
            } else {
                DOCKER_V2_SCHEMA2.to_string()
            }
        }
        _ => String::new(),
    }
}
