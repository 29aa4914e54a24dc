use thiserror::Error;

/// A3S image error types
#[derive(Error, Debug)]
pub enum ImageError {
    /// Manifest could not be decoded or failed structural validation
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// Content hash does not equal the declared digest
    #[error("Digest mismatch for {subject}: expected {expected}, got {actual}")]
    DigestMismatch {
        subject: String,
        expected: String,
        actual: String,
    },

    /// Requested manifest conversion has no implementation
    #[error("Conversion of image manifest from {from} to {to} is not implemented")]
    UnsupportedConversion { from: String, to: String },

    /// An operation was invoked without the state it needs
    #[error("Internal error: {0}")]
    MissingPrecondition(String),

    /// Updated layer list does not line up with the manifest
    #[error("Error preparing updated manifest: layer count changed from {expected} to {actual}")]
    LayerCountMismatch { expected: usize, actual: usize },

    /// Update side information is inconsistent with the manifest
    #[error("Inconsistent update input: {0}")]
    InconsistentUpdate(String),

    /// Image source or destination failed
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Manifest list has no entry for the requested platform
    #[error("no supported platform found in manifest list (want {os}/{architecture})")]
    NoPlatformMatch { os: String, architecture: String },

    /// Signatures requested from an image that was modified in memory
    #[error("Signatures are not supported for in-memory images")]
    SignaturesNotSupported,

    /// Image reference could not be parsed
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    /// Digest string is malformed or uses an unknown algorithm
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// Dummy signature could not be produced
    #[error("Signing error: {0}")]
    SigningError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ImageError {
    fn from(err: serde_json::Error) -> Self {
        ImageError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ImageError {
    fn from(err: serde_yaml::Error) -> Self {
        ImageError::SerializationError(err.to_string())
    }
}

/// Result type alias for A3S image operations
pub type Result<T> = std::result::Result<T, ImageError>;
