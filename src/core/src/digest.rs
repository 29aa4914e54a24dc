//! Content digests (`<algorithm>:<hex>`).
//!
//! Digests are kept as the exact string found on the wire so that manifests
//! round-trip byte for byte. Validation is explicit: a manifest may carry
//! an empty or odd digest until something actually relies on it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha384, Sha512};

use crate::error::{ImageError, Result};

/// The canonical digest algorithm.
pub const SHA256: &str = "sha256";

/// A content digest such as `sha256:e3b0c442...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wrap a digest string without validating it.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Compute the canonical (sha256) digest of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{}:{}", SHA256, hex::encode(Sha256::digest(data))))
    }

    /// Compute the digest of `data` using `algorithm`.
    pub fn compute(algorithm: &str, data: &[u8]) -> Result<Self> {
        let hex = match algorithm {
            "sha256" => hex::encode(Sha256::digest(data)),
            "sha384" => hex::encode(Sha384::digest(data)),
            "sha512" => hex::encode(Sha512::digest(data)),
            other => {
                return Err(ImageError::InvalidDigest(format!(
                    "unsupported digest algorithm '{}'",
                    other
                )))
            }
        };
        Ok(Self(format!("{}:{}", algorithm, hex)))
    }

    /// The algorithm part (`sha256`), or the empty string if there is none.
    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(alg, _)| alg).unwrap_or("")
    }

    /// The hex part, or the whole value if there is no algorithm prefix.
    pub fn hex(&self) -> &str {
        self.0.split_once(':').map(|(_, hex)| hex).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check the digest is well-formed: a known algorithm followed by
    /// lowercase hex of the right length.
    pub fn validate(&self) -> Result<()> {
        let (algorithm, hex) = self
            .0
            .split_once(':')
            .ok_or_else(|| ImageError::InvalidDigest(format!("'{}' has no algorithm", self.0)))?;

        let expected_len = match algorithm {
            "sha256" => 64,
            "sha384" => 96,
            "sha512" => 128,
            other => {
                return Err(ImageError::InvalidDigest(format!(
                    "unsupported digest algorithm '{}' in '{}'",
                    other, self.0
                )))
            }
        };

        if hex.len() != expected_len {
            return Err(ImageError::InvalidDigest(format!(
                "'{}' has {} hex characters, expected {}",
                self.0,
                hex.len(),
                expected_len
            )));
        }
        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(ImageError::InvalidDigest(format!(
                "'{}' is not lowercase hex",
                self.0
            )));
        }
        Ok(())
    }

    /// Hash `data` with this digest's algorithm and compare.
    ///
    /// Unknown algorithms never match.
    pub fn matches(&self, data: &[u8]) -> bool {
        match Self::compute(self.algorithm(), data) {
            Ok(computed) => computed == *self,
            Err(_) => false,
        }
    }

    /// Like [`Digest::matches`], but returns a [`ImageError::DigestMismatch`]
    /// naming `subject` on failure.
    pub fn verify(&self, subject: &str, data: &[u8]) -> Result<()> {
        if self.matches(data) {
            return Ok(());
        }
        let actual = Self::compute(self.algorithm(), data).unwrap_or_else(|_| Self::from_bytes(data));
        Err(ImageError::DigestMismatch {
            subject: subject.to_string(),
            expected: self.0.clone(),
            actual: actual.0,
        })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Digest {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self> {
        let digest = Self(s.to_string());
        digest.validate()?;
        Ok(digest)
    }
}

impl From<&str> for Digest {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Digest {
    fn from(value: String) -> Self {
        Self(value)
    }
}
