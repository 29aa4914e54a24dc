//! Image reference parsing.
//!
//! Parses references like `ghcr.io/a3s-box/code:v0.1.0` into structured
//! components and exposes the capability set the manifest engine relies on:
//! a repository path, an optional tag and an optional digest.

use crate::digest::Digest;
use crate::error::{ImageError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when neither a tag nor a digest is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "a3s-box/code")
    pub repository: String,
    /// Tag (e.g., "latest", "v0.1.0")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<Digest>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `nginx:1.25` → docker.io/library/nginx:1.25
    /// - `myuser/myimage` → docker.io/myuser/myimage:latest
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `ghcr.io/org/image@sha256:abc...` → ghcr.io/org/image@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImageError::InvalidReference(
                "Empty image reference".to_string(),
            ));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name_tag, digest_part)) => {
                let digest: Digest = digest_part.parse().map_err(|e| {
                    ImageError::InvalidReference(format!(
                        "Invalid digest in reference '{}': {}",
                        reference, e
                    ))
                })?;
                (name_tag, Some(digest))
            }
            None => (reference, None),
        };

        let (name, tag) = Self::split_tag(name_tag);
        let (registry, repository) = Self::split_registry_repository(name)?;

        // Apply default tag if no tag and no digest
        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag,
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Repository path without the registry host (`library/nginx`).
    pub fn path(&self) -> &str {
        &self.repository
    }

    /// Tag, if the reference is tagged.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Digest, if the reference is canonical.
    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    pub fn is_canonical(&self) -> bool {
        self.digest.is_some()
    }

    /// Split a tag off the last path component.
    ///
    /// A colon in the first component with only digits after it is a
    /// registry port, not a tag.
    fn split_tag(name_tag: &str) -> (&str, Option<String>) {
        let last_component_start = name_tag.rfind('/').map(|pos| pos + 1).unwrap_or(0);
        let last_component = &name_tag[last_component_start..];

        match last_component.rfind(':') {
            Some(colon_pos) => {
                let tag = &last_component[colon_pos + 1..];
                let is_port = last_component_start == 0
                    && !tag.is_empty()
                    && tag.chars().all(|c| c.is_ascii_digit());
                if is_port {
                    (name_tag, None)
                } else {
                    (
                        &name_tag[..last_component_start + colon_pos],
                        Some(tag.to_string()),
                    )
                }
            }
            None => (name_tag, None),
        }
    }

    /// Split a name into registry and repository components.
    fn split_registry_repository(name: &str) -> Result<(String, String)> {
        // Check if the first component looks like a registry hostname
        // (contains a dot or colon, or is "localhost")
        if let Some((first, rest)) = name.split_once('/') {
            if first.contains('.') || first.contains(':') || first == "localhost" {
                if rest.is_empty() {
                    return Err(ImageError::InvalidReference(format!(
                        "Empty repository in reference '{}'",
                        name
                    )));
                }
                return Ok((first.to_string(), rest.to_string()));
            }
        }

        if name.is_empty() {
            return Err(ImageError::InvalidReference(
                "Empty repository name".to_string(),
            ));
        }

        // No registry detected, use default
        let repository = if name.contains('/') {
            name.to_string()
        } else {
            // Single name like "nginx" → "library/nginx" for Docker Hub
            format!("library/{}", name)
        };

        Ok((DEFAULT_REGISTRY.to_string(), repository))
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest.as_str());
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
