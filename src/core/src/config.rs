//! Tool configuration.
//!
//! Stored as YAML at `~/.a3s/image.yaml`. A missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ImageError, Result};
use crate::platform::Platform;

/// Configuration for the image tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: LogLevel,

    /// Platform used to pick an entry from manifest lists
    pub platform: PlatformOverride,
}

/// Partial platform; unset fields fall back to the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformOverride {
    pub os: Option<String>,
    pub architecture: Option<String>,
}

impl ToolConfig {
    /// Default config location (`~/.a3s/image.yaml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            ImageError::ConfigError("Cannot determine home directory".to_string())
        })?;
        Ok(home.join(".a3s").join("image.yaml"))
    }

    /// Load configuration from `path`. Returns defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            ImageError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&data).map_err(|e| {
            ImageError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load from `path` if given, otherwise from the default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load(&Self::default_path()?),
        }
    }

    /// Host platform with configured overrides applied.
    pub fn effective_platform(&self) -> Platform {
        let host = Platform::host();
        Platform {
            os: self.platform.os.clone().unwrap_or(host.os),
            architecture: self
                .platform
                .architecture
                .clone()
                .unwrap_or(host.architecture),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
