//! A3S Image Core - Foundational Types and Abstractions
//!
//! This module provides the types shared by the A3S image manifest engine
//! and its tooling: the error type, content digests, image references,
//! target platforms and tool configuration.

pub mod config;
pub mod digest;
pub mod error;
pub mod platform;
pub mod reference;

// Re-export commonly used types
pub use config::{LogLevel, PlatformOverride, ToolConfig};
pub use digest::Digest;
pub use error::{ImageError, Result};
pub use platform::Platform;
pub use reference::ImageReference;

/// A3S Image version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
