//! fpack Configuration System
//!
//! Provides the configuration consumed by the provisioning engine:
//! - Provisioning requests (provisioning.toml)
//! - Global user configuration (~/.fpack/config.toml)
//! - Configuration precedence for the feature-pack layout directory
//!
//! # Configuration Hierarchy
//!
//! The layout directory is taken from the first source that defines it:
//! 1. Environment variable (FPACK_LAYOUT_DIR)
//! 2. Provisioning request option (`layout-dir`, relative to the request)
//! 3. Global config (`[universe] layout-dir`)
//!
//! # Example
//!
//! ```no_run
//! use fpack_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! ```

pub mod global;
pub mod loader;
pub mod provisioning;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use provisioning::ProvisioningConfig;
