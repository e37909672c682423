//! Global Configuration (~/.fpack/config.toml)
//!
//! Handles user-level configuration stored in `~/.fpack/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.fpack/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Feature-pack universe settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub universe: Option<UniverseConfig>,
}

/// Where feature-pack layouts live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct UniverseConfig {
    /// Directory holding `<group>/<artifact>/<version>/feature-pack.toml`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_dir: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(dir) = self.layout_dir() {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidPath(dir.to_path_buf()));
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.fpack/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".fpack").join("config.toml"))
    }

    /// Get the configured layout directory
    pub fn layout_dir(&self) -> Option<&Path> {
        self.universe.as_ref().and_then(|u| u.layout_dir.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.universe.is_some() {
            self.universe = other.universe.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_config() {
        let toml = r#"
[universe]
layout-dir = "/opt/fpack/layouts"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout_dir(), Some(Path::new("/opt/fpack/layouts")));
    }

    #[test]
    fn test_empty_global_config() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.layout_dir(), None);
    }

    #[test]
    fn test_empty_layout_dir_rejected() {
        let config = GlobalConfig {
            universe: Some(UniverseConfig {
                layout_dir: Some(PathBuf::new()),
            }),
        };

        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath(_))));
    }

    #[test]
    fn test_merge_configs() {
        let mut base = GlobalConfig::default();
        let override_config = GlobalConfig {
            universe: Some(UniverseConfig {
                layout_dir: Some(PathBuf::from("/srv/layouts")),
            }),
        };

        base.merge(&override_config);
        assert_eq!(base.layout_dir(), Some(Path::new("/srv/layouts")));
    }
}
