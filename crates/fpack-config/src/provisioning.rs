//! Provisioning Request (provisioning.toml)
//!
//! Lists the feature packs to install with their config and package
//! filters, configs defined on top of them and free-form options.

use crate::{ConfigError, ConfigResult};
use fpack_spec::{ConfigModel, FeaturePackConfig, Gav};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Option naming the directory feature-pack layouts are read from
pub const LAYOUT_DIR_OPTION: &str = "layout-dir";

/// Provisioning request from provisioning.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProvisioningConfig {
    /// Requested feature packs, in installation order
    #[serde(default, rename = "feature-pack")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_packs: Vec<FeaturePackConfig>,

    /// Configs defined by the request itself
    #[serde(default, rename = "config")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<ConfigModel>,

    /// Free-form options passed through to the runtime
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl ProvisioningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a request from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: "provisioning.toml".into(),
            error: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a request from a file
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

    /// Serialize to TOML string
    pub fn to_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the request
    pub fn validate(&self) -> ConfigResult<()> {
        let mut coordinates = HashSet::new();
        let mut origins = HashSet::new();

        for fp in &self.feature_packs {
            if !coordinates.insert(fp.gav.ga()) {
                return Err(ConfigError::ValidationError(format!(
                    "feature pack {} is requested more than once",
                    fp.gav.ga()
                )));
            }
            if let Some(origin) = &fp.origin {
                if !origins.insert(origin.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "origin '{}' is used by more than one feature pack",
                        origin
                    )));
                }
            }
        }

        if let Some(dir) = self.options.get(LAYOUT_DIR_OPTION) {
            if dir.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("options.{}", LAYOUT_DIR_OPTION),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get an option value
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Layout directory option as written in the request
    pub fn layout_dir(&self) -> Option<&str> {
        self.option(LAYOUT_DIR_OPTION)
    }

    /// Find a requested feature pack by coordinate, ignoring the version
    pub fn feature_pack(&self, gav: &Gav) -> Option<&FeaturePackConfig> {
        let ga = gav.ga();
        self.feature_packs.iter().find(|fp| fp.gav.ga() == ga)
    }

    pub fn add_feature_pack(&mut self, fp: FeaturePackConfig) {
        self.feature_packs.push(fp);
    }

    pub fn add_config(&mut self, config: ConfigModel) {
        self.configs.push(config);
    }

    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.insert(name.into(), value.into());
    }
}
