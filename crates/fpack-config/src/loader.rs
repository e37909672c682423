//! Configuration Loader
//!
//! Locates the provisioning request and resolves the layout directory from
//! its sources with proper precedence.

use crate::global::GlobalConfig;
use crate::provisioning::ProvisioningConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// File name of the provisioning request
pub const PROVISIONING_FILE: &str = "provisioning.toml";

/// Environment variable overriding the layout directory
pub const LAYOUT_DIR_ENV: &str = "FPACK_LAYOUT_DIR";

/// Configuration loader
///
/// Loads configuration from multiple sources. The layout directory comes from:
/// 1. FPACK_LAYOUT_DIR - highest priority
/// 2. `options.layout-dir` of provisioning.toml, relative to its directory
/// 3. Global config (~/.fpack/config.toml) - lowest priority
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Provisioning request
    pub provisioning: ProvisioningConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Directory where provisioning.toml was found
    pub project_root: Option<PathBuf>,

    /// Layout directory taken from the environment
    pub layout_dir_override: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.fpack/config.toml
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find provisioning.toml, then loads
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, provisioning) = self.find_provisioning_config(start_dir)?;
        let global = self.load_global_config().unwrap_or_default();

        Ok(Config {
            provisioning,
            global,
            project_root,
            layout_dir_override: Self::env_layout_dir(),
        })
    }

    /// Load configuration from a specific provisioning file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let provisioning = ProvisioningConfig::load_from_file(config_path)?;
        let global = self.load_global_config().unwrap_or_default();

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            provisioning,
            global,
            project_root,
            layout_dir_override: Self::env_layout_dir(),
        })
    }

    /// Find provisioning.toml by walking up the directory tree
    ///
    /// Returns (project_root, request); an empty request when none is found
    fn find_provisioning_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProvisioningConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROVISIONING_FILE);

            if config_path.exists() {
                let config = ProvisioningConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProvisioningConfig::default())),
            }
        }
    }

    /// Load global configuration
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    fn env_layout_dir() -> Option<PathBuf> {
        env::var_os(LAYOUT_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// Get the global configuration directory (~/.fpack)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".fpack"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Get the effective layout directory (environment > request > global)
    pub fn layout_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.layout_dir_override {
            return Some(dir.clone());
        }
        if let Some(dir) = self.provisioning.layout_dir() {
            let dir = Path::new(dir);
            return Some(match &self.project_root {
                Some(root) if dir.is_relative() => root.join(dir),
                _ => dir.to_path_buf(),
            });
        }
        self.global.layout_dir().map(Path::to_path_buf)
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a provisioning.toml was found
    pub fn has_request(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROVISIONING_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn loader(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_config_path(dir.path().join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_request() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[[feature-pack]]
gav = "org.example:app:1.0"
"#,
        );

        let config = loader(&temp_dir)
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert!(config.has_request());
        assert_eq!(config.provisioning.feature_packs.len(), 1);
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "");

        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let config = loader(&temp_dir).load_from_directory(&sub_dir).unwrap();
        assert_eq!(config.project_root(), Some(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_layout_dir_relative_to_request() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[options]
layout-dir = "layouts"
"#,
        );

        let config = loader(&temp_dir)
            .load_from_directory(temp_dir.path())
            .unwrap();
        assert_eq!(config.layout_dir(), Some(temp_dir.path().join("layouts")));
    }

    #[test]
    #[serial]
    fn test_env_override_layout_dir() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[options]
layout-dir = "layouts"
"#,
        );

        env::set_var(LAYOUT_DIR_ENV, "/from/env");

        let config = loader(&temp_dir)
            .load_from_directory(temp_dir.path())
            .unwrap();
        assert_eq!(config.layout_dir(), Some(PathBuf::from("/from/env")));

        env::remove_var(LAYOUT_DIR_ENV);
    }

    #[test]
    #[serial]
    fn test_global_layout_dir_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let global_path = temp_dir.path().join("global.toml");
        fs::write(
            &global_path,
            r#"
[universe]
layout-dir = "/opt/layouts"
"#,
        )
        .unwrap();
        let config_path = create_config_file(temp_dir.path(), "");

        let mut loader = ConfigLoader::with_global_config_path(&global_path);
        let config = loader.load_from_file(&config_path).unwrap();

        assert_eq!(config.layout_dir(), Some(PathBuf::from("/opt/layouts")));
    }
}
