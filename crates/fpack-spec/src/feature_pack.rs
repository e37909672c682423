//! Feature-pack descriptor (feature-pack.toml)

use crate::config::{ConfigId, ConfigModel, FeatureGroup};
use crate::coordinate::Gav;
use crate::feature_spec::{FeatureSpec, PackageDependency};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed layout of one feature pack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeaturePackLayout {
    #[serde(rename = "feature-pack")]
    pub spec: FeaturePackSpec,
    #[serde(default, rename = "spec", skip_serializing_if = "Vec::is_empty")]
    pub specs: Vec<FeatureSpec>,
    #[serde(default, rename = "feature-group", skip_serializing_if = "Vec::is_empty")]
    pub feature_groups: Vec<FeatureGroup>,
    #[serde(default, rename = "package", skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageSpec>,
}

impl FeaturePackLayout {
    pub fn new(gav: Gav) -> Self {
        Self {
            spec: FeaturePackSpec::new(gav),
            specs: Vec::new(),
            feature_groups: Vec::new(),
            packages: Vec::new(),
        }
    }

    /// Parse layout from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load layout from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn gav(&self) -> &Gav {
        &self.spec.gav
    }

    pub fn feature_spec(&self, name: &str) -> Option<&FeatureSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn feature_group(&self, name: &str) -> Option<&FeatureGroup> {
        self.feature_groups.iter().find(|g| g.name == name)
    }

    pub fn package(&self, name: &str) -> Option<&PackageSpec> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Dependency declared under the given origin alias
    pub fn dependency(&self, origin: &str) -> Option<&FeaturePackConfig> {
        self.spec
            .dependencies
            .iter()
            .find(|d| d.origin.as_deref() == Some(origin))
    }

    pub fn with_spec(mut self, spec: FeatureSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn with_group(mut self, group: FeatureGroup) -> Self {
        self.feature_groups.push(group);
        self
    }

    pub fn with_package(mut self, package: PackageSpec) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_dependency(mut self, dependency: FeaturePackConfig) -> Self {
        self.spec.dependencies.push(dependency);
        self
    }

    pub fn with_default_package(mut self, name: impl Into<String>) -> Self {
        self.spec.default_packages.push(name.into());
        self
    }

    pub fn with_config(mut self, config: ConfigModel) -> Self {
        self.spec.configs.push(config);
        self
    }
}

/// Feature-pack header: coordinate, dependencies, default packages and
/// the configs the pack contributes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeaturePackSpec {
    pub gav: Gav,
    #[serde(default, rename = "dependency", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<FeaturePackConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_packages: Vec<String>,
    #[serde(default, rename = "config", skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<ConfigModel>,
}

impl FeaturePackSpec {
    pub fn new(gav: Gav) -> Self {
        Self {
            gav,
            dependencies: Vec::new(),
            default_packages: Vec::new(),
            configs: Vec::new(),
        }
    }
}

/// Feature-pack selection with config and package filters. Used both for
/// pack dependencies and for the packs of a provisioning request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeaturePackConfig {
    pub gav: Gav,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default = "default_true")]
    pub inherit_configs: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_configs: Vec<ConfigId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_configs: Vec<ConfigId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_models: Vec<String>,
    #[serde(default = "default_true")]
    pub inherit_packages: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_packages: Vec<String>,
    #[serde(default, rename = "config", skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<ConfigModel>,
}

fn default_true() -> bool {
    true
}

impl FeaturePackConfig {
    pub fn new(gav: Gav) -> Self {
        Self {
            gav,
            origin: None,
            inherit_configs: true,
            included_configs: Vec::new(),
            excluded_configs: Vec::new(),
            included_models: Vec::new(),
            excluded_models: Vec::new(),
            inherit_packages: true,
            included_packages: Vec::new(),
            excluded_packages: Vec::new(),
            configs: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn inherit_configs(mut self, inherit: bool) -> Self {
        self.inherit_configs = inherit;
        self
    }

    pub fn include_config(mut self, id: ConfigId) -> Self {
        self.included_configs.push(id);
        self
    }

    pub fn exclude_config(mut self, id: ConfigId) -> Self {
        self.excluded_configs.push(id);
        self
    }

    pub fn include_model(mut self, model: impl Into<String>) -> Self {
        self.included_models.push(model.into());
        self
    }

    pub fn exclude_model(mut self, model: impl Into<String>) -> Self {
        self.excluded_models.push(model.into());
        self
    }

    pub fn inherit_packages(mut self, inherit: bool) -> Self {
        self.inherit_packages = inherit;
        self
    }

    pub fn include_package(mut self, name: impl Into<String>) -> Self {
        self.included_packages.push(name.into());
        self
    }

    pub fn exclude_package(mut self, name: impl Into<String>) -> Self {
        self.excluded_packages.push(name.into());
        self
    }

    pub fn with_config(mut self, config: ConfigModel) -> Self {
        self.configs.push(config);
        self
    }

    pub fn is_package_excluded(&self, name: &str) -> bool {
        self.excluded_packages.iter().any(|p| p == name)
    }
}

/// Package content descriptor; the content itself is copied by an installer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<PackageDependency>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
        }
    }

    pub fn dep(mut self, dependency: PackageDependency) -> Self {
        self.deps.push(dependency);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigItem;

    const LAYOUT: &str = r#"
[feature-pack]
gav = "org.example:app:1.0.0"
default-packages = ["app.main"]

[[feature-pack.dependency]]
gav = "org.example:core:1.0.0"
origin = "core"
inherit-configs = false
included-configs = [{ model = "standalone", name = "standalone.xml" }]
excluded-packages = ["core.docs"]

[[feature-pack.config]]
model = "standalone"
name = "standalone.xml"

[[feature-pack.config.items]]
kind = "group"
name = "app-defaults"

[[spec]]
name = "app-deployment"
packages = [{ name = "app.main" }, { origin = "core", name = "core.modules", optional = true }]

[[spec.params]]
name = "name"
feature-id = true

[[feature-group]]
name = "app-defaults"

[[feature-group.items]]
kind = "feature"
spec = "app-deployment"
params = { name = "app.war" }

[[package]]
name = "app.main"
deps = [{ origin = "core", name = "core.modules" }]
"#;

    #[test]
    fn test_parse_layout() {
        let layout = FeaturePackLayout::from_str(LAYOUT).unwrap();

        assert_eq!(layout.gav(), &Gav::new("org.example", "app", "1.0.0"));
        assert_eq!(layout.spec.default_packages, vec!["app.main".to_string()]);

        let core = layout.dependency("core").unwrap();
        assert!(!core.inherit_configs);
        assert!(core.inherit_packages);
        assert!(core.is_package_excluded("core.docs"));
        assert_eq!(
            core.included_configs,
            vec![ConfigId::named("standalone", "standalone.xml")]
        );

        let spec = layout.feature_spec("app-deployment").unwrap();
        assert_eq!(spec.packages.len(), 2);
        assert!(spec.packages[1].optional);

        let group = layout.feature_group("app-defaults").unwrap();
        assert!(matches!(group.items[0], ConfigItem::Feature(_)));
        assert_eq!(layout.package("app.main").unwrap().deps.len(), 1);
        assert!(layout.package("missing").is_none());
    }

    #[test]
    fn test_layout_toml_roundtrip() {
        let layout = FeaturePackLayout::from_str(LAYOUT).unwrap();
        let serialized = layout.to_string().unwrap();
        let parsed = FeaturePackLayout::from_str(&serialized).unwrap();
        assert_eq!(layout, parsed);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = FeaturePackLayout::from_str(
            r#"
[feature-pack]
gav = "org.example:app:1.0.0"
unexpected = true
"#,
        );
        assert!(result.is_err());
    }
}
