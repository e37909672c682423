//! Feature spec descriptors

use crate::capability::CapabilitySpec;
use crate::id::SpecRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feature spec: parameters, capabilities, references and package dependencies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<FeatureParameterSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<CapabilitySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<CapabilitySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<FeatureReferenceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageDependency>,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            provides: Vec::new(),
            requires: Vec::new(),
            refs: Vec::new(),
            packages: Vec::new(),
        }
    }

    /// Add an identifying parameter
    pub fn id_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(FeatureParameterSpec {
            name: name.into(),
            feature_id: true,
            default: None,
            nillable: false,
        });
        self
    }

    /// Add a nillable parameter without default
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(FeatureParameterSpec {
            name: name.into(),
            feature_id: false,
            default: None,
            nillable: true,
        });
        self
    }

    /// Add a parameter with a default value
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.params.push(FeatureParameterSpec {
            name: name.into(),
            feature_id: false,
            default: Some(default.into()),
            nillable: false,
        });
        self
    }

    pub fn provides(mut self, capability: CapabilitySpec) -> Self {
        self.provides.push(capability);
        self
    }

    pub fn requires(mut self, capability: CapabilitySpec) -> Self {
        self.requires.push(capability);
        self
    }

    pub fn reference(mut self, reference: FeatureReferenceSpec) -> Self {
        self.refs.push(reference);
        self
    }

    pub fn package(mut self, dependency: PackageDependency) -> Self {
        self.packages.push(dependency);
        self
    }

    pub fn get_param(&self, name: &str) -> Option<&FeatureParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.get_param(name).is_some()
    }

    /// Identifying parameters in declaration order
    pub fn id_params(&self) -> impl Iterator<Item = &FeatureParameterSpec> {
        self.params.iter().filter(|p| p.feature_id)
    }

    pub fn has_id(&self) -> bool {
        self.params.iter().any(|p| p.feature_id)
    }
}

/// Feature spec parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureParameterSpec {
    pub name: String,
    #[serde(default)]
    pub feature_id: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub nillable: bool,
}

/// Reference from a feature to another feature, foreign-key style
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureReferenceSpec {
    /// Reference name, defaults to the target spec name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Target feature spec
    pub feature: SpecRef,
    #[serde(default)]
    pub nillable: bool,
    /// Include the referenced feature when it is not yet in the config
    #[serde(default)]
    pub include: bool,
    /// Local parameter -> target id parameter. Target id parameters without
    /// a mapping take the local parameter of the same name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mappings: BTreeMap<String, String>,
}

impl FeatureReferenceSpec {
    pub fn new(feature: SpecRef) -> Self {
        Self {
            name: None,
            feature,
            nillable: false,
            include: false,
            mappings: BTreeMap::new(),
        }
    }

    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    pub fn include(mut self) -> Self {
        self.include = true;
        self
    }

    pub fn mapping(mut self, local: impl Into<String>, target: impl Into<String>) -> Self {
        self.mappings.insert(local.into(), target.into());
        self
    }

    /// Effective reference name
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.feature.name)
    }
}

/// Dependency on a package, optionally in another pack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageDependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

impl PackageDependency {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            origin: None,
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            origin: None,
            name: name.into(),
            optional: true,
        }
    }

    pub fn from_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = FeatureSpec::new("datasource")
            .id_param("name")
            .param("jndi-name")
            .param_with_default("enabled", "true")
            .requires(CapabilitySpec::parse("driver.$driver").unwrap())
            .reference(FeatureReferenceSpec::new(SpecRef::local("driver")).mapping("driver", "name"));

        assert!(spec.has_id());
        assert_eq!(spec.id_params().count(), 1);
        assert_eq!(
            spec.get_param("enabled").and_then(|p| p.default.as_deref()),
            Some("true")
        );
        assert_eq!(spec.refs[0].name(), "driver");
    }

    #[test]
    fn test_parse_spec_from_toml() {
        let spec: FeatureSpec = toml::from_str(
            r#"
            name = "datasource"
            provides = ["datasource.$name"]
            requires = [{ name = "driver.$driver", optional = true }]

            [[params]]
            name = "name"
            feature-id = true

            [[params]]
            name = "driver"

            [[refs]]
            feature = "jdbc#driver"
            nillable = true
            mappings = { driver = "name" }
            "#,
        )
        .unwrap();

        assert_eq!(spec.params.len(), 2);
        assert!(spec.requires[0].is_optional());
        assert_eq!(spec.refs[0].feature, SpecRef::with_origin("jdbc", "driver"));
        assert_eq!(spec.refs[0].mappings.get("driver").map(String::as_str), Some("name"));
    }
}
