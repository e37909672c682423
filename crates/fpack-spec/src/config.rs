//! Feature, feature-group and config model descriptors

use crate::id::{FeatureIdRef, SpecRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A feature declaration inside a group or config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureConfig {
    pub spec: SpecRef,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<FeatureDependency>,
}

impl FeatureConfig {
    pub fn new(spec: SpecRef) -> Self {
        Self {
            spec,
            params: BTreeMap::new(),
            deps: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn dep(mut self, id: FeatureIdRef) -> Self {
        self.deps.push(FeatureDependency { id, include: false });
        self
    }
}

/// Explicit dependency of a feature on another feature
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureDependency {
    pub id: FeatureIdRef,
    /// Include the target feature when it is not yet in the config
    #[serde(default)]
    pub include: bool,
}

/// Include/exclude filter attached to a group reference or a config model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureFilter {
    #[serde(default = "default_true")]
    pub inherit_features: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_specs: Vec<SpecRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_specs: Vec<SpecRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_features: Vec<IncludedFeature>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_features: Vec<FeatureIdRef>,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFilter {
    fn default() -> Self {
        Self {
            inherit_features: true,
            included_specs: Vec::new(),
            excluded_specs: Vec::new(),
            included_features: Vec::new(),
            excluded_features: Vec::new(),
        }
    }
}

impl FeatureFilter {
    /// Filter that only lets explicitly included specs and features through
    pub fn exclusive() -> Self {
        Self {
            inherit_features: false,
            ..Self::default()
        }
    }

    pub fn include_spec(mut self, spec: SpecRef) -> Self {
        self.included_specs.push(spec);
        self
    }

    pub fn exclude_spec(mut self, spec: SpecRef) -> Self {
        self.excluded_specs.push(spec);
        self
    }

    pub fn include_feature(mut self, feature: IncludedFeature) -> Self {
        self.included_features.push(feature);
        self
    }

    pub fn exclude_feature(mut self, id: FeatureIdRef) -> Self {
        self.excluded_features.push(id);
        self
    }

    /// True when the filter lets everything through
    pub fn is_transparent(&self) -> bool {
        self.inherit_features
            && self.excluded_specs.is_empty()
            && self.excluded_features.is_empty()
            && self.included_features.is_empty()
    }
}

/// Explicitly included feature, optionally overriding parameters and
/// dependencies of the included feature
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IncludedFeature {
    pub id: FeatureIdRef,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<FeatureDependency>,
}

impl IncludedFeature {
    pub fn new(id: FeatureIdRef) -> Self {
        Self {
            id,
            params: BTreeMap::new(),
            deps: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn has_overrides(&self) -> bool {
        !self.params.is_empty() || !self.deps.is_empty()
    }
}

/// Reference to a feature group, local or from a dependency origin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureGroupRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub name: String,
    #[serde(default)]
    pub filter: FeatureFilter,
}

impl FeatureGroupRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            origin: None,
            name: name.into(),
            filter: FeatureFilter::default(),
        }
    }

    pub fn from_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_filter(mut self, filter: FeatureFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Item of a group or config: a feature or a nested group reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigItem {
    Feature(FeatureConfig),
    Group(FeatureGroupRef),
}

/// Named, reusable bundle of features and nested groups
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ConfigItem>,
}

impl FeatureGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn feature(mut self, feature: FeatureConfig) -> Self {
        self.items.push(ConfigItem::Feature(feature));
        self
    }

    pub fn group(mut self, group: FeatureGroupRef) -> Self {
        self.items.push(ConfigItem::Group(group));
        self
    }
}

/// Addressing mode of a config model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Anonymous,
    NameOnly,
    ModelOnly,
    Named,
}

/// Identity of a config model; model and name are independently optional
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConfigId {
    pub fn new(model: Option<&str>, name: Option<&str>) -> Self {
        Self {
            model: model.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    pub fn named(model: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            name: Some(name.into()),
        }
    }

    pub fn model_only(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            name: None,
        }
    }

    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            model: None,
            name: Some(name.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> ConfigKind {
        match (&self.model, &self.name) {
            (None, None) => ConfigKind::Anonymous,
            (None, Some(_)) => ConfigKind::NameOnly,
            (Some(_), None) => ConfigKind::ModelOnly,
            (Some(_), Some(_)) => ConfigKind::Named,
        }
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.model, &self.name) {
            (None, None) => f.write_str("anonymous"),
            (None, Some(name)) => write!(f, "name={}", name),
            (Some(model), None) => write!(f, "model={}", model),
            (Some(model), Some(name)) => write!(f, "model={} name={}", model, name),
        }
    }
}

/// Config model: properties, a filter over contributed features and items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
    #[serde(default)]
    pub filter: FeatureFilter,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ConfigItem>,
}

impl ConfigModel {
    pub fn new(id: ConfigId) -> Self {
        Self {
            model: id.model,
            name: id.name,
            ..Self::default()
        }
    }

    pub fn id(&self) -> ConfigId {
        ConfigId {
            model: self.model.clone(),
            name: self.name.clone(),
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_filter(mut self, filter: FeatureFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn feature(mut self, feature: FeatureConfig) -> Self {
        self.items.push(ConfigItem::Feature(feature));
        self
    }

    pub fn group(mut self, group: FeatureGroupRef) -> Self {
        self.items.push(ConfigItem::Group(group));
        self
    }
}
