//! Feature-pack layout validation

use crate::config::{ConfigItem, ConfigModel, FeatureFilter};
use crate::feature_pack::{FeaturePackConfig, FeaturePackLayout};
use crate::feature_spec::{FeatureSpec, PackageDependency};
use crate::id::SpecRef;
use std::collections::HashSet;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Parameter declared twice in the same spec
    DuplicateParameter { spec: String, param: String },
    /// Feature spec defined twice
    DuplicateSpec(String),
    /// Feature group defined twice
    DuplicateGroup(String),
    /// Package defined twice
    DuplicatePackage(String),
    /// Identifying parameter marked nillable
    NillableIdParameter { spec: String, param: String },
    /// Invalid feature reference
    InvalidReference { spec: String, reason: String },
    /// Capability uses a parameter the spec does not declare
    UndeclaredCapabilityParameter {
        spec: String,
        capability: String,
        param: String,
    },
    /// Invalid feature-pack dependency
    InvalidDependency { gav: String, reason: String },
    /// Origin alias not declared as a dependency
    UnknownOrigin { context: String, origin: String },
    /// Local package dependency on a package the layout does not define
    UnknownPackage { context: String, package: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::DuplicateParameter { spec, param } => {
                write!(f, "Duplicate parameter '{}' in spec '{}'", param, spec)
            }
            ValidationError::DuplicateSpec(name) => {
                write!(f, "Duplicate feature spec: {}", name)
            }
            ValidationError::DuplicateGroup(name) => {
                write!(f, "Duplicate feature group: {}", name)
            }
            ValidationError::DuplicatePackage(name) => {
                write!(f, "Duplicate package: {}", name)
            }
            ValidationError::NillableIdParameter { spec, param } => {
                write!(
                    f,
                    "Identifying parameter '{}' of spec '{}' cannot be nillable",
                    param, spec
                )
            }
            ValidationError::InvalidReference { spec, reason } => {
                write!(f, "Invalid reference in spec '{}': {}", spec, reason)
            }
            ValidationError::UndeclaredCapabilityParameter {
                spec,
                capability,
                param,
            } => write!(
                f,
                "Capability '{}' of spec '{}' uses undeclared parameter '{}'",
                capability, spec, param
            ),
            ValidationError::InvalidDependency { gav, reason } => {
                write!(f, "Invalid dependency '{}': {}", gav, reason)
            }
            ValidationError::UnknownOrigin { context, origin } => {
                write!(f, "Unknown origin '{}' used by {}", origin, context)
            }
            ValidationError::UnknownPackage { context, package } => {
                write!(f, "Unknown package '{}' used by {}", package, context)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Feature-pack layout validator
pub struct Validator;

impl Validator {
    /// Validate a layout, collecting every problem found
    pub fn validate(layout: &FeaturePackLayout) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let origins = Self::collect_origins(&layout.spec.dependencies, &mut errors);
        let packages: HashSet<&str> = layout.packages.iter().map(|p| p.name.as_str()).collect();

        Self::check_unique(
            layout.specs.iter().map(|s| s.name.as_str()),
            ValidationError::DuplicateSpec,
            &mut errors,
        );
        Self::check_unique(
            layout.feature_groups.iter().map(|g| g.name.as_str()),
            ValidationError::DuplicateGroup,
            &mut errors,
        );
        Self::check_unique(
            layout.packages.iter().map(|p| p.name.as_str()),
            ValidationError::DuplicatePackage,
            &mut errors,
        );

        for spec in &layout.specs {
            errors.extend(Self::validate_spec(spec));
            let context = format!("spec '{}'", spec.name);
            for reference in &spec.refs {
                Self::check_spec_ref(&reference.feature, &origins, &context, &mut errors);
            }
            for dep in &spec.packages {
                Self::check_package_dep(dep, &origins, &packages, &context, &mut errors);
            }
        }

        for group in &layout.feature_groups {
            let context = format!("feature group '{}'", group.name);
            Self::check_items(&group.items, &origins, &context, &mut errors);
        }

        for package in &layout.packages {
            let context = format!("package '{}'", package.name);
            for dep in &package.deps {
                Self::check_package_dep(dep, &origins, &packages, &context, &mut errors);
            }
        }

        for name in &layout.spec.default_packages {
            if !packages.contains(name.as_str()) {
                errors.push(ValidationError::UnknownPackage {
                    context: "default packages".to_string(),
                    package: name.clone(),
                });
            }
        }

        for config in &layout.spec.configs {
            Self::check_config(config, &origins, &mut errors);
        }
        for dependency in &layout.spec.dependencies {
            for config in &dependency.configs {
                Self::check_config(config, &origins, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a single feature spec in isolation
    pub fn validate_spec(spec: &FeatureSpec) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for param in &spec.params {
            if !seen.insert(param.name.as_str()) {
                errors.push(ValidationError::DuplicateParameter {
                    spec: spec.name.clone(),
                    param: param.name.clone(),
                });
            }
            if param.feature_id && param.nillable {
                errors.push(ValidationError::NillableIdParameter {
                    spec: spec.name.clone(),
                    param: param.name.clone(),
                });
            }
        }

        for capability in spec.provides.iter().chain(&spec.requires) {
            for param in capability.params() {
                if !spec.has_param(param) {
                    errors.push(ValidationError::UndeclaredCapabilityParameter {
                        spec: spec.name.clone(),
                        capability: capability.to_string(),
                        param: param.to_string(),
                    });
                }
            }
        }

        for reference in &spec.refs {
            for local in reference.mappings.keys() {
                if !spec.has_param(local) {
                    errors.push(ValidationError::InvalidReference {
                        spec: spec.name.clone(),
                        reason: format!(
                            "reference '{}' maps undeclared parameter '{}'",
                            reference.name(),
                            local
                        ),
                    });
                }
            }
        }

        errors
    }

    /// Every dependency needs a distinct origin; returns the declared origins
    fn collect_origins<'a>(
        dependencies: &'a [FeaturePackConfig],
        errors: &mut Vec<ValidationError>,
    ) -> HashSet<&'a str> {
        let mut origins = HashSet::new();

        for dep in dependencies {
            match dep.origin.as_deref() {
                None => errors.push(ValidationError::InvalidDependency {
                    gav: dep.gav.to_string(),
                    reason: "dependency must declare an origin".to_string(),
                }),
                Some(origin) => {
                    if !origins.insert(origin) {
                        errors.push(ValidationError::InvalidDependency {
                            gav: dep.gav.to_string(),
                            reason: format!("origin '{}' is already used", origin),
                        });
                    }
                }
            }
        }

        origins
    }

    fn check_unique<'a>(
        names: impl Iterator<Item = &'a str>,
        error: impl Fn(String) -> ValidationError,
        errors: &mut Vec<ValidationError>,
    ) {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                errors.push(error(name.to_string()));
            }
        }
    }

    fn check_origin(
        origin: Option<&str>,
        origins: &HashSet<&str>,
        context: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(origin) = origin {
            if !origins.contains(origin) {
                errors.push(ValidationError::UnknownOrigin {
                    context: context.to_string(),
                    origin: origin.to_string(),
                });
            }
        }
    }

    fn check_spec_ref(
        spec: &SpecRef,
        origins: &HashSet<&str>,
        context: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        Self::check_origin(spec.origin.as_deref(), origins, context, errors);
    }

    fn check_package_dep(
        dep: &PackageDependency,
        origins: &HashSet<&str>,
        packages: &HashSet<&str>,
        context: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        match dep.origin.as_deref() {
            Some(_) => Self::check_origin(dep.origin.as_deref(), origins, context, errors),
            None if !packages.contains(dep.name.as_str()) => {
                errors.push(ValidationError::UnknownPackage {
                    context: context.to_string(),
                    package: dep.name.clone(),
                });
            }
            None => {}
        }
    }

    fn check_filter(
        filter: &FeatureFilter,
        origins: &HashSet<&str>,
        context: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        for spec in filter.included_specs.iter().chain(&filter.excluded_specs) {
            Self::check_spec_ref(spec, origins, context, errors);
        }
        for feature in &filter.included_features {
            Self::check_spec_ref(&feature.id.spec, origins, context, errors);
        }
        for id in &filter.excluded_features {
            Self::check_spec_ref(&id.spec, origins, context, errors);
        }
    }

    fn check_items(
        items: &[ConfigItem],
        origins: &HashSet<&str>,
        context: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        for item in items {
            match item {
                ConfigItem::Feature(feature) => {
                    Self::check_spec_ref(&feature.spec, origins, context, errors);
                    for dep in &feature.deps {
                        Self::check_spec_ref(&dep.id.spec, origins, context, errors);
                    }
                }
                ConfigItem::Group(group) => {
                    Self::check_origin(group.origin.as_deref(), origins, context, errors);
                    Self::check_filter(&group.filter, origins, context, errors);
                }
            }
        }
    }

    fn check_config(
        config: &ConfigModel,
        origins: &HashSet<&str>,
        errors: &mut Vec<ValidationError>,
    ) {
        let context = format!("config '{}'", config.id());
        Self::check_filter(&config.filter, origins, &context, errors);
        Self::check_items(&config.items, origins, &context, errors);
    }
}
