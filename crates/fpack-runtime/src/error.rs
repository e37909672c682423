//! Provisioning error types

use fpack_spec::{ConfigId, FeatureId, Ga, Gav, ResolvedSpecId, SpecError, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Feature pack not found: {0}")]
    FeaturePackNotFound(Gav),

    #[error("Invalid feature pack {gav}: {}", format_validation_errors(.errors))]
    InvalidFeaturePack {
        gav: Gav,
        errors: Vec<ValidationError>,
    },

    #[error("No feature-pack layout directory configured")]
    LayoutDirNotConfigured,

    #[error("Layout {} describes {found}, expected {expected}", .path.display())]
    LayoutMismatch {
        path: PathBuf,
        expected: Gav,
        found: Gav,
    },

    #[error("Feature pack {ga} is requested in conflicting versions {first} and {second}")]
    FeaturePackVersionConflict { ga: Ga, first: Gav, second: Gav },

    #[error("Unknown feature-pack origin '{origin}' in {context}")]
    UnknownOrigin { origin: String, context: String },

    #[error("Feature spec '{spec}' not found from {context}")]
    SpecNotFound { spec: String, context: String },

    #[error("Feature group '{group}' not found from {context}")]
    FeatureGroupNotFound { group: String, context: String },

    #[error("Feature spec {spec} does not declare parameter '{param}'")]
    UnknownFeatureParameter { spec: ResolvedSpecId, param: String },

    #[error("Identifying parameter '{param}' of {id} cannot be modified")]
    IdParameterModified { id: FeatureId, param: String },

    #[error("Missing value for identifying parameter '{param}' of {spec}")]
    MissingIdParameter { spec: ResolvedSpecId, param: String },

    #[error("Capability '{capability}' of {spec} is missing parameter '{param}'")]
    CapabilityMissingParameter {
        capability: String,
        spec: ResolvedSpecId,
        param: String,
    },

    #[error("No provider found for capability '{0}'")]
    NoCapabilityProvider(String),

    #[error("Failed to resolve dependency {dependency} of {feature}")]
    UnresolvedFeatureDependency { feature: String, dependency: FeatureId },

    #[error("Reference '{reference}' of {feature} is missing parameter '{param}'")]
    UnsatisfiedReferenceParameter {
        feature: String,
        reference: String,
        param: String,
    },

    #[error("Feature {id} overridden by {group} is not in the group's scope")]
    FeatureNotInScope { id: FeatureId, group: String },

    #[error("Package '{package}' not found in feature pack {gav}")]
    PackageNotFound { gav: Gav, package: String },

    #[error("Package '{package}' of {gav} is required by {required_by} but excluded")]
    RequiredPackageExcluded {
        gav: Gav,
        package: String,
        required_by: String,
    },

    #[error("Failed to resolve config {config}")]
    FailedToResolveConfigSpec {
        config: ConfigId,
        #[source]
        source: Box<ProvisioningError>,
    },

    #[error("Failed to process feature pack {gav}")]
    FailedToProcess {
        gav: Gav,
        #[source]
        source: Box<ProvisioningError>,
    },

    #[error("Invalid descriptor: {0}")]
    Spec(#[from] SpecError),

    #[error("Failed to read {}: {error}", .path.display())]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse provisioning record: {0}")]
    RecordParse(#[from] toml::de::Error),

    #[error("Failed to serialize provisioning record: {0}")]
    RecordSerialize(#[from] toml::ser::Error),
}

impl ProvisioningError {
    /// Wrap an error with the config it occurred in
    pub fn in_config(config: &ConfigId, source: ProvisioningError) -> Self {
        Self::FailedToResolveConfigSpec {
            config: config.clone(),
            source: Box::new(source),
        }
    }

    /// Wrap an error with the feature pack being processed
    pub fn in_feature_pack(gav: &Gav, source: ProvisioningError) -> Self {
        Self::FailedToProcess {
            gav: gav.clone(),
            source: Box::new(source),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Innermost error below the wrapping contexts
    pub fn root_cause(&self) -> &ProvisioningError {
        match self {
            Self::FailedToResolveConfigSpec { source, .. } | Self::FailedToProcess { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
