//! Feature-pack spec model
//!
//! Immutable value types shared by the provisioning engine:
//! - Coordinates of feature packs ([`Gav`], [`Ga`])
//! - Spec and feature identifiers, unresolved and resolved
//! - Capability expressions with static and `$param` segments
//! - Descriptor types for feature specs, groups, configs and feature packs
//!   (`feature-pack.toml`)
//! - Layout validation

pub mod capability;
pub mod config;
pub mod coordinate;
pub mod feature_pack;
pub mod feature_spec;
pub mod id;
pub mod validator;

pub use capability::{CapabilityElement, CapabilitySpec};
pub use config::{
    ConfigId, ConfigItem, ConfigKind, ConfigModel, FeatureConfig, FeatureDependency,
    FeatureFilter, FeatureGroup, FeatureGroupRef, IncludedFeature,
};
pub use coordinate::{Ga, Gav};
pub use feature_pack::{FeaturePackConfig, FeaturePackLayout, FeaturePackSpec, PackageSpec};
pub use feature_spec::{
    FeatureParameterSpec, FeatureReferenceSpec, FeatureSpec, PackageDependency,
};
pub use id::{FeatureId, FeatureIdRef, ResolvedSpecId, SpecRef};
pub use validator::{ValidationError, Validator};

/// Spec model errors
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("Invalid feature-pack coordinate '{0}': expected group:artifact[:version]")]
    InvalidCoordinate(String),

    #[error("Invalid spec reference '{0}'")]
    InvalidSpecRef(String),

    #[error("Invalid feature id '{input}': {reason}")]
    InvalidFeatureId { input: String, reason: String },

    #[error("Invalid capability '{input}': {reason}")]
    InvalidCapability { input: String, reason: String },

    #[error("Failed to parse feature-pack descriptor: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize feature-pack descriptor: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpecError>;
