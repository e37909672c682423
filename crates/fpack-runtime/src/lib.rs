//! fpack Provisioning Runtime
//!
//! Resolves a provisioning request against a set of feature packs into an
//! installable state:
//! - Feature-pack loading, validation and version conflict detection
//! - Feature group and config filters with per-feature overrides
//! - Config model accumulation across packs, model-only defaults
//! - Capability resolution and provider lookup
//! - Feature ordering with circular references serialized into batches
//! - Package selection and package dependency resolution
//!
//! # Example
//!
//! ```no_run
//! use fpack_config::ConfigLoader;
//! use fpack_runtime::{DirectorySource, ProvisioningRuntimeBuilder};
//! use std::path::Path;
//!
//! let config = ConfigLoader::new().load_from_directory(Path::new(".")).unwrap();
//! let source = DirectorySource::from_config(&config).unwrap();
//! let state = ProvisioningRuntimeBuilder::new(source)
//!     .build(&config.provisioning)
//!     .unwrap();
//! for config in &state.configs {
//!     println!("{}: {} features", config.id, config.features.len());
//! }
//! ```

pub mod builder;
pub mod capability;
pub mod collector;
pub mod config_model;
pub mod error;
pub mod feature_group;
pub mod fp_stack;
mod ordering;
pub mod packages;
pub mod provisioned;
pub mod record;
pub mod resolved;
pub mod source;
pub mod spec_index;

pub use builder::ProvisioningRuntimeBuilder;
pub use capability::{resolve_capability, CapabilityProviders, CapabilityRegistry};
pub use config_model::ConfigModelResolver;
pub use error::{ProvisioningError, ProvisioningResult};
pub use feature_group::{FeatureGroupStack, FeatureOverride, GroupKey, ResolvedFeatureGroupConfig};
pub use provisioned::{
    ProvisionedConfig, ProvisionedConfigHandler, ProvisionedFeature, ProvisionedFeaturePack,
    ProvisionedState,
};
pub use record::{ProvisioningRecord, RecordedConfig, RecordedFeature, RecordedFeaturePack};
pub use resolved::{FeatureHandle, ResolvedFeature, ResolvedFeatureSpec, ResolvedReference};
pub use source::{DirectorySource, FeaturePackSource, InMemorySource};
pub use spec_index::{Context, SpecIndex};
