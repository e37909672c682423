//! Provisioned state and the handler protocol
//!
//! A [`ProvisionedConfig`] is the frozen, ordered result of one config
//! resolution pass. Installers consume it through
//! [`ProvisionedConfig::handle`], which replays the features to a
//! [`ProvisionedConfigHandler`] with pack, spec and batch transitions.

use crate::error::ProvisioningResult;
use crate::resolved::{ResolvedFeature, ResolvedFeatureSpec};
use fpack_spec::{ConfigId, FeatureId, Gav, ResolvedSpecId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Feature in its final position within a config
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedFeature {
    pub id: Option<FeatureId>,
    pub spec: Arc<ResolvedFeatureSpec>,
    /// Explicit parameters with spec defaults applied
    pub params: BTreeMap<String, String>,
    pub batch_start: bool,
    pub batch_end: bool,
}

impl ProvisionedFeature {
    fn from_resolved(feature: ResolvedFeature) -> Self {
        Self {
            params: feature.resolved_params(),
            batch_start: feature.is_batch_start(),
            batch_end: feature.is_batch_end(),
            id: feature.id,
            spec: feature.spec,
        }
    }

    pub fn spec_id(&self) -> &ResolvedSpecId {
        &self.spec.id
    }

    pub fn gav(&self) -> &Gav {
        &self.spec.id.gav
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Ordered, fully resolved config
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedConfig {
    pub id: ConfigId,
    pub props: BTreeMap<String, String>,
    pub features: Vec<ProvisionedFeature>,
}

impl ProvisionedConfig {
    pub(crate) fn new(
        id: ConfigId,
        props: BTreeMap<String, String>,
        features: Vec<ResolvedFeature>,
    ) -> Self {
        Self {
            id,
            props,
            features: features
                .into_iter()
                .map(ProvisionedFeature::from_resolved)
                .collect(),
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.id.model.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.id.name.as_deref()
    }

    pub fn has_features(&self) -> bool {
        !self.features.is_empty()
    }

    /// Replay the ordered features to a handler
    pub fn handle(&self, handler: &mut dyn ProvisionedConfigHandler) -> ProvisioningResult<()> {
        handler.prepare(self)?;

        let mut current_gav: Option<&Gav> = None;
        let mut current_spec: Option<&ResolvedSpecId> = None;
        for feature in &self.features {
            if feature.batch_start {
                handler.start_batch()?;
            }
            if current_gav != Some(feature.gav()) {
                current_gav = Some(feature.gav());
                handler.next_feature_pack(feature.gav())?;
            }
            if current_spec != Some(feature.spec_id()) {
                current_spec = Some(feature.spec_id());
                handler.next_spec(&feature.spec)?;
            }
            handler.next_feature(feature)?;
            if feature.batch_end {
                handler.end_batch()?;
            }
        }

        handler.done()
    }
}

/// Installation side of the provisioning contract. Every callback defaults to
/// a no-op.
pub trait ProvisionedConfigHandler {
    fn prepare(&mut self, _config: &ProvisionedConfig) -> ProvisioningResult<()> {
        Ok(())
    }

    fn next_feature_pack(&mut self, _gav: &Gav) -> ProvisioningResult<()> {
        Ok(())
    }

    fn next_spec(&mut self, _spec: &ResolvedFeatureSpec) -> ProvisioningResult<()> {
        Ok(())
    }

    fn next_feature(&mut self, _feature: &ProvisionedFeature) -> ProvisioningResult<()> {
        Ok(())
    }

    fn start_batch(&mut self) -> ProvisioningResult<()> {
        Ok(())
    }

    fn end_batch(&mut self) -> ProvisioningResult<()> {
        Ok(())
    }

    fn done(&mut self) -> ProvisioningResult<()> {
        Ok(())
    }
}

/// Feature pack with the packages selected for installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedFeaturePack {
    pub gav: Gav,
    pub packages: Vec<String>,
}

/// Result of a provisioning operation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProvisionedState {
    /// Packs in dependency order (dependencies first)
    pub feature_packs: Vec<ProvisionedFeaturePack>,
    pub configs: Vec<ProvisionedConfig>,
}

impl ProvisionedState {
    pub fn feature_pack(&self, gav: &Gav) -> Option<&ProvisionedFeaturePack> {
        self.feature_packs.iter().find(|fp| &fp.gav == gav)
    }

    pub fn config(&self, id: &ConfigId) -> Option<&ProvisionedConfig> {
        self.configs.iter().find(|c| &c.id == id)
    }
}
