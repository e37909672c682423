//! Config model resolution
//!
//! A [`ConfigModelResolver`] accumulates the features of one addressable
//! config across every pack that contributes to it. Features live in an
//! arena owned by the resolver and are addressed by [`FeatureHandle`].
//!
//! Features are collected into a stack of scopes, one per pushed filter
//! frame. When a frame is popped, the overrides it deferred are applied to
//! the closing scope and its features are promoted into the parent scope,
//! merging with features of the same id. Features reaching the root scope
//! are registered in the bucket of their spec, which is what gets ordered.

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::feature_group::{FeatureGroupStack, GroupKey, ResolvedFeatureGroupConfig};
use crate::ordering::FeatureOrderer;
use crate::provisioned::ProvisionedConfig;
use crate::resolved::{FeatureHandle, OrderState, ResolvedFeature, ResolvedFeatureSpec};
use fpack_spec::{ConfigId, FeatureId, ResolvedSpecId};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Root-scope features of one spec, with a spec-level ordering state
#[derive(Debug, Clone)]
pub(crate) struct SpecFeatures {
    pub(crate) spec: Arc<ResolvedFeatureSpec>,
    pub(crate) features: Vec<FeatureHandle>,
    pub(crate) state: OrderState,
}

impl SpecFeatures {
    fn new(spec: Arc<ResolvedFeatureSpec>) -> Self {
        Self {
            spec,
            features: Vec::new(),
            state: OrderState::Free,
        }
    }
}

type Scope = IndexMap<FeatureId, FeatureHandle>;

/// Accumulates and finally orders the features of one config
#[derive(Debug)]
pub struct ConfigModelResolver {
    id: ConfigId,
    props: BTreeMap<String, String>,
    features: Vec<ResolvedFeature>,
    /// scopes[0] is the root scope
    scopes: Vec<Scope>,
    specs: IndexMap<ResolvedSpecId, SpecFeatures>,
    group_stack: FeatureGroupStack,
    next_include_no: usize,
}

impl ConfigModelResolver {
    pub fn new(id: ConfigId) -> Self {
        Self {
            group_stack: FeatureGroupStack::new(id.clone()),
            id,
            props: BTreeMap::new(),
            features: Vec::new(),
            scopes: vec![Scope::new()],
            specs: IndexMap::new(),
            next_include_no: 0,
        }
    }

    pub fn id(&self) -> &ConfigId {
        &self.id
    }

    pub fn props(&self) -> &BTreeMap<String, String> {
        &self.props
    }

    /// Set properties, overwriting earlier values
    pub fn set_props(&mut self, props: &BTreeMap<String, String>) {
        self.props
            .extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Set properties that are not set yet
    pub fn fill_props(&mut self, props: &BTreeMap<String, String>) {
        for (name, value) in props {
            self.props
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Number of features registered at the root scope
    pub fn feature_count(&self) -> usize {
        self.specs.values().map(|s| s.features.len()).sum()
    }

    pub fn has_features(&self) -> bool {
        self.specs.values().any(|s| !s.features.is_empty())
    }

    pub(crate) fn feature(&self, handle: FeatureHandle) -> &ResolvedFeature {
        &self.features[handle.0]
    }

    /// Include a feature into the innermost scope. A feature with an id
    /// already present in that scope is merged: parameters are overwritten
    /// and dependencies unioned.
    pub fn include_feature(
        &mut self,
        id: Option<FeatureId>,
        spec: Arc<ResolvedFeatureSpec>,
        params: &BTreeMap<String, String>,
        deps: &[FeatureId],
    ) -> ProvisioningResult<FeatureHandle> {
        if let Some(id) = &id {
            if let Some(handle) = self.current_scope().get(id).copied() {
                let feature = &mut self.features[handle.0];
                feature.set_params(params, true)?;
                feature.add_deps(deps);
                return Ok(handle);
            }
        }

        let mut feature = ResolvedFeature::new(self.next_include_no, id.clone(), spec);
        feature.set_params(params, true)?;
        feature.add_deps(deps);
        self.next_include_no += 1;

        let handle = FeatureHandle(self.features.len());
        self.features.push(feature);
        match id {
            Some(id) => {
                let at_root = self.scopes.len() == 1;
                self.current_scope_mut().insert(id, handle);
                if at_root {
                    self.register(handle);
                }
            }
            None => self.register(handle),
        }
        Ok(handle)
    }

    /// True when a feature with the id is present in any live scope
    pub fn includes(&self, id: &FeatureId) -> bool {
        self.scopes.iter().any(|scope| scope.contains_key(id))
    }

    pub fn is_filtered_out(&self, spec: &ResolvedSpecId, id: Option<&FeatureId>) -> bool {
        self.group_stack.is_filtered_out(spec, id)
    }

    /// Push a filter frame and open a scope for it. Returns false when the
    /// push was redundant and nothing was pushed.
    pub fn push_filter(&mut self, key: GroupKey, configs: Vec<ResolvedFeatureGroupConfig>) -> bool {
        if !self.group_stack.push(key, configs) {
            return false;
        }
        self.scopes.push(Scope::new());
        true
    }

    /// Pop the innermost filter frame, apply its overrides to the closing
    /// scope and promote the scope into its parent
    pub fn pop_filter(&mut self) -> ProvisioningResult<()> {
        let frame = self.group_stack.pop();
        for config in &frame.configs {
            for (id, overrides) in &config.included_features {
                let Some(overrides) = overrides else {
                    continue;
                };
                let Some(handle) = self.current_scope().get(id).copied() else {
                    return Err(ProvisioningError::FeatureNotInScope {
                        id: id.clone(),
                        group: frame.key.to_string(),
                    });
                };
                let feature = &mut self.features[handle.0];
                feature.set_params(&overrides.params, true)?;
                feature.add_deps(&overrides.deps);
            }
        }
        self.end_group()
    }

    fn end_group(&mut self) -> ProvisioningResult<()> {
        assert!(
            self.scopes.len() > 1,
            "config {} closed its root scope",
            self.id
        );
        let closing = self.scopes.pop().unwrap_or_default();
        let to_root = self.scopes.len() == 1;

        for (id, handle) in closing {
            let existing = self.current_scope().get(&id).copied();
            match existing {
                Some(existing) => {
                    let params = self.features[handle.0].explicit_params().clone();
                    let deps: Vec<FeatureId> = self.features[handle.0].deps().cloned().collect();
                    let feature = &mut self.features[existing.0];
                    feature.set_params(&params, true)?;
                    feature.add_deps(&deps);
                }
                None => {
                    self.current_scope_mut().insert(id, handle);
                    if to_root {
                        self.register(handle);
                    }
                }
            }
        }
        Ok(())
    }

    /// Merge the features and properties of another config. Features are
    /// copied in declaration order with fresh include numbers; features
    /// already present only get their missing parameters and the union of
    /// dependencies. Properties only fill gaps.
    pub fn merge(&mut self, other: &ConfigModelResolver) -> ProvisioningResult<()> {
        assert_eq!(self.scopes.len(), 1, "config {} merged into with open scopes", self.id);

        let mut incoming: Vec<&ResolvedFeature> = other
            .specs
            .values()
            .flat_map(|s| s.features.iter().map(|h| &other.features[h.0]))
            .collect();
        incoming.sort_by_key(|f| f.include_no);

        for feature in incoming {
            if let Some(id) = &feature.id {
                if let Some(&existing) = self.scopes[0].get(id) {
                    let target = &mut self.features[existing.0];
                    target.set_params(feature.explicit_params(), false)?;
                    target.add_deps(feature.deps());
                    continue;
                }
            }

            let handle = FeatureHandle(self.features.len());
            self.features.push(feature.copy_as(self.next_include_no));
            self.next_include_no += 1;
            if let Some(id) = &feature.id {
                self.scopes[0].insert(id.clone(), handle);
            }
            self.register(handle);
        }

        self.fill_props(&other.props);
        Ok(())
    }

    /// Order the features and freeze the config
    ///
    /// # Panics
    ///
    /// Panics when filter frames are still open.
    pub fn build(self) -> ProvisioningResult<ProvisionedConfig> {
        assert_eq!(
            self.scopes.len(),
            1,
            "config {} built with open scopes",
            self.id
        );
        debug!(config = %self.id, features = self.feature_count(), "ordering config");

        let Self {
            id,
            props,
            features,
            scopes,
            specs,
            ..
        } = self;
        let by_id = scopes.into_iter().next().unwrap_or_default();
        let ordered = FeatureOrderer::new(features, specs.into_values().collect(), by_id)
            .order()
            .map_err(|e| ProvisioningError::in_config(&id, e))?;

        Ok(ProvisionedConfig::new(id, props, ordered))
    }

    fn register(&mut self, handle: FeatureHandle) {
        let spec = self.features[handle.0].spec.clone();
        self.specs
            .entry(spec.id.clone())
            .or_insert_with(|| SpecFeatures::new(spec))
            .features
            .push(handle);
    }

    fn current_scope(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_scope_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}
