//! Feature ordering
//!
//! Orders the root features of a config so that every feature comes after
//! the providers of the capabilities it requires, its explicit dependencies
//! and the features it references. Circular references are legitimate: a
//! resolved cycle is emitted as one batch, anchored at the member declared
//! first, and bracketed by batch start and end markers.

use crate::capability::{resolve_capability, CapabilityRegistry};
use crate::config_model::SpecFeatures;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::resolved::{FeatureHandle, OrderState, ResolvedFeature};
use fpack_spec::{FeatureId, ResolvedSpecId};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::trace;

/// Circular reference travelling up the ordering path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CircularRef {
    /// Feature that was re-entered while scheduled
    looped_on: FeatureHandle,
    /// Earliest declared feature seen on the path so far
    first_in_config: FeatureHandle,
    /// Feature entered right after `looped_on`
    next_on_path: FeatureHandle,
}

impl CircularRef {
    fn new(feature: FeatureHandle) -> Self {
        Self {
            looped_on: feature,
            first_in_config: feature,
            next_on_path: feature,
        }
    }

    fn set_next(&mut self, feature: FeatureHandle, features: &[ResolvedFeature]) {
        self.next_on_path = feature;
        if features[self.first_in_config.0].include_no > features[feature.0].include_no {
            self.first_in_config = feature;
        }
    }
}

/// Result of ordering a feature or a group of features
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OrderOutcome {
    Ordered,
    Loops(Vec<CircularRef>),
}

impl OrderOutcome {
    fn into_loops(self) -> Vec<CircularRef> {
        match self {
            OrderOutcome::Ordered => Vec::new(),
            OrderOutcome::Loops(loops) => loops,
        }
    }
}

/// Ordering pass over the feature arena of one config
pub(crate) struct FeatureOrderer {
    features: Vec<ResolvedFeature>,
    specs: Vec<SpecFeatures>,
    spec_index: HashMap<ResolvedSpecId, usize>,
    /// Root scope of the config
    by_id: IndexMap<FeatureId, FeatureHandle>,
    capabilities: CapabilityRegistry,
    ordered: Vec<FeatureHandle>,
    in_batch: bool,
    order_referenced_spec: bool,
}

impl FeatureOrderer {
    pub(crate) fn new(
        features: Vec<ResolvedFeature>,
        specs: Vec<SpecFeatures>,
        by_id: IndexMap<FeatureId, FeatureHandle>,
    ) -> Self {
        let spec_index = specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.spec.id.clone(), i))
            .collect();
        Self {
            features,
            specs,
            spec_index,
            by_id,
            capabilities: CapabilityRegistry::new(),
            ordered: Vec::new(),
            in_batch: false,
            order_referenced_spec: true,
        }
    }

    /// Order every root feature, returning them in their final order
    ///
    /// # Panics
    ///
    /// Panics when a circular reference survives to the top of the pass.
    pub(crate) fn order(mut self) -> ProvisioningResult<Vec<ResolvedFeature>> {
        self.register_providers()?;

        let mut roots: Vec<FeatureHandle> = self
            .specs
            .iter()
            .flat_map(|s| s.features.iter().copied())
            .collect();
        roots.sort_by_key(|h| self.features[h.0].include_no);

        for handle in roots {
            if let OrderOutcome::Loops(loops) = self.order_feature(handle)? {
                panic!(
                    "unresolved circular reference at {}: {:?}",
                    self.features[handle.0], loops
                );
            }
        }

        let mut features: Vec<Option<ResolvedFeature>> =
            self.features.into_iter().map(Some).collect();
        Ok(self
            .ordered
            .iter()
            .filter_map(|h| features[h.0].take())
            .collect())
    }

    /// Static capabilities register the whole spec bucket, parametric ones
    /// each feature that resolves to them
    fn register_providers(&mut self) -> ProvisioningResult<()> {
        for (i, bucket) in self.specs.iter().enumerate() {
            for capability in &bucket.spec.spec.provides {
                if capability.is_static() {
                    self.capabilities
                        .get_providers(&capability.to_string(), true)?
                        .specs
                        .insert(i);
                    continue;
                }
                for &handle in &bucket.features {
                    for resolved in resolve_capability(capability, &self.features[handle.0])? {
                        self.capabilities
                            .get_providers(&resolved, true)?
                            .features
                            .insert(handle);
                    }
                }
            }
        }
        Ok(())
    }

    fn order_feature(&mut self, handle: FeatureHandle) -> ProvisioningResult<OrderOutcome> {
        match self.features[handle.0].state() {
            OrderState::Ordered => return Ok(OrderOutcome::Ordered),
            OrderState::Scheduled => {
                trace!(feature = %self.features[handle.0], "circular reference");
                return Ok(OrderOutcome::Loops(vec![CircularRef::new(handle)]));
            }
            OrderState::Free => {}
        }
        self.features[handle.0].schedule();

        let mut loops = self.order_capability_providers(handle)?;
        let own_id = self.features[handle.0].id.clone();
        let deps: Vec<FeatureId> = self.features[handle.0].deps().cloned().collect();
        for dep in deps.iter().filter(|d| Some(*d) != own_id.as_ref()) {
            loops.extend(self.order_referenced(handle, dep)?.into_loops());
        }
        for target in self.resolve_refs(handle)? {
            loops.extend(self.order_referenced(handle, &target)?.into_loops());
        }

        // split the loops this feature closed from those still open above it
        let mut initiated = Vec::new();
        let mut open = Vec::new();
        for mut circular in loops {
            if circular.looped_on == handle {
                initiated.push(circular);
            } else {
                circular.set_next(handle, &self.features);
                open.push(circular);
            }
        }
        if !open.is_empty() {
            self.features[handle.0].free();
            return Ok(OrderOutcome::Loops(open));
        }
        if initiated.is_empty() {
            self.mark_ordered(handle)?;
            return Ok(OrderOutcome::Ordered);
        }

        let order_referenced_spec = std::mem::replace(&mut self.order_referenced_spec, false);
        initiated.sort_by_key(|c| self.features[c.first_in_config.0].include_no);

        let first = initiated[0].first_in_config;
        if self.features[first.0].include_no < self.features[handle.0].include_no {
            // re-anchor the batch on the member declared first
            self.features[handle.0].free();
            for circular in &initiated {
                self.complete_loop(circular.first_in_config)?;
            }
        } else {
            let opens_batch = !self.in_batch;
            if opens_batch {
                self.in_batch = true;
                self.features[handle.0].batch_start = true;
                trace!(feature = %self.features[handle.0], "batch start");
            }
            self.mark_ordered(handle)?;

            initiated.sort_by_key(|c| self.features[c.next_on_path.0].include_no);
            for circular in &initiated {
                self.complete_loop(circular.next_on_path)?;
            }

            if opens_batch {
                self.in_batch = false;
                if let Some(&last) = self.ordered.last() {
                    self.features[last.0].batch_end = true;
                    trace!(feature = %self.features[last.0], "batch end");
                }
            }
        }

        self.order_referenced_spec = order_referenced_spec;
        Ok(OrderOutcome::Ordered)
    }

    /// Order a member of a loop that is being resolved
    fn complete_loop(&mut self, handle: FeatureHandle) -> ProvisioningResult<()> {
        match self.order_feature(handle)? {
            OrderOutcome::Ordered => Ok(()),
            OrderOutcome::Loops(loops) => panic!(
                "circular reference re-surfaced while completing a batch at {}: {:?}",
                self.features[handle.0], loops
            ),
        }
    }

    /// Ids referenced by a feature through its spec's references
    fn resolve_refs(&self, handle: FeatureHandle) -> ProvisioningResult<Vec<FeatureId>> {
        let feature = &self.features[handle.0];
        let mut targets = Vec::new();
        for reference in &feature.spec.refs {
            if let Some(target) = reference.target_id(feature)? {
                if feature.id.as_ref() != Some(&target) {
                    targets.push(target);
                }
            }
        }
        Ok(targets)
    }

    fn order_referenced(
        &mut self,
        handle: FeatureHandle,
        target: &FeatureId,
    ) -> ProvisioningResult<OrderOutcome> {
        let Some(&dependency) = self.by_id.get(target) else {
            return Err(ProvisioningError::UnresolvedFeatureDependency {
                feature: self.features[handle.0].to_string(),
                dependency: target.clone(),
            });
        };

        if self.order_referenced_spec && target.spec.gav != self.features[handle.0].spec.id.gav {
            if let Some(&spec) = self.spec_index.get(&target.spec) {
                // Loops met by the rest of the bucket leave their paths free.
                // The ones that run through the dependency surface again below.
                self.order_features_in_spec(spec, false)?;
            }
        }
        self.order_feature(dependency)
    }

    fn order_capability_providers(
        &mut self,
        handle: FeatureHandle,
    ) -> ProvisioningResult<Vec<CircularRef>> {
        let spec = self.features[handle.0].spec.clone();
        let mut loops = Vec::new();
        for capability in &spec.spec.requires {
            for resolved in resolve_capability(capability, &self.features[handle.0])? {
                loops.extend(self.order_providers(&resolved)?);
            }
        }
        Ok(loops)
    }

    /// Order providers of a capability until one of them is ordered.
    /// Returns the loops met by the first provider that surfaced any.
    fn order_providers(&mut self, capability: &str) -> ProvisioningResult<Vec<CircularRef>> {
        let providers = self.capabilities.get_providers(capability, false)?;
        if providers.is_provided() {
            return Ok(Vec::new());
        }
        let specs: Vec<usize> = providers.specs.iter().copied().collect();
        let features: Vec<FeatureHandle> = providers.features.iter().copied().collect();

        let mut first_loops = Vec::new();
        for spec in specs {
            let force = self.specs[spec].state != OrderState::Free;
            let loops = self.order_features_in_spec(spec, force)?;
            if self.is_provided(capability) {
                return Ok(Vec::new());
            }
            if first_loops.is_empty() {
                first_loops = loops;
            }
        }
        for feature in features {
            let loops = self.order_feature(feature)?.into_loops();
            if self.is_provided(capability) {
                return Ok(Vec::new());
            }
            if first_loops.is_empty() {
                first_loops = loops;
            }
        }
        Ok(first_loops)
    }

    /// Order all features of a spec bucket. Unless forced, a bucket already
    /// being ordered is left alone.
    fn order_features_in_spec(
        &mut self,
        spec: usize,
        force: bool,
    ) -> ProvisioningResult<Vec<CircularRef>> {
        if !force {
            if self.specs[spec].state != OrderState::Free {
                return Ok(Vec::new());
            }
            self.specs[spec].state = OrderState::Scheduled;
        }

        let mut loops = Vec::new();
        let handles = self.specs[spec].features.clone();
        for handle in handles {
            loops.extend(self.order_feature(handle)?.into_loops());
        }

        if !force {
            self.specs[spec].state = OrderState::Free;
        }
        Ok(loops)
    }

    fn is_provided(&mut self, capability: &str) -> bool {
        self.capabilities
            .get_providers(capability, false)
            .map(|p| p.is_provided())
            .unwrap_or(false)
    }

    fn mark_ordered(&mut self, handle: FeatureHandle) -> ProvisioningResult<()> {
        self.features[handle.0].set_ordered();
        self.ordered.push(handle);

        let feature = &self.features[handle.0];
        for capability in &feature.spec.spec.provides {
            for resolved in resolve_capability(capability, feature)? {
                self.capabilities.mark_provided(&resolved);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config_model::ConfigModelResolver;
    use crate::error::ProvisioningError;
    use crate::provisioned::ProvisionedConfig;
    use crate::resolved::{ResolvedFeatureSpec, ResolvedReference};
    use fpack_spec::{CapabilitySpec, ConfigId, FeatureId, FeatureSpec, Gav, ResolvedSpecId};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn gav() -> Gav {
        Gav::new("org", "fp", "1")
    }

    fn node_spec() -> Arc<ResolvedFeatureSpec> {
        Arc::new(ResolvedFeatureSpec::new(
            ResolvedSpecId::new(gav(), "node"),
            FeatureSpec::new("node").id_param("name"),
        ))
    }

    fn node(name: &str) -> FeatureId {
        FeatureId::new(ResolvedSpecId::new(gav(), "node")).with_param("name", name)
    }

    fn include(resolver: &mut ConfigModelResolver, name: &str, deps: &[&str]) {
        let deps: Vec<FeatureId> = deps.iter().map(|d| node(d)).collect();
        let params = BTreeMap::from([("name".to_string(), name.to_string())]);
        resolver
            .include_feature(Some(node(name)), node_spec(), &params, &deps)
            .unwrap();
    }

    /// (name, batch_start, batch_end) in output order
    fn layout(config: &ProvisionedConfig) -> Vec<(String, bool, bool)> {
        config
            .features
            .iter()
            .map(|f| {
                (
                    f.param("name").unwrap_or_default().to_string(),
                    f.batch_start,
                    f.batch_end,
                )
            })
            .collect()
    }

    fn row(name: &str, start: bool, end: bool) -> (String, bool, bool) {
        (name.to_string(), start, end)
    }

    #[test]
    fn test_declaration_order_without_dependencies() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        for name in ["c", "a", "b"] {
            include(&mut resolver, name, &[]);
        }
        let config = resolver.build().unwrap();
        assert_eq!(
            layout(&config),
            vec![row("c", false, false), row("a", false, false), row("b", false, false)]
        );
    }

    #[test]
    fn test_dependencies_come_first() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        include(&mut resolver, "app", &["db"]);
        include(&mut resolver, "db", &["net"]);
        include(&mut resolver, "net", &[]);
        let config = resolver.build().unwrap();
        assert_eq!(
            layout(&config),
            vec![row("net", false, false), row("db", false, false), row("app", false, false)]
        );
    }

    #[test]
    fn test_mutual_dependency_is_one_batch() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        include(&mut resolver, "A", &["B"]);
        include(&mut resolver, "B", &["A"]);
        let config = resolver.build().unwrap();
        assert_eq!(
            layout(&config),
            vec![row("A", true, false), row("B", false, true)]
        );
    }

    #[test]
    fn test_three_cycle_anchored_at_first() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        include(&mut resolver, "X", &["Y"]);
        include(&mut resolver, "Y", &["Z"]);
        include(&mut resolver, "Z", &["X"]);
        let config = resolver.build().unwrap();
        assert_eq!(
            layout(&config),
            vec![row("X", true, false), row("Z", false, false), row("Y", false, true)]
        );
    }

    #[test]
    fn test_batch_reanchors_on_earliest_member() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        include(&mut resolver, "D", &["B"]);
        include(&mut resolver, "A", &["B"]);
        include(&mut resolver, "B", &["A"]);
        let config = resolver.build().unwrap();
        assert_eq!(
            layout(&config),
            vec![row("A", true, false), row("B", false, true), row("D", false, false)]
        );
    }

    #[test]
    fn test_self_dependency_is_ignored() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        include(&mut resolver, "A", &["A"]);
        let config = resolver.build().unwrap();
        assert_eq!(layout(&config), vec![row("A", false, false)]);
    }

    #[test]
    fn test_missing_dependency_is_unresolved() {
        let mut resolver = ConfigModelResolver::new(ConfigId::named("m", "c"));
        include(&mut resolver, "A", &["ghost"]);
        let err = resolver.build().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ProvisioningError::UnresolvedFeatureDependency { dependency, .. } if *dependency == node("ghost")
        ));
        assert!(matches!(err, ProvisioningError::FailedToResolveConfigSpec { .. }));
    }

    #[test]
    fn test_references_order_parents_first() {
        let driver_spec = Arc::new(ResolvedFeatureSpec::new(
            ResolvedSpecId::new(gav(), "driver"),
            FeatureSpec::new("driver").id_param("name"),
        ));
        let ds_spec = Arc::new(
            ResolvedFeatureSpec::new(
                ResolvedSpecId::new(gav(), "ds"),
                FeatureSpec::new("ds").id_param("name").param("driver"),
            )
            .with_reference(
                ResolvedReference::new("driver", ResolvedSpecId::new(gav(), "driver"))
                    .mapping("driver", "name"),
            ),
        );
        let ds_id = FeatureId::new(ResolvedSpecId::new(gav(), "ds")).with_param("name", "ExampleDS");
        let driver_id = FeatureId::new(ResolvedSpecId::new(gav(), "driver")).with_param("name", "h2");

        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        resolver
            .include_feature(
                Some(ds_id),
                ds_spec,
                &BTreeMap::from([
                    ("name".to_string(), "ExampleDS".to_string()),
                    ("driver".to_string(), "h2".to_string()),
                ]),
                &[],
            )
            .unwrap();
        resolver
            .include_feature(
                Some(driver_id),
                driver_spec,
                &BTreeMap::from([("name".to_string(), "h2".to_string())]),
                &[],
            )
            .unwrap();

        let config = resolver.build().unwrap();
        let specs: Vec<&str> = config.features.iter().map(|f| f.spec.name()).collect();
        assert_eq!(specs, vec!["driver", "ds"]);
    }

    fn capability_spec(name: &str, provides: &[&str], requires: &[&str]) -> Arc<ResolvedFeatureSpec> {
        let mut spec = FeatureSpec::new(name).param("type");
        for cap in provides {
            spec = spec.provides(CapabilitySpec::parse(cap).unwrap());
        }
        for cap in requires {
            spec = spec.requires(CapabilitySpec::parse(cap).unwrap());
        }
        Arc::new(ResolvedFeatureSpec::new(ResolvedSpecId::new(gav(), name), spec))
    }

    #[test]
    fn test_capability_providers_come_first() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        let params = BTreeMap::from([("type".to_string(), "mysql".to_string())]);
        resolver
            .include_feature(None, capability_spec("ds", &[], &["driver.$type"]), &params, &[])
            .unwrap();
        resolver
            .include_feature(None, capability_spec("driver", &["driver.$type"], &[]), &params, &[])
            .unwrap();

        let config = resolver.build().unwrap();
        let specs: Vec<&str> = config.features.iter().map(|f| f.spec.name()).collect();
        assert_eq!(specs, vec!["driver", "ds"]);
    }

    #[test]
    fn test_missing_capability_provider() {
        let mut resolver = ConfigModelResolver::new(ConfigId::anonymous());
        let params = BTreeMap::from([("type".to_string(), "mysql".to_string())]);
        resolver
            .include_feature(None, capability_spec("ds", &[], &["driver.$type"]), &params, &[])
            .unwrap();
        resolver
            .include_feature(
                None,
                capability_spec("driver", &["driver.h2"], &[]),
                &BTreeMap::new(),
                &[],
            )
            .unwrap();

        let err = resolver.build().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ProvisioningError::NoCapabilityProvider(cap) if cap == "driver.mysql"
        ));
    }
}
