//! Provisioning runtime builder
//!
//! Orchestrates one provisioning operation:
//! 1. Load the requested feature packs and their transitive dependencies
//!    from a [`FeaturePackSource`], validating each layout and detecting
//!    version conflicts
//! 2. Walk the dependency graph depth-first, collecting config
//!    contributions into one resolver per addressable config
//! 3. Resolve the configs: anonymous, name-only, model-only merged into the
//!    named configs of their model, named
//! 4. Resolve the packages of every pack
//!
//! A builder owns all state of the operation and is consumed by
//! [`ProvisioningRuntimeBuilder::build`].

use crate::collector::FeatureCollector;
use crate::config_model::ConfigModelResolver;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::feature_group::GroupKey;
use crate::fp_stack::FeaturePackStack;
use crate::packages::PackageResolver;
use crate::provisioned::{ProvisionedConfig, ProvisionedFeaturePack, ProvisionedState};
use crate::source::FeaturePackSource;
use crate::spec_index::{Context, SpecIndex};
use fpack_config::ProvisioningConfig;
use fpack_spec::{ConfigId, ConfigKind, ConfigModel, FeaturePackConfig, Ga, Gav, Validator};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Position of a config resolver in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSlot {
    Anonymous(usize),
    Keyed(usize),
}

/// Config resolvers of one operation. Every anonymous contribution gets its
/// own resolver; the others are shared by id.
#[derive(Debug, Default)]
struct ConfigRegistry {
    anonymous: Vec<ConfigModelResolver>,
    keyed: IndexMap<ConfigId, ConfigModelResolver>,
}

impl ConfigRegistry {
    fn slot_for(&mut self, id: &ConfigId) -> ConfigSlot {
        if id.kind() == ConfigKind::Anonymous {
            self.anonymous.push(ConfigModelResolver::new(id.clone()));
            return ConfigSlot::Anonymous(self.anonymous.len() - 1);
        }
        let entry = self.keyed.entry(id.clone());
        let index = entry.index();
        entry.or_insert_with(|| ConfigModelResolver::new(id.clone()));
        ConfigSlot::Keyed(index)
    }

    fn get_mut(&mut self, slot: ConfigSlot) -> &mut ConfigModelResolver {
        match slot {
            ConfigSlot::Anonymous(index) => &mut self.anonymous[index],
            ConfigSlot::Keyed(index) => &mut self.keyed[index],
        }
    }
}

/// Config contribution whose filter is pushed and whose items are still to
/// be collected
struct Contribution {
    slot: ConfigSlot,
    ctx: Context,
    config: ConfigModel,
    pushed: bool,
}

pub struct ProvisioningRuntimeBuilder<S: FeaturePackSource> {
    source: S,
    index: SpecIndex,
    packages: PackageResolver,
    fp_stack: FeaturePackStack,
    registry: ConfigRegistry,
    /// Packs whose own configs were contributed
    visited: HashSet<Ga>,
    /// Processed packs, dependencies first
    processed: IndexSet<Gav>,
}

impl<S: FeaturePackSource> ProvisioningRuntimeBuilder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            index: SpecIndex::new(),
            packages: PackageResolver::new(),
            fp_stack: FeaturePackStack::new(),
            registry: ConfigRegistry::default(),
            visited: HashSet::new(),
            processed: IndexSet::new(),
        }
    }

    /// Resolve a provisioning request
    pub fn build(mut self, request: &ProvisioningConfig) -> ProvisioningResult<ProvisionedState> {
        for fp in &request.feature_packs {
            let gav = self.load(&fp.gav)?;
            self.index.add_root(gav, fp.origin.as_deref());
        }
        debug!(packs = self.index.packs().count(), "feature packs loaded");

        let root_gavs = self.index.root_packs().to_vec();
        let mut root_contributions = Vec::new();
        for config in &request.configs {
            root_contributions.push(self.start_contribution(
                Context::Root,
                None,
                &root_gavs,
                config,
            )?);
        }
        for fp in &request.feature_packs {
            self.process(fp)?;
        }
        for contribution in root_contributions.into_iter().rev() {
            self.finish_contribution(contribution)?;
        }

        let resolved_packages = self.packages.resolve(&self.index)?;
        let feature_packs = self
            .processed
            .iter()
            .map(|gav| ProvisionedFeaturePack {
                gav: gav.clone(),
                packages: resolved_packages.get(gav).cloned().unwrap_or_default(),
            })
            .collect();
        let configs = Self::resolve_configs(self.registry)?;

        Ok(ProvisionedState {
            feature_packs,
            configs,
        })
    }

    /// Load a pack and its dependencies, returning the loaded coordinate
    fn load(&mut self, requested: &Gav) -> ProvisioningResult<Gav> {
        if let Some(loaded) = self.index.pack(&requested.ga()) {
            if requested.version().is_some() && requested.version() != loaded.gav.version() {
                return Err(ProvisioningError::FeaturePackVersionConflict {
                    ga: requested.ga(),
                    first: loaded.gav.clone(),
                    second: requested.clone(),
                });
            }
            return Ok(loaded.gav.clone());
        }

        debug!(gav = %requested, "loading feature pack");
        let layout = self.source.load(requested)?;
        Validator::validate(&layout).map_err(|errors| ProvisioningError::InvalidFeaturePack {
            gav: layout.gav().clone(),
            errors,
        })?;

        let gav = layout.gav().clone();
        let dependencies = layout.spec.dependencies.clone();
        // registered before its dependencies so that dependency cycles end here
        self.index.insert_pack(layout);
        for dependency in &dependencies {
            let dep_gav = self
                .load(&dependency.gav)
                .map_err(|e| ProvisioningError::in_feature_pack(&gav, e))?;
            self.index
                .add_dependency(&gav, dependency.origin.as_deref(), dep_gav);
        }
        Ok(gav)
    }

    fn process(&mut self, fp_config: &FeaturePackConfig) -> ProvisioningResult<()> {
        let gav = self
            .index
            .pack(&fp_config.gav.ga())
            .map(|pack| pack.gav.clone())
            .ok_or_else(|| ProvisioningError::FeaturePackNotFound(fp_config.gav.clone()))?;
        self.process_pack(&gav, fp_config)
            .map_err(|e| ProvisioningError::in_feature_pack(&gav, e))
    }

    fn process_pack(&mut self, gav: &Gav, fp_config: &FeaturePackConfig) -> ProvisioningResult<()> {
        let ga = gav.ga();
        if self.fp_stack.contains(&ga) {
            debug!(%gav, "feature pack already on the walk path");
            return Ok(());
        }
        debug!(%gav, depth = self.fp_stack.depth(), "processing feature pack");

        let layout = self.index.layout(gav)?;
        self.fp_stack.push(fp_config.clone());
        self.packages.visit(&layout, fp_config);

        let ctx = Context::Pack(gav.clone());
        let local_gavs = [gav.clone()];
        let mut contributions = Vec::new();
        if self.visited.insert(ga) {
            for config in &layout.spec.configs {
                if !self.fp_stack.is_included(&config.id()) {
                    debug!(config = %config.id(), %gav, "config filtered out");
                    continue;
                }
                contributions.push(self.start_contribution(
                    ctx.clone(),
                    Some(gav),
                    &local_gavs,
                    config,
                )?);
            }
        }
        for config in &fp_config.configs {
            contributions.push(self.start_contribution(ctx.clone(), Some(gav), &local_gavs, config)?);
        }

        for dependency in &layout.spec.dependencies {
            self.process(dependency)?;
        }

        for contribution in contributions.into_iter().rev() {
            self.finish_contribution(contribution)?;
        }
        self.fp_stack.pop();
        self.processed.insert(gav.clone());
        Ok(())
    }

    /// Push the filter of a config contribution on its resolver
    fn start_contribution(
        &mut self,
        ctx: Context,
        gav: Option<&Gav>,
        local_gavs: &[Gav],
        config: &ConfigModel,
    ) -> ProvisioningResult<Contribution> {
        let id = config.id();
        let filters = FeatureCollector::new(&mut self.index, &mut self.packages)
            .resolve_filter(&ctx, &ctx, local_gavs, &config.filter)
            .map_err(|e| ProvisioningError::in_config(&id, e))?;

        let slot = self.registry.slot_for(&id);
        let key = GroupKey::Config {
            gav: gav.cloned(),
            id,
        };
        let pushed = self.registry.get_mut(slot).push_filter(key, filters);
        Ok(Contribution {
            slot,
            ctx,
            config: config.clone(),
            pushed,
        })
    }

    /// Collect the properties and items of a contribution and pop its filter
    fn finish_contribution(&mut self, contribution: Contribution) -> ProvisioningResult<()> {
        let Contribution {
            slot,
            ctx,
            config,
            pushed,
        } = contribution;
        if !pushed {
            return Ok(());
        }

        let resolver = self.registry.get_mut(slot);
        let id = resolver.id().clone();
        resolver.set_props(&config.props);
        let mut collector = FeatureCollector::new(&mut self.index, &mut self.packages);
        collector
            .process_items(resolver, &ctx, &config.items)
            .and_then(|()| resolver.pop_filter())
            .map_err(|e| ProvisioningError::in_config(&id, e))
    }

    fn resolve_configs(registry: ConfigRegistry) -> ProvisioningResult<Vec<ProvisionedConfig>> {
        let ConfigRegistry { anonymous, keyed } = registry;
        let mut name_only = Vec::new();
        let mut model_only = HashMap::new();
        let mut named = Vec::new();
        for (id, resolver) in keyed {
            match id.kind() {
                ConfigKind::NameOnly => name_only.push(resolver),
                ConfigKind::Named => named.push(resolver),
                ConfigKind::ModelOnly => {
                    model_only.insert(id.model.unwrap_or_default(), resolver);
                }
                ConfigKind::Anonymous => unreachable!("anonymous config {} registered by id", id),
            }
        }

        let mut configs = Vec::new();
        for resolver in anonymous.into_iter().chain(name_only) {
            Self::push_built(&mut configs, resolver)?;
        }
        for mut resolver in named {
            let model = resolver.id().model.clone().unwrap_or_default();
            if let Some(defaults) = model_only.get(&model) {
                let id = resolver.id().clone();
                debug!(config = %id, %model, "merging model-only config");
                resolver
                    .merge(defaults)
                    .map_err(|e| ProvisioningError::in_config(&id, e))?;
            }
            Self::push_built(&mut configs, resolver)?;
        }
        Ok(configs)
    }

    fn push_built(
        configs: &mut Vec<ProvisionedConfig>,
        resolver: ConfigModelResolver,
    ) -> ProvisioningResult<()> {
        if !resolver.has_features() {
            debug!(config = %resolver.id(), "skipping config without features");
            return Ok(());
        }
        configs.push(resolver.build()?);
        Ok(())
    }
}
