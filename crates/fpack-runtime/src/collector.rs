//! Collection of config items into a config resolver
//!
//! Items are features and references to feature groups. A group reference
//! pushes its resolved filter, collects the group's items in the pack that
//! defines the group and pops the filter again. Features are checked against
//! the filter stack before they are included; dependencies and references
//! flagged `include` pull their targets into the config.

use crate::config_model::ConfigModelResolver;
use crate::error::ProvisioningResult;
use crate::feature_group::{FeatureOverride, GroupKey, ResolvedFeatureGroupConfig};
use crate::packages::PackageResolver;
use crate::resolved::FeatureHandle;
use crate::spec_index::{Context, SpecIndex};
use fpack_spec::{
    ConfigItem, FeatureConfig, FeatureDependency, FeatureFilter, FeatureGroupRef, FeatureId, Gav,
};
use indexmap::IndexMap;
use tracing::trace;

/// Context an entry of a filter resolves in: qualified entries in the
/// context that wrote the filter, unqualified ones in the filter's own pack
fn scope<'c>(ctx: &'c Context, local: &'c Context, origin: Option<&str>) -> &'c Context {
    if origin.is_some() {
        ctx
    } else {
        local
    }
}

fn config_for<'m>(
    configs: &'m mut IndexMap<Gav, ResolvedFeatureGroupConfig>,
    gav: &Gav,
    inherit: bool,
) -> &'m mut ResolvedFeatureGroupConfig {
    configs
        .entry(gav.clone())
        .or_insert_with(|| ResolvedFeatureGroupConfig::new(gav.clone(), inherit))
}

pub struct FeatureCollector<'a> {
    index: &'a mut SpecIndex,
    packages: &'a mut PackageResolver,
}

impl<'a> FeatureCollector<'a> {
    pub fn new(index: &'a mut SpecIndex, packages: &'a mut PackageResolver) -> Self {
        Self { index, packages }
    }

    pub fn process_items(
        &mut self,
        resolver: &mut ConfigModelResolver,
        ctx: &Context,
        items: &[ConfigItem],
    ) -> ProvisioningResult<()> {
        for item in items {
            match item {
                ConfigItem::Feature(feature) => self.process_feature(resolver, ctx, feature)?,
                ConfigItem::Group(group) => self.process_group(resolver, ctx, group)?,
            }
        }
        Ok(())
    }

    fn process_group(
        &mut self,
        resolver: &mut ConfigModelResolver,
        ctx: &Context,
        group_ref: &FeatureGroupRef,
    ) -> ProvisioningResult<()> {
        let (gav, group) = self
            .index
            .resolve_group(ctx, group_ref.origin.as_deref(), &group_ref.name)?;
        let group_ctx = Context::Pack(gav.clone());
        let configs = self.resolve_filter(
            ctx,
            &group_ctx,
            std::slice::from_ref(&gav),
            &group_ref.filter,
        )?;

        let key = GroupKey::Group {
            gav,
            name: group.name.clone(),
        };
        if !resolver.push_filter(key, configs) {
            return Ok(());
        }
        self.process_items(resolver, &group_ctx, &group.items)?;
        self.include_override_deps(resolver, ctx, &group_ctx, &group_ref.filter)?;
        resolver.pop_filter()
    }

    fn process_feature(
        &mut self,
        resolver: &mut ConfigModelResolver,
        ctx: &Context,
        feature: &FeatureConfig,
    ) -> ProvisioningResult<()> {
        let spec_id = self.index.resolve_spec(ctx, &feature.spec)?;
        let spec = self.index.resolved_spec(&spec_id)?;
        let id = spec.feature_id(&feature.params)?;
        if resolver.is_filtered_out(&spec_id, id.as_ref()) {
            trace!(spec = %spec_id, "feature filtered out");
            return Ok(());
        }

        let deps = self.resolve_deps(ctx, ctx, &feature.deps)?;
        let handle = resolver.include_feature(
            id,
            spec.clone(),
            &feature.params,
            &deps.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>(),
        )?;
        self.packages.require_spec(&spec);

        for (dep, include) in deps {
            if include {
                self.include_on_resolve(resolver, &dep)?;
            }
        }
        self.include_references(resolver, handle)
    }

    /// Include a feature by id unless it is already in the config or
    /// filtered out
    pub fn include_on_resolve(
        &mut self,
        resolver: &mut ConfigModelResolver,
        id: &FeatureId,
    ) -> ProvisioningResult<()> {
        if resolver.includes(id) || resolver.is_filtered_out(&id.spec, Some(id)) {
            return Ok(());
        }
        trace!(feature = %id, "including on resolve");
        let spec = self.index.resolved_spec(&id.spec)?;
        let handle = resolver.include_feature(Some(id.clone()), spec.clone(), &id.params, &[])?;
        self.packages.require_spec(&spec);
        self.include_references(resolver, handle)
    }

    fn include_references(
        &mut self,
        resolver: &mut ConfigModelResolver,
        handle: FeatureHandle,
    ) -> ProvisioningResult<()> {
        let feature = resolver.feature(handle);
        let mut targets = Vec::new();
        for reference in feature.spec.refs.iter().filter(|r| r.include) {
            if let Some(target) = reference.target_id(feature)? {
                if feature.id.as_ref() != Some(&target) {
                    targets.push(target);
                }
            }
        }
        for target in targets {
            self.include_on_resolve(resolver, &target)?;
        }
        Ok(())
    }

    fn include_override_deps(
        &mut self,
        resolver: &mut ConfigModelResolver,
        ctx: &Context,
        local: &Context,
        filter: &FeatureFilter,
    ) -> ProvisioningResult<()> {
        for included in &filter.included_features {
            for (dep, include) in self.resolve_deps(ctx, local, &included.deps)? {
                if include {
                    self.include_on_resolve(resolver, &dep)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_deps(
        &self,
        ctx: &Context,
        local: &Context,
        deps: &[FeatureDependency],
    ) -> ProvisioningResult<Vec<(FeatureId, bool)>> {
        deps.iter()
            .map(|dep| {
                let dep_ctx = scope(ctx, local, dep.id.spec.origin.as_deref());
                Ok((self.index.resolve_feature_id(dep_ctx, &dep.id)?, dep.include))
            })
            .collect()
    }

    /// Bind a filter to the packs its entries resolve to. `ctx` is the
    /// context the filter is written in, `local` the context of the group or
    /// config it filters. A filter that does not inherit features yields an
    /// exclusive config for each of `local_gavs` even when it names nothing
    /// there.
    pub fn resolve_filter(
        &self,
        ctx: &Context,
        local: &Context,
        local_gavs: &[Gav],
        filter: &FeatureFilter,
    ) -> ProvisioningResult<Vec<ResolvedFeatureGroupConfig>> {
        if filter.is_transparent() {
            return Ok(Vec::new());
        }

        let inherit = filter.inherit_features;
        let mut configs: IndexMap<Gav, ResolvedFeatureGroupConfig> = IndexMap::new();
        if !inherit {
            for gav in local_gavs {
                config_for(&mut configs, gav, inherit);
            }
        }

        for spec in &filter.included_specs {
            let id = self
                .index
                .resolve_spec(scope(ctx, local, spec.origin.as_deref()), spec)?;
            config_for(&mut configs, &id.gav, inherit)
                .included_specs
                .insert(id);
        }
        for spec in &filter.excluded_specs {
            let id = self
                .index
                .resolve_spec(scope(ctx, local, spec.origin.as_deref()), spec)?;
            config_for(&mut configs, &id.gav, inherit)
                .excluded_specs
                .insert(id);
        }
        for included in &filter.included_features {
            let id = self.index.resolve_feature_id(
                scope(ctx, local, included.id.spec.origin.as_deref()),
                &included.id,
            )?;
            let overrides = if included.has_overrides() {
                let deps = self.resolve_deps(ctx, local, &included.deps)?;
                Some(FeatureOverride {
                    params: included.params.clone(),
                    deps: deps.into_iter().map(|(id, _)| id).collect(),
                })
            } else {
                None
            };
            config_for(&mut configs, &id.spec.gav, inherit)
                .included_features
                .insert(id, overrides);
        }
        for excluded in &filter.excluded_features {
            let id = self.index.resolve_feature_id(
                scope(ctx, local, excluded.spec.origin.as_deref()),
                excluded,
            )?;
            config_for(&mut configs, &id.spec.gav, inherit)
                .excluded_features
                .insert(id);
        }

        Ok(configs.into_values().collect())
    }
}
