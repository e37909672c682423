//! Index of loaded feature packs and name resolution across them
//!
//! Names are resolved relative to a [`Context`]: the provisioning request
//! itself or a loaded pack. An unqualified name is searched in the context
//! pack and then depth-first through its dependencies in declaration order;
//! an `origin#name` reference is searched from the pack the origin maps to.

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::resolved::{ResolvedFeatureSpec, ResolvedPackageDependency, ResolvedReference};
use fpack_spec::{
    FeatureGroup, FeatureId, FeatureIdRef, FeaturePackLayout, FeatureSpec, Ga, Gav,
    ResolvedSpecId, SpecRef,
};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Where a name is being resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// The provisioning request; its feature packs are the search roots
    Root,
    Pack(Gav),
}

impl Context {
    pub fn gav(&self) -> Option<&Gav> {
        match self {
            Context::Root => None,
            Context::Pack(gav) => Some(gav),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Root => f.write_str("provisioning request"),
            Context::Pack(gav) => write!(f, "{}", gav),
        }
    }
}

/// Loaded pack with its dependencies bound to loaded coordinates
#[derive(Debug, Clone)]
pub struct LoadedPack {
    pub gav: Gav,
    pub layout: Arc<FeaturePackLayout>,
    /// Dependencies in declaration order
    pub deps: Vec<Gav>,
    pub origins: IndexMap<String, Gav>,
}

#[derive(Debug, Default)]
pub struct SpecIndex {
    packs: IndexMap<Ga, LoadedPack>,
    root_packs: Vec<Gav>,
    root_origins: IndexMap<String, Gav>,
    specs: HashMap<ResolvedSpecId, Arc<ResolvedFeatureSpec>>,
}

impl SpecIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded pack under its group and artifact
    pub fn insert_pack(&mut self, layout: FeaturePackLayout) {
        let gav = layout.gav().clone();
        self.packs.insert(
            gav.ga(),
            LoadedPack {
                gav,
                layout: Arc::new(layout),
                deps: Vec::new(),
                origins: IndexMap::new(),
            },
        );
    }

    /// Bind a declared dependency of `pack` to the loaded coordinate
    pub fn add_dependency(&mut self, pack: &Gav, origin: Option<&str>, dependency: Gav) {
        if let Some(loaded) = self.packs.get_mut(&pack.ga()) {
            if let Some(origin) = origin {
                loaded.origins.insert(origin.to_string(), dependency.clone());
            }
            loaded.deps.push(dependency);
        }
    }

    /// Register a pack requested by the provisioning request
    pub fn add_root(&mut self, gav: Gav, origin: Option<&str>) {
        if let Some(origin) = origin {
            self.root_origins.insert(origin.to_string(), gav.clone());
        }
        self.root_packs.push(gav);
    }

    pub fn root_packs(&self) -> &[Gav] {
        &self.root_packs
    }

    pub fn pack(&self, ga: &Ga) -> Option<&LoadedPack> {
        self.packs.get(ga)
    }

    pub fn packs(&self) -> impl Iterator<Item = &LoadedPack> {
        self.packs.values()
    }

    pub fn layout(&self, gav: &Gav) -> ProvisioningResult<Arc<FeaturePackLayout>> {
        self.loaded(gav).map(|p| p.layout.clone())
    }

    fn loaded(&self, gav: &Gav) -> ProvisioningResult<&LoadedPack> {
        self.packs
            .get(&gav.ga())
            .ok_or_else(|| ProvisioningError::FeaturePackNotFound(gav.clone()))
    }

    /// Coordinate an origin alias maps to in the given context
    pub fn resolve_origin(&self, ctx: &Context, origin: &str) -> ProvisioningResult<Gav> {
        let origins = match ctx {
            Context::Root => &self.root_origins,
            Context::Pack(gav) => &self.loaded(gav)?.origins,
        };
        origins
            .get(origin)
            .cloned()
            .ok_or_else(|| ProvisioningError::UnknownOrigin {
                origin: origin.to_string(),
                context: ctx.to_string(),
            })
    }

    fn search_roots(&self, ctx: &Context, origin: Option<&str>) -> ProvisioningResult<Vec<Gav>> {
        Ok(match (origin, ctx) {
            (Some(origin), _) => vec![self.resolve_origin(ctx, origin)?],
            (None, Context::Root) => self.root_packs.clone(),
            (None, Context::Pack(gav)) => vec![gav.clone()],
        })
    }

    /// First pack, depth-first from `start`, whose layout matches
    fn find(&self, start: &[Gav], matches: &dyn Fn(&FeaturePackLayout) -> bool) -> Option<Gav> {
        let mut visited = HashSet::new();
        start
            .iter()
            .find_map(|gav| self.find_from(gav, matches, &mut visited))
    }

    fn find_from(
        &self,
        gav: &Gav,
        matches: &dyn Fn(&FeaturePackLayout) -> bool,
        visited: &mut HashSet<Ga>,
    ) -> Option<Gav> {
        if !visited.insert(gav.ga()) {
            return None;
        }
        let pack = self.packs.get(&gav.ga())?;
        if matches(&pack.layout) {
            return Some(pack.gav.clone());
        }
        pack.deps
            .iter()
            .find_map(|dep| self.find_from(dep, matches, visited))
    }

    pub fn resolve_spec(&self, ctx: &Context, spec: &SpecRef) -> ProvisioningResult<ResolvedSpecId> {
        let start = self.search_roots(ctx, spec.origin.as_deref())?;
        self.find(&start, &|layout| layout.feature_spec(&spec.name).is_some())
            .map(|gav| ResolvedSpecId::new(gav, spec.name.clone()))
            .ok_or_else(|| ProvisioningError::SpecNotFound {
                spec: spec.to_string(),
                context: ctx.to_string(),
            })
    }

    pub fn resolve_group(
        &self,
        ctx: &Context,
        origin: Option<&str>,
        name: &str,
    ) -> ProvisioningResult<(Gav, FeatureGroup)> {
        let start = self.search_roots(ctx, origin)?;
        let not_found = || ProvisioningError::FeatureGroupNotFound {
            group: match origin {
                Some(origin) => format!("{}#{}", origin, name),
                None => name.to_string(),
            },
            context: ctx.to_string(),
        };

        let gav = self
            .find(&start, &|layout| layout.feature_group(name).is_some())
            .ok_or_else(not_found)?;
        let group = self
            .loaded(&gav)?
            .layout
            .feature_group(name)
            .cloned()
            .ok_or_else(not_found)?;
        Ok((gav, group))
    }

    fn feature_spec(&self, id: &ResolvedSpecId) -> ProvisioningResult<&FeatureSpec> {
        self.loaded(&id.gav)?
            .layout
            .feature_spec(&id.name)
            .ok_or_else(|| ProvisioningError::SpecNotFound {
                spec: id.name.clone(),
                context: id.gav.to_string(),
            })
    }

    /// Spec with references and package dependencies resolved, shared by
    /// every feature of the spec
    pub fn resolved_spec(&mut self, id: &ResolvedSpecId) -> ProvisioningResult<Arc<ResolvedFeatureSpec>> {
        if let Some(spec) = self.specs.get(id) {
            return Ok(spec.clone());
        }

        let spec = self.feature_spec(id)?.clone();
        let ctx = Context::Pack(id.gav.clone());
        let mut resolved = ResolvedFeatureSpec::new(id.clone(), spec.clone());

        for reference in &spec.refs {
            let target = self.resolve_spec(&ctx, &reference.feature)?;
            let mut resolved_ref = ResolvedReference::new(reference.name(), target.clone());
            resolved_ref.nillable = reference.nillable;
            resolved_ref.include = reference.include;
            for (local, target_param) in &reference.mappings {
                resolved_ref = resolved_ref.mapping(local, target_param);
            }
            for param in self.feature_spec(&target)?.id_params() {
                if !reference.mappings.values().any(|t| *t == param.name) {
                    resolved_ref = resolved_ref.mapping(&param.name, &param.name);
                }
            }
            resolved = resolved.with_reference(resolved_ref);
        }

        for dependency in &spec.packages {
            let gav = match &dependency.origin {
                Some(origin) => self.resolve_origin(&ctx, origin)?,
                None => id.gav.clone(),
            };
            resolved = resolved.with_package(ResolvedPackageDependency {
                gav,
                name: dependency.name.clone(),
                optional: dependency.optional,
            });
        }

        let resolved = Arc::new(resolved);
        self.specs.insert(id.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Resolve a feature id reference. Every identifying parameter must be
    /// given or have a default; no other parameter may be given.
    pub fn resolve_feature_id(&self, ctx: &Context, id: &FeatureIdRef) -> ProvisioningResult<FeatureId> {
        let spec_id = self.resolve_spec(ctx, &id.spec)?;
        let spec = self.feature_spec(&spec_id)?;

        if let Some(param) = id
            .params
            .keys()
            .find(|name| !spec.get_param(name).is_some_and(|p| p.feature_id))
        {
            return Err(ProvisioningError::UnknownFeatureParameter {
                spec: spec_id,
                param: param.clone(),
            });
        }

        let mut feature_id = FeatureId::new(spec_id.clone());
        for param in spec.id_params() {
            let value = id
                .params
                .get(&param.name)
                .or(param.default.as_ref())
                .ok_or_else(|| ProvisioningError::MissingIdParameter {
                    spec: spec_id.clone(),
                    param: param.name.clone(),
                })?;
            feature_id = feature_id.with_param(param.name.clone(), value.clone());
        }
        Ok(feature_id)
    }
}
