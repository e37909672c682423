//! Resolved feature specs and feature instances
//!
//! A [`ResolvedFeatureSpec`] binds a [`FeatureSpec`] to the coordinate of its
//! pack and resolves its references and package dependencies once per
//! provisioning pass. Every [`ResolvedFeature`] of the spec shares it.

use crate::error::{ProvisioningError, ProvisioningResult};
use fpack_spec::{FeatureId, FeatureSpec, Gav, ResolvedSpecId};
use indexmap::IndexSet;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Feature spec bound to its pack with resolved references
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFeatureSpec {
    pub id: ResolvedSpecId,
    pub spec: FeatureSpec,
    pub refs: Vec<ResolvedReference>,
    pub packages: Vec<ResolvedPackageDependency>,
}

impl ResolvedFeatureSpec {
    /// Spec without references or package dependencies
    pub fn new(id: ResolvedSpecId, spec: FeatureSpec) -> Self {
        Self {
            id,
            spec,
            refs: Vec::new(),
            packages: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference: ResolvedReference) -> Self {
        self.refs.push(reference);
        self
    }

    pub fn with_package(mut self, dependency: ResolvedPackageDependency) -> Self {
        self.packages.push(dependency);
        self
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn gav(&self) -> &Gav {
        &self.id.gav
    }

    /// Compute the id of a feature with the given explicit parameters.
    /// Returns `None` for specs without identifying parameters.
    pub fn feature_id(
        &self,
        params: &BTreeMap<String, String>,
    ) -> ProvisioningResult<Option<FeatureId>> {
        if !self.spec.has_id() {
            return Ok(None);
        }
        let mut id = FeatureId::new(self.id.clone());
        for param in self.spec.id_params() {
            let value = params
                .get(&param.name)
                .or(param.default.as_ref())
                .ok_or_else(|| ProvisioningError::MissingIdParameter {
                    spec: self.id.clone(),
                    param: param.name.clone(),
                })?;
            id = id.with_param(param.name.clone(), value.clone());
        }
        Ok(Some(id))
    }
}

impl fmt::Display for ResolvedFeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

/// Reference to a target spec with local-to-target parameter mappings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReference {
    pub name: String,
    pub target: ResolvedSpecId,
    pub nillable: bool,
    pub include: bool,
    /// (local parameter, target id parameter)
    pub mappings: Vec<(String, String)>,
}

impl ResolvedReference {
    pub fn new(name: impl Into<String>, target: ResolvedSpecId) -> Self {
        Self {
            name: name.into(),
            target,
            nillable: false,
            include: false,
            mappings: Vec::new(),
        }
    }

    pub fn mapping(mut self, local: impl Into<String>, target: impl Into<String>) -> Self {
        self.mappings.push((local.into(), target.into()));
        self
    }

    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    pub fn include(mut self) -> Self {
        self.include = true;
        self
    }

    /// Id of the feature this reference points to from `feature`.
    ///
    /// `None` when a mapped parameter is absent on a nillable reference.
    pub fn target_id(&self, feature: &ResolvedFeature) -> ProvisioningResult<Option<FeatureId>> {
        let mut id = FeatureId::new(self.target.clone());
        for (local, target) in &self.mappings {
            match feature.param(local) {
                Some(value) => id = id.with_param(target.clone(), value),
                None if self.nillable => return Ok(None),
                None => {
                    return Err(ProvisioningError::UnsatisfiedReferenceParameter {
                        feature: feature.to_string(),
                        reference: self.name.clone(),
                        param: local.clone(),
                    })
                }
            }
        }
        Ok(Some(id))
    }
}

/// Package dependency bound to the pack that defines the package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackageDependency {
    pub gav: Gav,
    pub name: String,
    pub optional: bool,
}

/// Index of a feature in the arena of one config resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureHandle(pub(crate) usize);

/// Ordering state of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Free,
    Scheduled,
    Ordered,
}

/// Feature instance collected into a config
#[derive(Debug, Clone)]
pub struct ResolvedFeature {
    pub include_no: usize,
    pub id: Option<FeatureId>,
    pub spec: Arc<ResolvedFeatureSpec>,
    params: BTreeMap<String, String>,
    deps: IndexSet<FeatureId>,
    state: OrderState,
    pub(crate) batch_start: bool,
    pub(crate) batch_end: bool,
}

impl ResolvedFeature {
    pub(crate) fn new(
        include_no: usize,
        id: Option<FeatureId>,
        spec: Arc<ResolvedFeatureSpec>,
    ) -> Self {
        Self {
            include_no,
            id,
            spec,
            params: BTreeMap::new(),
            deps: IndexSet::new(),
            state: OrderState::Free,
            batch_start: false,
            batch_end: false,
        }
    }

    /// Parameter value with the spec default applied
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str).or_else(|| {
            self.spec
                .spec
                .get_param(name)
                .and_then(|p| p.default.as_deref())
        })
    }

    /// Explicitly set parameters
    pub fn explicit_params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Explicit parameters plus defaults for the unset ones
    pub fn resolved_params(&self) -> BTreeMap<String, String> {
        let mut params = self.params.clone();
        for spec in &self.spec.spec.params {
            if let Some(default) = &spec.default {
                params
                    .entry(spec.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        params
    }

    pub fn deps(&self) -> impl Iterator<Item = &FeatureId> {
        self.deps.iter()
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn is_batch_start(&self) -> bool {
        self.batch_start
    }

    pub fn is_batch_end(&self) -> bool {
        self.batch_end
    }

    /// Set parameters, keeping existing explicit values unless `overwrite`
    pub(crate) fn set_params(
        &mut self,
        params: &BTreeMap<String, String>,
        overwrite: bool,
    ) -> ProvisioningResult<()> {
        for (name, value) in params {
            let Some(spec) = self.spec.spec.get_param(name) else {
                return Err(ProvisioningError::UnknownFeatureParameter {
                    spec: self.spec.id.clone(),
                    param: name.clone(),
                });
            };
            if spec.feature_id {
                if let Some(id) = &self.id {
                    if id.param(name) != Some(value.as_str()) {
                        return Err(ProvisioningError::IdParameterModified {
                            id: id.clone(),
                            param: name.clone(),
                        });
                    }
                }
            }
            if overwrite || !self.params.contains_key(name) {
                self.params.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    pub(crate) fn add_deps<'a>(&mut self, deps: impl IntoIterator<Item = &'a FeatureId>) {
        self.deps.extend(deps.into_iter().cloned());
    }

    pub(crate) fn schedule(&mut self) {
        assert_eq!(
            self.state,
            OrderState::Free,
            "feature {} scheduled while not free",
            self
        );
        self.state = OrderState::Scheduled;
    }

    pub(crate) fn free(&mut self) {
        assert_eq!(
            self.state,
            OrderState::Scheduled,
            "feature {} freed while not scheduled",
            self
        );
        self.state = OrderState::Free;
    }

    pub(crate) fn set_ordered(&mut self) {
        assert_eq!(
            self.state,
            OrderState::Scheduled,
            "feature {} ordered while not scheduled",
            self
        );
        self.state = OrderState::Ordered;
    }

    /// Copy for another config pass: same content, fresh state
    pub(crate) fn copy_as(&self, include_no: usize) -> Self {
        Self {
            include_no,
            id: self.id.clone(),
            spec: self.spec.clone(),
            params: self.params.clone(),
            deps: self.deps.clone(),
            state: OrderState::Free,
            batch_start: false,
            batch_end: false,
        }
    }
}

impl fmt::Display for ResolvedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "{} #{}", self.spec.id, self.include_no),
        }
    }
}
