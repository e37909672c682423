//! Capability resolution and provider registry

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::resolved::{FeatureHandle, ResolvedFeature};
use fpack_spec::{CapabilityElement, CapabilitySpec};
use indexmap::{IndexMap, IndexSet};

/// Resolve a capability expression against a feature's parameters.
///
/// Static expressions resolve to themselves. `$param` segments take the
/// trimmed parameter value; a value written `[a, b]` expands to one
/// capability per element. An absent or blank parameter yields no
/// capability for optional expressions and an error otherwise.
pub fn resolve_capability(
    capability: &CapabilitySpec,
    feature: &ResolvedFeature,
) -> ProvisioningResult<Vec<String>> {
    let mut resolved = vec![String::new()];

    for (i, element) in capability.elements().iter().enumerate() {
        let values = match element {
            CapabilityElement::Static(segment) => vec![segment.clone()],
            CapabilityElement::Param(param) => {
                let values = feature.param(param).map(param_values).unwrap_or_default();
                if values.is_empty() {
                    if capability.is_optional() {
                        return Ok(Vec::new());
                    }
                    return Err(ProvisioningError::CapabilityMissingParameter {
                        capability: capability.to_string(),
                        spec: feature.spec.id.clone(),
                        param: param.clone(),
                    });
                }
                values
            }
        };

        resolved = resolved
            .iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    if i == 0 {
                        value.clone()
                    } else {
                        format!("{}.{}", prefix, value)
                    }
                })
            })
            .collect();
    }

    Ok(resolved)
}

/// Values a parameter contributes to a capability; empty when blank
fn param_values(value: &str) -> Vec<String> {
    let value = value.trim();
    match value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
    {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
        None if value.is_empty() => Vec::new(),
        None => vec![value.to_string()],
    }
}

/// Providers of one resolved capability
#[derive(Debug, Clone, Default)]
pub struct CapabilityProviders {
    /// Spec buckets whose features collectively provide the capability
    pub(crate) specs: IndexSet<usize>,
    /// Individual features providing the capability
    pub(crate) features: IndexSet<FeatureHandle>,
    /// Set once any provider has been ordered
    pub(crate) provided: bool,
}

impl CapabilityProviders {
    pub fn is_provided(&self) -> bool {
        self.provided
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty() && self.features.is_empty()
    }
}

/// Capability string to providers, for one config resolution pass
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    providers: IndexMap<String, CapabilityProviders>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the providers of a capability, creating an empty record when
    /// `create` is set
    pub fn get_providers(
        &mut self,
        capability: &str,
        create: bool,
    ) -> ProvisioningResult<&mut CapabilityProviders> {
        if create {
            return Ok(self.providers.entry(capability.to_string()).or_default());
        }
        self.providers
            .get_mut(capability)
            .ok_or_else(|| ProvisioningError::NoCapabilityProvider(capability.to_string()))
    }

    pub(crate) fn mark_provided(&mut self, capability: &str) {
        if let Some(providers) = self.providers.get_mut(capability) {
            providers.provided = true;
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
