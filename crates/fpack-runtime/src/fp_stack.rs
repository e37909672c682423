//! Feature-pack config levels of the dependency walk

use fpack_spec::{ConfigId, FeaturePackConfig, Ga};

/// Stack of the feature-pack configs on the current walk path, outermost
/// first
#[derive(Debug, Default)]
pub struct FeaturePackStack {
    levels: Vec<FeaturePackConfig>,
}

impl FeaturePackStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, config: FeaturePackConfig) {
        self.levels.push(config);
    }

    pub fn pop(&mut self) -> Option<FeaturePackConfig> {
        self.levels.pop()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// True when the pack is already on the walk path
    pub fn contains(&self, ga: &Ga) -> bool {
        self.levels.iter().any(|level| level.gav.ga() == *ga)
    }

    /// Whether a config defined by the innermost pack passes every level.
    /// Levels are consulted outermost first: an explicit inclusion of the
    /// config or its model lets it through, an explicit exclusion or
    /// `inherit-configs = false` drops it.
    pub fn is_included(&self, id: &ConfigId) -> bool {
        for level in &self.levels {
            if level.included_configs.contains(id) {
                return true;
            }
            if level.excluded_configs.contains(id) {
                return false;
            }
            if let Some(model) = &id.model {
                if level.excluded_models.contains(model) {
                    return false;
                }
                if level.included_models.contains(model) {
                    return true;
                }
            }
            if !level.inherit_configs {
                return false;
            }
        }
        true
    }
}
