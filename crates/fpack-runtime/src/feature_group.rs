//! Feature group filters and the filter stack of a config
//!
//! A group reference or config filter resolves into one
//! [`ResolvedFeatureGroupConfig`] per feature pack it mentions. Configs are
//! pushed as frames while the referenced items are collected; a pushed frame
//! filters every feature included while it is on the stack.

use fpack_spec::{ConfigId, FeatureId, Gav, ResolvedSpecId};
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// Parameter and dependency overrides of an explicitly included feature,
/// applied when the group that includes it is popped
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureOverride {
    pub params: BTreeMap<String, String>,
    pub deps: Vec<FeatureId>,
}

/// Filter bound to the specs and features of one feature pack
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFeatureGroupConfig {
    pub gav: Gav,
    pub inherit_features: bool,
    pub included_specs: IndexSet<ResolvedSpecId>,
    pub excluded_specs: IndexSet<ResolvedSpecId>,
    pub included_features: IndexMap<FeatureId, Option<FeatureOverride>>,
    pub excluded_features: IndexSet<FeatureId>,
}

impl ResolvedFeatureGroupConfig {
    pub fn new(gav: Gav, inherit_features: bool) -> Self {
        Self {
            gav,
            inherit_features,
            included_specs: IndexSet::new(),
            excluded_specs: IndexSet::new(),
            included_features: IndexMap::new(),
            excluded_features: IndexSet::new(),
        }
    }

    pub fn has_overrides(&self) -> bool {
        self.included_features.values().any(Option::is_some)
    }

    /// Decision of this config for a feature of its pack: `Some(true)` when
    /// filtered out, `Some(false)` when explicitly included, `None` when the
    /// decision is left to the enclosing frames.
    fn decide(&self, spec: &ResolvedSpecId, id: Option<&FeatureId>) -> Option<bool> {
        if let Some(id) = id {
            if self.included_features.contains_key(id) {
                return Some(false);
            }
            if self.excluded_features.contains(id) {
                return Some(true);
            }
        }
        if self.inherit_features {
            if self.excluded_specs.contains(spec) {
                return Some(true);
            }
        } else if !self.included_specs.contains(spec) {
            return Some(true);
        }
        None
    }

    /// True when everything this config lets through `other` lets through
    /// too and every override of this config is also in `other`
    pub fn is_subset_of(&self, other: &Self) -> bool {
        if self.gav != other.gav {
            return false;
        }
        for (id, overrides) in &self.included_features {
            match other.included_features.get(id) {
                Some(other_overrides) if other_overrides == overrides => {}
                _ => return false,
            }
        }

        let hides_excluded_features = || {
            other.excluded_features.iter().all(|id| {
                self.excluded_features.contains(id) || !self.included_specs.contains(&id.spec)
            })
        };

        match (self.inherit_features, other.inherit_features) {
            (true, true) => {
                other.excluded_specs.is_subset(&self.excluded_specs)
                    && other.excluded_features.is_subset(&self.excluded_features)
            }
            (false, true) => {
                self.included_specs.is_disjoint(&other.excluded_specs) && hides_excluded_features()
            }
            (false, false) => {
                self.included_specs.is_subset(&other.included_specs) && hides_excluded_features()
            }
            (true, false) => false,
        }
    }
}

/// True when pushing `new` after `old` cannot let anything new through
fn configs_subset(new: &[ResolvedFeatureGroupConfig], old: &[ResolvedFeatureGroupConfig]) -> bool {
    let narrows_old = old.iter().all(|old_config| {
        new.iter()
            .find(|c| c.gav == old_config.gav)
            .is_some_and(|c| c.is_subset_of(old_config))
    });
    narrows_old
        && new
            .iter()
            .filter(|c| !old.iter().any(|o| o.gav == c.gav))
            .all(|c| !c.has_overrides())
}

/// What a filter frame was pushed for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Feature group defined in a pack
    Group { gav: Gav, name: String },
    /// Config contribution, from a pack or from the provisioning request
    Config { gav: Option<Gav>, id: ConfigId },
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Group { gav, name } => write!(f, "feature group {}#{}", gav, name),
            GroupKey::Config { gav: Some(gav), id } => write!(f, "config {} of {}", id, gav),
            GroupKey::Config { gav: None, id } => write!(f, "config {}", id),
        }
    }
}

/// One frame of the filter stack
#[derive(Debug, Clone)]
pub struct GroupFrame {
    pub key: GroupKey,
    pub configs: Vec<ResolvedFeatureGroupConfig>,
    /// Pushes completed while this frame was the innermost one
    processed: Vec<(GroupKey, Vec<ResolvedFeatureGroupConfig>)>,
}

impl GroupFrame {
    fn new(key: GroupKey, configs: Vec<ResolvedFeatureGroupConfig>) -> Self {
        Self {
            key,
            configs,
            processed: Vec::new(),
        }
    }
}

/// Filter stack of one config; frame 0 is the config root
#[derive(Debug, Clone)]
pub struct FeatureGroupStack {
    frames: Vec<GroupFrame>,
}

impl FeatureGroupStack {
    pub fn new(config: ConfigId) -> Self {
        Self {
            frames: vec![GroupFrame::new(
                GroupKey::Config {
                    gav: None,
                    id: config,
                },
                Vec::new(),
            )],
        }
    }

    /// Push a frame. Returns false and leaves the stack unchanged when the
    /// same key was already processed at this level or above with configs
    /// that let through at least as much.
    pub fn push(&mut self, key: GroupKey, configs: Vec<ResolvedFeatureGroupConfig>) -> bool {
        let redundant = self.frames.iter().any(|frame| {
            frame
                .processed
                .iter()
                .any(|(k, old)| *k == key && configs_subset(&configs, old))
        });
        if redundant {
            trace!(%key, "skipping redundant filter push");
            return false;
        }

        if let Some(current) = self.frames.last_mut() {
            current.processed.push((key.clone(), configs.clone()));
        }
        self.frames.push(GroupFrame::new(key, configs));
        true
    }

    /// Pop the innermost frame
    ///
    /// # Panics
    ///
    /// Panics when only the root frame is left.
    pub fn pop(&mut self) -> GroupFrame {
        match self.frames.pop() {
            Some(frame) if !self.frames.is_empty() => frame,
            _ => panic!("root filter frame popped"),
        }
    }

    /// Number of frames above the root
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Walk the frames innermost-first. Configs bound to other packs are
    /// transparent; the first frame with an opinion decides.
    pub fn is_filtered_out(&self, spec: &ResolvedSpecId, id: Option<&FeatureId>) -> bool {
        for frame in self.frames.iter().rev() {
            for config in frame.configs.iter().filter(|c| c.gav == spec.gav) {
                if let Some(filtered) = config.decide(spec, id) {
                    return filtered;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gav() -> Gav {
        Gav::new("org", "fp", "1")
    }

    fn spec(name: &str) -> ResolvedSpecId {
        ResolvedSpecId::new(gav(), name)
    }

    fn feature(spec_name: &str, name: &str) -> FeatureId {
        FeatureId::new(spec(spec_name)).with_param("name", name)
    }

    fn group(name: &str) -> GroupKey {
        GroupKey::Group {
            gav: gav(),
            name: name.to_string(),
        }
    }

    fn excluding(spec_name: &str) -> ResolvedFeatureGroupConfig {
        let mut config = ResolvedFeatureGroupConfig::new(gav(), true);
        config.excluded_specs.insert(spec(spec_name));
        config
    }

    fn including(spec_name: &str) -> ResolvedFeatureGroupConfig {
        let mut config = ResolvedFeatureGroupConfig::new(gav(), false);
        config.included_specs.insert(spec(spec_name));
        config
    }

    #[test]
    fn test_identical_push_is_skipped() {
        let mut stack = FeatureGroupStack::new(ConfigId::named("m", "c"));
        assert!(stack.push(group("g"), vec![excluding("a")]));
        stack.pop();

        assert!(!stack.push(group("g"), vec![excluding("a")]));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_wider_push_is_not_skipped() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        assert!(stack.push(group("g"), vec![excluding("a")]));
        stack.pop();

        assert!(stack.push(group("g"), Vec::new()));
        stack.pop();
        assert!(!stack.push(group("g"), vec![including("a")]));
    }

    #[test]
    fn test_push_with_new_overrides_is_not_skipped() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        assert!(stack.push(group("g"), Vec::new()));
        stack.pop();

        let mut config = ResolvedFeatureGroupConfig::new(gav(), true);
        config.included_features.insert(
            feature("ds", "A"),
            Some(FeatureOverride {
                params: BTreeMap::from([("jndi".to_string(), "java:/A".to_string())]),
                deps: Vec::new(),
            }),
        );
        assert!(stack.push(group("g"), vec![config]));
    }

    #[test]
    fn test_processed_pushes_are_scoped_to_their_frame() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        assert!(stack.push(group("outer"), Vec::new()));
        assert!(stack.push(group("inner"), Vec::new()));
        stack.pop();
        stack.pop();

        // the inner push was recorded inside the popped outer frame
        assert!(stack.push(group("inner"), Vec::new()));
    }

    #[test]
    fn test_inherit_filter_excludes_spec_unless_id_included() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        let mut config = excluding("ds");
        config.included_features.insert(feature("ds", "A"), None);
        stack.push(group("g"), vec![config]);

        assert!(stack.is_filtered_out(&spec("ds"), Some(&feature("ds", "B"))));
        assert!(!stack.is_filtered_out(&spec("ds"), Some(&feature("ds", "A"))));
        assert!(!stack.is_filtered_out(&spec("logger"), None));
    }

    #[test]
    fn test_exclusive_filter_honors_id_exclusion() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        let mut config = including("ds");
        config.excluded_features.insert(feature("ds", "B"));
        stack.push(group("g"), vec![config]);

        assert!(!stack.is_filtered_out(&spec("ds"), Some(&feature("ds", "A"))));
        assert!(stack.is_filtered_out(&spec("ds"), Some(&feature("ds", "B"))));
        assert!(stack.is_filtered_out(&spec("logger"), None));
    }

    #[test]
    fn test_nested_exclusion_is_monotonic() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        stack.push(group("outer"), vec![excluding("ds")]);
        stack.push(group("inner"), vec![including("ds")]);
        assert!(stack.is_filtered_out(&spec("ds"), Some(&feature("ds", "A"))));
        stack.pop();

        let mut config = ResolvedFeatureGroupConfig::new(gav(), true);
        config.included_features.insert(feature("ds", "A"), None);
        stack.push(group("inner"), vec![config]);
        assert!(!stack.is_filtered_out(&spec("ds"), Some(&feature("ds", "A"))));
        assert!(stack.is_filtered_out(&spec("ds"), Some(&feature("ds", "B"))));
    }

    #[test]
    fn test_configs_of_other_packs_are_transparent() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        let mut config = ResolvedFeatureGroupConfig::new(Gav::new("org", "other", "1"), false);
        config.included_specs.insert(ResolvedSpecId::new(Gav::new("org", "other", "1"), "x"));
        stack.push(group("g"), vec![config]);

        assert!(!stack.is_filtered_out(&spec("ds"), None));
    }

    #[test]
    fn test_subset_rules() {
        assert!(excluding("a").is_subset_of(&ResolvedFeatureGroupConfig::new(gav(), true)));
        assert!(!ResolvedFeatureGroupConfig::new(gav(), true).is_subset_of(&excluding("a")));
        assert!(including("b").is_subset_of(&excluding("a")));
        assert!(!including("a").is_subset_of(&excluding("a")));
        assert!(!excluding("a").is_subset_of(&including("b")));

        let mut both = including("a");
        both.included_specs.insert(spec("b"));
        assert!(including("a").is_subset_of(&both));
        assert!(!both.is_subset_of(&including("a")));
    }

    #[test]
    #[should_panic(expected = "root filter frame popped")]
    fn test_pop_root_panics() {
        let mut stack = FeatureGroupStack::new(ConfigId::anonymous());
        stack.pop();
    }
}
