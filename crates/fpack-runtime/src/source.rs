//! Feature-pack sources
//!
//! A [`FeaturePackSource`] turns a requested coordinate into a parsed layout.
//! A request without a version is served with the greatest available
//! version (string order).

use crate::error::{ProvisioningError, ProvisioningResult};
use fpack_config::Config;
use fpack_spec::{FeaturePackLayout, Ga, Gav};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the layout descriptor inside a pack directory
pub const LAYOUT_FILE: &str = "feature-pack.toml";

pub trait FeaturePackSource {
    /// Load the layout of a feature pack
    fn load(&self, gav: &Gav) -> ProvisioningResult<FeaturePackLayout>;
}

/// Layouts held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    packs: IndexMap<Ga, Vec<FeaturePackLayout>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pack(mut self, layout: FeaturePackLayout) -> Self {
        self.add(layout);
        self
    }

    pub fn add(&mut self, layout: FeaturePackLayout) {
        self.packs.entry(layout.gav().ga()).or_default().push(layout);
    }
}

impl FeaturePackSource for InMemorySource {
    fn load(&self, gav: &Gav) -> ProvisioningResult<FeaturePackLayout> {
        let candidates = self
            .packs
            .get(&gav.ga())
            .ok_or_else(|| ProvisioningError::FeaturePackNotFound(gav.clone()))?;

        let found = match gav.version() {
            Some(version) => candidates
                .iter()
                .find(|layout| layout.gav().version() == Some(version)),
            None => candidates
                .iter()
                .max_by(|a, b| a.gav().version().cmp(&b.gav().version())),
        };
        found
            .cloned()
            .ok_or_else(|| ProvisioningError::FeaturePackNotFound(gav.clone()))
    }
}

/// Layouts on disk under `<root>/<group>/<artifact>/<version>/feature-pack.toml`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Source over the effective layout directory of a loaded configuration
    pub fn from_config(config: &Config) -> ProvisioningResult<Self> {
        config
            .layout_dir()
            .map(Self::new)
            .ok_or(ProvisioningError::LayoutDirNotConfigured)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_dir(&self, gav: &Gav) -> PathBuf {
        self.root.join(gav.group()).join(gav.artifact())
    }

    /// Greatest version directory of an artifact
    fn latest_version(&self, gav: &Gav) -> ProvisioningResult<String> {
        let dir = self.artifact_dir(gav);
        if !dir.is_dir() {
            return Err(ProvisioningError::FeaturePackNotFound(gav.clone()));
        }

        let mut latest: Option<String> = None;
        for entry in std::fs::read_dir(&dir).map_err(|e| ProvisioningError::io(&dir, e))? {
            let entry = entry.map_err(|e| ProvisioningError::io(&dir, e))?;
            if !entry.path().join(LAYOUT_FILE).is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if latest.as_ref().map_or(true, |l| name > *l) {
                latest = Some(name);
            }
        }
        latest.ok_or_else(|| ProvisioningError::FeaturePackNotFound(gav.clone()))
    }
}

impl FeaturePackSource for DirectorySource {
    fn load(&self, gav: &Gav) -> ProvisioningResult<FeaturePackLayout> {
        let version = match gav.version() {
            Some(version) => version.to_string(),
            None => self.latest_version(gav)?,
        };
        let path = self.artifact_dir(gav).join(&version).join(LAYOUT_FILE);
        if !path.is_file() {
            return Err(ProvisioningError::FeaturePackNotFound(gav.clone()));
        }

        debug!(path = %path.display(), "reading feature-pack layout");
        let content = std::fs::read_to_string(&path).map_err(|e| ProvisioningError::io(&path, e))?;
        let layout = FeaturePackLayout::from_str(&content)?;

        let expected = gav.with_version(version);
        if layout.gav() != &expected {
            return Err(ProvisioningError::LayoutMismatch {
                path,
                expected,
                found: layout.gav().clone(),
            });
        }
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_in_memory_picks_requested_or_greatest_version() {
        let source = InMemorySource::new()
            .with_pack(FeaturePackLayout::new(Gav::new("org", "core", "1.0")))
            .with_pack(FeaturePackLayout::new(Gav::new("org", "core", "1.2")));

        let exact = source.load(&Gav::new("org", "core", "1.0")).unwrap();
        assert_eq!(exact.gav(), &Gav::new("org", "core", "1.0"));

        let latest = source.load(&Gav::unversioned("org", "core")).unwrap();
        assert_eq!(latest.gav(), &Gav::new("org", "core", "1.2"));
    }

    #[test]
    fn test_in_memory_unknown_pack() {
        let source = InMemorySource::new();
        assert!(matches!(
            source.load(&Gav::new("org", "core", "1.0")),
            Err(ProvisioningError::FeaturePackNotFound(_))
        ));
    }
}
