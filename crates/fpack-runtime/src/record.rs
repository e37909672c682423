//! Provisioning record (provisioned.toml)
//!
//! Serializable summary of a provisioned state: the packs with their
//! packages and every config with its ordered features and batch markers.

use crate::error::ProvisioningResult;
use crate::provisioned::{ProvisionedConfig, ProvisionedFeature, ProvisionedState};
use fpack_spec::Gav;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Record of one provisioning operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ProvisioningRecord {
    /// Record format version
    pub version: u32,
    #[serde(default)]
    pub metadata: RecordMetadata,
    /// Provisioned packs, dependencies first
    #[serde(default, rename = "feature-pack", skip_serializing_if = "Vec::is_empty")]
    pub feature_packs: Vec<RecordedFeaturePack>,
    #[serde(default, rename = "config", skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<RecordedConfig>,
}

impl ProvisioningRecord {
    /// Current record format version
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            metadata: RecordMetadata::default(),
            feature_packs: Vec::new(),
            configs: Vec::new(),
        }
    }

    /// Record a provisioned state, stamped with the generation time
    pub fn from_state(state: &ProvisionedState) -> Self {
        let mut record = Self::new();
        record.metadata.fpack_version = Some(env!("CARGO_PKG_VERSION").to_string());
        record.metadata.generated_at =
            Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));

        record.feature_packs = state
            .feature_packs
            .iter()
            .map(|fp| RecordedFeaturePack {
                gav: fp.gav.clone(),
                packages: fp.packages.clone(),
            })
            .collect();
        record.configs = state.configs.iter().map(RecordedConfig::from_config).collect();
        record
    }

    /// Parse a record from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load a record from a file
    pub fn from_file(path: &Path) -> ProvisioningResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&content)?)
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> ProvisioningResult<()> {
        let content = self.to_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn feature_pack(&self, gav: &Gav) -> Option<&RecordedFeaturePack> {
        self.feature_packs.iter().find(|fp| &fp.gav == gav)
    }

    /// Verify record integrity
    pub fn verify(&self) -> Result<(), String> {
        if self.version > Self::VERSION {
            return Err(format!(
                "Record version {} is newer than supported version {}",
                self.version,
                Self::VERSION
            ));
        }

        let mut seen = HashSet::new();
        for fp in &self.feature_packs {
            if !seen.insert(fp.gav.ga()) {
                return Err(format!("Duplicate feature pack in record: {}", fp.gav));
            }
        }

        let mut seen = HashSet::new();
        for config in self.configs.iter().filter(|c| c.model.is_some() || c.name.is_some()) {
            if !seen.insert((&config.model, &config.name)) {
                return Err(format!(
                    "Duplicate config in record: {}:{}",
                    config.model.as_deref().unwrap_or(""),
                    config.name.as_deref().unwrap_or("")
                ));
            }
        }

        Ok(())
    }
}

impl Default for ProvisioningRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RecordMetadata {
    /// When the record was generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// fpack version that generated the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fpack_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedFeaturePack {
    pub gav: Gav,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
    #[serde(default, rename = "feature", skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<RecordedFeature>,
}

impl RecordedConfig {
    fn from_config(config: &ProvisionedConfig) -> Self {
        Self {
            model: config.id.model.clone(),
            name: config.id.name.clone(),
            props: config.props.clone(),
            features: config.features.iter().map(RecordedFeature::from_feature).collect(),
        }
    }
}

/// Feature in installation order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RecordedFeature {
    /// `gav#spec`
    pub spec: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub batch_start: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub batch_end: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl RecordedFeature {
    fn from_feature(feature: &ProvisionedFeature) -> Self {
        Self {
            spec: feature.spec_id().to_string(),
            batch_start: feature.batch_start,
            batch_end: feature.batch_end,
            params: feature.params.clone(),
        }
    }
}
