//! Spec and feature identifiers
//!
//! Unresolved identifiers ([`SpecRef`], [`FeatureIdRef`]) name a spec relative
//! to the pack they are written in, optionally qualified with the origin alias
//! of a dependency (`origin#name`). Resolved identifiers ([`ResolvedSpecId`],
//! [`FeatureId`]) are bound to the coordinate of the owning pack.

use crate::coordinate::Gav;
use crate::SpecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reference to a feature spec or group, written `[origin#]name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpecRef {
    pub origin: Option<String>,
    pub name: String,
}

impl SpecRef {
    /// Reference within the current pack (or any pack it depends on)
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            origin: None,
            name: name.into(),
        }
    }

    /// Reference qualified with a dependency origin
    pub fn with_origin(origin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for SpecRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{}#{}", origin, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for SpecRef {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (origin, name) = match s.split_once('#') {
            Some((origin, name)) => (Some(origin.trim()), name.trim()),
            None => (None, s.trim()),
        };
        if name.is_empty() || name.contains(['#', ':']) || origin.is_some_and(str::is_empty) {
            return Err(SpecError::InvalidSpecRef(s.to_string()));
        }
        Ok(Self {
            origin: origin.map(str::to_string),
            name: name.to_string(),
        })
    }
}

impl TryFrom<String> for SpecRef {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SpecRef> for String {
    fn from(value: SpecRef) -> Self {
        value.to_string()
    }
}

/// Spec id bound to the coordinate of the pack that defines it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedSpecId {
    pub gav: Gav,
    pub name: String,
}

impl ResolvedSpecId {
    pub fn new(gav: Gav, name: impl Into<String>) -> Self {
        Self {
            gav,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResolvedSpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.gav, self.name)
    }
}

/// Unresolved feature id, written `[origin#]spec:param=value,...`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureIdRef {
    pub spec: SpecRef,
    pub params: BTreeMap<String, String>,
}

impl FeatureIdRef {
    pub fn new(spec: SpecRef) -> Self {
        Self {
            spec,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for FeatureIdRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.spec)?;
        write_params(f, &self.params)
    }
}

impl FromStr for FeatureIdRef {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SpecError::InvalidFeatureId {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (spec, params_str) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected spec:param=value"))?;
        let spec: SpecRef = spec.parse().map_err(|_| invalid("invalid spec reference"))?;

        let mut params = BTreeMap::new();
        for pair in params_str.split(',') {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid("expected param=value"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid("empty parameter name"));
            }
            if params
                .insert(name.to_string(), value.trim().to_string())
                .is_some()
            {
                return Err(invalid("duplicate parameter"));
            }
        }

        Ok(Self { spec, params })
    }
}

impl TryFrom<String> for FeatureIdRef {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FeatureIdRef> for String {
    fn from(value: FeatureIdRef) -> Self {
        value.to_string()
    }
}

/// Resolved feature id: spec id plus the values of its id parameters.
///
/// Equality and hashing are structural over the id parameters only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId {
    pub spec: ResolvedSpecId,
    pub params: BTreeMap<String, String>,
}

impl FeatureId {
    pub fn new(spec: ResolvedSpecId) -> Self {
        Self {
            spec,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.spec)?;
        write_params(f, &self.params)
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &BTreeMap<String, String>) -> fmt::Result {
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}={}", name, value)?;
    }
    Ok(())
}
