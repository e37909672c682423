//! Feature-pack coordinates

use crate::SpecError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Feature-pack coordinate: group, artifact and an optional version.
///
/// The version may be absent before the pack is located by a source. Ordering
/// follows the string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gav {
    group: String,
    artifact: String,
    version: Option<String>,
}

impl Gav {
    /// Create a fully versioned coordinate
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: Some(version.into()),
        }
    }

    /// Create a coordinate without a version
    pub fn unversioned(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: None,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Version-less key of this coordinate
    pub fn ga(&self) -> Ga {
        Ga {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
        }
    }

    /// Same group and artifact with the given version
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for Gav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}:{}", self.group, self.artifact, version),
            None => write!(f, "{}:{}", self.group, self.artifact),
        }
    }
}

impl FromStr for Gav {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(SpecError::InvalidCoordinate(s.to_string()));
        }
        match parts.as_slice() {
            [group, artifact] => Ok(Self::unversioned(*group, *artifact)),
            [group, artifact, version] => Ok(Self::new(*group, *artifact, *version)),
            _ => Err(SpecError::InvalidCoordinate(s.to_string())),
        }
    }
}

impl TryFrom<String> for Gav {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Gav> for String {
    fn from(gav: Gav) -> Self {
        gav.to_string()
    }
}

impl PartialOrd for Gav {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Gav {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

/// Group and artifact of a feature pack, the identity used to detect
/// version conflicts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ga {
    pub group: String,
    pub artifact: String,
}

impl Ga {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }
}

impl fmt::Display for Ga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versioned() {
        let gav: Gav = "org.example:base:1.0.0".parse().unwrap();
        assert_eq!(gav.group(), "org.example");
        assert_eq!(gav.artifact(), "base");
        assert_eq!(gav.version(), Some("1.0.0"));
        assert_eq!(gav.to_string(), "org.example:base:1.0.0");
    }

    #[test]
    fn test_parse_unversioned() {
        let gav: Gav = "org.example:base".parse().unwrap();
        assert_eq!(gav.version(), None);
        assert_eq!(gav.to_string(), "org.example:base");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("org.example".parse::<Gav>().is_err());
        assert!("org.example::1.0".parse::<Gav>().is_err());
        assert!("a:b:c:d".parse::<Gav>().is_err());
    }

    #[test]
    fn test_ordering_follows_string_form() {
        let a = Gav::new("org.a", "x", "1.0");
        let b = Gav::new("org.b", "x", "0.1");
        assert!(a < b);
        assert!(Gav::new("org.a", "x", "1.0") < Gav::new("org.a", "x", "1.1"));
    }

    #[test]
    fn test_ga_ignores_version() {
        let one = Gav::new("org.a", "x", "1.0");
        let two = Gav::new("org.a", "x", "2.0");
        assert_eq!(one.ga(), two.ga());
        assert_eq!(one.ga().to_string(), "org.a:x");
    }
}
