//! Capability expressions
//!
//! A capability is a dot-separated sequence of segments. A segment is either a
//! literal or a `$param` reference that is substituted with a feature's
//! parameter value when the capability is resolved.

use crate::SpecError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One segment of a capability expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityElement {
    Static(String),
    Param(String),
}

/// Parsed capability expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CapabilityDef", into = "CapabilityDef")]
pub struct CapabilitySpec {
    elements: Vec<CapabilityElement>,
    optional: bool,
}

impl CapabilitySpec {
    /// Parse a required capability expression
    pub fn parse(expr: &str) -> crate::Result<Self> {
        Self::parse_with(expr, false)
    }

    /// Parse an optional capability expression
    pub fn optional(expr: &str) -> crate::Result<Self> {
        Self::parse_with(expr, true)
    }

    pub fn parse_with(expr: &str, optional: bool) -> crate::Result<Self> {
        let invalid = |reason: &str| SpecError::InvalidCapability {
            input: expr.to_string(),
            reason: reason.to_string(),
        };

        if expr.trim().is_empty() {
            return Err(invalid("empty capability"));
        }

        let mut elements = Vec::new();
        for segment in expr.split('.') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            match segment.strip_prefix('$') {
                Some(param) if param.is_empty() => return Err(invalid("empty parameter name")),
                Some(param) => elements.push(CapabilityElement::Param(param.to_string())),
                None => elements.push(CapabilityElement::Static(segment.to_string())),
            }
        }

        Ok(Self { elements, optional })
    }

    pub fn elements(&self) -> &[CapabilityElement] {
        &self.elements
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// True when every segment is a literal
    pub fn is_static(&self) -> bool {
        self.elements
            .iter()
            .all(|e| matches!(e, CapabilityElement::Static(_)))
    }

    /// Names of the parameters referenced by this expression
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            CapabilityElement::Param(name) => Some(name.as_str()),
            CapabilityElement::Static(_) => None,
        })
    }
}

impl fmt::Display for CapabilitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match element {
                CapabilityElement::Static(s) => f.write_str(s)?,
                CapabilityElement::Param(p) => write!(f, "${}", p)?,
            }
        }
        Ok(())
    }
}

/// Descriptor form: a plain string or `{ name = "...", optional = true }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CapabilityDef {
    Plain(String),
    Detailed {
        name: String,
        #[serde(default)]
        optional: bool,
    },
}

impl TryFrom<CapabilityDef> for CapabilitySpec {
    type Error = SpecError;

    fn try_from(def: CapabilityDef) -> Result<Self, Self::Error> {
        match def {
            CapabilityDef::Plain(expr) => Self::parse(&expr),
            CapabilityDef::Detailed { name, optional } => Self::parse_with(&name, optional),
        }
    }
}

impl From<CapabilitySpec> for CapabilityDef {
    fn from(spec: CapabilitySpec) -> Self {
        if spec.optional {
            CapabilityDef::Detailed {
                name: spec.to_string(),
                optional: true,
            }
        } else {
            CapabilityDef::Plain(spec.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static() {
        let cap = CapabilitySpec::parse("org.example.logging").unwrap();
        assert!(cap.is_static());
        assert!(!cap.is_optional());
        assert_eq!(cap.elements().len(), 3);
        assert_eq!(cap.to_string(), "org.example.logging");
    }

    #[test]
    fn test_parse_parametric() {
        let cap = CapabilitySpec::optional("driver.$type").unwrap();
        assert!(!cap.is_static());
        assert!(cap.is_optional());
        assert_eq!(cap.params().collect::<Vec<_>>(), vec!["type"]);
        assert_eq!(cap.to_string(), "driver.$type");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(CapabilitySpec::parse("").is_err());
        assert!(CapabilitySpec::parse("a..b").is_err());
        assert!(CapabilitySpec::parse("a.$").is_err());
    }
}
