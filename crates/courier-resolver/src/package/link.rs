use serde::{Deserialize, Serialize};
use std::fmt;

use courier_semver::{Constraint, Version};

use crate::error::{ResolverError, Result};

/// Type of package link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Regular require dependency
    #[serde(rename = "requires")]
    Require,
    /// Development dependency
    #[serde(rename = "devRequires")]
    DevRequire,
    /// Package provides this virtual package
    #[serde(rename = "provides")]
    Provide,
    /// Conflicts with this package
    #[serde(rename = "conflicts")]
    Conflict,
    /// Replaces this package
    #[serde(rename = "replaces")]
    Replace,
}

impl LinkType {
    /// Returns a human-readable description of the link type
    pub fn description(&self) -> &'static str {
        match self {
            LinkType::Require => "requires",
            LinkType::DevRequire => "requires (for development)",
            LinkType::Provide => "provides",
            LinkType::Conflict => "conflicts",
            LinkType::Replace => "replaces",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A link from a source package to a target name under a version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Source package name (lowercase)
    pub source: String,
    /// Target package name (lowercase)
    pub target: String,
    /// Parsed constraint
    pub constraint: Constraint,
    /// Constraint as written, for display
    pub pretty_constraint: String,
    pub link_type: LinkType,
}

impl Link {
    /// Creates a new link, parsing the constraint text
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        constraint: &str,
        link_type: LinkType,
    ) -> Result<Self> {
        let pretty_constraint = constraint.trim().to_string();
        let parsed = Constraint::parse(&pretty_constraint)
            .map_err(|e| ResolverError::constraint(&pretty_constraint, e))?;

        Ok(Self::with_constraint(source, target, parsed, pretty_constraint, link_type))
    }

    /// Creates a link from an already parsed constraint
    pub fn with_constraint(
        source: impl Into<String>,
        target: impl Into<String>,
        constraint: Constraint,
        pretty_constraint: impl Into<String>,
        link_type: LinkType,
    ) -> Self {
        Self {
            source: source.into().to_lowercase(),
            target: target.into().to_lowercase(),
            constraint,
            pretty_constraint: pretty_constraint.into(),
            link_type,
        }
    }

    /// Whether a version of the target satisfies this link
    pub fn matches(&self, version: &Version) -> bool {
        self.constraint.matches(version)
    }

    /// Returns a human-readable description of this link
    pub fn description(&self) -> String {
        format!(
            "{} {} {} ({})",
            self.source,
            self.link_type.description(),
            self.target,
            self.pretty_constraint
        )
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_creation() {
        let link = Link::new("My/Package", "Vendor/Library", "^1.0", LinkType::Require).unwrap();

        assert_eq!(link.source, "my/package");
        assert_eq!(link.target, "vendor/library");
        assert_eq!(link.pretty_constraint, "^1.0");
        assert_eq!(link.constraint.to_string(), "[>= 1.0.0.0-dev < 2.0.0.0-dev]");
        assert_eq!(link.link_type, LinkType::Require);
    }

    #[test]
    fn test_link_matches() {
        let link = Link::new("a", "b", ">=1.5", LinkType::Require).unwrap();

        assert!(link.matches(&Version::parse("2.0").unwrap()));
        assert!(!link.matches(&Version::parse("1.0").unwrap()));
    }

    #[test]
    fn test_link_display() {
        let link = Link::new("my/package", "vendor/library", "^1.0", LinkType::Require).unwrap();

        assert_eq!(link.to_string(), "my/package requires vendor/library (^1.0)");
    }

    #[test]
    fn test_link_invalid_constraint() {
        let err = Link::new("a", "b", "~>1.0", LinkType::Require).unwrap_err();

        assert!(matches!(err, ResolverError::InvalidConstraintFormat { .. }));
    }

    #[test]
    fn test_link_type_description() {
        assert_eq!(LinkType::Require.description(), "requires");
        assert_eq!(LinkType::DevRequire.description(), "requires (for development)");
        assert_eq!(LinkType::Conflict.to_string(), "conflicts");
    }
}
