use indexmap::IndexMap;
use std::fmt;

use courier_semver::{Stability, Version};

use super::{Link, LinkType};
use crate::error::{ResolverError, Result};

/// Package type used when nothing else is declared
pub const DEFAULT_TYPE: &str = "library";

/// Package type of synthetic platform packages (`php`, `ext-*`, ...)
pub const PLATFORM_TYPE: &str = "platform";

/// A resolvable package: a name at one version plus its links.
///
/// Packages are assembled through the consuming `with_*` builders and are
/// never mutated afterwards; the solver shares them behind `Arc`.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    pretty_name: String,
    version: Version,
    stability: Option<Stability>,
    package_type: String,
    description: Option<String>,
    license: Vec<String>,
    requires: IndexMap<String, Link>,
    dev_requires: IndexMap<String, Link>,
    conflicts: IndexMap<String, Link>,
    provides: IndexMap<String, Link>,
    replaces: IndexMap<String, Link>,
}

impl Package {
    /// Create a package with no links
    pub fn new(name: impl Into<String>, version: &str) -> Result<Self> {
        let pretty_name = name.into();
        let version = Version::parse(version).map_err(|e| ResolverError::version(version, e))?;

        Ok(Self {
            name: pretty_name.to_lowercase(),
            pretty_name,
            version,
            stability: None,
            package_type: DEFAULT_TYPE.to_string(),
            description: None,
            license: Vec::new(),
            requires: IndexMap::new(),
            dev_requires: IndexMap::new(),
            conflicts: IndexMap::new(),
            provides: IndexMap::new(),
            replaces: IndexMap::new(),
        })
    }

    pub fn with_require(mut self, target: &str, constraint: &str) -> Result<Self> {
        let link = self.link(target, constraint, LinkType::Require)?;
        self.requires.insert(link.target.clone(), link);
        Ok(self)
    }

    pub fn with_dev_require(mut self, target: &str, constraint: &str) -> Result<Self> {
        let link = self.link(target, constraint, LinkType::DevRequire)?;
        self.dev_requires.insert(link.target.clone(), link);
        Ok(self)
    }

    pub fn with_conflict(mut self, target: &str, constraint: &str) -> Result<Self> {
        let link = self.link(target, constraint, LinkType::Conflict)?;
        self.conflicts.insert(link.target.clone(), link);
        Ok(self)
    }

    pub fn with_provide(mut self, target: &str, constraint: &str) -> Result<Self> {
        let link = self.link(target, constraint, LinkType::Provide)?;
        self.provides.insert(link.target.clone(), link);
        Ok(self)
    }

    pub fn with_replace(mut self, target: &str, constraint: &str) -> Result<Self> {
        let link = self.link(target, constraint, LinkType::Replace)?;
        self.replaces.insert(link.target.clone(), link);
        Ok(self)
    }

    /// Add an already built requirement link
    pub(crate) fn with_require_link(mut self, link: Link) -> Self {
        self.requires.insert(link.target.clone(), link);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_license(mut self, license: Vec<String>) -> Self {
        self.license = license;
        self
    }

    pub fn with_type(mut self, package_type: impl Into<String>) -> Self {
        self.package_type = package_type.into();
        self
    }

    pub fn with_pretty_name(mut self, pretty_name: impl Into<String>) -> Self {
        self.pretty_name = pretty_name.into();
        self
    }

    /// Override the stability derived from the version
    pub fn with_stability(mut self, stability: Stability) -> Self {
        self.stability = Some(stability);
        self
    }

    fn link(&self, target: &str, constraint: &str, link_type: LinkType) -> Result<Link> {
        // "self.version" pins the target to this package's own version
        if constraint.trim() == "self.version" {
            let pinned = format!("={}", self.version.pretty());
            return Link::new(&self.name, target, &pinned, link_type);
        }
        Link::new(&self.name, target, constraint, link_type)
    }

    /// Returns the package name (lowercase)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the package name as it was declared
    pub fn pretty_name(&self) -> &str {
        &self.pretty_name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn pretty_version(&self) -> &str {
        self.version.pretty()
    }

    pub fn stability(&self) -> Stability {
        self.stability.unwrap_or_else(|| self.version.stability())
    }

    pub fn package_type(&self) -> &str {
        &self.package_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn license(&self) -> &[String] {
        &self.license
    }

    pub fn requires(&self) -> &IndexMap<String, Link> {
        &self.requires
    }

    pub fn dev_requires(&self) -> &IndexMap<String, Link> {
        &self.dev_requires
    }

    pub fn conflicts(&self) -> &IndexMap<String, Link> {
        &self.conflicts
    }

    pub fn provides(&self) -> &IndexMap<String, Link> {
        &self.provides
    }

    pub fn replaces(&self) -> &IndexMap<String, Link> {
        &self.replaces
    }

    pub fn is_platform(&self) -> bool {
        self.package_type == PLATFORM_TYPE
    }

    /// All names this package answers to: its own, then replaced and provided names
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        for target in self.replaces.keys().chain(self.provides.keys()) {
            if !names.contains(&target.as_str()) {
                names.push(target);
            }
        }
        names
    }

    /// Names that only one package may occupy at a time (own name and replaced names)
    pub(crate) fn exclusive_names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        for target in self.replaces.keys() {
            if !names.contains(&target.as_str()) {
                names.push(target);
            }
        }
        names
    }

    /// Returns a unique identifier for this package version
    pub fn unique_name(&self) -> String {
        format!("{}-{}", self.name, self.version.normalized())
    }

    /// Returns a pretty string representation
    pub fn pretty_string(&self) -> String {
        format!("{} {}", self.pretty_name, self.version.pretty())
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version.normalized() == other.version.normalized()
    }
}

impl Eq for Package {}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_new() {
        let pkg = Package::new("Vendor/Package", "v1.2.3").unwrap();

        assert_eq!(pkg.name(), "vendor/package");
        assert_eq!(pkg.pretty_name(), "Vendor/Package");
        assert_eq!(pkg.version().normalized(), "1.2.3.0");
        assert_eq!(pkg.pretty_version(), "v1.2.3");
        assert_eq!(pkg.package_type(), DEFAULT_TYPE);
        assert_eq!(pkg.stability(), Stability::Stable);
    }

    #[test]
    fn test_package_invalid_version() {
        let err = Package::new("vendor/package", "not-a-version").unwrap_err();
        assert!(matches!(err, ResolverError::InvalidVersionFormat { .. }));
    }

    #[test]
    fn test_package_stability() {
        let pkg = Package::new("a/b", "2.0.0-beta1").unwrap();
        assert_eq!(pkg.stability(), Stability::Beta);

        let pinned = Package::new("a/b", "0.0-dev").unwrap().with_stability(Stability::Stable);
        assert_eq!(pinned.stability(), Stability::Stable);
    }

    #[test]
    fn test_package_links() {
        let pkg = Package::new("vendor/app", "1.0.0")
            .unwrap()
            .with_require("Vendor/Lib", "^2.0")
            .unwrap()
            .with_dev_require("vendor/test-tools", "*")
            .unwrap()
            .with_conflict("vendor/legacy", "<1.0")
            .unwrap();

        let require = pkg.requires().get("vendor/lib").unwrap();
        assert_eq!(require.source, "vendor/app");
        assert_eq!(require.pretty_constraint, "^2.0");
        assert_eq!(require.link_type, LinkType::Require);
        assert_eq!(pkg.dev_requires().len(), 1);
        assert_eq!(pkg.conflicts().get("vendor/legacy").unwrap().link_type, LinkType::Conflict);
    }

    #[test]
    fn test_self_version_replaced() {
        let pkg = Package::new("vendor/suite", "3.1.0")
            .unwrap()
            .with_replace("vendor/component", "self.version")
            .unwrap();

        let link = pkg.replaces().get("vendor/component").unwrap();
        assert_eq!(link.pretty_constraint, "=3.1.0");
        assert!(link.matches(&Version::parse("3.1.0").unwrap()));
        assert!(!link.matches(&Version::parse("3.0.0").unwrap()));
    }

    #[test]
    fn test_package_names() {
        let pkg = Package::new("vendor/impl", "1.0.0")
            .unwrap()
            .with_replace("vendor/old", "*")
            .unwrap()
            .with_provide("psr/log-implementation", "1.0")
            .unwrap();

        assert_eq!(pkg.names(), vec!["vendor/impl", "vendor/old", "psr/log-implementation"]);
        assert_eq!(pkg.exclusive_names(), vec!["vendor/impl", "vendor/old"]);
    }

    #[test]
    fn test_pretty_and_unique_name() {
        let pkg = Package::new("Vendor/Package", "1.0").unwrap();

        assert_eq!(pkg.pretty_string(), "Vendor/Package 1.0");
        assert_eq!(pkg.unique_name(), "vendor/package-1.0.0.0");
        assert_eq!(pkg.to_string(), "Vendor/Package 1.0");
    }

    #[test]
    fn test_package_identity() {
        let a = Package::new("a/b", "1.0").unwrap();
        let b = Package::new("A/B", "1.0.0.0").unwrap().with_description("same package");
        let c = Package::new("a/b", "1.1").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
