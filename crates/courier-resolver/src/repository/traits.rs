use std::sync::Arc;

use courier_semver::Version;

use crate::package::Package;

/// Repository interface - read-only package source.
///
/// Repositories are populated before they are handed to a pool, so every
/// query is synchronous.
pub trait Repository: Send + Sync {
    /// Get a unique name for this repository
    fn name(&self) -> &str;

    /// Get all packages in the repository
    fn packages(&self) -> Vec<Arc<Package>>;

    /// Find all versions of a package by name
    fn find_packages(&self, name: &str) -> Vec<Arc<Package>> {
        let name = name.to_lowercase();
        self.packages()
            .into_iter()
            .filter(|p| p.name() == name)
            .collect()
    }

    /// Find a specific package version
    fn find_package(&self, name: &str, version: &str) -> Option<Arc<Package>> {
        let version = Version::parse(version).ok()?;
        self.find_packages(name)
            .into_iter()
            .find(|p| p.version().normalized() == version.normalized())
    }

    /// Packages answering to `name` through their own name, a replace or a provide
    fn what_provides(&self, name: &str) -> Vec<Arc<Package>> {
        let name = name.to_lowercase();
        self.packages()
            .into_iter()
            .filter(|p| p.names().contains(&name.as_str()))
            .collect()
    }

    /// Check whether this exact package (name and version) is present
    fn has_package(&self, package: &Package) -> bool {
        self.packages().iter().any(|p| p.as_ref() == package)
    }

    /// Get the number of packages in the repository
    fn count(&self) -> usize {
        self.packages().len()
    }

    /// Whether this repository describes what is already present on the host.
    ///
    /// Packages from such repositories are never filtered by stability.
    fn is_installed(&self) -> bool {
        false
    }
}
