use std::sync::{Arc, Weak};

use super::traits::Repository;
use crate::package::Package;

/// Read-only overlay over other repositories.
///
/// The composite owns nothing: it holds weak references, so a member dropped
/// by its owner silently disappears from every query.
pub struct CompositeRepository {
    name: String,
    repositories: Vec<Weak<dyn Repository>>,
}

impl CompositeRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repositories: Vec::new(),
        }
    }

    pub fn add_repository(&mut self, repository: &Arc<dyn Repository>) {
        self.repositories.push(Arc::downgrade(repository));
    }

    pub fn with_repository(mut self, repository: &Arc<dyn Repository>) -> Self {
        self.add_repository(repository);
        self
    }

    /// Members that are still alive, in insertion order
    pub fn repositories(&self) -> Vec<Arc<dyn Repository>> {
        self.repositories.iter().filter_map(Weak::upgrade).collect()
    }
}

impl std::fmt::Debug for CompositeRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .repositories()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        f.debug_struct("CompositeRepository")
            .field("name", &self.name)
            .field("repositories", &names)
            .finish()
    }
}

impl Repository for CompositeRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn packages(&self) -> Vec<Arc<Package>> {
        self.repositories()
            .iter()
            .flat_map(|r| r.packages())
            .collect()
    }

    fn find_packages(&self, name: &str) -> Vec<Arc<Package>> {
        self.repositories()
            .iter()
            .flat_map(|r| r.find_packages(name))
            .collect()
    }

    fn what_provides(&self, name: &str) -> Vec<Arc<Package>> {
        self.repositories()
            .iter()
            .flat_map(|r| r.what_provides(name))
            .collect()
    }

    fn count(&self) -> usize {
        self.repositories().iter().map(|r| r.count()).sum()
    }

    /// Installed only when every live member is
    fn is_installed(&self) -> bool {
        let members = self.repositories();
        !members.is_empty() && members.iter().all(|r| r.is_installed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ArrayRepository, InstalledRepository, PlatformRepository};

    fn installed(name: &str, version: &str) -> Arc<dyn Repository> {
        let mut repo = InstalledRepository::new("installed");
        repo.add_package(Package::new(name, version).unwrap());
        Arc::new(repo)
    }

    #[test]
    fn test_overlay_queries() {
        let local = installed("vendor/a", "1.0");
        let platform: Arc<dyn Repository> = Arc::new(PlatformRepository::new());

        let composite = CompositeRepository::new("local")
            .with_repository(&local)
            .with_repository(&platform);

        assert_eq!(composite.count(), 1 + platform.count());
        assert_eq!(composite.find_packages("vendor/a").len(), 1);
        assert_eq!(composite.what_provides("php").len(), 1);
        assert!(composite.is_installed());
    }

    #[test]
    fn test_dropped_member_disappears() {
        let local = installed("vendor/a", "1.0");
        let composite = CompositeRepository::new("local").with_repository(&local);
        assert_eq!(composite.count(), 1);

        drop(local);
        assert_eq!(composite.count(), 0);
        assert!(composite.repositories().is_empty());
        assert!(!composite.is_installed());
    }

    #[test]
    fn test_mixed_members_not_installed() {
        let local = installed("vendor/a", "1.0");
        let catalog: Arc<dyn Repository> = Arc::new(ArrayRepository::new("catalog"));
        let composite = CompositeRepository::new("mixed")
            .with_repository(&local)
            .with_repository(&catalog);

        assert!(!composite.is_installed());
    }
}
