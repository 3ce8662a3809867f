use indexmap::IndexMap;
use std::sync::Arc;

use super::traits::Repository;
use crate::error::Result;
use crate::package::{InstalledUnit, Package};

/// Repository of packages already present on the host, one version per name
#[derive(Debug)]
pub struct InstalledRepository {
    name: String,
    packages: IndexMap<String, Arc<Package>>,
}

impl InstalledRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: IndexMap::new(),
        }
    }

    /// Adapt the host's discovery records (identifier -> metadata)
    pub fn from_units<I>(name: impl Into<String>, vendor: Option<&str>, units: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, InstalledUnit)>,
    {
        let mut repo = Self::new(name);
        for (id, unit) in units {
            repo.add_package(unit.into_package(&id, vendor)?);
        }
        Ok(repo)
    }

    /// Add a package, replacing any installed version of the same name
    pub fn add_package(&mut self, package: Package) {
        if let Some(previous) = self.packages.get(package.name()) {
            log::debug!("Replacing installed {} with {}", previous.pretty_string(), package.pretty_string());
        }
        self.packages.insert(package.name().to_string(), Arc::new(package));
    }

    /// Remove a package; returns whether it was present
    pub fn remove_package(&mut self, package: &Package) -> bool {
        match self.packages.get(package.name()) {
            Some(existing) if existing.as_ref() == package => {
                self.packages.shift_remove(package.name());
                true
            }
            _ => false,
        }
    }
}

impl Repository for InstalledRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn packages(&self) -> Vec<Arc<Package>> {
        self.packages.values().cloned().collect()
    }

    fn find_packages(&self, name: &str) -> Vec<Arc<Package>> {
        self.packages
            .get(&name.to_lowercase())
            .map(|p| vec![p.clone()])
            .unwrap_or_default()
    }

    fn count(&self) -> usize {
        self.packages.len()
    }

    fn is_installed(&self) -> bool {
        true
    }
}
