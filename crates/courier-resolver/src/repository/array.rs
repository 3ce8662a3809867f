use std::sync::Arc;

use super::traits::Repository;
use crate::error::Result;
use crate::package::{Package, PackageData};

/// In-memory catalog of installable packages
#[derive(Debug, Default)]
pub struct ArrayRepository {
    name: String,
    packages: Vec<Arc<Package>>,
}

impl ArrayRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
        }
    }

    /// Build a repository from a JSON array of catalog entries
    pub fn from_json(name: impl Into<String>, content: &str) -> Result<Self> {
        let entries: Vec<PackageData> = serde_json::from_str(content)?;
        Self::from_entries(name, entries)
    }

    /// Build a repository from already deserialized catalog entries
    pub fn from_entries(name: impl Into<String>, entries: Vec<PackageData>) -> Result<Self> {
        let mut repo = Self::new(name);
        for entry in entries {
            repo.add_package(entry.into_package()?);
        }
        log::debug!("Loaded {} packages into repository {}", repo.packages.len(), repo.name);
        Ok(repo)
    }

    pub fn add_package(&mut self, package: Package) {
        self.packages.push(Arc::new(package));
    }
}

impl Repository for ArrayRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn packages(&self) -> Vec<Arc<Package>> {
        self.packages.clone()
    }

    fn count(&self) -> usize {
        self.packages.len()
    }
}
