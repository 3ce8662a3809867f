use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use courier_semver::{Constraint, Stability, Version};

use crate::package::Package;
use crate::repository::Repository;

/// Identifier of a package inside one pool (1-based).
pub type PackageId = i32;

/// Signed package id: positive means "installed", negative "not installed".
pub type Literal = i32;

/// Pool of all candidate packages for one resolution.
///
/// Repositories are copied into the pool in priority order (first added wins
/// ties). Every distinct (name, version) pair gets an id that the solver uses
/// as a SAT variable. Ids are only meaningful for this pool instance.
pub struct Pool {
    /// Packages indexed by `id - 1`
    packages: Vec<Arc<Package>>,

    /// Repository index of each package (same indexing as `packages`)
    package_repos: Vec<usize>,

    /// Repository names in the order they were added
    repositories: Vec<String>,

    /// Whether each repository describes installed packages
    repository_installed: Vec<bool>,

    /// Package ids indexed by own name
    packages_by_name: HashMap<String, Vec<PackageId>>,

    /// Package ids indexed by provided or replaced name
    providers: HashMap<String, Vec<PackageId>>,

    /// Normalized (name, version) pairs already in the pool
    seen: HashSet<(String, String)>,

    minimum_stability: Stability,

    /// Per-package stability overrides (package name -> stability)
    stability_flags: HashMap<String, Stability>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("packages", &self.packages.len())
            .field("repositories", &self.repositories)
            .field("minimum_stability", &self.minimum_stability)
            .field("stability_flags", &self.stability_flags)
            .finish()
    }
}

impl Pool {
    pub fn new<I>(minimum_stability: Stability, stability_flags: I) -> Self
    where
        I: IntoIterator<Item = (String, Stability)>,
    {
        Self {
            packages: Vec::new(),
            package_repos: Vec::new(),
            repositories: Vec::new(),
            repository_installed: Vec::new(),
            packages_by_name: HashMap::new(),
            providers: HashMap::new(),
            seen: HashSet::new(),
            minimum_stability,
            stability_flags: stability_flags
                .into_iter()
                .map(|(name, stability)| (name.to_lowercase(), stability))
                .collect(),
        }
    }

    /// Copy every package of `repository` into the pool.
    ///
    /// Returns the number of packages that received a new id; a (name,
    /// version) pair already contributed by an earlier repository is skipped.
    pub fn add_repository(&mut self, repository: &dyn Repository) -> usize {
        let repo_index = self.repositories.len();
        self.repositories.push(repository.name().to_string());
        self.repository_installed.push(repository.is_installed());

        let mut added = 0;
        for package in repository.packages() {
            let key = (package.name().to_string(), package.version().normalized().to_string());
            if !self.seen.insert(key) {
                log::trace!(
                    "Skipping {} from {}, already provided by a higher priority repository",
                    package.pretty_string(),
                    repository.name()
                );
                continue;
            }
            self.add_package(package, repo_index);
            added += 1;
        }

        log::debug!("Added {} packages from repository {}", added, repository.name());
        added
    }

    fn add_package(&mut self, package: Arc<Package>, repo_index: usize) -> PackageId {
        let id = (self.packages.len() + 1) as PackageId;

        self.packages_by_name
            .entry(package.name().to_string())
            .or_default()
            .push(id);

        for name in package.replaces().keys().chain(package.provides().keys()) {
            let ids = self.providers.entry(name.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        self.packages.push(package);
        self.package_repos.push(repo_index);
        id
    }

    /// Ids of every package answering to `name` whose version matches
    /// `constraint`, own-name packages first.
    ///
    /// Providers and replacers match when their link constraint intersects
    /// `constraint`. Unless `include_unacceptable` is set, packages below the
    /// configured stability are left out; installed packages never are.
    pub fn what_provides(
        &self,
        name: &str,
        constraint: Option<&Constraint>,
        include_unacceptable: bool,
    ) -> Vec<PackageId> {
        let name = name.to_lowercase();
        let mut result = Vec::new();

        if let Some(ids) = self.packages_by_name.get(&name) {
            for &id in ids {
                let package = &self.packages[(id - 1) as usize];
                let matches = constraint.map_or(true, |c| c.matches(package.version()));
                if matches && (include_unacceptable || self.is_acceptable_id(id)) {
                    result.push(id);
                }
            }
        }

        if let Some(ids) = self.providers.get(&name) {
            for &id in ids {
                let package = &self.packages[(id - 1) as usize];
                let link = package
                    .replaces()
                    .get(&name)
                    .or_else(|| package.provides().get(&name));
                let matches = match (link, constraint) {
                    (Some(_), None) => true,
                    (Some(link), Some(c)) => link.constraint.intersects(c),
                    (None, _) => false,
                };
                if matches && !result.contains(&id) && (include_unacceptable || self.is_acceptable_id(id)) {
                    result.push(id);
                }
            }
        }

        result
    }

    /// Same as [`Pool::what_provides`], returning the packages themselves
    pub fn packages_providing(
        &self,
        name: &str,
        constraint: Option<&Constraint>,
        include_unacceptable: bool,
    ) -> Vec<Arc<Package>> {
        self.what_provides(name, constraint, include_unacceptable)
            .into_iter()
            .filter_map(|id| self.package(id).cloned())
            .collect()
    }

    /// Whether a package with these names and this stability may be installed.
    ///
    /// A per-package stability flag on any of the names takes precedence over
    /// the minimum stability.
    pub fn is_package_acceptable(&self, names: &[&str], stability: Stability) -> bool {
        for name in names {
            match self.stability_flags.get(&name.to_lowercase()) {
                Some(flag) => {
                    if stability >= *flag {
                        return true;
                    }
                }
                None => {
                    if stability >= self.minimum_stability {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn is_acceptable_id(&self, id: PackageId) -> bool {
        if self.is_installed(id) {
            return true;
        }
        let package = &self.packages[(id - 1) as usize];
        self.is_package_acceptable(&package.names(), package.stability())
    }

    pub fn package(&self, id: PackageId) -> Option<&Arc<Package>> {
        if id < 1 {
            return None;
        }
        self.packages.get((id - 1) as usize)
    }

    /// Ids of every version named `name`, regardless of stability
    pub fn packages_by_name(&self, name: &str) -> Vec<PackageId> {
        self.packages_by_name
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Id of the package with exactly this name and version
    pub fn find(&self, name: &str, version: &Version) -> Option<PackageId> {
        self.packages_by_name
            .get(&name.to_lowercase())?
            .iter()
            .copied()
            .find(|&id| self.packages[(id - 1) as usize].version().normalized() == version.normalized())
    }

    /// Whether the package came from a repository of installed packages
    pub fn is_installed(&self, id: PackageId) -> bool {
        self.repo_index(id)
            .map_or(false, |index| self.repository_installed[index])
    }

    /// Repository priority of a package; lower is preferred
    pub fn priority(&self, id: PackageId) -> i32 {
        self.repo_index(id).map_or(i32::MAX, |index| index as i32)
    }

    pub fn repository_name(&self, id: PackageId) -> Option<&str> {
        self.repo_index(id).map(|index| self.repositories[index].as_str())
    }

    fn repo_index(&self, id: PackageId) -> Option<usize> {
        if id < 1 {
            return None;
        }
        self.package_repos.get((id - 1) as usize).copied()
    }

    pub fn minimum_stability(&self) -> Stability {
        self.minimum_stability
    }

    /// Number of packages in the pool
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterate over all package ids
    pub fn all_package_ids(&self) -> impl Iterator<Item = PackageId> {
        1..=(self.packages.len() as PackageId)
    }

    /// Get the package ID from a literal
    pub fn literal_to_id(literal: Literal) -> PackageId {
        literal.abs()
    }

    /// Check if a literal is positive (install)
    pub fn literal_is_positive(literal: Literal) -> bool {
        literal > 0
    }

    /// Create a literal from package ID and install flag
    pub fn id_to_literal(id: PackageId, install: bool) -> Literal {
        if install {
            id
        } else {
            -id
        }
    }

    /// "name version" of the package behind a literal
    pub fn literal_to_pretty_string(&self, literal: Literal) -> String {
        self.package(Self::literal_to_id(literal))
            .map(|p| p.pretty_string())
            .unwrap_or_else(|| format!("#{}", Self::literal_to_id(literal)))
    }
}
