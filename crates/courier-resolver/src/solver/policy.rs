use std::cmp::Ordering;
use std::collections::HashMap;

use courier_semver::Version;

use super::pool::{PackageId, Pool};
use super::request::Request;
use crate::package::Package;

/// Policy for selecting between candidate packages.
///
/// When multiple packages can satisfy a requirement, the policy
/// determines which one to try first.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Prefer stable versions over more recent unstable ones
    pub prefer_stable: bool,
    /// Prefer lowest versions
    pub prefer_lowest: bool,
    /// Installed version per package name
    installed: HashMap<String, Version>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    pub fn new() -> Self {
        Self {
            prefer_stable: true,
            prefer_lowest: false,
            installed: HashMap::new(),
        }
    }

    pub fn prefer_stable(mut self, prefer: bool) -> Self {
        self.prefer_stable = prefer;
        self
    }

    pub fn prefer_lowest(mut self, prefer: bool) -> Self {
        self.prefer_lowest = prefer;
        self
    }

    /// Prefer the currently installed version of this package's name
    pub fn with_installed(mut self, package: &Package) -> Self {
        self.installed
            .insert(package.name().to_string(), package.version().clone());
        self
    }

    /// Order candidates for `required_name`, best first.
    ///
    /// 1. Packages named `required_name` before providers and replacers
    /// 2. The installed version, unless the request updates that name
    /// 3. Higher stability, when prefer-stable is on
    /// 4. Between names: repository priority, then pool id of the name's first candidate
    /// 5. Within a name: higher version (lower with prefer-lowest), repository priority, pool id
    pub fn select_preferred(
        &self,
        pool: &Pool,
        request: &Request,
        required_name: &str,
        candidates: &[PackageId],
    ) -> Vec<PackageId> {
        let required_name = required_name.to_lowercase();
        let mut sorted: Vec<PackageId> = Vec::with_capacity(candidates.len());
        for &id in candidates {
            if pool.package(id).is_some() && !sorted.contains(&id) {
                sorted.push(id);
            }
        }

        // (best priority, lowest id) per name keeps the order total across names
        let mut groups: HashMap<&str, (i32, PackageId)> = HashMap::new();
        for &id in &sorted {
            if let Some(package) = pool.package(id) {
                let entry = groups.entry(package.name()).or_insert((i32::MAX, PackageId::MAX));
                entry.0 = entry.0.min(pool.priority(id));
                entry.1 = entry.1.min(id);
            }
        }

        sorted.sort_by(|&a, &b| self.compare(pool, request, &required_name, &groups, a, b));
        sorted
    }

    fn compare(
        &self,
        pool: &Pool,
        request: &Request,
        required_name: &str,
        groups: &HashMap<&str, (i32, PackageId)>,
        a: PackageId,
        b: PackageId,
    ) -> Ordering {
        let (pa, pb) = match (pool.package(a), pool.package(b)) {
            (Some(pa), Some(pb)) => (pa, pb),
            _ => return a.cmp(&b),
        };

        let own_a = pa.name() == required_name;
        let own_b = pb.name() == required_name;
        if own_a != own_b {
            return own_b.cmp(&own_a);
        }

        let installed_a = self.is_preferred_installed(request, pa);
        let installed_b = self.is_preferred_installed(request, pb);
        if installed_a != installed_b {
            return installed_b.cmp(&installed_a);
        }

        if self.prefer_stable {
            let stability = pb.stability().cmp(&pa.stability());
            if stability != Ordering::Equal {
                return stability;
            }
        }

        if pa.name() != pb.name() {
            return groups.get(pa.name()).cmp(&groups.get(pb.name()));
        }

        let version = if self.prefer_lowest {
            pa.version().cmp(pb.version())
        } else {
            pb.version().cmp(pa.version())
        };

        version
            .then_with(|| pool.priority(a).cmp(&pool.priority(b)))
            .then_with(|| a.cmp(&b))
    }

    fn is_preferred_installed(&self, request: &Request, package: &Package) -> bool {
        if request.is_update(package.name()) {
            return false;
        }
        self.installed
            .get(package.name())
            .map_or(false, |version| version.normalized() == package.version().normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ArrayRepository;
    use courier_semver::Stability;

    fn pool_with(packages: Vec<Package>) -> Pool {
        let mut repo = ArrayRepository::new("catalog");
        for package in packages {
            repo.add_package(package);
        }
        let mut pool = Pool::new(Stability::Dev, Vec::new());
        pool.add_repository(&repo);
        pool
    }

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(name, version).unwrap()
    }

    #[test]
    fn test_highest_version_first() {
        let pool = pool_with(vec![pkg("a/a", "1.0"), pkg("a/a", "2.0"), pkg("a/a", "1.5")]);
        let policy = Policy::new();

        let sorted = policy.select_preferred(&pool, &Request::new(), "a/a", &[1, 2, 3]);
        assert_eq!(sorted, vec![2, 3, 1]);
    }

    #[test]
    fn test_prefer_lowest() {
        let pool = pool_with(vec![pkg("a/a", "1.0"), pkg("a/a", "2.0")]);
        let policy = Policy::new().prefer_lowest(true);

        assert_eq!(policy.select_preferred(&pool, &Request::new(), "a/a", &[2, 1]), vec![1, 2]);
    }

    #[test]
    fn test_prefer_stable() {
        let pool = pool_with(vec![pkg("a/a", "1.0"), pkg("a/a", "2.0-beta1")]);

        let stable = Policy::new();
        assert_eq!(stable.select_preferred(&pool, &Request::new(), "a/a", &[1, 2]), vec![1, 2]);

        let newest = Policy::new().prefer_stable(false);
        assert_eq!(newest.select_preferred(&pool, &Request::new(), "a/a", &[1, 2]), vec![2, 1]);
    }

    #[test]
    fn test_installed_version_preferred() {
        let pool = pool_with(vec![pkg("a/a", "1.0"), pkg("a/a", "2.0")]);
        let policy = Policy::new().with_installed(&pkg("a/a", "1.0"));

        assert_eq!(policy.select_preferred(&pool, &Request::new(), "a/a", &[1, 2]), vec![1, 2]);

        let mut request = Request::new();
        request.update("a/a");
        assert_eq!(policy.select_preferred(&pool, &request, "a/a", &[1, 2]), vec![2, 1]);
    }

    #[test]
    fn test_own_name_before_replacers() {
        let replacer = pkg("b/b", "9.0").with_replace("a/a", "*").unwrap();
        let pool = pool_with(vec![replacer, pkg("a/a", "1.0")]);
        let policy = Policy::new();

        assert_eq!(policy.select_preferred(&pool, &Request::new(), "a/a", &[1, 2]), vec![2, 1]);
    }

    #[test]
    fn test_repository_priority_then_id() {
        let mut first = ArrayRepository::new("first");
        first.add_package(pkg("b/b", "1.0").with_provide("virtual/x", "1.0").unwrap());
        let mut second = ArrayRepository::new("second");
        second.add_package(pkg("a/a", "1.0").with_provide("virtual/x", "1.0").unwrap());
        second.add_package(pkg("c/c", "1.0").with_provide("virtual/x", "1.0").unwrap());

        let mut pool = Pool::new(Stability::Stable, Vec::new());
        pool.add_repository(&first);
        pool.add_repository(&second);

        let sorted = Policy::new().select_preferred(&pool, &Request::new(), "virtual/x", &[3, 2, 1]);
        assert_eq!(sorted, vec![1, 2, 3]);
    }
}
