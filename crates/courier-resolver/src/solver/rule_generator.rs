use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use super::pool::{PackageId, Pool};
use super::request::Request;
use super::rule::Rule;
use super::rule_set::RuleSet;

/// Generates SAT rules from a request and the pool.
///
/// Rules are added in a fixed order, which is also the order the solver
/// scans them in when branching:
/// - Job rules: fixed packages, root requirements, removals
/// - Package requirements, breadth-first from the jobs and installed packages
/// - Conflict links between reachable packages
/// - Same-name rules: two packages sharing a name (own or replaced) exclude each other
pub struct RuleGenerator<'a> {
    pool: &'a Pool,
    rules: RuleSet,
    queue: VecDeque<PackageId>,
    /// Packages whose rules have been (or are about to be) generated
    added_packages: HashSet<PackageId>,
    /// Reachable package ids in the order they were reached
    added_order: Vec<PackageId>,
    /// Reachable packages grouped by exclusive name
    added_packages_by_name: IndexMap<String, Vec<PackageId>>,
}

impl<'a> RuleGenerator<'a> {
    pub fn new(pool: &'a Pool) -> Self {
        Self {
            pool,
            rules: RuleSet::new(),
            queue: VecDeque::new(),
            added_packages: HashSet::new(),
            added_order: Vec::new(),
            added_packages_by_name: IndexMap::new(),
        }
    }

    /// Generate all rules for a request
    pub fn generate(mut self, request: &Request) -> RuleSet {
        let start = Instant::now();

        self.add_fixed_rules(request);
        self.add_root_require_rules(request);
        self.add_remove_rules(request);

        for id in self.pool.all_package_ids() {
            if self.pool.is_installed(id) {
                self.enqueue(id);
            }
        }

        while let Some(id) = self.queue.pop_front() {
            self.add_package_rules(id);
        }

        self.add_conflict_rules();
        self.add_same_name_rules();

        log::debug!(
            "Generated {} for {} reachable packages in {:?}",
            self.rules.stats(),
            self.added_order.len(),
            start.elapsed()
        );

        self.rules
    }

    fn enqueue(&mut self, id: PackageId) {
        if !self.added_packages.insert(id) {
            return;
        }
        self.added_order.push(id);
        if let Some(package) = self.pool.package(id) {
            for name in package.exclusive_names() {
                self.added_packages_by_name
                    .entry(name.to_string())
                    .or_default()
                    .push(id);
            }
        }
        self.queue.push_back(id);
    }

    /// Fixed packages must stay installed at exactly their version
    fn add_fixed_rules(&mut self, request: &Request) {
        for package in request.fixed_packages() {
            let id = self.pool.find(package.name(), package.version());
            let rule = Rule::fixed(id).with_target(package.pretty_string());
            self.rules.add(rule);

            match id {
                Some(id) => self.enqueue(id),
                None => log::warn!("Fixed package {} is not in the pool", package.pretty_string()),
            }
        }
    }

    /// Each root requirement needs one of its candidates installed
    fn add_root_require_rules(&mut self, request: &Request) {
        for job in request.install_jobs() {
            let candidates = self.pool.what_provides(&job.name, Some(&job.constraint), false);
            if candidates.is_empty() {
                log::warn!("No installable candidate for root requirement {} {}", job.name, job.pretty_constraint);
            }

            let rule = Rule::root_require(candidates.clone())
                .with_target(job.name.clone())
                .with_constraint(job.constraint.clone(), job.pretty_constraint.clone());
            self.rules.add(rule);

            for id in candidates {
                self.enqueue(id);
            }
        }
    }

    /// Every version matching a removal job is forced out
    fn add_remove_rules(&mut self, request: &Request) {
        for job in request.remove_jobs() {
            for id in self.pool.what_provides(&job.name, Some(&job.constraint), true) {
                let own_name = self.pool.package(id).map_or(false, |p| p.name() == job.name);
                if !own_name {
                    continue;
                }
                let rule = Rule::remove(id)
                    .with_target(job.name.clone())
                    .with_constraint(job.constraint.clone(), job.pretty_constraint.clone());
                self.rules.add(rule);
            }
        }
    }

    /// Requirement rules of one package; candidates are queued in turn
    fn add_package_rules(&mut self, id: PackageId) {
        let Some(package) = self.pool.package(id) else {
            return;
        };

        for link in package.requires().values() {
            let candidates = self.pool.what_provides(&link.target, Some(&link.constraint), false);

            // A package that provides what it requires satisfies itself
            if candidates.contains(&id) {
                continue;
            }

            let rule = Rule::requires(id, candidates.clone())
                .with_target(link.target.clone())
                .with_constraint(link.constraint.clone(), link.pretty_constraint.clone());
            self.rules.add(rule);

            for candidate in candidates {
                self.enqueue(candidate);
            }
        }
    }

    fn add_conflict_rules(&mut self) {
        for &id in &self.added_order {
            let Some(package) = self.pool.package(id) else {
                continue;
            };

            for link in package.conflicts().values() {
                for other in self.pool.what_provides(&link.target, Some(&link.constraint), true) {
                    if other == id || !self.added_packages.contains(&other) {
                        continue;
                    }
                    let rule = Rule::conflict(id, other)
                        .with_target(link.target.clone())
                        .with_constraint(link.constraint.clone(), link.pretty_constraint.clone());
                    self.rules.add(rule);
                }
            }
        }
    }

    fn add_same_name_rules(&mut self) {
        for (name, ids) in &self.added_packages_by_name {
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    self.rules.add(Rule::same_name(a, b).with_target(name.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use crate::repository::{ArrayRepository, InstalledRepository};
    use crate::solver::RuleType;
    use courier_semver::Stability;
    use std::sync::Arc;

    fn pool(packages: Vec<Package>) -> Pool {
        let mut repo = ArrayRepository::new("catalog");
        for package in packages {
            repo.add_package(package);
        }
        let mut pool = Pool::new(Stability::Stable, Vec::new());
        pool.add_repository(&repo);
        pool
    }

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(name, version).unwrap()
    }

    #[test]
    fn test_root_require_and_package_rules() {
        let pool = pool(vec![
            pkg("a/a", "1.0").with_require("b/b", "^1.0").unwrap(),
            pkg("b/b", "1.0"),
            pkg("b/b", "1.1"),
            pkg("c/c", "1.0"),
        ]);
        let mut request = Request::new();
        request.install("a/a", "*").unwrap();

        let rules = RuleGenerator::new(&pool).generate(&request);

        let all: Vec<_> = rules.iter().collect();
        assert_eq!(all[0].rule_type(), RuleType::RootRequire);
        assert_eq!(all[0].literals(), &[1]);
        assert_eq!(all[1].rule_type(), RuleType::PackageRequires);
        assert_eq!(all[1].literals(), &[-1, 2, 3]);
        assert_eq!(all[2].rule_type(), RuleType::PackageSameName);
        assert_eq!(all[2].literals(), &[-2, -3]);
        assert_eq!(rules.len(), 3, "unreachable c/c gets no rules");
    }

    #[test]
    fn test_missing_requirement_yields_assertion() {
        let pool = pool(vec![pkg("a/a", "1.0").with_require("missing/pkg", "*").unwrap()]);
        let mut request = Request::new();
        request.install("a/a", "*").unwrap();

        let rules = RuleGenerator::new(&pool).generate(&request);
        let requires: Vec<_> = rules.rules_of_type(RuleType::PackageRequires).collect();
        assert_eq!(requires[0].literals(), &[-1]);
        assert_eq!(requires[0].target_name(), Some("missing/pkg"));
    }

    #[test]
    fn test_unsatisfiable_root_requirement_is_empty_rule() {
        let pool = pool(vec![pkg("a/a", "1.0")]);
        let mut request = Request::new();
        request.install("a/a", ">=2.0").unwrap();

        let rules = RuleGenerator::new(&pool).generate(&request);
        let root = rules.get(0).unwrap();
        assert!(root.is_empty());
        assert_eq!(root.pretty_constraint(), Some(">=2.0"));
    }

    #[test]
    fn test_conflict_rules_only_between_reachable_packages() {
        let pool = pool(vec![
            pkg("x/x", "1.0").with_conflict("y/y", "*").unwrap(),
            pkg("y/y", "1.0"),
        ]);

        let mut only_x = Request::new();
        only_x.install("x/x", "*").unwrap();
        let rules = RuleGenerator::new(&pool).generate(&only_x);
        assert_eq!(rules.count_by_type(RuleType::PackageConflict), 0);

        let mut both = Request::new();
        both.install("x/x", "*").unwrap();
        both.install("y/y", "*").unwrap();
        let rules = RuleGenerator::new(&pool).generate(&both);
        let conflict = rules.rules_of_type(RuleType::PackageConflict).next().unwrap();
        assert_eq!(conflict.literals(), &[-1, -2]);
    }

    #[test]
    fn test_replacers_share_a_name() {
        let pool = pool(vec![
            pkg("a/a", "1.0"),
            pkg("b/b", "1.0").with_replace("a/a", "1.0").unwrap(),
        ]);
        let mut request = Request::new();
        request.install("a/a", "*").unwrap();

        let rules = RuleGenerator::new(&pool).generate(&request);
        assert_eq!(rules.get(0).unwrap().literals(), &[1, 2]);
        let same_name = rules.rules_of_type(RuleType::PackageSameName).next().unwrap();
        assert_eq!(same_name.literals(), &[-1, -2]);
    }

    #[test]
    fn test_fixed_and_installed_packages() {
        let mut installed = InstalledRepository::new("installed");
        installed.add_package(pkg("i/i", "1.0").with_require("d/d", "*").unwrap());
        let mut catalog = ArrayRepository::new("catalog");
        catalog.add_package(pkg("d/d", "1.0"));

        let mut pool = Pool::new(Stability::Stable, Vec::new());
        pool.add_repository(&installed);
        pool.add_repository(&catalog);

        let mut request = Request::new();
        request.fix(Arc::new(pkg("php", "8.3.0")));

        let rules = RuleGenerator::new(&pool).generate(&request);
        let fixed = rules.get(0).unwrap();
        assert_eq!(fixed.rule_type(), RuleType::Fixed);
        assert!(fixed.is_empty(), "php is not in this pool");
        assert_eq!(rules.count_by_type(RuleType::PackageRequires), 1);
    }

    #[test]
    fn test_remove_rules() {
        let mut installed = InstalledRepository::new("installed");
        installed.add_package(pkg("old/pkg", "1.0-beta1"));
        let mut pool = Pool::new(Stability::Stable, Vec::new());
        pool.add_repository(&installed);

        let mut request = Request::new();
        request.remove("old/pkg", "*").unwrap();

        let rules = RuleGenerator::new(&pool).generate(&request);
        let remove = rules.rules_of_type(RuleType::JobRemove).next().unwrap();
        assert_eq!(remove.literals(), &[-1]);
    }
}
