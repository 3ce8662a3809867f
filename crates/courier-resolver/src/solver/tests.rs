//! Solver scenario tests: whole resolutions from request to ordered operations.

use super::*;

use courier_semver::Stability;

use crate::error::ResolverError;
use crate::package::Package;
use crate::repository::{ArrayRepository, InstalledRepository, PlatformRepository, Repository};

fn pkg(name: &str, version: &str) -> Package {
    Package::new(name, version).unwrap()
}

fn pkg_with_requires(name: &str, version: &str, requires: Vec<(&str, &str)>) -> Package {
    let mut package = pkg(name, version);
    for (target, constraint) in requires {
        package = package.with_require(target, constraint).unwrap();
    }
    package
}

fn catalog(packages: Vec<Package>) -> ArrayRepository {
    let mut repo = ArrayRepository::new("catalog");
    for package in packages {
        repo.add_package(package);
    }
    repo
}

fn installed(packages: Vec<Package>) -> InstalledRepository {
    let mut repo = InstalledRepository::new("installed");
    for package in packages {
        repo.add_package(package);
    }
    repo
}

/// Installed packages first, like the resolver context builds its pool
fn make_pool(installed: &InstalledRepository, catalog: &ArrayRepository) -> Pool {
    let mut pool = Pool::new(Stability::Stable, Vec::new());
    pool.add_repository(installed);
    pool.add_repository(catalog);
    pool
}

fn make_policy(installed: &InstalledRepository) -> Policy {
    installed
        .packages()
        .iter()
        .fold(Policy::new(), |policy, package| policy.with_installed(package))
}

fn solve(
    catalog_packages: Vec<Package>,
    installed_packages: Vec<Package>,
    request: &Request,
) -> crate::error::Result<Transaction> {
    let installed = installed(installed_packages);
    let catalog = catalog(catalog_packages);
    let pool = make_pool(&installed, &catalog);
    let policy = make_policy(&installed);
    Solver::new(&pool, &policy).solve(request, &installed)
}

/// (kind, name, version) per operation, in transaction order
fn operations(transaction: &Transaction) -> Vec<(&'static str, String, String)> {
    transaction
        .operations()
        .iter()
        .map(|op| {
            let package = op.package();
            (op.kind(), package.name().to_string(), package.pretty_version().to_string())
        })
        .collect()
}

fn check_solver_result(transaction: &Transaction, expected: Vec<(&'static str, &str, &str)>) {
    let expected: Vec<(&'static str, String, String)> = expected
        .into_iter()
        .map(|(kind, name, version)| (kind, name.to_string(), version.to_string()))
        .collect();
    assert_eq!(operations(transaction), expected);
}

fn conflict_messages(result: crate::error::Result<Transaction>) -> Vec<String> {
    match result {
        Err(ResolverError::SolverConflict(problems)) => {
            assert!(!problems.is_empty());
            problems.messages()
        }
        other => panic!("expected a solver conflict, got {:?}", other),
    }
}

// ============================================================================
// Basic Installation Tests
// ============================================================================

#[test]
fn test_solver_install_single() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let transaction = solve(vec![pkg("acme/a", "1.0")], vec![], &request).unwrap();
    check_solver_result(&transaction, vec![("install", "acme/a", "1.0")]);
}

#[test]
fn test_solver_install_with_deps_in_order() {
    let mut request = Request::new();
    request.install("acme/foo", "*").unwrap();
    request.install("acme/bar", ">=1.5").unwrap();

    let transaction = solve(
        vec![
            pkg_with_requires("acme/foo", "1.0", vec![("acme/baz", ">=1.0")]),
            pkg("acme/bar", "1.5"),
            pkg("acme/bar", "2.0"),
            pkg("acme/baz", "1.0"),
        ],
        vec![],
        &request,
    )
    .unwrap();

    check_solver_result(
        &transaction,
        vec![
            ("install", "acme/bar", "2.0"),
            ("install", "acme/baz", "1.0"),
            ("install", "acme/foo", "1.0"),
        ],
    );
}

#[test]
fn test_solver_prefer_lowest() {
    let installed = installed(vec![]);
    let catalog = catalog(vec![pkg("acme/bar", "1.5"), pkg("acme/bar", "2.0")]);
    let pool = make_pool(&installed, &catalog);
    let policy = Policy::new().prefer_lowest(true);

    let mut request = Request::new();
    request.install("acme/bar", ">=1.5").unwrap();

    let transaction = Solver::new(&pool, &policy).solve(&request, &installed).unwrap();
    check_solver_result(&transaction, vec![("install", "acme/bar", "1.5")]);
}

#[test]
fn test_solver_one_version_per_name() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();
    request.install("acme/b", "*").unwrap();

    let transaction = solve(
        vec![
            pkg_with_requires("acme/a", "1.0", vec![("acme/lib", "^1.0")]),
            pkg_with_requires("acme/b", "1.0", vec![("acme/lib", ">=1.0")]),
            pkg("acme/lib", "1.0"),
            pkg("acme/lib", "1.5"),
            pkg("acme/lib", "2.0"),
        ],
        vec![],
        &request,
    )
    .unwrap();

    let libs: Vec<_> = transaction
        .installs()
        .filter(|p| p.name() == "acme/lib")
        .map(|p| p.pretty_version().to_string())
        .collect();
    assert_eq!(libs, vec!["1.5"]);
}

#[test]
fn test_solver_learns_from_conflict() {
    // The newest lib satisfies a but not b; the solver has to backtrack
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();
    request.install("acme/b", "*").unwrap();

    let transaction = solve(
        vec![
            pkg_with_requires("acme/a", "1.0", vec![("acme/lib", "*")]),
            pkg_with_requires("acme/b", "1.0", vec![("acme/lib", "<2.0")]),
            pkg("acme/lib", "1.0"),
            pkg("acme/lib", "2.0"),
        ],
        vec![],
        &request,
    )
    .unwrap();

    check_solver_result(
        &transaction,
        vec![
            ("install", "acme/lib", "1.0"),
            ("install", "acme/a", "1.0"),
            ("install", "acme/b", "1.0"),
        ],
    );
}

#[test]
fn test_install_circular_require() {
    // b 1.1 requires a back; the cycle is fine for the solver
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let installed = installed(vec![]);
    let catalog = catalog(vec![
        pkg_with_requires("acme/a", "1.0", vec![("acme/b", ">=1.0")]),
        pkg("acme/b", "0.9"),
        pkg_with_requires("acme/b", "1.1", vec![("acme/a", ">=1.0")]),
    ]);
    let pool = make_pool(&installed, &catalog);
    let policy = Policy::new();

    let result = Solver::new(&pool, &policy).resolve(&request).unwrap();
    let names: Vec<String> = result.iter().map(|p| p.pretty_string()).collect();
    assert_eq!(names, vec!["acme/a 1.0", "acme/b 1.1"]);

    // but the operations cannot be ordered
    match Solver::new(&pool, &policy).solve(&request, &installed) {
        Err(ResolverError::DependencyCycle(names)) => {
            assert_eq!(names, vec!["acme/a".to_string(), "acme/b".to_string()]);
        }
        other => panic!("expected a dependency cycle, got {:?}", other),
    }
}

// ============================================================================
// Provide & Replace Tests
// ============================================================================

#[test]
fn test_install_provider() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let transaction = solve(
        vec![
            pkg_with_requires("acme/a", "1.0", vec![("virtual/cache", "^1.0")]),
            pkg("acme/redis", "1.0").with_provide("virtual/cache", "1.0").unwrap(),
        ],
        vec![],
        &request,
    )
    .unwrap();

    check_solver_result(
        &transaction,
        vec![("install", "acme/redis", "1.0"), ("install", "acme/a", "1.0")],
    );
}

#[test]
fn test_skip_replacer_of_existing_package() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let transaction = solve(
        vec![
            pkg_with_requires("acme/a", "1.0", vec![("acme/b", ">=1.0")]),
            pkg("acme/b", "1.0"),
            pkg("acme/q", "1.0").with_replace("acme/b", ">=1.0").unwrap(),
        ],
        vec![],
        &request,
    )
    .unwrap();

    let installs: Vec<&str> = transaction.installs().map(|p| p.name()).collect();
    assert!(installs.contains(&"acme/b"));
    assert!(!installs.contains(&"acme/q"), "replacer should not be installed next to b");
}

#[test]
fn test_replacer_satisfies_replaced_name() {
    let mut request = Request::new();
    request.install("acme/b", "*").unwrap();
    request.install("acme/q", "*").unwrap();

    let transaction = solve(
        vec![
            pkg("acme/b", "1.0"),
            pkg("acme/q", "1.0").with_replace("acme/b", "*").unwrap(),
        ],
        vec![],
        &request,
    )
    .unwrap();

    check_solver_result(&transaction, vec![("install", "acme/q", "1.0")]);
}

#[test]
fn test_replacer_and_replaced_cannot_coexist() {
    // q only replaces old versions of b, so it cannot stand in for b 1.0
    let mut request = Request::new();
    request.install("acme/b", "1.0").unwrap();
    request.install("acme/q", "*").unwrap();

    let messages = conflict_messages(solve(
        vec![
            pkg("acme/b", "1.0"),
            pkg("acme/q", "1.0").with_replace("acme/b", "<1.0").unwrap(),
        ],
        vec![],
        &request,
    ));

    assert!(
        messages.iter().any(|m| m.contains("acme/q replaces acme/b and thus cannot coexist with it")),
        "{:?}",
        messages
    );
}

// ============================================================================
// Installed Package Tests
// ============================================================================

#[test]
fn test_solver_satisfied_request_is_noop() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let transaction = solve(
        vec![
            pkg_with_requires("acme/a", "1.0", vec![("acme/b", "^1.0")]),
            pkg_with_requires("acme/a", "2.0", vec![("acme/b", "^1.0")]),
            pkg("acme/b", "1.0"),
        ],
        vec![
            pkg_with_requires("acme/a", "1.0", vec![("acme/b", "^1.0")]),
            pkg("acme/b", "1.0"),
        ],
        &request,
    )
    .unwrap();

    assert!(transaction.is_empty(), "{:?}", operations(&transaction));
    assert_eq!(transaction.summary().to_string(), "Nothing to do");
}

#[test]
fn test_solver_update_single() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();
    request.update("acme/a");

    let transaction = solve(
        vec![
            pkg_with_requires("acme/a", "2.0", vec![("acme/b", "^1.0")]),
            pkg("acme/b", "1.0"),
        ],
        vec![
            pkg_with_requires("acme/a", "1.0", vec![("acme/b", "^1.0")]),
            pkg("acme/b", "1.0"),
        ],
        &request,
    )
    .unwrap();

    check_solver_result(&transaction, vec![("update", "acme/a", "2.0")]);
    let (from, to) = transaction.updates().next().unwrap();
    assert_eq!(from.pretty_version(), "1.0");
    assert_eq!(to.pretty_version(), "2.0");
}

#[test]
fn test_solver_keeps_unrequested_installed_package() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let transaction = solve(
        vec![pkg("acme/a", "1.0"), pkg("acme/other", "2.0")],
        vec![pkg("acme/other", "1.0")],
        &request,
    )
    .unwrap();

    check_solver_result(&transaction, vec![("install", "acme/a", "1.0")]);
}

#[test]
fn test_solver_remove() {
    let mut request = Request::new();
    request.remove("acme/old", "*").unwrap();

    let transaction = solve(vec![], vec![pkg("acme/old", "1.0")], &request).unwrap();
    check_solver_result(&transaction, vec![("remove", "acme/old", "1.0")]);
}

#[test]
fn test_solver_removes_conflicting_installed_package() {
    let mut request = Request::new();
    request.install("acme/new", "*").unwrap();

    let transaction = solve(
        vec![pkg("acme/new", "1.0").with_conflict("acme/old", "*").unwrap()],
        vec![pkg("acme/old", "1.0")],
        &request,
    )
    .unwrap();

    check_solver_result(
        &transaction,
        vec![("remove", "acme/old", "1.0"), ("install", "acme/new", "1.0")],
    );
}

// ============================================================================
// Conflict Explanation Tests
// ============================================================================

#[test]
fn test_conflict_between_requested_packages() {
    let mut request = Request::new();
    request.install("acme/x", ">=1.0").unwrap();
    request.install("acme/y", ">=1.0").unwrap();

    let messages = conflict_messages(solve(
        vec![
            pkg("acme/x", "1.0").with_conflict("acme/y", "*").unwrap(),
            pkg("acme/y", "1.0"),
        ],
        vec![],
        &request,
    ));

    assert!(
        messages.iter().any(|m| m == "acme/x 1.0 conflicts with acme/y 1.0 (*)"),
        "{:?}",
        messages
    );
}

#[test]
fn test_root_requirement_without_matching_version() {
    let mut request = Request::new();
    request.install("acme/a", ">=2.0").unwrap();

    let messages = conflict_messages(solve(vec![pkg("acme/a", "1.0")], vec![], &request));

    assert_eq!(
        messages,
        vec!["Root requires acme/a >=2.0 -> found acme/a[1.0] but it does not match the constraint."]
    );
}

#[test]
fn test_root_package_requirement_without_matching_version() {
    let mut request = Request::new();
    request.install("site/root", "1.0").unwrap();

    let messages = conflict_messages(solve(
        vec![
            pkg_with_requires("site/root", "1.0", vec![("acme/a", ">=2.0")]),
            pkg("acme/a", "1.0"),
        ],
        vec![],
        &request,
    ));

    assert!(
        messages.iter().any(|m| m.contains("site/root 1.0 requires acme/a >=2.0")
            && m.contains("found acme/a[1.0] but it does not match the constraint")),
        "{:?}",
        messages
    );
}

#[test]
fn test_unknown_package() {
    let mut request = Request::new();
    request.install("acme/typo", "*").unwrap();

    let messages = conflict_messages(solve(vec![pkg("acme/a", "1.0")], vec![], &request));
    assert!(messages[0].contains("no package named acme/typo exists"), "{:?}", messages);
}

#[test]
fn test_minimum_stability_explained() {
    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let messages = conflict_messages(solve(vec![pkg("acme/a", "2.0-beta1")], vec![], &request));
    assert!(
        messages[0].contains("found acme/a[2.0-beta1] but these do not match the minimum stability (stable)"),
        "{:?}",
        messages
    );
}

#[test]
fn test_stability_flag_allows_unstable_package() {
    let installed = installed(vec![]);
    let catalog = catalog(vec![pkg("acme/a", "2.0-beta1")]);
    let mut pool = Pool::new(Stability::Stable, vec![("acme/a".to_string(), Stability::Beta)]);
    pool.add_repository(&installed);
    pool.add_repository(&catalog);
    let policy = Policy::new();

    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let transaction = Solver::new(&pool, &policy).solve(&request, &installed).unwrap();
    check_solver_result(&transaction, vec![("install", "acme/a", "2.0-beta1")]);
}

#[test]
fn test_fixed_platform_package_blocks_requirement() {
    let mut overrides = indexmap::IndexMap::new();
    overrides.insert("php".to_string(), "8.1.0".to_string());
    let platform = PlatformRepository::with_overrides(&overrides).unwrap();
    let php = platform.find_package("php", "8.1.0").unwrap();

    let installed = installed(vec![]);
    let catalog = catalog(vec![pkg_with_requires("acme/a", "1.0", vec![("php", ">=8.2")])]);
    let mut pool = Pool::new(Stability::Stable, Vec::new());
    pool.add_repository(&installed);
    pool.add_repository(&platform);
    pool.add_repository(&catalog);
    let policy = Policy::new();

    let mut request = Request::new();
    request.fix(php);
    request.install("acme/a", "*").unwrap();

    let messages = conflict_messages(Solver::new(&pool, &policy).solve(&request, &installed));
    assert!(
        messages.iter().any(|m| m.contains("acme/a 1.0 requires php >=8.2")),
        "{:?}",
        messages
    );
}

#[test]
fn test_fixed_platform_package_is_not_an_operation() {
    let platform = PlatformRepository::new();
    let php = platform.find_package("php", crate::repository::DEFAULT_PLATFORM_VERSION).unwrap();

    let installed = installed(vec![]);
    let catalog = catalog(vec![pkg_with_requires("acme/a", "1.0", vec![("php", ">=8.0")])]);
    let mut pool = Pool::new(Stability::Stable, Vec::new());
    pool.add_repository(&installed);
    pool.add_repository(&platform);
    pool.add_repository(&catalog);
    let policy = Policy::new();

    let mut request = Request::new();
    request.fix(php);
    request.install("acme/a", "*").unwrap();

    let transaction = Solver::new(&pool, &policy).solve(&request, &installed).unwrap();
    check_solver_result(&transaction, vec![("install", "acme/a", "1.0")]);
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_step_budget_is_a_timeout_not_a_conflict() {
    let installed = installed(vec![]);
    let catalog = catalog(vec![
        pkg_with_requires("acme/a", "1.0", vec![("acme/b", "*")]),
        pkg_with_requires("acme/a", "2.0", vec![("acme/b", "*")]),
        pkg("acme/b", "1.0"),
        pkg("acme/b", "2.0"),
    ]);
    let pool = make_pool(&installed, &catalog);
    let policy = Policy::new();

    let mut request = Request::new();
    request.install("acme/a", "*").unwrap();

    let result = Solver::new(&pool, &policy).with_max_steps(1).solve(&request, &installed);
    match result {
        Err(ResolverError::SolverTimeout { steps }) => assert!(steps > 1),
        other => panic!("expected a timeout, got {:?}", other.map(|t| t.len())),
    }
}
