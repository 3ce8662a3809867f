//! Resolver context.
//!
//! Callers (plugins, modules, ...) register their requirements against an
//! explicitly constructed [`Resolver`]. The resolution trigger,
//! [`Resolver::resolve`], turns every registration into a root package and
//! solves all of them together against the installed units, the platform and
//! the catalog repositories.
//!
//! ```ignore
//! use courier_resolver::{CallerInfo, Requirements, Resolver, ResolverConfig};
//!
//! let mut resolver = Resolver::new(ResolverConfig::default())?
//!     .with_repository(catalog);
//!
//! let caller = CallerInfo::new("my-plugin").with_version("1.0");
//! resolver.register(&caller, Requirements::Basic(vec!["akismet>=4.0".into()]))?;
//!
//! match resolver.resolve() {
//!     Ok(transaction) => println!("{}", transaction.summary()),
//!     Err(failure) => eprintln!("{}", failure.first_message()),
//! }
//! ```

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use courier_semver::{Constraint, Stability, VersionParser};

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::package::{qualify, InstalledUnit, Package};
use crate::repository::{is_platform_name, CompositeRepository, InstalledRepository, PlatformRepository, Repository};
use crate::solver::{Policy, Pool, Request, Solver, Transaction};

lazy_static! {
    /// `name` followed by an optional constraint: `akismet`, `akismet>=4.0`, `akismet ~1.2`
    static ref BASIC_REQUIREMENT_RE: Regex = Regex::new(r"^\s*([^\s<>=!~^|,@]+)\s*(.*?)\s*$").unwrap();

    /// `vendor/name` or a bare `name`
    static ref PACKAGE_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*(/[A-Za-z0-9][A-Za-z0-9_.\-]*)?$").unwrap();
}

/// Identity of whoever registers requirements.
///
/// Replaces any guessing about the origin of a registration: the caller says
/// who it is, and the metadata becomes its root package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    /// Identifier, usually the unit's directory name
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CallerInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One requirement in structured form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSpec {
    pub name: String,
    #[serde(default = "wildcard")]
    pub constraint: String,
}

fn wildcard() -> String {
    "*".to_string()
}

impl RequirementSpec {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
        }
    }
}

/// Requirements as handed over by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirements {
    /// `"name"`, `"name>=1.0"`, `"name~1.2"`, `"name=1.0"`
    Basic(Vec<String>),
    /// `{name, constraint}` pairs
    Advanced(Vec<RequirementSpec>),
}

/// Category of a failed resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No combination of packages satisfies the registrations
    Conflict,
    /// The solver exhausted its step budget; retrying with a larger one may help
    Timeout,
    /// Anything else: configuration problems, unorderable operations
    Internal,
}

/// Structured failure returned by the resolution trigger.
///
/// CLI hosts print [`ResolutionFailure::remaining_messages`] line by line and
/// report [`ResolutionFailure::first_message`] as the error itself.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{summary}")]
pub struct ResolutionFailure {
    pub kind: FailureKind,
    pub summary: String,
    pub messages: Vec<String>,
}

impl ResolutionFailure {
    pub fn first_message(&self) -> &str {
        &self.summary
    }

    pub fn remaining_messages(&self) -> &[String] {
        &self.messages
    }
}

impl From<ResolverError> for ResolutionFailure {
    fn from(error: ResolverError) -> Self {
        match error {
            ResolverError::SolverConflict(problems) => ResolutionFailure {
                kind: FailureKind::Conflict,
                summary: problems.summary().to_string(),
                messages: problems
                    .messages()
                    .iter()
                    .map(|m| m.trim().trim_start_matches(['-', ' ']).to_string())
                    .collect(),
            },
            ResolverError::SolverTimeout { steps } => ResolutionFailure {
                kind: FailureKind::Timeout,
                summary: ResolverError::SolverTimeout { steps }.to_string(),
                messages: vec![format!(
                    "The solver stopped after {} steps; raise max-steps to let it search further.",
                    steps
                )],
            },
            other => ResolutionFailure {
                kind: FailureKind::Internal,
                summary: "Dependency resolution failed".to_string(),
                messages: vec![other.to_string()],
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Registration {
    caller: CallerInfo,
    requires: Vec<RequirementSpec>,
    dev_requires: Vec<RequirementSpec>,
}

/// The resolver context: registrations, repositories and configuration
pub struct Resolver {
    config: ResolverConfig,
    registrations: IndexMap<String, Registration>,
    repositories: Vec<Arc<dyn Repository>>,
    platform: Arc<PlatformRepository>,
    units: IndexMap<String, Package>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let repositories: Vec<&str> = self.repositories.iter().map(|r| r.name()).collect();
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("registrations", &self.registrations.keys().collect::<Vec<_>>())
            .field("repositories", &repositories)
            .field("units", &self.units.len())
            .finish()
    }
}

impl Resolver {
    /// Create a context; the platform comes from the configured overrides
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let platform = PlatformRepository::with_overrides(&config.platform)?;

        Ok(Self {
            config,
            registrations: IndexMap::new(),
            repositories: Vec::new(),
            platform: Arc::new(platform),
            units: IndexMap::new(),
        })
    }

    /// Add a catalog repository; earlier repositories take priority
    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.add_repository(repository);
        self
    }

    pub fn add_repository(&mut self, repository: Arc<dyn Repository>) {
        self.repositories.push(repository);
    }

    /// Replace the platform packages
    pub fn with_platform(mut self, platform: PlatformRepository) -> Self {
        self.platform = Arc::new(platform);
        self
    }

    /// Adapt the host's discovery records into installed packages
    pub fn with_installed_units<I>(mut self, vendor: Option<&str>, units: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, InstalledUnit)>,
    {
        for (id, unit) in units {
            self.add_installed_unit(&id, unit, vendor)?;
        }
        Ok(self)
    }

    /// Record a unit that became available, replacing an earlier record of the same name
    pub fn add_installed_unit(&mut self, id: &str, unit: InstalledUnit, vendor: Option<&str>) -> Result<()> {
        let package = unit.into_package(id, vendor)?;
        log::debug!("Installed unit {}", package.pretty_string());
        self.units.insert(package.name().to_string(), package);
        Ok(())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Callers with at least one accepted registration, in registration order
    pub fn callers(&self) -> impl Iterator<Item = &CallerInfo> {
        self.registrations.values().map(|r| &r.caller)
    }

    /// Register requirements for `caller`.
    ///
    /// Either every requirement parses and the registration is recorded, or
    /// nothing is recorded; other callers are never affected.
    pub fn register(&mut self, caller: &CallerInfo, requirements: Requirements) -> Result<()> {
        let parsed = self.parse_requirements(caller, requirements)?;
        self.registration(caller).requires.extend(parsed);
        Ok(())
    }

    /// Register development requirements, only used with `include-dev`
    pub fn register_dev(&mut self, caller: &CallerInfo, requirements: Requirements) -> Result<()> {
        let parsed = self.parse_requirements(caller, requirements)?;
        self.registration(caller).dev_requires.extend(parsed);
        Ok(())
    }

    fn registration(&mut self, caller: &CallerInfo) -> &mut Registration {
        self.registrations
            .entry(caller.id.to_lowercase())
            .or_insert_with(|| Registration {
                caller: caller.clone(),
                requires: Vec::new(),
                dev_requires: Vec::new(),
            })
    }

    fn parse_requirements(&self, caller: &CallerInfo, requirements: Requirements) -> Result<Vec<RequirementSpec>> {
        let result = match requirements {
            Requirements::Basic(texts) => texts
                .iter()
                .map(|text| self.parse_basic(caller, text))
                .collect::<Result<Vec<_>>>(),
            Requirements::Advanced(specs) => specs
                .into_iter()
                .map(|spec| self.check_requirement(caller, &format!("{} {}", spec.name, spec.constraint), spec))
                .collect::<Result<Vec<_>>>(),
        };

        if let Err(e) = &result {
            log::warn!("Registration of {} rejected: {}", caller.id, e);
        }
        result
    }

    fn parse_basic(&self, caller: &CallerInfo, text: &str) -> Result<RequirementSpec> {
        let caps = BASIC_REQUIREMENT_RE
            .captures(text)
            .ok_or_else(|| invalid(caller, text, "expected a package name followed by an optional constraint"))?;

        let name = caps.get(1).map_or("", |m| m.as_str());
        let mut constraint = caps.get(2).map_or("", |m| m.as_str());

        // `name=1.0` means the exact version
        if constraint.len() >= 2 && constraint.starts_with('=') && constraint[1..].starts_with(|c: char| c.is_ascii_digit()) {
            constraint = &constraint[1..];
        }
        if constraint.is_empty() {
            constraint = "*";
        }

        self.check_requirement(caller, text, RequirementSpec::new(name, constraint))
    }

    /// Validate the name and constraint, and apply the default vendor
    fn check_requirement(&self, caller: &CallerInfo, text: &str, spec: RequirementSpec) -> Result<RequirementSpec> {
        let name = spec.name.trim();
        if !PACKAGE_NAME_RE.is_match(name) {
            return Err(invalid(caller, text, &format!("\"{}\" is not a valid package name", name)));
        }

        let constraint = spec.constraint.trim();
        let constraint = if constraint.is_empty() { "*" } else { constraint };
        Constraint::parse(constraint).map_err(|e| invalid(caller, text, &e.to_string()))?;

        let name = if is_platform_name(name) {
            name.to_lowercase()
        } else {
            qualify(&name.to_lowercase(), self.config.default_vendor.as_deref())
        };

        Ok(RequirementSpec::new(name, constraint))
    }

    /// Name of the root package standing for `caller`
    fn root_name(&self, caller: &CallerInfo) -> String {
        qualify(&caller.id.to_lowercase(), self.config.default_vendor.as_deref())
    }

    fn root_package(&self, registration: &Registration) -> Result<Package> {
        let caller = &registration.caller;
        let name = self.root_name(caller);

        // A caller that does not state its version inherits the discovered one
        let version = caller
            .version
            .clone()
            .or_else(|| self.units.get(&name).map(|unit| unit.pretty_version().to_string()));

        let unit = InstalledUnit {
            name: caller.name.clone(),
            version,
            description: caller.description.clone(),
        };
        let mut package = unit.into_package(&caller.id.to_lowercase(), self.config.default_vendor.as_deref())?;

        let mut requires = merge_requirements(&registration.requires);
        if self.config.include_dev {
            for (target, constraint) in merge_requirements(&registration.dev_requires) {
                match requires.get_mut(&target) {
                    Some(existing) => *existing = format!("{}, {}", existing, constraint),
                    None => {
                        requires.insert(target, constraint);
                    }
                }
            }
        }
        for (target, constraint) in &requires {
            package = package.with_require(target, constraint)?;
        }
        for (target, constraint) in merge_requirements(&registration.dev_requires) {
            package = package.with_dev_require(&target, &constraint)?;
        }

        Ok(package)
    }

    /// The resolution trigger: solve every registration at once.
    ///
    /// Returns the operations that bring the installed units in line with
    /// the registrations; nothing is applied here.
    pub fn resolve(&self) -> std::result::Result<Transaction, ResolutionFailure> {
        self.try_resolve().map_err(|e| {
            log::debug!("Resolution failed: {}", e);
            ResolutionFailure::from(e)
        })
    }

    fn try_resolve(&self) -> Result<Transaction> {
        let roots: Vec<Package> = self
            .registrations
            .values()
            .map(|registration| self.root_package(registration))
            .collect::<Result<_>>()?;
        let root_names: HashSet<&str> = roots.iter().map(|r| r.name()).collect();

        let mut registered = InstalledRepository::new("registered");
        for root in &roots {
            registered.add_package(root.clone());
        }
        let mut available = InstalledRepository::new("available");
        for unit in self.units.values().filter(|u| !root_names.contains(u.name())) {
            available.add_package(unit.clone());
        }

        let registered: Arc<dyn Repository> = Arc::new(registered);
        let available: Arc<dyn Repository> = Arc::new(available);
        let platform: Arc<dyn Repository> = self.platform.clone();
        let installed = CompositeRepository::new("installed")
            .with_repository(&registered)
            .with_repository(&platform)
            .with_repository(&available);

        let mut pool = Pool::new(self.config.minimum_stability()?, self.stability_flags(&roots)?);
        pool.add_repository(&installed);
        for repository in &self.repositories {
            pool.add_repository(repository.as_ref());
        }

        let request = self.build_request(&roots, &pool, platform.as_ref(), available.as_ref());

        let policy = installed
            .packages()
            .iter()
            .fold(
                Policy::new()
                    .prefer_stable(self.config.prefer_stable)
                    .prefer_lowest(self.config.prefer_lowest),
                |policy, package| policy.with_installed(package),
            );

        log::info!(
            "Resolving {} registration(s) against {} candidate packages",
            roots.len(),
            pool.len()
        );

        Solver::new(&pool, &policy)
            .with_max_steps(self.config.max_steps)
            .solve(&request, &installed)
    }

    /// Configured stability flags plus `@stability` flags found in root requirements
    fn stability_flags(&self, roots: &[Package]) -> Result<Vec<(String, Stability)>> {
        let mut flags = self.config.stability_flags()?;
        for root in roots {
            for link in root.requires().values() {
                if let Some(flag) = VersionParser::parse_stability_flag(&link.pretty_constraint) {
                    flags.entry(link.target.clone()).or_insert(flag);
                }
            }
        }
        Ok(flags.into_iter().collect())
    }

    fn build_request(
        &self,
        roots: &[Package],
        pool: &Pool,
        platform: &dyn Repository,
        available: &dyn Repository,
    ) -> Request {
        let mut request = Request::new();

        for root in roots {
            request.install_constraint(root.name(), Constraint::Exact(root.version().clone()), root.pretty_version());
        }

        // Platform packages cannot change, unless a root stands in for them
        for package in platform.packages() {
            let provided = roots.iter().any(|root| {
                root.provides()
                    .get(package.name())
                    .map_or(false, |link| link.constraint.matches(package.version()))
            });
            if !provided {
                request.fix(package);
            }
        }

        for package in available.packages() {
            if !pool.is_package_acceptable(&package.names(), package.stability()) {
                log::debug!("Removing {}, its stability is no longer acceptable", package.pretty_string());
                request.remove_constraint(
                    package.name(),
                    Constraint::Exact(package.version().clone()),
                    package.pretty_version(),
                );
            }
        }

        request
    }
}

fn invalid(caller: &CallerInfo, requirement: &str, reason: &str) -> ResolverError {
    ResolverError::InvalidRequirement {
        caller: caller.id.clone(),
        requirement: requirement.trim().to_string(),
        reason: reason.to_string(),
    }
}

/// Requirements keyed by target; repeated targets are conjoined
fn merge_requirements(specs: &[RequirementSpec]) -> IndexMap<String, String> {
    let mut merged: IndexMap<String, String> = IndexMap::new();
    for spec in specs {
        match merged.get_mut(&spec.name) {
            Some(existing) => *existing = format!("{}, {}", existing, spec.constraint),
            None => {
                merged.insert(spec.name.clone(), spec.constraint.clone());
            }
        }
    }
    merged
}
