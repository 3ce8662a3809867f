//! Dependency resolution for registered plugin requirements.
//!
//! Callers register requirements with a [`Resolver`]; the resolver builds a
//! [`Pool`] from the installed units, the platform and the catalog
//! repositories, and a CDCL [`Solver`] derives the ordered [`Transaction`]
//! that satisfies every registration, or a [`ProblemSet`] explaining why
//! none exists.

pub mod config;
pub mod error;
pub mod manager;
pub mod package;
pub mod repository;
pub mod solver;

pub use config::ResolverConfig;
pub use error::{ResolverError, Result};
pub use manager::{CallerInfo, FailureKind, RequirementSpec, Requirements, ResolutionFailure, Resolver};
pub use package::{InstalledUnit, Link, LinkType, Package, PackageData};
pub use repository::{ArrayRepository, CompositeRepository, InstalledRepository, PlatformRepository, Repository};
pub use solver::{Operation, Policy, Pool, ProblemSet, Request, Solver, Transaction};
