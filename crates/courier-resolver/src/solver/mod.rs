//! SAT-based dependency resolver.
//!
//! This module implements a CDCL (Conflict-Driven Clause Learning) SAT solver
//! specifically designed for package dependency resolution.
//!
//! # Architecture
//!
//! - [`Pool`]: Registry of all candidate packages with lookup by name/constraint
//! - [`Request`]: Specification of what needs to be resolved
//! - [`Policy`]: Ranks competing candidates for branching
//! - [`RuleSet`]: Collection of SAT clauses representing dependencies
//! - [`Solver`]: The main CDCL algorithm implementation
//! - [`ProblemSet`]: Human-readable explanation of an unsolvable request
//! - [`Transaction`]: Ordered operations derived from a solution
//!
//! # Algorithm Overview
//!
//! 1. **Rule Generation**: Convert the reachable dependency graph to SAT clauses
//! 2. **Unit Propagation**: Force decisions from unit clauses
//! 3. **Decision Making**: Choose package versions using the policy
//! 4. **Conflict Analysis**: Learn from conflicts to avoid repeating mistakes
//! 5. **Backtracking**: Revert to the appropriate level on conflict
//! 6. **Operation Extraction**: Diff the solution against installed packages
//!
//! # Example
//!
//! ```ignore
//! use courier_resolver::repository::InstalledRepository;
//! use courier_resolver::solver::{Policy, Pool, Request, Solver};
//! use courier_semver::Stability;
//!
//! let mut pool = Pool::new(Stability::Stable, Vec::new());
//! // ... add repositories to the pool
//!
//! let mut request = Request::new();
//! request.install("vendor/package", "^1.0")?;
//!
//! let policy = Policy::default();
//! let installed = InstalledRepository::new("installed");
//! match Solver::new(&pool, &policy).solve(&request, &installed) {
//!     Ok(transaction) => println!("{}", transaction.summary()),
//!     Err(e) => println!("No solution: {}", e),
//! }
//! ```

mod decisions;
mod policy;
mod pool;
mod problem;
mod request;
mod rule;
mod rule_generator;
mod rule_set;
#[allow(clippy::module_inception)]
mod solver;
mod transaction;
mod watch_graph;

#[cfg(test)]
mod tests;

pub use decisions::Decisions;
pub use policy::Policy;
pub use pool::{Literal, PackageId, Pool};
pub use problem::{Problem, ProblemRule, ProblemSet};
pub use request::{Job, Request};
pub use rule::{Rule, RuleType};
pub use rule_generator::RuleGenerator;
pub use rule_set::{RuleSet, RuleSetStats};
pub use solver::Solver;
pub use transaction::{Operation, Transaction, TransactionSummary};
pub use watch_graph::WatchGraph;
