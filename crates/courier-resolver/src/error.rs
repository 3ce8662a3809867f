use thiserror::Error;

use courier_semver::VersionParserError;

use crate::solver::ProblemSet;

#[derive(Error, Debug)]
pub enum ResolverError {
    // Parse errors
    #[error("Invalid version \"{version}\": {reason}")]
    InvalidVersionFormat { version: String, reason: String },

    #[error("Invalid version constraint \"{constraint}\": {reason}")]
    InvalidConstraintFormat { constraint: String, reason: String },

    #[error("Invalid requirement \"{requirement}\" registered by {caller}: {reason}")]
    InvalidRequirement {
        caller: String,
        requirement: String,
        reason: String,
    },

    // Repository errors
    #[error("Invalid repository entry: {0}")]
    InvalidRepositoryEntry(String),

    // Solver errors
    #[error("{}", .0.summary())]
    SolverConflict(ProblemSet),

    #[error("Dependency resolution gave up after {steps} steps")]
    SolverTimeout { steps: usize },

    #[error("Dependency cycle detected between {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Solver invariant violated: {0}")]
    Internal(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    pub(crate) fn version(version: &str, err: VersionParserError) -> Self {
        ResolverError::InvalidVersionFormat {
            version: version.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn constraint(constraint: &str, err: VersionParserError) -> Self {
        ResolverError::InvalidConstraintFormat {
            constraint: constraint.to_string(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;
