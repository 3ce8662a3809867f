//! Version normalization, ordering and constraint matching
//!
//! Versions are normalized to a four-segment form (`1.2` becomes `1.2.0.0`)
//! with an optional stability modifier, and compared numerically. Named
//! `dev-*` branches sort below every numeric version.

pub mod constraint;
mod semver;
mod version;
mod version_parser;

pub use constraint::{version_compare, Constraint, Operator};
pub use semver::Semver;
pub use version::Version;
pub use version_parser::{Stability, VersionParser, VersionParserError};
