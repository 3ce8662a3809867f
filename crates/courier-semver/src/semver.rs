//! High-level helpers over string versions and constraints

use crate::constraint::Constraint;
use crate::version::Version;

/// Convenience operations that take raw strings
pub struct Semver;

impl Semver {
    /// Check if a version satisfies a constraint; unparseable input never does
    pub fn satisfies(version: &str, constraints: &str) -> bool {
        let version = match Version::parse(version) {
            Ok(v) => v,
            Err(_) => return false,
        };

        match Constraint::parse(constraints) {
            Ok(constraint) => constraint.matches(&version),
            Err(_) => false,
        }
    }

    /// Return all versions that satisfy the given constraints, in input order
    pub fn satisfied_by(versions: &[&str], constraints: &str) -> Vec<String> {
        let constraint = match Constraint::parse(constraints) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        versions
            .iter()
            .filter(|v| Version::parse(v).map_or(false, |version| constraint.matches(&version)))
            .map(|v| v.to_string())
            .collect()
    }

    /// Sort versions in ascending order, dropping unparseable entries
    pub fn sort(versions: &[&str]) -> Vec<String> {
        Self::usort(versions, true)
    }

    /// Sort versions in descending order, dropping unparseable entries
    pub fn rsort(versions: &[&str]) -> Vec<String> {
        Self::usort(versions, false)
    }

    fn usort(versions: &[&str], ascending: bool) -> Vec<String> {
        let mut parsed: Vec<(Version, &str)> = versions
            .iter()
            .filter_map(|v| Version::parse(v).ok().map(|version| (version, *v)))
            .collect();

        parsed.sort_by(|(a, _), (b, _)| if ascending { a.cmp(b) } else { b.cmp(a) });

        parsed.into_iter().map(|(_, v)| v.to_string()).collect()
    }
}
