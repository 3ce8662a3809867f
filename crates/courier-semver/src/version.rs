//! Normalized versions and their total ordering

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::version_parser::{Stability, VersionParser, VersionParserError};

/// Pre-release and post-release modifiers, least mature first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Modifier {
    Dev,
    Alpha,
    Beta,
    RC,
    Stable,
    Patch,
}

impl Modifier {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Some(Modifier::Dev),
            "alpha" | "a" => Some(Modifier::Alpha),
            "beta" | "b" => Some(Modifier::Beta),
            "rc" => Some(Modifier::RC),
            "stable" => Some(Modifier::Stable),
            "patch" | "pl" | "p" => Some(Modifier::Patch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Numeric {
        segments: Vec<u64>,
        modifier: Modifier,
        modifier_number: Vec<u64>,
        dev: bool,
    },
    /// Named development branch such as `dev-main`
    Branch(String),
}

/// A normalized package version.
///
/// Equality and ordering only look at the normalized form: build metadata
/// and the pretty spelling are carried along for display.
#[derive(Debug, Clone)]
pub struct Version {
    normalized: String,
    pretty: String,
    build: Option<String>,
    kind: Kind,
}

impl Version {
    /// Parse and normalize a version string
    pub fn parse(input: &str) -> Result<Self, VersionParserError> {
        let parser = VersionParser::new();
        let normalized = parser.normalize(input)?;
        let kind = parse_normalized(&normalized)
            .ok_or_else(|| VersionParserError::InvalidVersion(input.to_string()))?;

        Ok(Self {
            normalized,
            pretty: input.trim().to_string(),
            build: VersionParser::build_metadata(input),
            kind,
        })
    }

    /// Replace the human-readable spelling kept alongside the normalized form
    pub fn with_pretty(mut self, pretty: impl Into<String>) -> Self {
        self.pretty = pretty.into();
        self
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn pretty(&self) -> &str {
        &self.pretty
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// Whether this is a named `dev-*` branch
    pub fn is_branch(&self) -> bool {
        matches!(self.kind, Kind::Branch(_))
    }

    pub fn is_dev(&self) -> bool {
        self.stability() == Stability::Dev
    }

    pub fn stability(&self) -> Stability {
        match &self.kind {
            Kind::Branch(_) => Stability::Dev,
            Kind::Numeric { dev: true, .. } => Stability::Dev,
            Kind::Numeric { modifier, .. } => match modifier {
                Modifier::Dev => Stability::Dev,
                Modifier::Alpha => Stability::Alpha,
                Modifier::Beta => Stability::Beta,
                Modifier::RC => Stability::RC,
                Modifier::Stable | Modifier::Patch => Stability::Stable,
            },
        }
    }
}

fn parse_numbers(s: &str, separators: &[char]) -> Option<Vec<u64>> {
    s.split(separators)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

fn parse_normalized(normalized: &str) -> Option<Kind> {
    if let Some(name) = normalized.strip_prefix("dev-") {
        return Some(Kind::Branch(name.to_string()));
    }

    let (numbers, suffix) = match normalized.split_once('-') {
        Some((numbers, suffix)) => (numbers, Some(suffix)),
        None => (normalized, None),
    };

    let segments = parse_numbers(numbers, &['.'])?;
    if segments.is_empty() {
        return None;
    }

    let (modifier, modifier_number, dev) = match suffix {
        None => (Modifier::Stable, Vec::new(), false),
        Some(suffix) if suffix.eq_ignore_ascii_case("dev") => (Modifier::Dev, Vec::new(), false),
        Some(suffix) => {
            let (rest, dev) = match suffix.strip_suffix("-dev") {
                Some(rest) => (rest, true),
                None => (suffix, false),
            };
            let split = rest.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(rest.len());
            let modifier = Modifier::from_str(&rest[..split])?;
            let number = parse_numbers(&rest[split..], &['.', '-'])?;
            (modifier, number, dev)
        }
    };

    Some(Kind::Numeric {
        segments,
        modifier,
        modifier_number,
        dev,
    })
}

fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            left.cmp(&right)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.kind, &other.kind) {
            (Kind::Branch(a), Kind::Branch(b)) => a.cmp(b),
            (Kind::Branch(_), Kind::Numeric { .. }) => Ordering::Less,
            (Kind::Numeric { .. }, Kind::Branch(_)) => Ordering::Greater,
            (
                Kind::Numeric {
                    segments: sa,
                    modifier: ma,
                    modifier_number: na,
                    dev: da,
                },
                Kind::Numeric {
                    segments: sb,
                    modifier: mb,
                    modifier_number: nb,
                    dev: db,
                },
            ) => compare_segments(sa, sb)
                .then_with(|| ma.cmp(mb))
                .then_with(|| na.cmp(nb))
                // a trailing -dev sorts before the release it leads up to
                .then_with(|| db.cmp(da)),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.kind {
            Kind::Branch(name) => {
                0u8.hash(state);
                name.hash(state);
            }
            Kind::Numeric {
                segments,
                modifier,
                modifier_number,
                dev,
            } => {
                1u8.hash(state);
                let significant = segments
                    .iter()
                    .rposition(|s| *s != 0)
                    .map_or(0, |last| last + 1);
                segments[..significant].hash(state);
                modifier.hash(state);
                modifier_number.hash(state);
                dev.hash(state);
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized)
    }
}

impl FromStr for Version {
    type Err = VersionParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_keeps_pretty_and_build() {
        let version = v("v1.2+build.7");
        assert_eq!(version.normalized(), "1.2.0.0");
        assert_eq!(version.pretty(), "v1.2+build.7");
        assert_eq!(version.build(), Some("build.7"));
        assert_eq!(version.to_string(), "1.2.0.0");
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("2.0") > v("1.99.99"));
        assert_eq!(v("1.2"), v("1.2.0.0"));
    }

    #[test]
    fn test_modifier_ordering() {
        assert!(v("1.0.0-dev") < v("1.0.0-alpha1"));
        assert!(v("1.0.0-alpha1") < v("1.0.0-alpha2"));
        assert!(v("1.0.0-alpha2") < v("1.0.0-beta1"));
        assert!(v("1.0.0-beta1") < v("1.0.0-RC1"));
        assert!(v("1.0.0-RC1") < v("1.0.0"));
        assert!(v("1.0.0") < v("1.0.0-patch1"));
        assert!(v("1.0.0-beta2-dev") < v("1.0.0-beta2"));
        assert!(v("0.9.9") < v("1.0.0-dev"));
    }

    #[test]
    fn test_branches_sort_below_numeric() {
        assert!(v("dev-main") < v("0.0.1"));
        assert!(v("dev-feature") < v("dev-main"));
        assert!(v("dev-main") < v("1.x-dev"));
    }

    #[test]
    fn test_build_metadata_ignored_in_equality() {
        let a = v("1.2.3+build.1");
        let b = v("1.2.3+build.2");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(v("1.2.3.0"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_stability() {
        assert_eq!(v("1.0.0").stability(), Stability::Stable);
        assert_eq!(v("1.0.0-p1").stability(), Stability::Stable);
        assert_eq!(v("1.0.0-beta3").stability(), Stability::Beta);
        assert_eq!(v("1.0.0-RC1-dev").stability(), Stability::Dev);
        assert_eq!(v("dev-main").stability(), Stability::Dev);
        assert!(v("dev-main").is_branch());
        assert!(!v("1.x-dev").is_branch());
        assert!(v("1.x-dev").is_dev());
    }

    #[test]
    fn test_invalid() {
        assert!(Version::parse("not a version").is_err());
        assert!("".parse::<Version>().is_err());
    }
}
