//! Version parsing and normalization module

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::constraint::{Constraint, Operator};
use crate::version::Version;

/// Stability levels for versions, ordered from least to most mature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    Dev,
    Alpha,
    Beta,
    RC,
    Stable,
}

impl Stability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Dev => "dev",
            Stability::Alpha => "alpha",
            Stability::Beta => "beta",
            Stability::RC => "RC",
            Stability::Stable => "stable",
        }
    }
}

impl Default for Stability {
    fn default() -> Self {
        Stability::Stable
    }
}

impl std::fmt::Display for Stability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for version parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParserError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Invalid operator \"{0}\"")]
    InvalidOperator(String),
    #[error("Invalid stability \"{0}\"")]
    InvalidStability(String),
    #[error("Could not parse version constraint {constraint}: {reason}")]
    ConstraintParseError { constraint: String, reason: String },
}

const MODIFIER_PATTERN: &str =
    r"[._-]?(?:(stable|beta|b|RC|alpha|a|patch|pl|p)((?:[.-]?\d+)*)?)?([.-]?dev)?";

const STABILITIES_PATTERN: &str = r"stable|RC|beta|alpha|dev";

/// Highest development ordinal, used for `x`/`*` branch segments
const DEV_ORDINAL: &str = "9999999";

lazy_static! {
    // Groups: 1-4 numeric segments, 5 stability, 6 stability number, 7 dev
    static ref CLASSICAL_VERSION_RE: Regex = Regex::new(&format!(
        r"(?i)^v?(\d{{1,5}})(\.\d+)?(\.\d+)?(\.\d+)?{}$",
        MODIFIER_PATTERN
    )).unwrap();

    // Groups: 1 date, 2 stability, 3 stability number, 4 dev
    static ref DATE_VERSION_RE: Regex = Regex::new(&format!(
        r"(?i)^v?(\d{{4}}(?:[.:-]?\d{{2}}){{1,6}}(?:[.:-]?\d{{1,3}}){{0,2}}){}$",
        MODIFIER_PATTERN
    )).unwrap();

    static ref BRANCH_RE: Regex = Regex::new(
        r"(?i)^v?(\d+)(?:\.(\d+|[xX*]))?(?:\.(\d+|[xX*]))?(?:\.(\d+|[xX*]))?$"
    ).unwrap();

    static ref ALIAS_RE: Regex = Regex::new(r"^([^,\s]+) +as +([^,\s]+)$").unwrap();

    static ref STABILITY_FLAG_RE: Regex = Regex::new(&format!(
        r"(?i)@(?:{})$",
        STABILITIES_PATTERN
    )).unwrap();

    static ref BUILD_METADATA_RE: Regex = Regex::new(r"^([^,\s+]+)\+([^\s]+)$").unwrap();

    static ref DEV_BRANCH_RE: Regex = Regex::new(r"(?i)^(.*?)[.-]?dev$").unwrap();

    static ref STABILITY_PARSE_RE: Regex = Regex::new(&format!(
        r"(?i){}(?:\+.*)?$",
        MODIFIER_PATTERN
    )).unwrap();

    static ref WILDCARD_RE: Regex = Regex::new(r"(?i)^(v)?[xX*](\.[xX*])*$").unwrap();

    static ref X_RANGE_RE: Regex = Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.[xX*])+$").unwrap();

    static ref OR_CONSTRAINT_RE: Regex = Regex::new(r"\s*\|\|?\s*").unwrap();

    static ref CONSTRAINT_STABILITY_RE: Regex = Regex::new(&format!(
        r"(?i)^([^,\s]*?)@({})$",
        STABILITIES_PATTERN
    )).unwrap();

    static ref CONSTRAINT_REF_RE: Regex = Regex::new(r"(?i)^(dev-[^,\s@]+?|[^,\s@]+?\.x-dev)#.+$").unwrap();

    // Groups: 1-4 numeric segments, 5 stability, 6 stability number, 7 dev, 8 x-dev
    static ref VERSION_PATTERN: String = format!(
        r"v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(?:{}|\.([xX*][.-]?dev))(?:\+[^\s]+)?",
        MODIFIER_PATTERN
    );

    static ref TILDE_RE: Regex = Regex::new(&format!(r"(?i)^~{}$", *VERSION_PATTERN)).unwrap();

    static ref CARET_RE: Regex = Regex::new(&format!(r"(?i)^\^{}$", *VERSION_PATTERN)).unwrap();

    // Groups: 1 from (2-9 its parts), 10 to (11-18 its parts)
    static ref HYPHEN_RE: Regex = Regex::new(&format!(
        r"(?i)^(?P<from>{}) +- +(?P<to>{})$",
        *VERSION_PATTERN,
        *VERSION_PATTERN
    )).unwrap();

    static ref BASIC_COMPARATOR_RE: Regex = Regex::new(r"^(<>|!=|>=?|<=?|==?)?\s*(.*)").unwrap();
}

/// Version parser for normalizing and parsing version strings
pub struct VersionParser;

impl VersionParser {
    /// Create a new version parser
    pub fn new() -> Self {
        VersionParser
    }

    /// Check if a version string is valid
    pub fn is_valid(&self, version: &str) -> bool {
        self.normalize(version).is_ok()
    }

    /// Returns the stability of a version
    pub fn parse_stability(version: &str) -> Stability {
        let version = match version.find('#') {
            Some(pos) => &version[..pos],
            None => version,
        };

        if version.starts_with("dev-") || version.ends_with("-dev") {
            return Stability::Dev;
        }

        let version_lower = version.to_lowercase();
        if let Some(caps) = STABILITY_PARSE_RE.captures(&version_lower) {
            if caps.get(3).map_or(false, |m| !m.as_str().is_empty()) {
                return Stability::Dev;
            }

            if let Some(modifier) = caps.get(1) {
                match modifier.as_str() {
                    "beta" | "b" => return Stability::Beta,
                    "alpha" | "a" => return Stability::Alpha,
                    "rc" => return Stability::RC,
                    _ => {}
                }
            }
        }

        Stability::Stable
    }

    /// Normalize a stability string
    pub fn normalize_stability(stability: &str) -> Result<Stability, VersionParserError> {
        match stability.to_lowercase().as_str() {
            "stable" => Ok(Stability::Stable),
            "rc" => Ok(Stability::RC),
            "beta" => Ok(Stability::Beta),
            "alpha" => Ok(Stability::Alpha),
            "dev" => Ok(Stability::Dev),
            _ => Err(VersionParserError::InvalidStability(stability.to_string())),
        }
    }

    /// Extract an explicit `@stability` flag from a constraint such as `^1.0@beta`
    pub fn parse_stability_flag(constraint: &str) -> Option<Stability> {
        constraint
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter_map(|part| CONSTRAINT_STABILITY_RE.captures(part))
            .filter_map(|caps| caps.get(2))
            .filter_map(|m| Self::normalize_stability(m.as_str()).ok())
            .min()
    }

    /// Normalizes a version string to be able to perform comparisons on it
    pub fn normalize(&self, version: &str) -> Result<String, VersionParserError> {
        let orig_version = version.trim();
        if orig_version.is_empty() {
            return Err(VersionParserError::InvalidVersion(version.to_string()));
        }

        // Strip off aliasing
        let version = match ALIAS_RE.captures(orig_version) {
            Some(caps) => caps.get(1).map_or(orig_version, |m| m.as_str()),
            None => orig_version,
        };

        let version = STABILITY_FLAG_RE.replace(version, "");
        let version = match version.as_ref() {
            "master" | "trunk" | "default" => format!("dev-{}", version),
            other => other.to_string(),
        };

        if version.to_lowercase().starts_with("dev-") {
            return Ok(format!("dev-{}", &version[4..]));
        }

        if WILDCARD_RE.is_match(&version) {
            return Ok(Self::dev_ordinal_version());
        }

        let version = match BUILD_METADATA_RE.captures(&version) {
            Some(caps) => caps.get(1).map_or(version.clone(), |m| m.as_str().to_string()),
            None => version,
        };

        if let Some(caps) = CLASSICAL_VERSION_RE.captures(&version) {
            let mut result = caps.get(1).map_or("0", |m| m.as_str()).to_string();
            for index in 2..=4 {
                result.push_str(caps.get(index).map_or(".0", |m| m.as_str()));
            }
            return Ok(Self::add_version_modifiers(&caps, result, 5));
        }

        if let Some(caps) = DATE_VERSION_RE.captures(&version) {
            let result: String = caps
                .get(1)
                .map_or("", |m| m.as_str())
                .chars()
                .map(|c| if c.is_ascii_digit() { c } else { '.' })
                .collect();
            return Ok(Self::add_version_modifiers(&caps, result, 2));
        }

        if let Some(branch) = DEV_BRANCH_RE.captures(&version).and_then(|caps| caps.get(1)) {
            let normalized = self.normalize_branch(branch.as_str());
            // A branch ending with -dev is only valid if it is numeric
            if !normalized.starts_with("dev-") {
                return Ok(normalized);
            }
        }

        Err(VersionParserError::InvalidVersion(orig_version.to_string()))
    }

    fn add_version_modifiers(caps: &Captures, mut result: String, index: usize) -> String {
        if let Some(modifier) = caps.get(index) {
            let modifier_str = modifier.as_str();
            if modifier_str == "stable" {
                return result;
            }

            result.push('-');
            result.push_str(Self::expand_stability(modifier_str));

            if let Some(num) = caps.get(index + 1) {
                result.push_str(num.as_str().trim_start_matches(['.', '-']));
            }
        }

        if caps.get(index + 2).map_or(false, |m| !m.as_str().is_empty()) {
            result.push_str("-dev");
        }

        result
    }

    /// Normalizes a branch name
    pub fn normalize_branch(&self, name: &str) -> String {
        let name = name.trim();

        if let Some(caps) = BRANCH_RE.captures(name) {
            let parts: Vec<String> = (1..=4)
                .map(|i| match caps.get(i) {
                    Some(m) => m.as_str().replace(['*', 'X', 'x'], DEV_ORDINAL),
                    None => DEV_ORDINAL.to_string(),
                })
                .collect();

            return format!("{}-dev", parts.join("."));
        }

        format!("dev-{}", name)
    }

    fn dev_ordinal_version() -> String {
        format!("{0}.{0}.{0}.{0}-dev", DEV_ORDINAL)
    }

    fn expand_stability(stability: &str) -> &str {
        match stability.to_lowercase().as_str() {
            "a" | "alpha" => "alpha",
            "b" | "beta" => "beta",
            "p" | "pl" | "patch" => "patch",
            "rc" => "RC",
            _ => stability,
        }
    }

    /// Build metadata of a raw version string (`1.0.0+build.5` yields `build.5`)
    pub(crate) fn build_metadata(version: &str) -> Option<String> {
        let version = version.trim();
        if version.to_lowercase().starts_with("dev-") {
            return None;
        }
        BUILD_METADATA_RE
            .captures(version)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    /// Parse a constraint string into a constraint tree
    pub fn parse_constraints(&self, constraints: &str) -> Result<Constraint, VersionParserError> {
        let trimmed = constraints.trim();
        if trimmed.is_empty() {
            return Err(VersionParserError::ConstraintParseError {
                constraint: constraints.to_string(),
                reason: "empty constraint".to_string(),
            });
        }

        let or_constraints: Vec<&str> = OR_CONSTRAINT_RE.split(trimmed).collect();

        if or_constraints.first().map_or(false, |s| s.is_empty()) {
            return Err(VersionParserError::ConstraintParseError {
                constraint: trimmed.to_string(),
                reason: "leading operator".to_string(),
            });
        }
        if or_constraints.last().map_or(false, |s| s.is_empty()) {
            return Err(VersionParserError::ConstraintParseError {
                constraint: trimmed.to_string(),
                reason: "trailing operator".to_string(),
            });
        }

        let mut alternatives = Vec::with_capacity(or_constraints.len());
        for or_constraint in or_constraints {
            let and_constraints = split_and_constraints(or_constraint);
            if and_constraints.is_empty() {
                return Err(VersionParserError::ConstraintParseError {
                    constraint: trimmed.to_string(),
                    reason: "empty alternative".to_string(),
                });
            }

            let mut conjuncts = Vec::new();
            for and_constraint in &and_constraints {
                conjuncts.extend(self.parse_constraint(and_constraint)?);
            }
            alternatives.push(Constraint::all(conjuncts));
        }

        Ok(Constraint::any(alternatives))
    }

    fn parse_constraint(&self, constraint: &str) -> Result<Vec<Constraint>, VersionParserError> {
        let constraint = constraint.trim();

        let constraint = match ALIAS_RE.captures(constraint) {
            Some(caps) => caps.get(1).map_or(constraint, |m| m.as_str()),
            None => constraint,
        };

        // Stability flags only influence the pool, not matching
        let constraint = match CONSTRAINT_STABILITY_RE.captures(constraint) {
            Some(caps) => match caps.get(1).map(|m| m.as_str()) {
                Some(c) if !c.is_empty() => c,
                _ => "*",
            },
            None => constraint,
        };

        let constraint = match CONSTRAINT_REF_RE.captures(constraint) {
            Some(caps) => caps.get(1).map_or(constraint, |m| m.as_str()),
            None => constraint,
        };

        if WILDCARD_RE.is_match(constraint) {
            if constraint.starts_with(['v', 'V']) || constraint.contains('.') {
                return Ok(vec![Constraint::new(
                    Operator::GreaterThanOrEqual,
                    self.version("0.0.0.0-dev")?,
                )]);
            }
            return Ok(vec![Constraint::Wildcard]);
        }

        if constraint.starts_with("~>") {
            return Err(VersionParserError::ConstraintParseError {
                constraint: constraint.to_string(),
                reason: "Invalid operator \"~>\", you probably meant to use the \"~\" operator".to_string(),
            });
        }

        if let Some(caps) = TILDE_RE.captures(constraint) {
            return self.parse_tilde_constraint(&caps, constraint);
        }

        if let Some(caps) = CARET_RE.captures(constraint) {
            return self.parse_caret_constraint(&caps, constraint);
        }

        if let Some(caps) = X_RANGE_RE.captures(constraint) {
            return self.parse_x_range_constraint(&caps);
        }

        if let Some(caps) = HYPHEN_RE.captures(constraint) {
            return self.parse_hyphen_constraint(&caps);
        }

        if let Some(caps) = BASIC_COMPARATOR_RE.captures(constraint) {
            let operator = caps.get(1).map_or("=", |m| m.as_str());
            let version_str = caps.get(2).map_or("", |m| m.as_str()).trim();

            if version_str.is_empty() {
                return Err(VersionParserError::ConstraintParseError {
                    constraint: constraint.to_string(),
                    reason: "empty version".to_string(),
                });
            }

            let normalized = match self.normalize(version_str) {
                Ok(v) => v,
                Err(_) => match version_str.strip_suffix("-dev") {
                    // Recover from `foobar-dev` written instead of `dev-foobar`
                    Some(branch)
                        if !branch.is_empty()
                            && branch.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '.' || c == '/') =>
                    {
                        self.normalize(&format!("dev-{}", branch))?
                    }
                    _ => {
                        return Err(VersionParserError::ConstraintParseError {
                            constraint: constraint.to_string(),
                            reason: format!("Invalid version \"{}\"", version_str),
                        })
                    }
                },
            };

            let op: Operator = operator.parse()?;

            // `<1.0` must exclude 1.0 pre-releases and `>=1.0` include them
            let normalized = if matches!(op, Operator::LessThan | Operator::GreaterThanOrEqual)
                && !normalized.contains('-')
            {
                format!("{}-dev", normalized)
            } else {
                normalized
            };

            return Ok(vec![Constraint::new(op, self.version(&normalized)?)]);
        }

        Err(VersionParserError::ConstraintParseError {
            constraint: constraint.to_string(),
            reason: "Could not parse constraint".to_string(),
        })
    }

    fn parse_tilde_constraint(&self, caps: &Captures, constraint: &str) -> Result<Vec<Constraint>, VersionParserError> {
        let mut position = (1..=4)
            .rev()
            .find(|&i| caps.get(i).map_or(false, |m| !m.as_str().is_empty()))
            .unwrap_or(1);

        if caps.get(8).map_or(false, |m| !m.as_str().is_empty()) {
            position += 1;
        }

        let stability_suffix = Self::stability_suffix(caps, 5, 7, 8);
        let low_version = self.normalize(&format!("{}{}", &constraint[1..], stability_suffix))?;
        let lower_bound = Constraint::new(Operator::GreaterThanOrEqual, self.version(&low_version)?);

        let high_position = std::cmp::max(1, position - 1);
        let high_version = format!("{}-dev", manipulate_version_string(caps, 1, high_position, 1)?);
        let upper_bound = Constraint::new(Operator::LessThan, self.version(&high_version)?);

        Ok(vec![lower_bound, upper_bound])
    }

    fn parse_caret_constraint(&self, caps: &Captures, constraint: &str) -> Result<Vec<Constraint>, VersionParserError> {
        let part = |i: usize| caps.get(i).map(|m| m.as_str()).filter(|s| !s.is_empty());

        // The first non-zero segment is the one allowed to change
        let position = if part(1) != Some("0") || part(2).is_none() {
            1
        } else if part(2) != Some("0") || part(3).is_none() {
            2
        } else {
            3
        };

        let stability_suffix = Self::stability_suffix(caps, 5, 7, 8);
        let low_version = self.normalize(&format!("{}{}", &constraint[1..], stability_suffix))?;
        let lower_bound = Constraint::new(Operator::GreaterThanOrEqual, self.version(&low_version)?);

        let high_version = format!("{}-dev", manipulate_version_string(caps, 1, position, 1)?);
        let upper_bound = Constraint::new(Operator::LessThan, self.version(&high_version)?);

        Ok(vec![lower_bound, upper_bound])
    }

    fn parse_x_range_constraint(&self, caps: &Captures) -> Result<Vec<Constraint>, VersionParserError> {
        let position = (1..=3)
            .rev()
            .find(|&i| caps.get(i).map_or(false, |m| !m.as_str().is_empty()))
            .unwrap_or(1);

        let low_version = format!("{}-dev", manipulate_version_string(caps, 1, position, 0)?);
        let high_version = format!("{}-dev", manipulate_version_string(caps, 1, position, 1)?);
        let upper_bound = Constraint::new(Operator::LessThan, self.version(&high_version)?);

        if low_version == "0.0.0.0-dev" {
            return Ok(vec![upper_bound]);
        }

        Ok(vec![
            Constraint::new(Operator::GreaterThanOrEqual, self.version(&low_version)?),
            upper_bound,
        ])
    }

    fn parse_hyphen_constraint(&self, caps: &Captures) -> Result<Vec<Constraint>, VersionParserError> {
        let from = caps.name("from").map_or("", |m| m.as_str());
        let to = caps.name("to").map_or("", |m| m.as_str());

        let low_stability_suffix = Self::stability_suffix(caps, 6, 8, 9);
        let low_version = format!("{}{}", self.normalize(from)?, low_stability_suffix);
        let lower_bound = Constraint::new(Operator::GreaterThanOrEqual, self.version(&low_version)?);

        let non_empty = |i: usize| caps.get(i).map_or(false, |m| !m.as_str().is_empty());
        let has_patch = non_empty(12) && non_empty(13);
        let has_stability = caps.get(15).is_some() || caps.get(17).is_some() || caps.get(18).is_some();

        let upper_bound = if has_patch || has_stability {
            Constraint::new(Operator::LessThanOrEqual, self.version(&self.normalize(to)?)?)
        } else {
            self.normalize(to)?;
            let position = if non_empty(12) { 2 } else { 1 };
            let high_version = format!("{}-dev", manipulate_version_string(caps, 11, position, 1)?);
            Constraint::new(Operator::LessThan, self.version(&high_version)?)
        };

        Ok(vec![lower_bound, upper_bound])
    }

    /// `-dev` unless the version already carries a stability modifier
    fn stability_suffix(caps: &Captures, stability: usize, dev: usize, x_dev: usize) -> &'static str {
        if caps.get(stability).is_none() && caps.get(dev).is_none() && caps.get(x_dev).is_none() {
            "-dev"
        } else {
            ""
        }
    }

    fn version(&self, normalized: &str) -> Result<Version, VersionParserError> {
        Version::parse(normalized)
    }
}

impl Default for VersionParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Split constraint string by AND operators (comma or whitespace)
///
/// Operators separated from their version (`>= 1.0`), hyphen ranges
/// (`1.0 - 2.0`) and aliases (`dev-main as 1.0`) stay in one part.
fn split_and_constraints(input: &str) -> Vec<String> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut parts = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let mut part = tokens[i].to_string();

        while is_bare_operator(&part) && i + 1 < tokens.len() {
            i += 1;
            part.push_str(tokens[i]);
        }

        if i + 2 < tokens.len() && (tokens[i + 1] == "-" || tokens[i + 1] == "as") {
            part = format!("{} {} {}", part, tokens[i + 1], tokens[i + 2]);
            i += 2;
        }

        parts.push(part);
        i += 1;
    }

    parts
}

fn is_bare_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, '<' | '>' | '=' | '!' | '^' | '~'))
}

fn manipulate_version_string(
    caps: &Captures,
    first_group: usize,
    position: usize,
    increment: i64,
) -> Result<String, VersionParserError> {
    let matches: Vec<&str> = (first_group..first_group + 4)
        .map(|i| caps.get(i).map_or("0", |m| m.as_str()))
        .collect();
    manipulate_version_array(&matches, position, increment)
}

fn manipulate_version_array(matches: &[&str], position: usize, increment: i64) -> Result<String, VersionParserError> {
    let mut parts = [0i64; 4];
    for (i, s) in matches.iter().enumerate().take(4) {
        parts[i] = s.parse().unwrap_or(0);
    }

    for i in (0..4).rev() {
        if i + 1 > position {
            parts[i] = 0;
        } else if i + 1 == position && increment != 0 {
            parts[i] += increment;
            if parts[i] < 0 {
                parts[i] = 0;
                if i == 0 {
                    return Err(VersionParserError::InvalidVersion("carry overflow".to_string()));
                }
            }
        }
    }

    Ok(format!("{}.{}.{}.{}", parts[0], parts[1], parts[2], parts[3]))
}
