//! Version constraints

use std::fmt;
use std::str::FromStr;

use crate::version::Version;
use crate::version_parser::{VersionParser, VersionParserError};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
        }
    }

    /// The operator with any equality component removed (`>=` becomes `>`)
    fn strict(&self) -> &'static str {
        match self {
            Operator::Equal | Operator::NotEqual => "",
            Operator::LessThan | Operator::LessThanOrEqual => "<",
            Operator::GreaterThan | Operator::GreaterThanOrEqual => ">",
        }
    }

    fn is_strict(&self) -> bool {
        matches!(self, Operator::LessThan | Operator::GreaterThan)
    }
}

impl FromStr for Operator {
    type Err = VersionParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" => Ok(Operator::Equal),
            "!=" | "<>" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            _ => Err(VersionParserError::InvalidOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A version constraint tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Matches every version
    Wildcard,
    Exact(Version),
    Range(Operator, Version),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    /// Build a single comparison; `==` becomes [`Constraint::Exact`]
    pub fn new(operator: Operator, version: Version) -> Self {
        match operator {
            Operator::Equal => Constraint::Exact(version),
            _ => Constraint::Range(operator, version),
        }
    }

    /// Parse a constraint string such as `^1.2 || >=2.0,<3.0`
    pub fn parse(input: &str) -> Result<Self, VersionParserError> {
        VersionParser::new().parse_constraints(input)
    }

    /// Conjunction of all given constraints; empty input matches everything
    pub fn all(constraints: Vec<Constraint>) -> Self {
        Self::fold(constraints, |a, b| Constraint::And(Box::new(a), Box::new(b)))
    }

    /// Disjunction of all given constraints; empty input matches everything
    pub fn any(constraints: Vec<Constraint>) -> Self {
        Self::fold(constraints, |a, b| Constraint::Or(Box::new(a), Box::new(b)))
    }

    fn fold(constraints: Vec<Constraint>, join: impl Fn(Constraint, Constraint) -> Constraint) -> Self {
        let mut iter = constraints.into_iter();
        match iter.next() {
            None => Constraint::Wildcard,
            Some(first) => iter.fold(first, join),
        }
    }

    /// Check whether a concrete version satisfies this constraint
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Constraint::Wildcard => true,
            Constraint::Exact(v) => version_compare(version, v, Operator::Equal),
            Constraint::Range(op, v) => version_compare(version, v, *op),
            Constraint::And(a, b) => a.matches(version) && b.matches(version),
            Constraint::Or(a, b) => a.matches(version) || b.matches(version),
        }
    }

    /// Check whether some version could satisfy both constraints
    pub fn intersects(&self, other: &Constraint) -> bool {
        match (self, other) {
            (Constraint::Wildcard, _) | (_, Constraint::Wildcard) => true,
            (Constraint::Or(a, b), _) => a.intersects(other) || b.intersects(other),
            (_, Constraint::Or(a, b)) => self.intersects(a) || self.intersects(b),
            (Constraint::And(a, b), _) => a.intersects(other) && b.intersects(other),
            (_, Constraint::And(a, b)) => self.intersects(a) && self.intersects(b),
            _ => match (self.as_simple(), other.as_simple()) {
                (Some((op_a, va)), Some((op_b, vb))) => match_specific(op_a, va, op_b, vb),
                _ => false,
            },
        }
    }

    fn as_simple(&self) -> Option<(Operator, &Version)> {
        match self {
            Constraint::Exact(v) => Some((Operator::Equal, v)),
            Constraint::Range(op, v) => Some((*op, v)),
            _ => None,
        }
    }

    fn collect_and<'a>(&'a self, out: &mut Vec<&'a Constraint>) {
        match self {
            Constraint::And(a, b) => {
                a.collect_and(out);
                b.collect_and(out);
            }
            other => out.push(other),
        }
    }

    fn collect_or<'a>(&'a self, out: &mut Vec<&'a Constraint>) {
        match self {
            Constraint::Or(a, b) => {
                a.collect_or(out);
                b.collect_or(out);
            }
            other => out.push(other),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Wildcard => write!(f, "*"),
            Constraint::Exact(v) => write!(f, "== {}", v),
            Constraint::Range(op, v) => write!(f, "{} {}", op, v),
            Constraint::And(..) => {
                let mut parts = Vec::new();
                self.collect_and(&mut parts);
                let rendered: Vec<String> = parts.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", rendered.join(" "))
            }
            Constraint::Or(..) => {
                let mut parts = Vec::new();
                self.collect_or(&mut parts);
                let rendered: Vec<String> = parts.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", rendered.join(" || "))
            }
        }
    }
}

impl FromStr for Constraint {
    type Err = VersionParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::parse(s)
    }
}

/// Compare `a` against `b` with the given operator.
///
/// Named branches only ever compare equal to themselves; they never satisfy
/// an ordering comparison against a numeric version.
pub fn version_compare(a: &Version, b: &Version, operator: Operator) -> bool {
    let a_is_branch = a.is_branch();
    let b_is_branch = b.is_branch();

    if operator == Operator::NotEqual && (a_is_branch || b_is_branch) {
        return a.normalized() != b.normalized();
    }

    if a_is_branch && b_is_branch {
        return operator == Operator::Equal && a.normalized() == b.normalized();
    }

    if a_is_branch || b_is_branch {
        return false;
    }

    match operator {
        Operator::Equal => a == b,
        Operator::NotEqual => a != b,
        Operator::LessThan => a < b,
        Operator::LessThanOrEqual => a <= b,
        Operator::GreaterThan => a > b,
        Operator::GreaterThanOrEqual => a >= b,
    }
}

/// Whether two single comparisons `op_a va` and `op_b vb` share a version
fn match_specific(op_a: Operator, va: &Version, op_b: Operator, vb: &Version) -> bool {
    let a_equal = op_a == Operator::Equal;
    let a_not_equal = op_a == Operator::NotEqual;
    let b_equal = op_b == Operator::Equal;
    let b_not_equal = op_b == Operator::NotEqual;

    if a_not_equal || b_not_equal {
        if a_not_equal && !b_not_equal && !b_equal && vb.is_branch() {
            return false;
        }
        if b_not_equal && !a_not_equal && !a_equal && va.is_branch() {
            return false;
        }
        if !a_equal && !b_equal {
            return true;
        }
        return version_compare(vb, va, Operator::NotEqual);
    }

    // Two ranges pointing the same direction always overlap
    if !a_equal && op_a.strict() == op_b.strict() {
        return !(va.is_branch() || vb.is_branch());
    }

    let (left, right, operator) = if a_equal { (va, vb, op_b) } else { (vb, va, op_a) };

    if version_compare(left, right, operator) {
        // `>= 1.0` against `< 1.0` touches at 1.0 but shares nothing
        return !(op_b.is_strict() && !op_a.is_strict() && va == vb);
    }

    false
}
