use std::fmt;
use std::hash::{Hash, Hasher};

use courier_semver::Constraint;

use super::pool::{Literal, PackageId};

/// Why a rule exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    /// A requirement of a registered root
    RootRequire,
    /// Package pinned at its current version (platform packages, roots)
    Fixed,
    /// Package the request marks for removal
    JobRemove,
    /// Package dependency: if A is installed, then B|C|D must be installed
    PackageRequires,
    /// Package conflict: A and B cannot both be installed
    PackageConflict,
    /// Two packages occupying the same name: at most one can be installed
    PackageSameName,
    /// Learned clause from conflict analysis
    Learned,
}

impl RuleType {
    /// Rules derived from the request rather than from package metadata
    pub fn is_job(&self) -> bool {
        matches!(self, RuleType::RootRequire | RuleType::Fixed | RuleType::JobRemove)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::RootRequire => "root-require",
            RuleType::Fixed => "fixed",
            RuleType::JobRemove => "remove",
            RuleType::PackageRequires => "requires",
            RuleType::PackageConflict => "conflict",
            RuleType::PackageSameName => "same-name",
            RuleType::Learned => "learned",
        }
    }
}

/// A SAT rule (clause) representing a dependency constraint.
///
/// Rules are disjunctions (OR) of literals. A rule is satisfied when
/// at least one of its literals is true.
///
/// # Examples
///
/// - `[A]` - Package A must be installed (assertion)
/// - `[-A]` - Package A must not be installed
/// - `[-A, B, C]` - If A is installed, then B or C must be installed
/// - `[-A, -B]` - A and B cannot both be installed (conflict)
/// - `[]` - Cannot be satisfied (a root requirement nothing matches)
#[derive(Clone)]
pub struct Rule {
    literals: Vec<Literal>,
    rule_type: RuleType,
    /// Rule ID (assigned by RuleSet)
    id: u32,
    /// Package whose metadata produced the rule
    source_package: Option<PackageId>,
    /// Name the rule is about (required, conflicting or removed name)
    target_name: Option<String>,
    constraint: Option<Constraint>,
    pretty_constraint: Option<String>,
    disabled: bool,
}

impl Rule {
    pub fn new(literals: Vec<Literal>, rule_type: RuleType) -> Self {
        Self {
            literals,
            rule_type,
            id: 0,
            source_package: None,
            target_name: None,
            constraint: None,
            pretty_constraint: None,
            disabled: false,
        }
    }

    /// Create a requirement rule: if source is installed, one of targets must be
    pub fn requires(source: PackageId, targets: Vec<PackageId>) -> Self {
        let mut literals = vec![-source];
        literals.extend(targets);
        Self::new(literals, RuleType::PackageRequires).with_source(source)
    }

    /// Create a conflict rule: the two packages cannot both be installed
    pub fn conflict(source: PackageId, target: PackageId) -> Self {
        Self::new(vec![-source, -target], RuleType::PackageConflict).with_source(source)
    }

    /// Create a same-name rule: only one of the two can be installed
    pub fn same_name(a: PackageId, b: PackageId) -> Self {
        Self::new(vec![-a, -b], RuleType::PackageSameName).with_source(a)
    }

    /// Create a root requirement rule: one of the candidates must be installed
    pub fn root_require(candidates: Vec<PackageId>) -> Self {
        Self::new(candidates, RuleType::RootRequire)
    }

    /// Create a fixed package rule; `None` means the package is not in the pool
    pub fn fixed(package: Option<PackageId>) -> Self {
        Self::new(package.into_iter().collect(), RuleType::Fixed)
    }

    pub fn remove(package: PackageId) -> Self {
        Self::new(vec![-package], RuleType::JobRemove).with_source(package)
    }

    pub fn learned(literals: Vec<Literal>) -> Self {
        Self::new(literals, RuleType::Learned)
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Set source package for error messages
    pub fn with_source(mut self, package: PackageId) -> Self {
        self.source_package = Some(package);
        self
    }

    /// Set target name for error messages
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// Set the constraint (parsed and as written) for error messages
    pub fn with_constraint(mut self, constraint: Constraint, pretty: impl Into<String>) -> Self {
        self.constraint = Some(constraint);
        self.pretty_constraint = Some(pretty.into());
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn source_package(&self) -> Option<PackageId> {
        self.source_package
    }

    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    pub fn pretty_constraint(&self) -> Option<&str> {
        self.pretty_constraint.as_deref()
    }

    /// Check if this is an assertion (single literal)
    pub fn is_assertion(&self) -> bool {
        self.literals.len() == 1
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Get a hash of this rule's literals for deduplication
    pub fn literal_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();

        let mut sorted = self.literals.clone();
        sorted.sort_unstable();
        sorted.hash(&mut hasher);

        hasher.finish()
    }

    /// Check if two rules have the same literals (regardless of order)
    pub fn equals_literals(&self, other: &Rule) -> bool {
        if self.literals.len() != other.literals.len() {
            return false;
        }

        let mut a = self.literals.clone();
        let mut b = other.literals.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule({:?}, {:?})", self.rule_type, self.literals)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literals: Vec<String> = self
            .literals
            .iter()
            .map(|&l| if l > 0 { format!("+{}", l) } else { l.to_string() })
            .collect();

        write!(f, "({}) [{}]", self.rule_type.as_str(), literals.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_requires() {
        let rule = Rule::requires(1, vec![2, 3, 4]);
        assert_eq!(rule.literals(), &[-1, 2, 3, 4]);
        assert_eq!(rule.rule_type(), RuleType::PackageRequires);
        assert_eq!(rule.source_package(), Some(1));
    }

    #[test]
    fn test_rule_requires_without_candidates() {
        let rule = Rule::requires(7, vec![]);
        assert!(rule.is_assertion());
        assert_eq!(rule.literals(), &[-7]);
    }

    #[test]
    fn test_rule_conflict_and_same_name() {
        assert_eq!(Rule::conflict(1, 2).literals(), &[-1, -2]);
        assert_eq!(Rule::same_name(3, 4).rule_type(), RuleType::PackageSameName);
    }

    #[test]
    fn test_job_rules() {
        assert_eq!(Rule::fixed(Some(5)).literals(), &[5]);
        assert!(Rule::fixed(None).is_empty());
        assert_eq!(Rule::remove(5).literals(), &[-5]);
        assert!(Rule::root_require(vec![1, 2]).rule_type().is_job());
        assert!(!RuleType::Learned.is_job());
    }

    #[test]
    fn test_rule_metadata() {
        let rule = Rule::root_require(vec![1])
            .with_target("vendor/a")
            .with_constraint(Constraint::parse(">=2.0").unwrap(), ">=2.0");

        assert_eq!(rule.target_name(), Some("vendor/a"));
        assert_eq!(rule.pretty_constraint(), Some(">=2.0"));
        assert!(rule.constraint().is_some());
    }

    #[test]
    fn test_rule_literal_hash() {
        let rule1 = Rule::new(vec![1, 2, 3], RuleType::PackageRequires);
        let rule2 = Rule::new(vec![3, 1, 2], RuleType::PackageRequires);
        let rule3 = Rule::new(vec![1, 2, 4], RuleType::PackageRequires);

        assert_eq!(rule1.literal_hash(), rule2.literal_hash());
        assert_ne!(rule1.literal_hash(), rule3.literal_hash());
        assert!(rule1.equals_literals(&rule2));
        assert!(!rule1.equals_literals(&rule3));
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::requires(1, vec![2, 3]);
        assert_eq!(rule.to_string(), "(requires) [-1 | +2 | +3]");
    }
}
