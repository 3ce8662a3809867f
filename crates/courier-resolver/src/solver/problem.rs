use std::fmt;

use indexmap::{IndexMap, IndexSet};

use super::pool::{PackageId, Pool};
use super::rule::{Rule, RuleType};

/// A problem encountered during dependency resolution.
///
/// Problems explain why a solution cannot be found. Rules are rendered when
/// they are added, so a problem outlives the pool it was built from.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    /// Rules involved in this problem
    pub rules: Vec<ProblemRule>,
}

/// A rule that contributes to a problem
#[derive(Debug, Clone)]
pub struct ProblemRule {
    pub rule_id: u32,
    pub rule_type: RuleType,
    /// Source package name and version
    pub source: Option<String>,
    /// Required, conflicting or removed name
    pub target: Option<String>,
    /// Constraint as written
    pub constraint: Option<String>,
    /// Human-readable explanation
    pub message: String,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, rendering its explanation against the pool.
    ///
    /// A rule already part of this problem is ignored.
    pub fn add_rule(&mut self, rule: &Rule, pool: &Pool) {
        if self.rules.iter().any(|r| r.rule_id == rule.id()) {
            return;
        }

        let source = rule
            .source_package()
            .and_then(|id| pool.package(id))
            .map(|p| p.pretty_string());

        self.rules.push(ProblemRule {
            rule_id: rule.id(),
            rule_type: rule.rule_type(),
            source,
            target: rule.target_name().map(String::from),
            constraint: rule.pretty_constraint().map(String::from),
            message: describe_rule(rule, pool),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Explanations of this problem's rules, without duplicates
    pub fn messages(&self) -> Vec<String> {
        let unique: IndexSet<&str> = self.rules.iter().map(|r| r.message.as_str()).collect();
        unique.into_iter().map(String::from).collect()
    }

    /// Generate a human-readable description of this problem
    pub fn describe(&self) -> String {
        self.messages()
            .iter()
            .map(|m| format!("  - {}", m))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Collection of problems encountered during solving
#[derive(Debug, Clone, Default)]
pub struct ProblemSet {
    problems: Vec<Problem>,
}

impl ProblemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn summary(&self) -> &'static str {
        "Your requirements could not be resolved to an installable set of packages."
    }

    /// One message per distinct cause, in the order the problems were found.
    ///
    /// Never empty for a non-empty set.
    pub fn messages(&self) -> Vec<String> {
        let mut unique: IndexSet<String> = IndexSet::new();
        for problem in &self.problems {
            unique.extend(problem.messages());
        }

        if unique.is_empty() && !self.problems.is_empty() {
            unique.insert("The request could not be satisfied by any combination of packages".to_string());
        }

        unique.into_iter().collect()
    }

    /// Generate a complete description of all problems
    pub fn describe(&self) -> String {
        if self.problems.is_empty() {
            return "No problems found".to_string();
        }

        let blocks: Vec<String> = self
            .problems
            .iter()
            .enumerate()
            .map(|(i, p)| format!("  Problem {}\n{}", i + 1, p.describe()))
            .collect();

        format!("{}\n\n{}", self.summary(), blocks.join("\n"))
    }
}

impl fmt::Display for ProblemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s) found", self.problems.len())
    }
}

/// Describe a rule in human-readable form
fn describe_rule(rule: &Rule, pool: &Pool) -> String {
    let target = rule.target_name().unwrap_or("unknown");
    let constraint = rule.pretty_constraint().unwrap_or("*");
    let source = || {
        rule.source_package()
            .map(|id| pool.literal_to_pretty_string(id))
            .unwrap_or_else(|| "unknown".to_string())
    };

    match rule.rule_type() {
        RuleType::RootRequire => {
            let subject = format!("Root requires {} {}", target, constraint);
            explain_requirement(subject, rule, rule.literals(), pool)
        }
        RuleType::PackageRequires => {
            let subject = format!("{} requires {} {}", source(), target, constraint);
            let candidates: Vec<PackageId> = rule.literals().iter().skip(1).copied().collect();
            explain_requirement(subject, rule, &candidates, pool)
        }
        RuleType::Fixed => match rule.literals().first() {
            Some(&id) => format!("{} is fixed and cannot be changed", pool.literal_to_pretty_string(id)),
            None => format!("{} is fixed but is not available", target),
        },
        RuleType::JobRemove => format!("{} is marked for removal", source()),
        RuleType::PackageConflict => {
            let other = rule
                .literals()
                .get(1)
                .map(|&l| pool.literal_to_pretty_string(l))
                .unwrap_or_else(|| target.to_string());
            format!("{} conflicts with {} ({})", source(), other, constraint)
        }
        RuleType::PackageSameName => {
            let packages: Vec<_> = rule
                .literals()
                .iter()
                .filter_map(|&l| pool.package(Pool::literal_to_id(l)))
                .collect();
            let listed: Vec<String> = packages.iter().map(|p| p.pretty_string()).collect();
            let mut message = format!("Only one of these can be installed: {}.", listed.join(", "));

            if let Some(replacer) = packages.iter().find(|p| p.name() != target) {
                message.push_str(&format!(
                    " {} replaces {} and thus cannot coexist with it.",
                    replacer.pretty_name(),
                    target
                ));
            }
            message
        }
        RuleType::Learned => {
            let parts: Vec<String> = rule
                .literals()
                .iter()
                .map(|&l| {
                    let verb = if Pool::literal_is_positive(l) { "install" } else { "don't install" };
                    format!("{} {}", verb, pool.literal_to_pretty_string(l))
                })
                .collect();
            format!("Conclusion: {}", parts.join(" | "))
        }
    }
}

/// Explain a requirement given its candidate ids, or why there are none
fn explain_requirement(subject: String, rule: &Rule, candidates: &[PackageId], pool: &Pool) -> String {
    if !candidates.is_empty() {
        return format!("{} -> satisfiable by {}.", subject, pretty_versions(pool, candidates));
    }

    let Some(target) = rule.target_name() else {
        return format!("{} -> no matching package found.", subject);
    };

    let unacceptable = pool.what_provides(target, rule.constraint(), true);
    if !unacceptable.is_empty() {
        return format!(
            "{} -> found {} but these do not match the minimum stability ({}).",
            subject,
            pretty_versions(pool, &unacceptable),
            pool.minimum_stability()
        );
    }

    let any_version = pool.what_provides(target, None, true);
    if !any_version.is_empty() {
        return format!(
            "{} -> found {} but it does not match the constraint.",
            subject,
            pretty_versions(pool, &any_version)
        );
    }

    format!(
        "{} -> no package named {} exists in any version, there may be a typo in the package name.",
        subject, target
    )
}

/// `vendor/a[1.0, 1.1], vendor/b[2.0]`
fn pretty_versions(pool: &Pool, ids: &[PackageId]) -> String {
    let mut grouped: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for &id in ids {
        if let Some(package) = pool.package(id) {
            grouped
                .entry(package.pretty_name())
                .or_default()
                .push(package.pretty_version());
        }
    }

    grouped
        .iter()
        .map(|(name, versions)| format!("{}[{}]", name, versions.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}
