use std::collections::HashMap;
use std::fmt;

use super::rule::{Rule, RuleType};

/// Collection of SAT rules.
///
/// Rules get sequential ids in insertion order, which is also the order the
/// solver scans them when choosing what to decide next. Adding a rule whose
/// literals already exist returns the existing id.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,

    /// Rules by type for iteration
    rules_by_type: HashMap<RuleType, Vec<u32>>,

    /// Literal hash -> ids, for deduplication
    rule_hashes: HashMap<u64, Vec<u32>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to the set, returning its ID.
    ///
    /// Empty rules are never merged: each one stands for a different
    /// unsatisfiable job.
    pub fn add(&mut self, mut rule: Rule) -> u32 {
        let hash = rule.literal_hash();
        if !rule.is_empty() {
            if let Some(ids) = self.rule_hashes.get(&hash) {
                for &existing_id in ids {
                    if self.rules[existing_id as usize].equals_literals(&rule) {
                        return existing_id;
                    }
                }
            }
        }

        let id = self.rules.len() as u32;
        rule.set_id(id);

        self.rules_by_type.entry(rule.rule_type()).or_default().push(id);
        self.rule_hashes.entry(hash).or_default().push(id);
        self.rules.push(rule);

        id
    }

    pub fn get(&self, id: u32) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Rule> {
        self.rules.get_mut(id as usize)
    }

    pub fn rules_of_type(&self, rule_type: RuleType) -> impl Iterator<Item = &Rule> {
        self.rules_by_type
            .get(&rule_type)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.get(id))
    }

    /// All rules in id order
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count_by_type(&self, rule_type: RuleType) -> usize {
        self.rules_by_type.get(&rule_type).map_or(0, Vec::len)
    }

    pub fn disable(&mut self, id: u32) {
        if let Some(rule) = self.get_mut(id) {
            rule.disable();
        }
    }

    pub fn enable(&mut self, id: u32) {
        if let Some(rule) = self.get_mut(id) {
            rule.enable();
        }
    }

    pub fn stats(&self) -> RuleSetStats {
        let mut stats = RuleSetStats {
            total: self.rules.len(),
            ..Default::default()
        };

        for rule in &self.rules {
            match rule.rule_type() {
                RuleType::RootRequire => stats.root_require += 1,
                RuleType::Fixed => stats.fixed += 1,
                RuleType::JobRemove => stats.remove += 1,
                RuleType::PackageRequires => stats.requires += 1,
                RuleType::PackageConflict => stats.conflict += 1,
                RuleType::PackageSameName => stats.same_name += 1,
                RuleType::Learned => stats.learned += 1,
            }

            if rule.is_assertion() {
                stats.assertions += 1;
            }
        }

        stats
    }
}

/// Statistics about a rule set
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleSetStats {
    pub total: usize,
    pub assertions: usize,
    pub root_require: usize,
    pub fixed: usize,
    pub remove: usize,
    pub requires: usize,
    pub conflict: usize,
    pub same_name: usize,
    pub learned: usize,
}

impl fmt::Display for RuleSetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rules ({} root-require, {} fixed, {} remove, {} requires, {} conflict, {} same-name, {} learned; {} assertions)",
            self.total,
            self.root_require,
            self.fixed,
            self.remove,
            self.requires,
            self.conflict,
            self.same_name,
            self.learned,
            self.assertions
        )
    }
}
