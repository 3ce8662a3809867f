use super::pool::{Literal, PackageId};

/// Tracks decisions made during SAT solving.
///
/// The decision map stores, per package id, `0` for undecided, `+level` for
/// installed and `-level` for not installed. Levels start at 1, which holds
/// everything implied by assertions.
#[derive(Debug, Default)]
pub struct Decisions {
    decision_map: Vec<i32>,

    /// Decisions in the order they were made, with the rule that forced them
    decision_queue: Vec<(Literal, Option<u32>)>,

    /// Rule that forced each package's decision, if any (indexed by id)
    reasons: Vec<Option<u32>>,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_package_id: usize) -> Self {
        Self {
            decision_map: vec![0; max_package_id + 1],
            decision_queue: Vec::with_capacity(max_package_id),
            reasons: vec![None; max_package_id + 1],
        }
    }

    #[inline]
    fn ensure_capacity(&mut self, id: usize) {
        if id >= self.decision_map.len() {
            self.decision_map.resize(id + 1, 0);
            self.reasons.resize(id + 1, None);
        }
    }

    #[inline]
    fn value(&self, package_id: PackageId) -> i32 {
        self.decision_map
            .get(package_id.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Record `literal` at `level`.
    ///
    /// Returns false if the package was already decided the other way.
    pub fn decide(&mut self, literal: Literal, level: u32, rule_id: Option<u32>) -> bool {
        let id = literal.unsigned_abs() as usize;
        self.ensure_capacity(id);

        let existing = self.decision_map[id];
        if existing != 0 {
            return (existing > 0) == (literal > 0);
        }

        let level = level as i32;
        self.decision_map[id] = if literal > 0 { level } else { -level };
        self.reasons[id] = rule_id;
        self.decision_queue.push((literal, rule_id));

        true
    }

    /// Check if a literal is satisfied by current decisions
    #[inline]
    pub fn satisfied(&self, literal: Literal) -> bool {
        let decision = self.value(literal);
        decision != 0 && (decision > 0) == (literal > 0)
    }

    /// Check if a literal conflicts with current decisions
    #[inline]
    pub fn conflict(&self, literal: Literal) -> bool {
        let decision = self.value(literal);
        decision != 0 && (decision > 0) != (literal > 0)
    }

    /// `Some(true)` if satisfied, `Some(false)` if violated, `None` if undecided
    #[inline]
    pub fn evaluate(&self, literal: Literal) -> Option<bool> {
        match self.value(literal) {
            0 => None,
            decision => Some((decision > 0) == (literal > 0)),
        }
    }

    #[inline]
    pub fn decided(&self, package_id: PackageId) -> bool {
        self.value(package_id) != 0
    }

    #[inline]
    pub fn undecided(&self, package_id: PackageId) -> bool {
        !self.decided(package_id)
    }

    #[inline]
    pub fn decided_install(&self, package_id: PackageId) -> bool {
        self.value(package_id) > 0
    }

    /// Level at which a literal's package was decided
    #[inline]
    pub fn decision_level(&self, literal: Literal) -> Option<u32> {
        match self.value(literal) {
            0 => None,
            decision => Some(decision.unsigned_abs()),
        }
    }

    /// Get the rule that caused a decision
    pub fn decision_rule(&self, literal: Literal) -> Option<u32> {
        if self.undecided(literal.abs()) {
            return None;
        }
        self.reasons
            .get(literal.unsigned_abs() as usize)
            .copied()
            .flatten()
    }

    /// Undo every decision made above `level`
    pub fn revert_to_level(&mut self, level: u32) {
        while let Some(&(literal, _)) = self.decision_queue.last() {
            let id = literal.unsigned_abs() as usize;
            if self.decision_map[id].unsigned_abs() <= level {
                break;
            }
            self.decision_map[id] = 0;
            self.reasons[id] = None;
            self.decision_queue.pop();
        }
    }

    /// Ids of all packages decided installed, in id order
    pub fn installed_packages(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.decision_map
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 0)
            .map(|(id, _)| id as PackageId)
    }

    pub fn queue(&self) -> &[(Literal, Option<u32>)] {
        &self.decision_queue
    }

    pub fn len(&self) -> usize {
        self.decision_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decision_queue.is_empty()
    }

    pub fn reset(&mut self) {
        self.decision_map.fill(0);
        self.reasons.fill(None);
        self.decision_queue.clear();
    }
}
