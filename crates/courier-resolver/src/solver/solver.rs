use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use super::decisions::Decisions;
use super::policy::Policy;
use super::pool::{Literal, PackageId, Pool};
use super::problem::{Problem, ProblemSet};
use super::request::Request;
use super::rule::{Rule, RuleType};
use super::rule_generator::RuleGenerator;
use super::rule_set::RuleSet;
use super::transaction::Transaction;
use super::watch_graph::WatchGraph;

use crate::config::DEFAULT_MAX_STEPS;
use crate::error::{ResolverError, Result};
use crate::package::Package;
use crate::repository::Repository;

/// The main SAT solver for dependency resolution.
///
/// Implements a CDCL (Conflict-Driven Clause Learning) algorithm
/// adapted for package dependency resolution.
pub struct Solver<'a> {
    pool: &'a Pool,
    policy: &'a Policy,
    /// Upper bound on decisions plus analyzed conflicts
    max_steps: usize,
}

impl<'a> Solver<'a> {
    pub fn new(pool: &'a Pool, policy: &'a Policy) -> Self {
        Self {
            pool,
            policy,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Solve the request and diff the result against `installed`.
    pub fn solve(&self, request: &Request, installed: &dyn Repository) -> Result<Transaction> {
        let result = self.resolve(request)?;
        let transaction = Transaction::from_packages(installed.packages(), result)?;
        log::info!("Resolution finished: {}", transaction.summary());
        Ok(transaction)
    }

    /// Solve the request, returning every package the solution installs
    /// (sorted by name).
    pub fn resolve(&self, request: &Request) -> Result<Vec<Arc<Package>>> {
        log::debug!("Generating rules for {} pool packages", self.pool.len());
        let rules = RuleGenerator::new(self.pool).generate(request);

        let mut state = SolverState::new(rules, self.pool.len());

        log::debug!("Resolving dependencies through SAT");
        let start = Instant::now();
        self.run_sat(&mut state, request)?;

        if !state.problems.is_empty() {
            log::debug!(
                "SAT solving failed after {} steps in {:?} with {} problem(s)",
                state.steps,
                start.elapsed(),
                state.problems.len()
            );
            return Err(ResolverError::SolverConflict(state.problems));
        }

        log::debug!(
            "Dependency resolution completed in {:.3} seconds ({} steps, {} learned rules)",
            start.elapsed().as_secs_f64(),
            state.steps,
            state.rules.count_by_type(RuleType::Learned)
        );

        Ok(self.build_result(&state))
    }

    /// Main SAT loop:
    /// 1. Decide assertions and propagate
    /// 2. Fulfill job rules, then every other unresolved rule
    /// 3. Keep installed packages nothing forced out
    /// 4. On conflict: learn a rule and backjump
    fn run_sat(&self, state: &mut SolverState, request: &Request) -> Result<()> {
        self.make_assertion_decisions(state);

        let mut level: u32 = 1;
        let mut system_level: u32 = level + 1;

        loop {
            if level == 1 {
                if let Some(conflict) = self.propagate(state, level) {
                    log::debug!("Conflict at level 1: rule {} is unsolvable", conflict);
                    self.analyze_unsolvable(state, conflict);
                    return Ok(());
                }
            }

            // Job rules first
            if level < system_level {
                let mut interrupted = false;
                let job_rules: Vec<u32> = state
                    .rules
                    .iter()
                    .filter(|r| r.rule_type().is_job())
                    .map(Rule::id)
                    .collect();

                for rule_id in job_rules {
                    let Some(queue) = job_decision_queue(state, rule_id) else {
                        continue;
                    };

                    let previous = level;
                    level = self.select_and_install(state, request, level, queue, Some(rule_id))?;
                    if level == 0 {
                        return Ok(());
                    }
                    if level <= previous {
                        interrupted = true;
                        break;
                    }
                }

                if interrupted {
                    system_level = level + 1;
                    continue;
                }
                system_level = level;
            }

            // Every other rule whose source is installed but which is not yet fulfilled
            if let Some((rule_id, queue)) = next_unfulfilled_rule(state) {
                level = self.select_and_install(state, request, level, queue, Some(rule_id))?;
                if level == 0 {
                    return Ok(());
                }
                continue;
            }

            // Keep installed packages nothing has decided on
            if let Some(queue) = self.keep_installed_queue(state, request) {
                level = self.select_and_install(state, request, level, queue, None)?;
                if level == 0 {
                    return Ok(());
                }
                continue;
            }

            return Ok(());
        }
    }

    /// Decide every assertion at level 1.
    ///
    /// An empty rule or an assertion contradicting an earlier one becomes a
    /// problem; the offending job rules are disabled and solving goes on
    /// without them so that all such problems get reported together.
    fn make_assertion_decisions(&self, state: &mut SolverState) {
        for id in 0..state.rules.len() as u32 {
            let Some(rule) = state.rules.get(id) else {
                continue;
            };
            if rule.is_empty() && !rule.is_disabled() {
                let mut problem = Problem::new();
                problem.add_rule(rule, self.pool);
                state.problems.add(problem);
                state.rules.disable(id);
            }
        }

        let mut index = 0usize;
        while index < state.rules.len() {
            let id = index as u32;
            index += 1;

            let (literal, rule_type) = match state.rules.get(id) {
                Some(rule) if rule.is_assertion() && !rule.is_disabled() => (rule.literals()[0], rule.rule_type()),
                _ => continue,
            };

            if state.decisions.undecided(literal.abs()) {
                state.decisions.decide(literal, 1, Some(id));
                continue;
            }
            if state.decisions.satisfied(literal) {
                continue;
            }

            if rule_type == RuleType::Learned {
                state.rules.disable(id);
                continue;
            }

            let conflict = state.decisions.decision_rule(literal);
            let mut problem = Problem::new();
            if let Some(rule) = state.rules.get(id) {
                problem.add_rule(rule, self.pool);
            }
            if let Some(rule) = conflict.and_then(|c| state.rules.get(c)) {
                problem.add_rule(rule, self.pool);
            }

            let conflict_is_package = conflict
                .and_then(|c| state.rules.get(c))
                .map_or(false, |r| !r.rule_type().is_job());

            if conflict_is_package {
                log::debug!("Assertion {} contradicts a package rule", id);
                state.rules.disable(id);
                state.problems.add(problem);
                continue;
            }

            // Two jobs disagree: drop every job asserting this package and start over
            let clashing: Vec<u32> = state
                .rules
                .iter()
                .filter(|r| {
                    r.rule_type().is_job()
                        && r.is_assertion()
                        && !r.is_disabled()
                        && r.literals()[0].abs() == literal.abs()
                })
                .map(Rule::id)
                .collect();

            for &job in &clashing {
                if let Some(rule) = state.rules.get(job) {
                    problem.add_rule(rule, self.pool);
                }
                state.rules.disable(job);
            }
            if clashing.is_empty() {
                state.rules.disable(id);
            }

            log::debug!("Assertion {} contradicts job rules {:?}, restarting", id, clashing);
            state.problems.add(problem);
            state.decisions.reset();
            state.propagate_index = 0;
            index = 0;
        }
    }

    /// Propagate every decision not yet propagated; returns a violated rule
    fn propagate(&self, state: &mut SolverState, level: u32) -> Option<u32> {
        while state.propagate_index < state.decisions.len() {
            let (literal, _) = state.decisions.queue()[state.propagate_index];
            state.propagate_index += 1;

            let conflict =
                state
                    .watch_graph
                    .propagate_literal(literal, level, &state.rules, &mut state.decisions);
            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    /// Order the candidates with the policy and decide the best one
    fn select_and_install(
        &self,
        state: &mut SolverState,
        request: &Request,
        level: u32,
        mut queue: Vec<PackageId>,
        rule_id: Option<u32>,
    ) -> Result<u32> {
        // A fixed package among the candidates leaves no choice
        let fixed: Vec<PackageId> = queue.iter().copied().filter(|id| state.fixed.contains(id)).collect();
        if !fixed.is_empty() {
            queue = fixed;
        }

        let required_name = rule_id
            .and_then(|id| state.rules.get(id))
            .and_then(Rule::target_name)
            .map(str::to_string)
            .or_else(|| queue.first().and_then(|&id| self.pool.package(id)).map(|p| p.name().to_string()))
            .unwrap_or_default();

        let sorted = self.policy.select_preferred(self.pool, request, &required_name, &queue);
        let Some(&selected) = sorted.first().or(queue.first()) else {
            return Ok(level);
        };

        log::trace!(
            "Deciding {} at level {} ({} alternatives)",
            self.pool.literal_to_pretty_string(selected),
            level + 1,
            sorted.len().saturating_sub(1)
        );

        self.set_propagate_learn(state, level, selected, None)
    }

    /// Decide `literal` on a new level and propagate, learning from conflicts
    fn set_propagate_learn(
        &self,
        state: &mut SolverState,
        level: u32,
        literal: Literal,
        rule_id: Option<u32>,
    ) -> Result<u32> {
        self.step(state)?;

        let mut level = level + 1;
        state.decisions.decide(literal, level, rule_id);

        while let Some(conflict) = self.propagate(state, level) {
            self.step(state)?;

            if level == 1 {
                self.analyze_unsolvable(state, conflict);
                return Ok(0);
            }

            let (learned_literal, new_level, learned, why) = self.analyze(state, level, conflict)?;
            if new_level == 0 || new_level >= level {
                return Err(ResolverError::Internal(format!(
                    "trying to revert to invalid level {} from level {}",
                    new_level, level
                )));
            }

            self.revert(state, new_level);

            let before = state.rules.len();
            let learned_id = state.rules.add(Rule::learned(learned));
            if state.rules.len() > before {
                if let Some(rule) = state.rules.get(learned_id) {
                    log::trace!("Learned {} at level {}", rule, new_level);
                    state.watch_graph.insert(rule, Some(&state.decisions));
                }
                state.learned_why.insert(learned_id, why);
            }

            state.decisions.decide(learned_literal, new_level, Some(learned_id));
            level = new_level;
        }

        Ok(level)
    }

    fn step(&self, state: &mut SolverState) -> Result<()> {
        state.steps += 1;
        if state.steps > self.max_steps {
            log::debug!("Step budget of {} exhausted", self.max_steps);
            return Err(ResolverError::SolverTimeout { steps: state.steps });
        }
        Ok(())
    }

    /// Undo every decision above `level`
    fn revert(&self, state: &mut SolverState, level: u32) {
        state.decisions.revert_to_level(level);
        state.propagate_index = state.decisions.len();
    }

    /// First-UIP conflict analysis.
    ///
    /// Returns the literal to assert after backjumping, the level to jump to,
    /// the learned rule's literals and the rules it was derived from.
    fn analyze(
        &self,
        state: &SolverState,
        level: u32,
        conflict: u32,
    ) -> Result<(Literal, u32, Vec<Literal>, Vec<u32>)> {
        let bug = |what: &str| ResolverError::Internal(format!("conflict analysis {}", what));

        let mut rule_id = conflict;
        let mut rule_level: u32 = 1;
        let mut num: usize = 0;
        let mut l1num: isize = 0;
        let mut seen: HashSet<PackageId> = HashSet::new();
        let mut learned: Vec<Literal> = vec![0];
        let mut why: Vec<u32> = Vec::new();
        let queue = state.decisions.queue();
        let mut decision_id = queue.len();

        'analyze: loop {
            why.push(rule_id);
            let rule = state.rules.get(rule_id).ok_or_else(|| bug("reached an unknown rule"))?;

            for &literal in rule.literals() {
                // the one true literal
                if state.decisions.satisfied(literal) {
                    continue;
                }
                if !seen.insert(literal.abs()) {
                    continue;
                }

                let l = state.decisions.decision_level(literal).unwrap_or(0);
                if l == 1 {
                    l1num += 1;
                } else if l == level {
                    num += 1;
                } else {
                    learned.push(literal);
                    rule_level = rule_level.max(l);
                }
            }

            let mut l1retry = true;
            let mut literal = 0;
            while l1retry {
                l1retry = false;

                if num == 0 {
                    l1num -= 1;
                    if l1num == 0 {
                        break 'analyze;
                    }
                }

                literal = loop {
                    if decision_id == 0 {
                        return Err(bug("ran out of decisions"));
                    }
                    decision_id -= 1;
                    let (decided, _) = queue[decision_id];
                    if seen.contains(&decided.abs()) {
                        break decided;
                    }
                };
                seen.remove(&literal.abs());

                let found_uip = if num != 0 {
                    num -= 1;
                    num == 0
                } else {
                    false
                };

                if found_uip {
                    learned[0] = -literal;
                    if l1num == 0 {
                        break 'analyze;
                    }
                    for other in &learned[1..] {
                        seen.remove(&other.abs());
                    }
                    // only level 1 marks left
                    l1num += 1;
                    l1retry = true;
                }
            }

            rule_id = queue[decision_id]
                .1
                .ok_or_else(|| bug(&format!("found no reason for {}", literal)))?;
        }

        if learned[0] == 0 {
            return Err(bug("found no unique implication point"));
        }

        Ok((learned[0], rule_level, learned, why))
    }

    /// Record why a level 1 conflict cannot be resolved
    fn analyze_unsolvable(&self, state: &mut SolverState, conflict: u32) {
        let mut problem = Problem::new();
        let mut rules_seen: HashSet<u32> = HashSet::new();
        self.add_problem_rule(state, &mut problem, conflict, &mut rules_seen);

        let mut seen: HashSet<PackageId> = HashSet::new();
        if let Some(rule) = state.rules.get(conflict) {
            for &literal in rule.literals() {
                if !state.decisions.satisfied(literal) {
                    seen.insert(literal.abs());
                }
            }
        }

        for &(literal, reason) in state.decisions.queue().iter().rev() {
            if !seen.contains(&literal.abs()) {
                continue;
            }
            let Some(reason) = reason else {
                continue;
            };

            self.add_problem_rule(state, &mut problem, reason, &mut rules_seen);
            if let Some(rule) = state.rules.get(reason) {
                for &l in rule.literals() {
                    if !state.decisions.satisfied(l) {
                        seen.insert(l.abs());
                    }
                }
            }
        }

        state.problems.add(problem);
    }

    /// Add a rule to a problem, replacing learned rules by the rules they came from
    fn add_problem_rule(&self, state: &SolverState, problem: &mut Problem, rule_id: u32, seen: &mut HashSet<u32>) {
        if !seen.insert(rule_id) {
            return;
        }
        let Some(rule) = state.rules.get(rule_id) else {
            return;
        };

        if rule.rule_type() == RuleType::Learned {
            if let Some(why) = state.learned_why.get(&rule_id) {
                for &source in why {
                    self.add_problem_rule(state, problem, source, seen);
                }
            }
            return;
        }

        problem.add_rule(rule, self.pool);
    }

    /// An installed package nobody decided on yet, with the versions it may
    /// move to when the request allows updating it
    fn keep_installed_queue(&self, state: &SolverState, request: &Request) -> Option<Vec<PackageId>> {
        let id = self
            .pool
            .all_package_ids()
            .find(|&id| self.pool.is_installed(id) && state.decisions.undecided(id))?;
        let package = self.pool.package(id)?;

        if !request.is_update(package.name()) {
            return Some(vec![id]);
        }

        let mut queue: Vec<PackageId> = self
            .pool
            .what_provides(package.name(), None, false)
            .into_iter()
            .filter(|&c| state.decisions.undecided(c))
            .filter(|&c| self.pool.package(c).map_or(false, |p| p.name() == package.name()))
            .collect();
        if !queue.contains(&id) {
            queue.push(id);
        }
        Some(queue)
    }

    fn build_result(&self, state: &SolverState) -> Vec<Arc<Package>> {
        let mut packages: Vec<Arc<Package>> = state
            .decisions
            .installed_packages()
            .filter_map(|id| self.pool.package(id).cloned())
            .collect();

        log::debug!("Building result from {} installed packages", packages.len());
        packages.sort_by(|a, b| a.name().cmp(b.name()));
        packages
    }
}

/// Candidates of a job rule none of whose literals holds yet
fn job_decision_queue(state: &SolverState, rule_id: u32) -> Option<Vec<PackageId>> {
    let rule = state.rules.get(rule_id)?;
    if rule.is_disabled() {
        return None;
    }

    let mut queue = Vec::new();
    for &literal in rule.literals() {
        if state.decisions.satisfied(literal) {
            return None;
        }
        if literal > 0 && state.decisions.undecided(literal) {
            queue.push(literal);
        }
    }

    (!queue.is_empty()).then_some(queue)
}

/// First rule by id whose negative literals are all installed while none of
/// its positive literals is, and which still has undecided candidates
fn next_unfulfilled_rule(state: &SolverState) -> Option<(u32, Vec<PackageId>)> {
    'rules: for rule in state.rules.iter() {
        if rule.is_disabled() {
            continue;
        }

        let mut queue = Vec::new();
        for &literal in rule.literals() {
            if literal <= 0 {
                if !state.decisions.decided_install(-literal) {
                    continue 'rules;
                }
            } else {
                if state.decisions.decided_install(literal) {
                    continue 'rules;
                }
                if state.decisions.undecided(literal) {
                    queue.push(literal);
                }
            }
        }

        if !queue.is_empty() {
            return Some((rule.id(), queue));
        }
    }
    None
}

/// Internal state for the solver
struct SolverState {
    rules: RuleSet,
    decisions: Decisions,
    watch_graph: WatchGraph,
    /// Index of next decision to propagate (avoids re-propagating)
    propagate_index: usize,
    /// Packages pinned by fixed job rules
    fixed: HashSet<PackageId>,
    /// Learned rule id -> rules it was derived from
    learned_why: HashMap<u32, Vec<u32>>,
    problems: ProblemSet,
    steps: usize,
}

impl SolverState {
    fn new(rules: RuleSet, pool_size: usize) -> Self {
        let watch_graph = WatchGraph::from_rules(&rules);
        let fixed = rules
            .rules_of_type(RuleType::Fixed)
            .filter_map(|r| r.literals().first().copied())
            .collect();

        Self {
            rules,
            decisions: Decisions::with_capacity(pool_size),
            watch_graph,
            propagate_index: 0,
            fixed,
            learned_why: HashMap::new(),
            problems: ProblemSet::new(),
            steps: 0,
        }
    }
}
