use super::decisions::Decisions;
use super::pool::Literal;
use super::rule::Rule;
use super::rule_set::RuleSet;

/// Two-watched literals graph for unit propagation.
///
/// Each rule with at least two literals watches exactly two of them. A rule
/// only needs to be looked at when one of its watched literals becomes false:
/// then either another literal takes over the watch, the other watched
/// literal is forced true, or the rule is violated.
#[derive(Debug, Default)]
pub struct WatchGraph {
    nodes: Vec<WatchNode>,

    /// Literal index -> indices into `nodes` watching that literal
    watches: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy)]
struct WatchNode {
    rule_id: u32,
    watch1: Literal,
    watch2: Literal,
}

impl WatchNode {
    fn other_watch(&self, literal: Literal) -> Literal {
        if self.watch1 == literal {
            self.watch2
        } else {
            self.watch1
        }
    }

    fn move_watch(&mut self, from: Literal, to: Literal) {
        if self.watch1 == from {
            self.watch1 = to;
        } else {
            self.watch2 = to;
        }
    }
}

impl WatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert literal to index (handles positive and negative literals)
    fn literal_to_index(literal: Literal) -> usize {
        let abs = literal.unsigned_abs() as usize;
        if literal > 0 {
            abs * 2
        } else {
            abs * 2 + 1
        }
    }

    fn chain_mut(&mut self, literal: Literal) -> &mut Vec<usize> {
        let idx = Self::literal_to_index(literal);
        if idx >= self.watches.len() {
            self.watches.resize(idx + 1, Vec::new());
        }
        &mut self.watches[idx]
    }

    /// Build the watch graph from a rule set
    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut graph = Self::new();
        for rule in rules.iter() {
            graph.insert(rule, None);
        }
        graph
    }

    /// Start watching a rule; assertions and empty rules are not watched.
    ///
    /// With `decisions` given (learned rules), the second watch goes to the
    /// literal decided at the highest level, so the rule wakes up as soon as
    /// that decision is reverted.
    pub fn insert(&mut self, rule: &Rule, decisions: Option<&Decisions>) {
        let literals = rule.literals();
        if literals.len() < 2 {
            return;
        }

        let watch1 = literals[0];
        let mut watch2 = literals[1];

        if let Some(decisions) = decisions {
            let mut highest = 0;
            for &literal in &literals[1..] {
                let level = decisions.decision_level(literal).unwrap_or(0);
                if level > highest {
                    highest = level;
                    watch2 = literal;
                }
            }
        }

        let index = self.nodes.len();
        self.nodes.push(WatchNode {
            rule_id: rule.id(),
            watch1,
            watch2,
        });
        self.chain_mut(watch1).push(index);
        self.chain_mut(watch2).push(index);
    }

    /// Propagate the consequences of `decided` having been decided.
    ///
    /// Every rule watching the now false literal `-decided` either moves its
    /// watch, forces its other watched literal at `level`, or is violated.
    /// Returns the id of the first violated rule.
    pub fn propagate_literal(
        &mut self,
        decided: Literal,
        level: u32,
        rules: &RuleSet,
        decisions: &mut Decisions,
    ) -> Option<u32> {
        let literal = -decided;
        let idx = Self::literal_to_index(literal);
        if idx >= self.watches.len() {
            return None;
        }

        let chain = std::mem::take(&mut self.watches[idx]);
        let mut kept = Vec::with_capacity(chain.len());
        let mut conflict = None;
        let mut pending = chain.into_iter();

        while let Some(node_index) = pending.next() {
            let node = self.nodes[node_index];
            let other = node.other_watch(literal);

            let rule = match rules.get(node.rule_id) {
                Some(rule) if !rule.is_disabled() && !decisions.satisfied(other) => rule,
                _ => {
                    kept.push(node_index);
                    continue;
                }
            };

            let alternative = rule
                .literals()
                .iter()
                .copied()
                .find(|&l| l != literal && l != other && !decisions.conflict(l));

            if let Some(alternative) = alternative {
                self.nodes[node_index].move_watch(literal, alternative);
                self.chain_mut(alternative).push(node_index);
                continue;
            }

            kept.push(node_index);

            if decisions.conflict(other) {
                conflict = Some(node.rule_id);
                kept.extend(pending.by_ref());
                break;
            }

            decisions.decide(other, level, Some(node.rule_id));
        }

        self.watches[idx] = kept;
        conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(list: Vec<Rule>) -> RuleSet {
        let mut set = RuleSet::new();
        for rule in list {
            set.add(rule);
        }
        set
    }

    #[test]
    fn test_unit_propagation() {
        let set = rules(vec![Rule::requires(1, vec![2])]);
        let mut graph = WatchGraph::from_rules(&set);
        let mut decisions = Decisions::new();

        decisions.decide(1, 1, None);
        assert_eq!(graph.propagate_literal(1, 1, &set, &mut decisions), None);

        assert!(decisions.satisfied(2));
        assert_eq!(decisions.decision_rule(2), Some(0));
    }

    #[test]
    fn test_watch_moves_to_undecided_literal() {
        let set = rules(vec![Rule::requires(1, vec![2, 3])]);
        let mut graph = WatchGraph::from_rules(&set);
        let mut decisions = Decisions::new();

        decisions.decide(-2, 1, None);
        assert_eq!(graph.propagate_literal(-2, 1, &set, &mut decisions), None);
        assert!(decisions.undecided(3));

        decisions.decide(1, 2, None);
        assert_eq!(graph.propagate_literal(1, 2, &set, &mut decisions), None);
        assert!(decisions.satisfied(3));
    }

    #[test]
    fn test_conflict_detected() {
        let set = rules(vec![Rule::conflict(1, 2)]);
        let mut graph = WatchGraph::from_rules(&set);
        let mut decisions = Decisions::new();

        decisions.decide(1, 1, None);
        decisions.decide(2, 1, None);

        assert_eq!(graph.propagate_literal(2, 1, &set, &mut decisions), Some(0));
    }

    #[test]
    fn test_disabled_rules_ignored() {
        let mut set = rules(vec![Rule::requires(1, vec![2])]);
        set.disable(0);
        let mut graph = WatchGraph::from_rules(&set);
        let mut decisions = Decisions::new();

        decisions.decide(1, 1, None);
        assert_eq!(graph.propagate_literal(1, 1, &set, &mut decisions), None);
        assert!(decisions.undecided(2));
    }

    #[test]
    fn test_learned_rule_watches_highest_level() {
        let mut set = RuleSet::new();
        let id = set.add(Rule::learned(vec![-3, -1, -2]));
        let mut decisions = Decisions::new();
        decisions.decide(1, 1, None);
        decisions.decide(2, 2, None);

        let mut graph = WatchGraph::new();
        graph.insert(set.get(id).unwrap(), Some(&decisions));

        decisions.decide(3, 3, None);
        assert_eq!(graph.propagate_literal(3, 3, &set, &mut decisions), Some(id));
    }
}
