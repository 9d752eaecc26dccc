//! Subset construction of a decision's lookahead automaton.
//!
//! A state is a canonical set of [`Configuration`]s: an NFA position, the
//! alternative it predicts, the call stack that got it there and the guard
//! collected on the way. Starting from the alternatives of the decision we
//! follow every symbol range the current configurations can match, until
//! each state either predicts a single alternative or can not be split by
//! more lookahead. Those states are resolved by the hoister.
//!
//! Gated predicates with no static value also travel separately as the
//! configuration's `gate`. A transition into a state whose configurations
//! are all gated carries the disjunction of their gates, so a false gate
//! keeps its alternative out of every state it would reach.

use super::AnalysisConfig;
use super::automaton::{Candidate, DecisionAutomaton, DfaState, Resolution, StateId, Transition};
use super::hoist;
use super::nfa::{Edge, Nfa, NodeId};
use crate::context::{ContextInterner, SemanticContext};
use crate::error::AnalysisError;
use crate::error::diagnostics::Diagnostics;
use crate::grammar::symbol_set::partition;
use crate::grammar::{AltId, DecisionInfo, Grammar, SymbolSet};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub(crate) type CallStack = SmallVec<[NodeId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Configuration {
    pub(crate) alt: AltId,
    pub(crate) node: NodeId,
    pub(crate) stack: CallStack,
    pub(crate) context: SemanticContext,
    /// Gated part of `context`.
    pub(crate) gate: SemanticContext,
    /// Recognition can end here: the stop of an accepting rule was reached with
    /// an empty call stack.
    pub(crate) accept: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Seed {
    node: NodeId,
    alt: AltId,
    stack: CallStack,
    context: SemanticContext,
    gate: SemanticContext,
}

impl Seed {
    fn at(&self, node: NodeId) -> Self {
        Self {
            node,
            ..self.clone()
        }
    }
}

struct Guards {
    context: SemanticContext,
    gate: SemanticContext,
    accept: bool,
}

type Reached = HashMap<(NodeId, AltId, CallStack), Guards, ahash::RandomState>;

struct BuildState {
    configs: Arc<[Configuration]>,
    state: DfaState,
}

pub(crate) struct DecisionBuilder<'a> {
    grammar: &'a Grammar,
    nfa: &'a Nfa,
    config: &'a AnalysisConfig,
    /// Statically known predicate values; gates with a value are folded.
    static_values: &'a [Option<bool>],
    /// Shared context leaf per predicate.
    leaves: &'a [SemanticContext],
    info: &'a DecisionInfo,
    diagnostics: &'a dyn Diagnostics,
    interner: ContextInterner,
    states: Vec<BuildState>,
    index: HashMap<Arc<[Configuration]>, StateId, ahash::RandomState>,
    reported: HashSet<Vec<AltId>, ahash::RandomState>,
}

impl<'a> DecisionBuilder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        grammar: &'a Grammar,
        nfa: &'a Nfa,
        config: &'a AnalysisConfig,
        static_values: &'a [Option<bool>],
        leaves: &'a [SemanticContext],
        info: &'a DecisionInfo,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            grammar,
            nfa,
            config,
            static_values,
            leaves,
            info,
            diagnostics,
            interner: ContextInterner::new(),
            states: Vec::new(),
            index: HashMap::default(),
            reported: HashSet::default(),
        }
    }

    pub(crate) fn build(mut self) -> Result<DecisionAutomaton, AnalysisError> {
        let nfa = self.nfa;
        let seeds: Vec<Seed> = nfa
            .decision_alts(self.info.id)
            .iter()
            .enumerate()
            .map(|(i, &node)| Seed {
                node,
                alt: AltId(i as u32 + 1),
                stack: CallStack::new(),
                context: SemanticContext::always(),
                gate: SemanticContext::always(),
            })
            .collect();

        // Guards are only collected on the way to the first symbol; deeper
        // predicates belong to later decisions.
        let start = self.closure(seeds, true)?;
        self.add_state(start)?;

        let mut worklist = vec![StateId::START];
        while let Some(id) = worklist.pop() {
            let configs = Arc::clone(&self.states[id.0 as usize].configs);
            let mut alts: SmallVec<[AltId; 4]> = configs.iter().map(|c| c.alt).collect();
            alts.dedup();

            match alts.as_slice() {
                [] => continue,
                [alt] => {
                    // Later states are guarded by the transition into them.
                    let terminal = match self.gate_of(&configs) {
                        Some(gate) if id == StateId::START => {
                            Resolution::Predicated(vec![Candidate {
                                alt: *alt,
                                context: Some(gate),
                                exit_branch: self.info.exit_alt() == Some(*alt),
                            }])
                        }
                        _ => Resolution::Unique(*alt),
                    };
                    self.states[id.0 as usize].state.terminal = Some(terminal);
                    continue;
                }
                _ => {}
            }

            if is_conflict(&configs) {
                trace!(decision = self.info.id.0, state = id.0, "lookahead conflict");
                let terminal = self.resolve(configs.iter());
                self.states[id.0 as usize].state.terminal = terminal;
                continue;
            }

            let accept = if configs.iter().any(|c| c.accept) {
                self.resolve(configs.iter().filter(|c| c.accept))
            } else {
                None
            };

            let sets: Vec<&SymbolSet> = configs
                .iter()
                .flat_map(|c| nfa.node(c.node).edges.iter())
                .filter_map(|edge| match edge {
                    Edge::Match(set, _) => Some(set),
                    _ => None,
                })
                .collect();

            let mut transitions: Vec<Transition> = Vec::new();
            for (lo, hi) in partition(sets) {
                let reach = self.step(&configs, lo, hi)?;
                if reach.is_empty() {
                    continue;
                }
                let gate = self.gate_of(&reach);
                let target = match self.index.get(reach.as_slice()) {
                    Some(&target) => target,
                    None => {
                        let target = self.add_state(reach)?;
                        worklist.push(target);
                        target
                    }
                };
                match transitions.last_mut() {
                    Some(last)
                        if last.target == target
                            && last.gate == gate
                            && last.hi.checked_add(1) == Some(lo) =>
                    {
                        last.hi = hi;
                    }
                    _ => transitions.push(Transition {
                        lo,
                        hi,
                        target,
                        gate,
                    }),
                }
            }

            let state = &mut self.states[id.0 as usize].state;
            state.transitions = transitions;
            state.accept = accept;
        }

        let rule = self.grammar.rule(self.info.rule);
        let automaton = DecisionAutomaton {
            decision: self.info.id,
            rule: self.info.rule,
            rule_name: rule.name.clone(),
            kind: self.info.kind,
            alt_count: self.info.alt_count,
            states: self.states.into_iter().map(|s| s.state).collect(),
        };
        debug!(
            decision = automaton.decision.0,
            rule = %automaton.rule_name,
            states = automaton.len(),
            cyclic = automaton.is_cyclic(),
            predicated = automaton.predicated_states(),
            "decision automaton built"
        );
        Ok(automaton)
    }

    fn add_state(&mut self, configs: Vec<Configuration>) -> Result<StateId, AnalysisError> {
        if self.states.len() >= self.config.max_states {
            warn!(
                decision = self.info.id.0,
                max_states = self.config.max_states,
                "lookahead automaton did not converge"
            );
            return Err(AnalysisError::NonConvergence {
                rule: self.grammar.rule(self.info.rule).name.clone(),
                decision: self.info.id,
                max_states: self.config.max_states,
            });
        }
        let id = StateId(self.states.len() as u32);
        let configs: Arc<[Configuration]> = configs.into();
        self.index.insert(Arc::clone(&configs), id);
        self.states.push(BuildState {
            configs,
            state: DfaState::default(),
        });
        Ok(id)
    }

    fn resolve<'c>(
        &mut self,
        configs: impl IntoIterator<Item = &'c Configuration>,
    ) -> Option<Resolution> {
        let resolution = hoist::resolve(self.info, configs, &mut self.interner);
        if let Some(Resolution::Ambiguous {
            chosen,
            alternatives,
        }) = &resolution
            && self.reported.insert(alternatives.clone())
        {
            self.diagnostics
                .report_ambiguity(self.info.id, *chosen, alternatives);
        }
        resolution
    }

    /// Disjunction of the gates of `configs`, or `None` when some
    /// configuration is not gated.
    fn gate_of(&mut self, configs: &[Configuration]) -> Option<SemanticContext> {
        let mut gate = SemanticContext::never();
        for config in configs {
            gate = self.interner.or(&gate, &config.gate);
            if gate.is_always() {
                return None;
            }
        }
        Some(gate)
    }

    /// Configurations reached from `configs` by consuming any symbol in
    /// `lo..=hi`, closed over non-consuming edges.
    fn step(
        &mut self,
        configs: &[Configuration],
        lo: u32,
        hi: u32,
    ) -> Result<Vec<Configuration>, AnalysisError> {
        let nfa = self.nfa;
        let mut seeds: Vec<Seed> = Vec::new();
        for config in configs {
            for edge in &nfa.node(config.node).edges {
                if let Edge::Match(set, target) = edge
                    && set.covers(lo, hi)
                {
                    seeds.push(Seed {
                        node: *target,
                        alt: config.alt,
                        stack: config.stack.clone(),
                        context: config.context.clone(),
                        gate: config.gate.clone(),
                    });
                }
            }
        }
        self.closure(seeds, false)
    }

    /// Follows non-consuming edges from `seeds`. Keeps positions that match
    /// input and accepting positions, canonically sorted. With `hoist`,
    /// predicates on the way are conjoined into the configuration's guard;
    /// otherwise the guard is carried unchanged.
    ///
    /// A call site already on the stack `max_recursion_depth` times means
    /// the lookahead language needs unbounded recursion to describe, which
    /// no finite automaton can do.
    fn closure(
        &mut self,
        seeds: Vec<Seed>,
        hoist: bool,
    ) -> Result<Vec<Configuration>, AnalysisError> {
        let nfa = self.nfa;
        let grammar = self.grammar;
        let mut work = seeds;
        let mut busy: HashSet<Seed, ahash::RandomState> = HashSet::default();
        let mut reached = Reached::default();

        while let Some(seed) = work.pop() {
            if !busy.insert(seed.clone()) {
                continue;
            }
            let node = nfa.node(seed.node);

            if node.matches_input() {
                self.reach(&mut reached, &seed, false);
            }

            if let Some(rule) = node.stop_of {
                if let Some((&ret, rest)) = seed.stack.split_last() {
                    work.push(Seed {
                        stack: CallStack::from_slice(rest),
                        ..seed.at(ret)
                    });
                    continue;
                }
                if nfa.is_accepting(rule) {
                    self.reach(&mut reached, &seed, true);
                }
                // Without a caller on the stack any call site may follow.
                for &follow in nfa.follows(rule) {
                    work.push(seed.at(follow));
                }
                continue;
            }

            for edge in &node.edges {
                match edge {
                    Edge::Match(..) => {}
                    Edge::Epsilon(target) | Edge::Action(target) => work.push(seed.at(*target)),
                    Edge::Predicate(id, target) => {
                        let predicate = grammar.predicate(*id);
                        let index = id.0 as usize;
                        let gated = predicate.is_gated();
                        let static_value = if gated {
                            self.static_values[index]
                        } else {
                            None
                        };
                        let mut next = seed.at(*target);
                        match static_value {
                            Some(false) => continue,
                            Some(true) => {}
                            None if hoist => {
                                let leaf = &self.leaves[index];
                                next.context = self.interner.and(&seed.context, leaf);
                                if gated {
                                    next.gate = self.interner.and(&seed.gate, leaf);
                                }
                            }
                            None => {}
                        }
                        work.push(next);
                    }
                    Edge::Call { rule, follow } => {
                        let depth = seed.stack.iter().filter(|&&n| n == *follow).count();
                        if depth >= self.config.max_recursion_depth {
                            let name = &grammar.rule(self.info.rule).name;
                            warn!(
                                decision = self.info.id.0,
                                rule = %name,
                                callee = %grammar.rule(*rule).name,
                                depth,
                                "recursion too deep for lookahead"
                            );
                            return Err(AnalysisError::RecursionOverflow {
                                rule: name.clone(),
                                decision: self.info.id,
                                callee: grammar.rule(*rule).name.clone(),
                                max_depth: self.config.max_recursion_depth,
                            });
                        }
                        let mut call = seed.at(nfa.rule_start(*rule));
                        call.stack.push(*follow);
                        work.push(call);
                    }
                }
            }
        }

        let mut configs: Vec<Configuration> = reached
            .into_iter()
            .map(|((node, alt, stack), guards)| Configuration {
                alt,
                node,
                stack,
                context: guards.context,
                gate: guards.gate,
                accept: guards.accept,
            })
            .collect();
        configs.sort_unstable();
        Ok(configs)
    }

    fn reach(&mut self, reached: &mut Reached, seed: &Seed, accept: bool) {
        let key = (seed.node, seed.alt, seed.stack.clone());
        match reached.get_mut(&key) {
            Some(guards) => {
                guards.context = self.interner.or(&guards.context, &seed.context);
                guards.gate = self.interner.or(&guards.gate, &seed.gate);
            }
            None => {
                reached.insert(
                    key,
                    Guards {
                        context: seed.context.clone(),
                        gate: seed.gate.clone(),
                        accept,
                    },
                );
            }
        }
    }
}

/// A state is a conflict when no NFA position in it predicts a single
/// alternative: every continuation is shared, so no amount of lookahead
/// will tell the alternatives apart.
fn is_conflict(configs: &[Configuration]) -> bool {
    let mut groups: HashMap<(NodeId, &CallStack), SmallVec<[AltId; 4]>, ahash::RandomState> =
        HashMap::default();
    for config in configs {
        let alts = groups.entry((config.node, &config.stack)).or_default();
        if alts.last() != Some(&config.alt) {
            alts.push(config.alt);
        }
    }
    groups.values().all(|alts| alts.len() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::diagnostics::DiagnosticQueue;
    use crate::grammar::{DecisionId, Expr, GrammarBuilder, GrammarKind};

    fn build(
        grammar: &Grammar,
        decision: u32,
        config: &AnalysisConfig,
    ) -> Result<DecisionAutomaton, AnalysisError> {
        let nfa = Nfa::build(grammar);
        let statics: Vec<Option<bool>> = grammar.predicates().map(|p| p.constant()).collect();
        let leaves: Vec<SemanticContext> = grammar
            .predicates()
            .map(|p| SemanticContext::predicate(Arc::clone(p)))
            .collect();
        let queue = DiagnosticQueue::new();
        let info = grammar.decision(DecisionId(decision));
        DecisionBuilder::new(grammar, &nfa, config, &statics, &leaves, info, &queue).build()
    }

    #[test]
    fn test_ll1_decision() {
        let grammar = GrammarBuilder::new("t", GrammarKind::Parser)
            .rule("a", Expr::choice([Expr::token("A"), Expr::token("B")]))
            .build()
            .unwrap();
        let dfa = build(&grammar, 0, &AnalysisConfig::default()).unwrap();
        assert_eq!(dfa.len(), 3);
        assert!(!dfa.is_cyclic());
        let start = dfa.state(dfa.start());
        assert_eq!(start.transitions().len(), 2);
    }

    #[test]
    fn test_conflict_detection() {
        let c = |alt, node| Configuration {
            alt: AltId(alt),
            node,
            stack: CallStack::new(),
            context: SemanticContext::always(),
            gate: SemanticContext::always(),
            accept: false,
        };
        assert!(is_conflict(&[c(1, 3), c(2, 3)]));
        assert!(!is_conflict(&[c(1, 3), c(2, 3), c(2, 4)]));
    }

    #[test]
    fn test_state_limit() {
        let grammar = GrammarBuilder::new("t", GrammarKind::Parser)
            .rule(
                "a",
                Expr::choice([
                    Expr::seq([Expr::star(Expr::token("X")), Expr::token("Y")]),
                    Expr::seq([Expr::star(Expr::token("X")), Expr::token("Z")]),
                ]),
            )
            .build()
            .unwrap();
        let err = build(&grammar, 0, &AnalysisConfig::default().with_max_states(1)).unwrap_err();
        assert!(matches!(err, AnalysisError::NonConvergence { max_states: 1, .. }));
        assert!(build(&grammar, 0, &AnalysisConfig::default()).unwrap().is_cyclic());
    }
}
