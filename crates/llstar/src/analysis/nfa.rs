//! Grammar-wide NFA used for lookahead simulation.
//!
//! Every rule gets a start and a stop node; alternatives are chains of nodes
//! linked by match, predicate, action and call edges. Rule calls are not
//! inlined: a call edge names the callee and the node to return to, so the
//! automaton builder can keep a call stack.

use crate::grammar::{
    Alternative, Block, BlockKind, DecisionId, Element, Grammar, PredicateId, RuleId, RuleKind,
    SymbolSet,
};
use smallvec::SmallVec;

pub(crate) type NodeId = u32;

#[derive(Debug, Clone)]
pub(crate) enum Edge {
    Epsilon(NodeId),
    /// Actions are invisible to lookahead.
    Action(NodeId),
    Match(SymbolSet, NodeId),
    Predicate(PredicateId, NodeId),
    Call { rule: RuleId, follow: NodeId },
}

#[derive(Debug, Clone)]
pub(crate) struct NfaNode {
    pub(crate) rule: RuleId,
    pub(crate) edges: SmallVec<[Edge; 2]>,
    /// Set on the stop node of a rule.
    pub(crate) stop_of: Option<RuleId>,
}

impl NfaNode {
    fn new(rule: RuleId) -> Self {
        Self {
            rule,
            edges: SmallVec::new(),
            stop_of: None,
        }
    }

    /// Nodes that consume input are the only ones kept in lookahead states.
    pub(crate) fn matches_input(&self) -> bool {
        self.edges.iter().any(|edge| matches!(edge, Edge::Match(..)))
    }
}

#[derive(Debug)]
pub(crate) struct Nfa {
    nodes: Vec<NfaNode>,
    rule_start: Vec<NodeId>,
    rule_stop: Vec<NodeId>,
    /// Return nodes of every call to a rule.
    follows: Vec<SmallVec<[NodeId; 4]>>,
    /// Rules whose end with an empty call stack may be followed by the end
    /// of input: every parser rule, since any of them can be invoked
    /// directly, and the token dispatch rule of a lexer.
    accepting: Vec<bool>,
    /// First node of every alternative of every decision, in ordinal order.
    decision_alts: Vec<Vec<NodeId>>,
}

impl Nfa {
    pub(crate) fn build(grammar: &Grammar) -> Self {
        let rule_count = grammar.rules().count();
        let mut nfa = Self {
            nodes: Vec::new(),
            rule_start: Vec::with_capacity(rule_count),
            rule_stop: Vec::with_capacity(rule_count),
            follows: vec![SmallVec::new(); rule_count],
            accepting: vec![false; rule_count],
            decision_alts: vec![Vec::new(); grammar.decision_count()],
        };

        for rule in grammar.rules() {
            let start = nfa.add_node(rule.id);
            let stop = nfa.add_node(rule.id);
            nfa.nodes[stop as usize].stop_of = Some(rule.id);
            nfa.rule_start.push(start);
            nfa.rule_stop.push(stop);
        }

        for rule in grammar.rules() {
            let (start, stop) = (nfa.rule_start(rule.id), nfa.rule_stop(rule.id));
            nfa.compile_block(rule.id, &rule.block, start, stop);
        }

        let tokens_rule = grammar.tokens_rule().map(|rule| rule.id);
        for rule in grammar.rules() {
            nfa.accepting[rule.id.0 as usize] = match rule.kind {
                RuleKind::Parser => true,
                RuleKind::Lexer => Some(rule.id) == tokens_rule,
            };
        }
        nfa
    }

    fn add_node(&mut self, rule: RuleId) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(NfaNode::new(rule));
        id
    }

    fn add_edge(&mut self, from: NodeId, edge: Edge) {
        self.nodes[from as usize].edges.push(edge);
    }

    fn alt_start(&mut self, rule: RuleId, decision: Option<DecisionId>) -> NodeId {
        let start = self.add_node(rule);
        if let Some(decision) = decision {
            self.decision_alts[decision.0 as usize].push(start);
        }
        start
    }

    fn compile_block(
        &mut self,
        rule: RuleId,
        block: &Block,
        entry: NodeId,
        exit: NodeId,
    ) {
        let decision = block.decision;
        match block.kind {
            BlockKind::Single if decision.is_none() => match block.alternatives.first() {
                Some(alt) => self.compile_alt(rule, alt, entry, exit),
                None => self.add_edge(entry, Edge::Epsilon(exit)),
            },
            BlockKind::Single => {
                for alt in &block.alternatives {
                    let start = self.alt_start(rule, decision);
                    self.add_edge(entry, Edge::Epsilon(start));
                    self.compile_alt(rule, alt, start, exit);
                }
            }
            BlockKind::Optional => {
                for alt in &block.alternatives {
                    let start = self.alt_start(rule, decision);
                    self.add_edge(entry, Edge::Epsilon(start));
                    self.compile_alt(rule, alt, start, exit);
                }
                let skip = self.alt_start(rule, decision);
                self.add_edge(entry, Edge::Epsilon(skip));
                self.add_edge(skip, Edge::Epsilon(exit));
            }
            BlockKind::Star | BlockKind::Plus => {
                // `entry` reaches the loop node directly for `*` and only
                // through one pass of the body for `+`.
                let loop_back = self.add_node(rule);
                if block.kind == BlockKind::Star {
                    self.add_edge(entry, Edge::Epsilon(loop_back));
                }
                for alt in &block.alternatives {
                    let start = self.alt_start(rule, decision);
                    if block.kind == BlockKind::Plus {
                        self.add_edge(entry, Edge::Epsilon(start));
                    }
                    self.add_edge(loop_back, Edge::Epsilon(start));
                    self.compile_alt(rule, alt, start, loop_back);
                }
                let leave = self.alt_start(rule, decision);
                self.add_edge(loop_back, Edge::Epsilon(leave));
                self.add_edge(leave, Edge::Epsilon(exit));
            }
        }
    }

    fn compile_alt(
        &mut self,
        rule: RuleId,
        alt: &Alternative,
        from: NodeId,
        to: NodeId,
    ) {
        let mut current = from;
        for element in &alt.elements {
            let next = self.add_node(rule);
            match element {
                Element::Match(set) => self.add_edge(current, Edge::Match(set.clone(), next)),
                Element::Rule(callee) => {
                    self.add_edge(
                        current,
                        Edge::Call {
                            rule: *callee,
                            follow: next,
                        },
                    );
                    self.follows[callee.0 as usize].push(next);
                }
                Element::Block(block) => self.compile_block(rule, block, current, next),
                Element::Predicate(id) => self.add_edge(current, Edge::Predicate(*id, next)),
                Element::Action(_) => self.add_edge(current, Edge::Action(next)),
            }
            current = next;
        }
        self.add_edge(current, Edge::Epsilon(to));
    }

    pub(crate) fn node(&self, id: NodeId) -> &NfaNode {
        &self.nodes[id as usize]
    }

    pub(crate) fn rule_start(&self, rule: RuleId) -> NodeId {
        self.rule_start[rule.0 as usize]
    }

    pub(crate) fn rule_stop(&self, rule: RuleId) -> NodeId {
        self.rule_stop[rule.0 as usize]
    }

    pub(crate) fn follows(&self, rule: RuleId) -> &[NodeId] {
        &self.follows[rule.0 as usize]
    }

    pub(crate) fn is_accepting(&self, rule: RuleId) -> bool {
        self.accepting[rule.0 as usize]
    }

    pub(crate) fn decision_alts(&self, decision: DecisionId) -> &[NodeId] {
        &self.decision_alts[decision.0 as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
