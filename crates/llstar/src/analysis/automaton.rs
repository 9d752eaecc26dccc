//! Lookahead automata produced by analysis.
//!
//! One [`DecisionAutomaton`] per decision. States are arena-allocated and
//! addressed by [`StateId`]; state 0 is the start state. Edges are kept as
//! sorted, non-overlapping symbol ranges so a lookup is a binary search.

use crate::context::SemanticContext;
use crate::grammar::symbol_set::display_symbol;
use crate::grammar::{AltId, DecisionId, DecisionKind, RuleId};
use compact_str::CompactString;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(pub u32);

impl StateId {
    pub const START: Self = Self(0);
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Edge on the inclusive symbol range `lo..=hi`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    pub lo: u32,
    pub hi: u32,
    pub target: StateId,
    /// Set when every alternative still alive in `target` sits behind a
    /// gated predicate. The edge is only taken when the gate holds.
    pub gate: Option<SemanticContext>,
}

/// An alternative still in the running when lookahead alone cannot decide.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Candidate {
    pub alt: AltId,
    /// Hoisted guard; `None` when the alternative is unpredicated.
    pub context: Option<SemanticContext>,
    /// The candidate leaves an optional or loop block. Its guard is tested
    /// before the guards of alternatives that continue the block.
    pub exit_branch: bool,
}

/// How a state picks an alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    /// Exactly one alternative is viable.
    Unique(AltId),
    /// Several unpredicated alternatives are viable. The lowest ordinal was
    /// chosen and reported when the automaton was built.
    Ambiguous {
        chosen: AltId,
        alternatives: Vec<AltId>,
    },
    /// Candidates in ascending ordinal order, at least one with a guard.
    Predicated(Vec<Candidate>),
}

impl Resolution {
    /// Alternatives this resolution can end in, ascending.
    #[must_use]
    pub fn alternatives(&self) -> Vec<AltId> {
        match self {
            Self::Unique(alt) => vec![*alt],
            Self::Ambiguous { alternatives, .. } => alternatives.clone(),
            Self::Predicated(candidates) => candidates.iter().map(|c| c.alt).collect(),
        }
    }

    #[must_use]
    pub const fn is_predicated(&self) -> bool {
        matches!(self, Self::Predicated(_))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique(alt) => write!(f, "=> {}", alt.0),
            Self::Ambiguous {
                chosen,
                alternatives,
            } => {
                let alts: Vec<String> = alternatives.iter().map(|a| a.0.to_string()).collect();
                write!(f, "=> {} (ambiguous {{{}}})", chosen.0, alts.join(","))
            }
            Self::Predicated(candidates) => {
                f.write_str("=>")?;
                for (i, candidate) in candidates.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { " | " })?;
                    if let Some(context) = &candidate.context {
                        write!(f, "{{{context}}}? ")?;
                    }
                    write!(f, "{}", candidate.alt.0)?;
                    if candidate.exit_branch {
                        f.write_str(" (exit)")?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DfaState {
    pub(crate) transitions: Vec<Transition>,
    /// Taken when no transition matches the next symbol, including at the
    /// end of input.
    pub(crate) accept: Option<Resolution>,
    /// Set on states where prediction stops without reading further.
    pub(crate) terminal: Option<Resolution>,
}

impl DfaState {
    /// Target for `symbol`, by binary search over the sorted ranges. Gates
    /// are not checked; see [`edge`](Self::edge).
    #[must_use]
    pub fn next(&self, symbol: u32) -> Option<StateId> {
        self.edge(symbol).map(|t| t.target)
    }

    /// Transition on `symbol`.
    #[must_use]
    pub fn edge(&self, symbol: u32) -> Option<&Transition> {
        self.transitions
            .binary_search_by(|t| {
                if t.hi < symbol {
                    std::cmp::Ordering::Less
                } else if t.lo > symbol {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
            .map(|i| &self.transitions[i])
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[must_use]
    pub const fn accept(&self) -> Option<&Resolution> {
        self.accept.as_ref()
    }

    #[must_use]
    pub const fn terminal(&self) -> Option<&Resolution> {
        self.terminal.as_ref()
    }

    /// Whether any resolution or edge of this state carries a guard.
    #[must_use]
    pub fn is_predicated(&self) -> bool {
        self.terminal.iter().chain(&self.accept).any(Resolution::is_predicated)
            || self.transitions.iter().any(|t| t.gate.is_some())
    }
}

/// The lookahead automaton of one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionAutomaton {
    pub(crate) decision: DecisionId,
    pub(crate) rule: RuleId,
    pub(crate) rule_name: CompactString,
    pub(crate) kind: DecisionKind,
    pub(crate) alt_count: u32,
    pub(crate) states: Vec<DfaState>,
}

impl DecisionAutomaton {
    #[must_use]
    pub const fn decision(&self) -> DecisionId {
        self.decision
    }

    #[must_use]
    pub const fn rule(&self) -> RuleId {
        self.rule
    }

    #[must_use]
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    #[must_use]
    pub const fn kind(&self) -> DecisionKind {
        self.kind
    }

    #[must_use]
    pub const fn alt_count(&self) -> u32 {
        self.alt_count
    }

    #[must_use]
    pub const fn start(&self) -> StateId {
        StateId::START
    }

    #[must_use]
    pub fn state(&self, id: StateId) -> &DfaState {
        &self.states[id.0 as usize]
    }

    #[must_use]
    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether some input of unbounded length is needed to decide, that is,
    /// whether the automaton has a cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Open,
            Done,
        }

        let mut marks = vec![Mark::New; self.states.len()];
        for root in 0..self.states.len() {
            if marks[root] != Mark::New {
                continue;
            }
            // (state, next transition to visit)
            let mut stack = vec![(root, 0usize)];
            marks[root] = Mark::Open;
            while let Some((state, edge)) = stack.last_mut() {
                let transitions = &self.states[*state].transitions;
                if let Some(transition) = transitions.get(*edge) {
                    *edge += 1;
                    let target = transition.target.0 as usize;
                    match marks[target] {
                        Mark::Open => return true,
                        Mark::New => {
                            marks[target] = Mark::Open;
                            stack.push((target, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[*state] = Mark::Done;
                    stack.pop();
                }
            }
        }
        false
    }

    /// Number of states that need predicates to decide.
    #[must_use]
    pub fn predicated_states(&self) -> usize {
        self.states.iter().filter(|s| s.is_predicated()).count()
    }
}

impl fmt::Display for DecisionAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} in rule {} ({:?}, {} alts)",
            self.decision, self.rule_name, self.kind, self.alt_count
        )?;
        for (i, state) in self.states.iter().enumerate() {
            let id = StateId(i as u32);
            if let Some(terminal) = &state.terminal {
                writeln!(f, "{id} {terminal}")?;
            }
            for t in &state.transitions {
                if t.lo == t.hi {
                    write!(f, "{id} -{}-> {}", display_symbol(t.lo), t.target)?;
                } else {
                    write!(
                        f,
                        "{id} -{}..{}-> {}",
                        display_symbol(t.lo),
                        display_symbol(t.hi),
                        t.target
                    )?;
                }
                match &t.gate {
                    Some(gate) => writeln!(f, " if {{{gate}}}?")?,
                    None => writeln!(f)?,
                }
            }
            if let Some(accept) = &state.accept {
                writeln!(f, "{id} else {accept}")?;
            }
        }
        Ok(())
    }
}
