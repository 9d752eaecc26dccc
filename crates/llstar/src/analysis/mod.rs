//! # Grammar Analysis
//!
//! Builds one lookahead automaton per decision of a [`Grammar`].
//!
//! ```text
//! Grammar ──► Nfa ──► DecisionBuilder (per decision) ──► DecisionAutomaton
//!                          │
//!                          └── hoist: resolve conflicting states with
//!                              predicates found before the first symbol
//! ```
//!
//! Decisions are independent of each other. With the `parallel` feature
//! they are built on the rayon pool; the result is the same either way.

mod automaton;
pub(crate) mod builder;
mod config;
mod hoist;
pub(crate) mod nfa;

pub use automaton::{Candidate, DecisionAutomaton, DfaState, Resolution, StateId, Transition};
pub use config::AnalysisConfig;

use crate::context::SemanticContext;
use crate::error::AnalysisError;
use crate::error::diagnostics::Diagnostics;
use crate::grammar::{DecisionId, DecisionInfo, Grammar, Predicate, PredicateId};
use builder::DecisionBuilder;
use nfa::Nfa;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

type GateResolver = dyn Fn(&Predicate) -> Option<bool> + Send + Sync;

/// Analyzes a grammar into lookahead automata.
///
/// ```ignore
/// let analysis = Analyzer::new(grammar)
///     .with_config(AnalysisConfig::default().with_max_states(512))
///     .analyze(&TracingDiagnostics)?;
/// ```
pub struct Analyzer {
    grammar: Arc<Grammar>,
    config: AnalysisConfig,
    gate_resolver: Option<Arc<GateResolver>>,
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("grammar", &self.grammar.name())
            .field("config", &self.config)
            .field("gate_resolver", &self.gate_resolver.is_some())
            .finish()
    }
}

impl Analyzer {
    pub fn new(grammar: impl Into<Arc<Grammar>>) -> Self {
        Self {
            grammar: grammar.into(),
            config: AnalysisConfig::default(),
            gate_resolver: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the function deciding gated predicates at analysis time.
    ///
    /// A gate resolved to `false` removes every path through it from
    /// prediction; one resolved to `true` is transparent. Gates left
    /// unresolved (`None`) are evaluated at run time like validating
    /// predicates. Without a resolver only the literal gates `{true}?=>`
    /// and `{false}?=>` are resolved.
    #[must_use]
    pub fn with_gate_resolver(
        mut self,
        resolver: impl Fn(&Predicate) -> Option<bool> + Send + Sync + 'static,
    ) -> Self {
        self.gate_resolver = Some(Arc::new(resolver));
        self
    }

    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, diagnostics: &dyn Diagnostics) -> Result<Analysis, AnalysisError> {
        let grammar = &*self.grammar;
        let nfa = Nfa::build(grammar);

        let static_values: Vec<Option<bool>> = grammar
            .predicates()
            .map(|p| match (&self.gate_resolver, p.is_gated()) {
                (Some(resolver), true) => resolver(p),
                _ => p.constant(),
            })
            .collect();
        let leaves: Vec<SemanticContext> = grammar
            .predicates()
            .map(|p| SemanticContext::predicate(Arc::clone(p)))
            .collect();

        debug!(
            grammar = %grammar.name(),
            decisions = grammar.decision_count(),
            nfa_nodes = nfa.len(),
            parallel = self.config.parallel,
            "analyzing grammar"
        );

        let build = |info: &DecisionInfo| {
            DecisionBuilder::new(
                grammar,
                &nfa,
                &self.config,
                &static_values,
                &leaves,
                info,
                diagnostics,
            )
            .build()
            .map(Arc::new)
        };

        #[cfg(feature = "parallel")]
        let automata: Vec<Arc<DecisionAutomaton>> = if self.config.parallel {
            use rayon::prelude::*;
            grammar
                .decisions
                .par_iter()
                .map(build)
                .collect::<Result<_, _>>()?
        } else {
            grammar.decisions().map(build).collect::<Result<_, _>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let automata: Vec<Arc<DecisionAutomaton>> =
            grammar.decisions().map(build).collect::<Result<_, _>>()?;

        let analysis = Analysis {
            grammar: Arc::clone(&self.grammar),
            automata,
            static_values,
        };
        info!(
            grammar = %grammar.name(),
            decisions = analysis.automata.len(),
            states = analysis.state_count(),
            cyclic = analysis.automata.iter().filter(|a| a.is_cyclic()).count(),
            "grammar analyzed"
        );
        Ok(analysis)
    }
}

/// A grammar together with the lookahead automata of all its decisions.
#[derive(Debug, Clone)]
pub struct Analysis {
    grammar: Arc<Grammar>,
    automata: Vec<Arc<DecisionAutomaton>>,
    static_values: Vec<Option<bool>>,
}

impl Analysis {
    #[must_use]
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    #[must_use]
    pub fn automaton(&self, decision: DecisionId) -> &Arc<DecisionAutomaton> {
        &self.automata[decision.0 as usize]
    }

    #[must_use]
    pub fn automata(&self) -> &[Arc<DecisionAutomaton>] {
        &self.automata
    }

    /// Value of a predicate known without running it: resolved gates and
    /// the literal predicates `true` and `false`.
    #[must_use]
    pub fn static_value(&self, predicate: PredicateId) -> Option<bool> {
        self.static_values[predicate.0 as usize]
    }

    /// Total number of automaton states over all decisions.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.automata.iter().map(|a| a.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::diagnostics::DiagnosticQueue;
    use crate::grammar::{Expr, GrammarBuilder, GrammarKind};

    #[test]
    fn test_analyze_sequential_and_parallel_agree() {
        let grammar = Arc::new(
            GrammarBuilder::new("t", GrammarKind::Lexer)
                .rule("ID", Expr::plus(Expr::range('a', 'z')))
                .rule("INT", Expr::plus(Expr::range('0', '9')))
                .rule("WS", Expr::plus(Expr::choice([Expr::lit(" "), Expr::lit("\n")])))
                .build()
                .unwrap(),
        );
        let queue = DiagnosticQueue::new();
        let sequential = Analyzer::new(Arc::clone(&grammar))
            .with_config(AnalysisConfig::default().with_parallel(false))
            .analyze(&queue)
            .unwrap();
        let parallel = Analyzer::new(grammar)
            .with_config(AnalysisConfig::default().with_parallel(true))
            .analyze(&queue)
            .unwrap();
        assert_eq!(sequential.automata().len(), parallel.automata().len());
        for (a, b) in sequential.automata().iter().zip(parallel.automata()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_gate_resolver_sets_static_values() {
        let grammar = GrammarBuilder::new("t", GrammarKind::Parser)
            .rule(
                "a",
                Expr::choice([
                    Expr::seq([Expr::gate("enabled"), Expr::token("A")]),
                    Expr::seq([Expr::pred("true"), Expr::token("A")]),
                ]),
            )
            .build()
            .unwrap();
        let analysis = Analyzer::new(grammar)
            .with_gate_resolver(|p| (p.text() == "enabled").then_some(false))
            .analyze(&DiagnosticQueue::new())
            .unwrap();
        assert_eq!(analysis.static_value(PredicateId(0)), Some(false));
        assert_eq!(analysis.static_value(PredicateId(1)), Some(true));
        // The disabled alternative is gone, leaving a single choice.
        let start = analysis.automaton(DecisionId(0)).state(StateId::START);
        assert_eq!(
            start.terminal(),
            Some(&Resolution::Unique(crate::grammar::AltId(2)))
        );
    }
}
