//! # Runtime Decision Procedure
//!
//! [`predict`] walks a decision's lookahead automaton over a live input and,
//! where lookahead is not enough, evaluates the hoisted predicates through a
//! [`PredicateEvaluator`].
//!
//! The reference recognizer in [`interpreter`] drives whole rules with it.

pub mod interpreter;
mod stream;
mod token;

pub use interpreter::{Interpreter, Lexer, Parser, SemanticHost};
pub use stream::{CharStream, SymbolStream, TokenStream};
pub use token::{INVALID_TOKEN_TYPE, Token};

use crate::analysis::{Candidate, DecisionAutomaton, Resolution};
use crate::context::SemanticContext;
use crate::error::RecognitionError;
use crate::error::diagnostics::Diagnostics;
use crate::grammar::{AltId, Predicate, PredicateId};
use smallvec::SmallVec;
use tracing::trace;

/// Evaluates predicates against host state.
///
/// Predicates are pure with respect to the input: evaluating one must not
/// consume symbols.
pub trait PredicateEvaluator {
    fn eval(&mut self, predicate: &Predicate) -> bool;
}

impl<F> PredicateEvaluator for F
where
    F: FnMut(&Predicate) -> bool,
{
    fn eval(&mut self, predicate: &Predicate) -> bool {
        self(predicate)
    }
}

/// Chooses an alternative of `automaton` for the upcoming input.
///
/// The input is only peeked. The evaluator is not called when lookahead
/// alone decides, and each predicate is evaluated at most once, whether it
/// guards an edge or a resolution.
pub fn predict<S, E>(
    automaton: &DecisionAutomaton,
    input: &S,
    evaluator: &mut E,
    diagnostics: &dyn Diagnostics,
) -> Result<AltId, RecognitionError>
where
    S: SymbolStream + ?Sized,
    E: PredicateEvaluator + ?Sized,
{
    let mut guards = Guards {
        evaluator,
        memo: SmallVec::new(),
    };
    let mut state = automaton.state(automaton.start());
    let mut depth = 1;
    loop {
        if let Some(resolution) = state.terminal() {
            return resolve(automaton, resolution, &mut guards, diagnostics);
        }
        let symbol = input.la(depth);
        let edge = symbol
            .and_then(|s| state.edge(s))
            .filter(|t| t.gate.as_ref().is_none_or(|gate| guards.holds(gate)));
        if let Some(edge) = edge {
            state = automaton.state(edge.target);
            depth += 1;
            continue;
        }
        if let Some(resolution) = state.accept() {
            return resolve(automaton, resolution, &mut guards, diagnostics);
        }
        trace!(
            decision = automaton.decision().0,
            depth,
            "no viable alternative"
        );
        return Err(RecognitionError::NoViableAlternative {
            rule: automaton.rule_name().into(),
            decision: automaton.decision(),
            symbol,
            index: input.index() + depth - 1,
        });
    }
}

/// Memoizing front of the caller's evaluator for one prediction.
struct Guards<'e, E: ?Sized> {
    evaluator: &'e mut E,
    memo: SmallVec<[(PredicateId, bool); 4]>,
}

impl<E: PredicateEvaluator + ?Sized> Guards<'_, E> {
    fn holds(&mut self, context: &SemanticContext) -> bool {
        context.eval(&mut |predicate: &Predicate| self.leaf(predicate))
    }

    fn leaf(&mut self, predicate: &Predicate) -> bool {
        if let Some(value) = predicate.constant() {
            return value;
        }
        if let Some(&(_, value)) = self.memo.iter().find(|(id, _)| *id == predicate.id()) {
            return value;
        }
        let value = self.evaluator.eval(predicate);
        trace!(predicate = predicate.text(), value, "predicate evaluated");
        self.memo.push((predicate.id(), value));
        value
    }
}

fn resolve<E>(
    automaton: &DecisionAutomaton,
    resolution: &Resolution,
    guards: &mut Guards<'_, E>,
    diagnostics: &dyn Diagnostics,
) -> Result<AltId, RecognitionError>
where
    E: PredicateEvaluator + ?Sized,
{
    let candidates = match resolution {
        Resolution::Unique(alt) | Resolution::Ambiguous { chosen: alt, .. } => return Ok(*alt),
        Resolution::Predicated(candidates) => candidates,
    };

    // Guards that leave a block come before guards that stay in it.
    let predicated = |exit: bool| {
        candidates
            .iter()
            .filter(move |c| c.exit_branch == exit && c.context.is_some())
    };
    for candidate in predicated(true).chain(predicated(false)) {
        if let Some(context) = &candidate.context
            && guards.holds(context)
        {
            trace!(
                decision = automaton.decision().0,
                alt = candidate.alt.0,
                "predicate chose alternative"
            );
            return Ok(candidate.alt);
        }
    }

    if let Some(default) = candidates.iter().find(|c| c.context.is_none()) {
        let alternatives: Vec<AltId> = candidates.iter().map(|c| c.alt).collect();
        diagnostics.report_ambiguity(automaton.decision(), default.alt, &alternatives);
        return Ok(default.alt);
    }

    let predicate = first_failing(candidates);
    diagnostics.report_predicate_failure(automaton.rule_name(), &predicate);
    Err(RecognitionError::FailedPredicate {
        rule: automaton.rule_name().into(),
        predicate: predicate.into(),
    })
}

/// Source text of the guard that failed first, in evaluation order.
fn first_failing(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .filter(|c| c.exit_branch)
        .chain(candidates.iter().filter(|c| !c.exit_branch))
        .find_map(|c| c.context.as_ref())
        .map(ToString::to_string)
        .unwrap_or_default()
}
