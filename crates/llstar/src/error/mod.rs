//! # Error Types
//!
//! Errors raised by the three phases of the engine:
//!
//! - [`GrammarError`] / [`GrammarErrors`]: problems found while building a
//!   grammar (undefined rules, redefinitions, literals without a lexer rule).
//! - [`AnalysisError`]: a decision whose lookahead automaton does not fit in
//!   the configured state budget, or whose lookahead needs unbounded
//!   recursion. This is fatal to the whole analysis.
//! - [`RecognitionError`]: a decision or match that failed at runtime. It is
//!   local to one decision and returned to the caller as is.
//!
//! Ambiguities are *not* errors. They are resolved by the lowest-ordinal rule
//! and reported on the [`Diagnostics`](diagnostics::Diagnostics) channel.
//!
//! ## Diagnostics Support
//!
//! With the `diagnostics` feature every error derives [`miette::Diagnostic`]
//! and carries a stable error code.

pub mod diagnostics;

pub use crate::grammar::{GrammarError, GrammarErrors};

use crate::grammar::symbol_set::display_symbol;
use crate::grammar::{DecisionId, SymbolSet};
use compact_str::CompactString;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Failure to build the lookahead automaton of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum AnalysisError {
    #[error(
        "lookahead automaton for {decision} in rule {rule} did not converge within {max_states} states"
    )]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(analysis::non_convergence),
            help("left-factor the alternatives or add a predicate to tell them apart")
        )
    )]
    NonConvergence {
        rule: CompactString,
        decision: DecisionId,
        max_states: usize,
    },

    /// The alternatives only differ after an unbounded nesting of `callee`.
    #[error(
        "lookahead for {decision} in rule {rule} recurses into {callee} more than {max_depth} times"
    )]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(analysis::recursion_overflow),
            help("left-factor the recursive prefix or add a predicate to tell the alternatives apart")
        )
    )]
    RecursionOverflow {
        rule: CompactString,
        decision: DecisionId,
        callee: CompactString,
        max_depth: usize,
    },
}

impl AnalysisError {
    /// Rule holding the decision that failed.
    #[must_use]
    pub fn rule(&self) -> &str {
        match self {
            Self::NonConvergence { rule, .. } | Self::RecursionOverflow { rule, .. } => rule,
        }
    }

    #[must_use]
    pub const fn decision(&self) -> DecisionId {
        match self {
            Self::NonConvergence { decision, .. } | Self::RecursionOverflow { decision, .. } => {
                *decision
            }
        }
    }
}

/// Failure while recognizing input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum RecognitionError {
    /// Every candidate predicate of a decision evaluated false, or an
    /// in-body predicate failed. Never downgraded to a warning.
    #[error("rule {rule} failed predicate: {{{predicate}}}?")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(runtime::failed_predicate)))]
    FailedPredicate {
        rule: CompactString,
        predicate: CompactString,
    },

    #[error("no viable alternative at {} for {decision} in rule {rule} (index {index})", describe(.symbol))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(runtime::no_viable_alternative)))]
    NoViableAlternative {
        rule: CompactString,
        decision: DecisionId,
        symbol: Option<u32>,
        index: usize,
    },

    #[error("mismatched input {} expecting {expected} in rule {rule} (index {index})", describe(.found))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(runtime::mismatched_symbol)))]
    MismatchedSymbol {
        rule: CompactString,
        expected: SymbolSet,
        found: Option<u32>,
        index: usize,
    },

    #[error("({decision})+ loop in rule {rule} did not match anything at index {index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(runtime::early_exit)))]
    EarlyExit {
        rule: CompactString,
        decision: DecisionId,
        index: usize,
    },

    #[error("unknown rule: {name}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(runtime::unknown_rule)))]
    UnknownRule { name: CompactString },
}

impl RecognitionError {
    #[must_use]
    pub const fn is_failed_predicate(&self) -> bool {
        matches!(self, Self::FailedPredicate { .. })
    }

    /// Rule the error was raised in, when it has one.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::FailedPredicate { rule, .. }
            | Self::NoViableAlternative { rule, .. }
            | Self::MismatchedSymbol { rule, .. }
            | Self::EarlyExit { rule, .. } => Some(rule),
            Self::UnknownRule { .. } => None,
        }
    }
}

fn describe(symbol: &Option<u32>) -> String {
    symbol.map_or_else(|| "<EOF>".to_string(), display_symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_predicate_message() {
        let error = RecognitionError::FailedPredicate {
            rule: "a".into(),
            predicate: "false".into(),
        };
        assert_eq!(error.to_string(), "rule a failed predicate: {false}?");
        assert!(error.is_failed_predicate());
        assert_eq!(error.rule(), Some("a"));
    }

    #[test]
    fn test_no_viable_alternative_at_eof() {
        let error = RecognitionError::NoViableAlternative {
            rule: "Tokens".into(),
            decision: DecisionId(3),
            symbol: None,
            index: 7,
        };
        assert!(error.to_string().contains("<EOF>"));
        assert!(!error.is_failed_predicate());
    }

    #[test]
    fn test_mismatched_symbol_shows_characters() {
        let error = RecognitionError::MismatchedSymbol {
            rule: "A".into(),
            expected: SymbolSet::single('a' as u32),
            found: Some('b' as u32),
            index: 0,
        };
        assert_eq!(
            error.to_string(),
            "mismatched input 'b' expecting 'a' in rule A (index 0)"
        );
    }

    #[test]
    fn test_recursion_overflow_names_rule_and_callee() {
        let error = AnalysisError::RecursionOverflow {
            rule: "a".into(),
            decision: DecisionId(0),
            callee: "b".into(),
            max_depth: 4,
        };
        assert_eq!(error.rule(), "a");
        assert_eq!(error.decision(), DecisionId(0));
        assert!(error.to_string().contains("recurses into b more than 4 times"));
    }
}
