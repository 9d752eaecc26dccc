//! # llstar
//!
//! An LL(*) decision engine with semantic predicates.
//!
//! ## Overview
//!
//! Given a grammar, llstar builds one lookahead automaton per decision point
//! (every choice between alternatives and every optional or loop block). An
//! automaton reads as many symbols as it needs, possibly unboundedly many,
//! to pick an alternative. Where lookahead alone can not decide, the
//! predicates written at the start of the competing alternatives are hoisted
//! into the automaton and evaluated against host state at run time.
//!
//! - **Grammar model**: rules, alternatives, blocks, predicates and actions,
//!   built and validated by [`GrammarBuilder`]
//! - **Semantic contexts**: canonical boolean formulas over predicates
//! - **Analysis**: NFA construction, subset construction and predicate
//!   hoisting, optionally in parallel
//! - **Runtime**: the decision procedure plus a reference recognizer that
//!   interprets lexer and parser rules
//!
//! ## Quick Start
//!
//! ```rust
//! use llstar::grammar::{Expr, GrammarBuilder, GrammarKind};
//! use llstar::analysis::Analyzer;
//! use llstar::error::diagnostics::DiagnosticQueue;
//! use llstar::runtime::{CharStream, Lexer};
//! use llstar::testing::ScriptedHost;
//!
//! // A and B match the same text; the predicates pick one.
//! let grammar = GrammarBuilder::new("T", GrammarKind::Lexer)
//!     .rule("A", Expr::seq([Expr::pred("p"), Expr::lit("a")]))
//!     .rule("B", Expr::seq([Expr::pred("!p"), Expr::lit("a")]))
//!     .build()
//!     .expect("valid grammar");
//!
//! let diagnostics = DiagnosticQueue::new();
//! let analysis = Analyzer::new(grammar).analyze(&diagnostics).expect("converges");
//!
//! let host = ScriptedHost::new().with_flag("p", false);
//! let mut lexer = Lexer::new(&analysis, CharStream::new("a"), host);
//! let token = lexer.next_token().expect("recognized").expect("one token");
//! assert_eq!(Some(token.token_type), analysis.grammar().token_type("B"));
//! ```
//!
//! ## Modules
//!
//! - [`grammar`] - Grammar model, builder and symbol table
//! - [`context`] - Semantic context algebra
//! - [`analysis`] - Lookahead automaton construction
//! - [`runtime`] - Decision procedure and reference recognizer
//! - [`error`] - Error types and the diagnostics channel
//! - [`testing`] - Scripted host for tests

pub mod analysis;
pub mod context;
pub mod error;
pub mod grammar;
pub mod runtime;
pub mod testing;

// Re-export commonly used types
pub use analysis::{Analysis, AnalysisConfig, Analyzer, DecisionAutomaton, Resolution};
pub use context::SemanticContext;
pub use error::diagnostics::{DiagnosticQueue, Diagnostics, TracingDiagnostics};
pub use error::{AnalysisError, GrammarError, GrammarErrors, RecognitionError};
pub use grammar::{
    AltId, DecisionId, Expr, Grammar, GrammarBuilder, GrammarKind, Predicate, PredicateMode,
};
pub use runtime::{
    CharStream, Lexer, Parser, PredicateEvaluator, SemanticHost, SymbolStream, Token,
    TokenStream, predict,
};
