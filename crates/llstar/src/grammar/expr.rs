//! Rule bodies as handed to [`GrammarBuilder`](super::GrammarBuilder).
//!
//! `Expr` is the unresolved form of a rule: names are still strings and
//! literals are still text. The builder resolves it into
//! [`Block`](super::Block)s, assigning token types, predicate ids and
//! decision numbers along the way.

use super::predicate::{PredicateMode, SourceLocation};
use compact_str::CompactString;

/// Repetition operator of a sub-expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repeat {
    /// `x?`
    Optional,
    /// `x*`
    ZeroOrMore,
    /// `x+`
    OneOrMore,
}

/// A rule body expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Reference by name. Uppercase names are tokens (in parser rules) or
    /// lexer rule calls (in lexer rules); lowercase names are parser rules.
    Ref(CompactString),
    /// Quoted literal. Matches characters in lexer rules and the literal's
    /// token in parser rules of a combined grammar.
    Literal(CompactString),
    /// Character range, lexer rules only.
    Range(char, char),
    /// `.`: any character in lexer rules, any token in parser rules.
    Any,
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat(Repeat, Box<Expr>),
    Predicate {
        text: CompactString,
        mode: PredicateMode,
        location: Option<SourceLocation>,
    },
    Action(CompactString),
    /// Matches nothing, e.g. the empty alternative in `(a | )`.
    Empty,
}

impl Expr {
    /// Reference to a parser rule.
    pub fn rule(name: impl Into<CompactString>) -> Self {
        Self::Ref(name.into())
    }

    /// Reference to a token, or a call to a lexer rule from another lexer rule.
    pub fn token(name: impl Into<CompactString>) -> Self {
        Self::Ref(name.into())
    }

    pub fn lit(text: impl Into<CompactString>) -> Self {
        Self::Literal(text.into())
    }

    #[must_use]
    pub const fn range(lo: char, hi: char) -> Self {
        Self::Range(lo, hi)
    }

    #[must_use]
    pub const fn any() -> Self {
        Self::Any
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self::Empty
    }

    pub fn seq(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Seq(items.into_iter().collect())
    }

    pub fn choice(alternatives: impl IntoIterator<Item = Self>) -> Self {
        Self::Choice(alternatives.into_iter().collect())
    }

    #[must_use]
    pub fn opt(expr: Self) -> Self {
        Self::Repeat(Repeat::Optional, Box::new(expr))
    }

    #[must_use]
    pub fn star(expr: Self) -> Self {
        Self::Repeat(Repeat::ZeroOrMore, Box::new(expr))
    }

    #[must_use]
    pub fn plus(expr: Self) -> Self {
        Self::Repeat(Repeat::OneOrMore, Box::new(expr))
    }

    /// Validating predicate `{text}?`.
    pub fn pred(text: impl Into<CompactString>) -> Self {
        Self::Predicate {
            text: text.into(),
            mode: PredicateMode::Validating,
            location: None,
        }
    }

    /// Gated predicate `{text}?=>`.
    pub fn gate(text: impl Into<CompactString>) -> Self {
        Self::Predicate {
            text: text.into(),
            mode: PredicateMode::Gated,
            location: None,
        }
    }

    pub fn action(text: impl Into<CompactString>) -> Self {
        Self::Action(text.into())
    }

    /// Attaches a source location to a predicate. Other expressions are
    /// returned unchanged.
    #[must_use]
    pub fn at(self, line: u32, column: u32) -> Self {
        match self {
            Self::Predicate { text, mode, .. } => Self::Predicate {
                text,
                mode,
                location: Some(SourceLocation::new(line, column)),
            },
            other => other,
        }
    }

    /// Calls `f` on every expression in the tree, parents before children.
    pub(crate) fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        f(self);
        match self {
            Self::Seq(items) | Self::Choice(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            Self::Repeat(_, inner) => inner.walk(f),
            _ => {}
        }
    }
}
