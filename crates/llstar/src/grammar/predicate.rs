//! Semantic predicates and actions attached to grammar elements
//!
//! A predicate is an opaque boolean expression in the host language. The
//! engine never looks inside it; it only needs to know the literal source
//! text (for diagnostics), the enclosing rule, and how the predicate takes
//! part in prediction. That last part is carried as an explicit
//! [`PredicateMode`] on every predicate and is never inferred from where the
//! predicate happens to sit in a rule.
//!
//! ```rust
//! use llstar::grammar::{Expr, GrammarBuilder, GrammarKind};
//!
//! let grammar = GrammarBuilder::new("T", GrammarKind::Lexer)
//!     .rule("A", Expr::seq([Expr::gate("true"), Expr::lit("a")]))
//!     .rule("B", Expr::seq([Expr::pred("!p"), Expr::lit("a")]))
//!     .build()
//!     .unwrap();
//!
//! let gate = grammar.predicates().next().unwrap();
//! assert!(gate.is_gated());
//! assert_eq!(gate.constant(), Some(true));
//! ```

use compact_str::CompactString;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of a predicate, unique within one grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PredicateId(pub u32);

/// Identifier of an action, unique within one grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionId(pub u32);

/// How a predicate participates in prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PredicateMode {
    /// `{p}?`: checked when reached, and hoisted into decisions that need it
    /// to tell alternatives apart.
    Validating,
    /// `{p}?=>`: switches its alternative on or off before lookahead runs.
    Gated,
}

/// Where a predicate was written in the grammar source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A semantic predicate.
///
/// Equality, hashing and ordering only look at the id: two predicates with
/// the same text at different places in the grammar are different guards.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Predicate {
    id: PredicateId,
    text: CompactString,
    mode: PredicateMode,
    rule_name: CompactString,
    location: Option<SourceLocation>,
}

impl Predicate {
    pub(crate) fn new(
        id: PredicateId,
        text: CompactString,
        mode: PredicateMode,
        rule_name: CompactString,
        location: Option<SourceLocation>,
    ) -> Self {
        Self {
            id,
            text,
            mode,
            rule_name,
            location,
        }
    }

    #[must_use]
    pub const fn id(&self) -> PredicateId {
        self.id
    }

    /// Literal source text, without braces or `?`.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn mode(&self) -> PredicateMode {
        self.mode
    }

    #[must_use]
    pub const fn is_gated(&self) -> bool {
        matches!(self.mode, PredicateMode::Gated)
    }

    /// Name of the rule the predicate is written in.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    #[must_use]
    pub const fn location(&self) -> Option<SourceLocation> {
        self.location
    }

    /// Value of the predicate when its text is the literal `true` or `false`.
    #[must_use]
    pub fn constant(&self) -> Option<bool> {
        match self.text.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Predicate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Predicate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            PredicateMode::Validating => write!(f, "{{{}}}?", self.text),
            PredicateMode::Gated => write!(f, "{{{}}}?=>", self.text),
        }
    }
}

/// An embedded action. Opaque to the engine, handed to the host when reached.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Action {
    id: ActionId,
    text: CompactString,
    rule_name: CompactString,
}

impl Action {
    pub(crate) fn new(id: ActionId, text: CompactString, rule_name: CompactString) -> Self {
        Self {
            id,
            text,
            rule_name,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predicate(id: u32, text: &str) -> Predicate {
        Predicate::new(
            PredicateId(id),
            text.into(),
            PredicateMode::Validating,
            "r".into(),
            None,
        )
    }

    #[test]
    fn test_identity_is_by_id() {
        assert_ne!(predicate(0, "p"), predicate(1, "p"));
        assert_eq!(predicate(2, "p"), predicate(2, "q"));
        assert!(predicate(0, "z") < predicate(1, "a"));
    }

    #[test]
    fn test_constant_detection() {
        assert_eq!(predicate(0, " true ").constant(), Some(true));
        assert_eq!(predicate(0, "false").constant(), Some(false));
        assert_eq!(predicate(0, "!false").constant(), None);
    }

    #[test]
    fn test_display_marks_mode() {
        let mut p = predicate(0, "n<2");
        assert_eq!(p.to_string(), "{n<2}?");
        p.mode = PredicateMode::Gated;
        assert_eq!(p.to_string(), "{n<2}?=>");
    }
}
