//! # Grammar Model
//!
//! The read-only description of a grammar that the analysis consumes: rules,
//! their blocks and alternatives, and the predicates and actions attached to
//! them.
//!
//! Grammars are assembled with [`GrammarBuilder`] from [`Expr`] trees. The
//! builder resolves names through the [`SymbolTable`], assigns token types
//! (starting at [`MIN_TOKEN_TYPE`]) and numbers every decision point.
//!
//! ## Decision points
//!
//! A block is a decision point when it has more than one alternative or when
//! it is an optional or repeated block. Optional and loop blocks get one more
//! alternative than they list: the *exit* alternative, which always has the
//! highest ordinal.
//!
//! Lexer and combined grammars additionally get a synthetic `Tokens` rule
//! whose alternatives call every non-fragment lexer rule; its decision is
//! what picks the next token.
//!
//! ```rust
//! use llstar::grammar::{DecisionKind, Expr, GrammarBuilder, GrammarKind};
//!
//! let grammar = GrammarBuilder::new("T", GrammarKind::Parser)
//!     .rule("a", Expr::seq([Expr::star(Expr::token("A")), Expr::token("B")]))
//!     .build()
//!     .unwrap();
//!
//! let decision = grammar.decisions().next().unwrap();
//! assert_eq!(decision.kind, DecisionKind::Star);
//! assert_eq!(decision.alt_count, 2);
//! ```

mod builder;
mod expr;
pub mod predicate;
pub mod symbol_set;
mod symbols;

pub use builder::{GrammarBuilder, GrammarError, GrammarErrors};
pub use expr::{Expr, Repeat};
pub use predicate::{Action, ActionId, Predicate, PredicateId, PredicateMode, SourceLocation};
pub use symbol_set::SymbolSet;
pub use symbols::SymbolTable;

use compact_str::CompactString;
use std::fmt;
use std::sync::Arc;

/// Token type (parser grammars) or code point (lexer grammars).
pub type TokenType = u32;

/// Lowest token type handed out to user tokens. Lower values are reserved.
pub const MIN_TOKEN_TYPE: TokenType = 4;

/// Name of the synthetic token dispatch rule.
pub const TOKENS_RULE_NAME: &str = "Tokens";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionId(pub u32);

/// 1-based alternative ordinal. Lower ordinals have higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AltId(pub u32);

impl AltId {
    /// Zero-based index into a block's alternatives.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decision {}", self.0)
    }
}

impl fmt::Display for AltId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alt {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum GrammarKind {
    Parser,
    Lexer,
    /// Parser and lexer rules in one grammar; literals in parser rules
    /// become implicit tokens.
    Combined,
}

impl fmt::Display for GrammarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parser => "parser",
            Self::Lexer => "lexer",
            Self::Combined => "combined",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleKind {
    Parser,
    Lexer,
}

impl RuleKind {
    /// Uppercase names are lexer rules, everything else is a parser rule.
    #[must_use]
    pub fn of(name: &str) -> Self {
        if name.chars().next().is_some_and(char::is_uppercase) {
            Self::Lexer
        } else {
            Self::Parser
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    Single,
    Optional,
    Star,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum DecisionKind {
    /// Choice between the alternatives of a block.
    Block,
    Optional,
    Star,
    Plus,
    /// The token dispatch decision of a lexer.
    Tokens,
}

impl DecisionKind {
    /// Whether the last alternative of the decision leaves the block.
    #[must_use]
    pub const fn has_exit(self) -> bool {
        matches!(self, Self::Optional | Self::Star | Self::Plus)
    }
}

/// One decision point of the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionInfo {
    pub id: DecisionId,
    pub rule: RuleId,
    pub kind: DecisionKind,
    /// Number of alternatives, the exit alternative included.
    pub alt_count: u32,
}

impl DecisionInfo {
    /// Ordinal of the exit alternative, if the decision has one.
    #[must_use]
    pub const fn exit_alt(&self) -> Option<AltId> {
        if self.kind.has_exit() {
            Some(AltId(self.alt_count))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub enum Element {
    Match(SymbolSet),
    Rule(RuleId),
    Block(Block),
    Predicate(PredicateId),
    Action(ActionId),
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub ordinal: AltId,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub decision: Option<DecisionId>,
    pub alternatives: Vec<Alternative>,
}

impl Block {
    /// Ordinal of the alternative that leaves an optional or loop block.
    #[must_use]
    pub fn exit_alt(&self) -> AltId {
        AltId(self.alternatives.len() as u32 + 1)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub name: CompactString,
    pub kind: RuleKind,
    pub fragment: bool,
    /// Rules the builder made up: the token dispatch rule and the implicit
    /// lexer rules for literals of a combined grammar.
    pub synthetic: bool,
    /// Token emitted when this lexer rule matches.
    pub token_type: Option<TokenType>,
    pub block: Block,
}

/// A fully resolved grammar.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) name: CompactString,
    pub(crate) kind: GrammarKind,
    pub(crate) rules: Vec<Rule>,
    pub(crate) decisions: Vec<DecisionInfo>,
    pub(crate) predicates: Vec<Arc<Predicate>>,
    pub(crate) actions: Vec<Action>,
    pub(crate) symbols: SymbolTable,
    pub(crate) tokens_rule: Option<RuleId>,
}

impl Grammar {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> GrammarKind {
        self.kind
    }

    #[must_use]
    pub const fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0 as usize]
    }

    #[must_use]
    pub fn rule_by_name(&self, name: &str) -> Option<&Rule> {
        self.symbols.rule(name).map(|id| self.rule(id))
    }

    /// Names of the rules written by the user, in definition order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|rule| !rule.synthetic)
            .map(|rule| rule.name.as_str())
    }

    /// All token names, in token type order.
    pub fn token_names(&self) -> impl Iterator<Item = &str> {
        self.symbols.token_names()
    }

    #[must_use]
    pub fn token_type(&self, name: &str) -> Option<TokenType> {
        self.symbols.resolve_token_type(name)
    }

    pub fn decisions(&self) -> impl Iterator<Item = &DecisionInfo> {
        self.decisions.iter()
    }

    #[must_use]
    pub fn decision(&self, id: DecisionId) -> &DecisionInfo {
        &self.decisions[id.0 as usize]
    }

    #[must_use]
    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Arc<Predicate>> {
        self.predicates.iter()
    }

    #[must_use]
    pub fn predicate(&self, id: PredicateId) -> &Arc<Predicate> {
        &self.predicates[id.0 as usize]
    }

    #[must_use]
    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.0 as usize]
    }

    /// The synthetic token dispatch rule, present when the grammar has lexer
    /// rules.
    #[must_use]
    pub fn tokens_rule(&self) -> Option<&Rule> {
        self.tokens_rule.map(|id| self.rule(id))
    }

    /// Rule that an alternative of the token dispatch decision calls.
    #[must_use]
    pub fn token_rule_for(&self, alt: AltId) -> Option<&Rule> {
        let tokens = self.tokens_rule()?;
        match tokens.block.alternatives.get(alt.index())?.elements.first()? {
            Element::Rule(id) => Some(self.rule(*id)),
            _ => None,
        }
    }

    /// Symbols matched by `.` in rules of the given kind.
    #[must_use]
    pub fn any_symbol(&self, kind: RuleKind) -> SymbolSet {
        match kind {
            RuleKind::Lexer => SymbolSet::range(0, symbol_set::MAX_CHAR),
            RuleKind::Parser if self.symbols.max_token_type() < MIN_TOKEN_TYPE => {
                SymbolSet::empty()
            }
            RuleKind::Parser => SymbolSet::range(MIN_TOKEN_TYPE, self.symbols.max_token_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_kind_from_name() {
        assert_eq!(RuleKind::of("ID"), RuleKind::Lexer);
        assert_eq!(RuleKind::of("Tokens"), RuleKind::Lexer);
        assert_eq!(RuleKind::of("expr"), RuleKind::Parser);
        assert_eq!(RuleKind::of(""), RuleKind::Parser);
    }

    #[test]
    fn test_exit_alt_is_last() {
        let info = DecisionInfo {
            id: DecisionId(0),
            rule: RuleId(0),
            kind: DecisionKind::Star,
            alt_count: 3,
        };
        assert_eq!(info.exit_alt(), Some(AltId(3)));

        let block = DecisionInfo {
            kind: DecisionKind::Block,
            ..info
        };
        assert_eq!(block.exit_alt(), None);
    }

    #[test]
    fn test_alt_index_is_zero_based() {
        assert_eq!(AltId(1).index(), 0);
        assert_eq!(AltId(4).index(), 3);
    }
}
