use super::expr::{Expr, Repeat};
use super::predicate::{Action, ActionId, Predicate, PredicateId, PredicateMode, SourceLocation};
use super::symbol_set::{SymbolSet, MAX_CHAR};
use super::symbols::SymbolTableBuilder;
use super::{
    AltId, Alternative, Block, BlockKind, DecisionId, DecisionInfo, DecisionKind, Element,
    Grammar, GrammarKind, Rule, RuleId, RuleKind, TokenType, MIN_TOKEN_TYPE, TOKENS_RULE_NAME,
};
use crate::error::diagnostics::did_you_mean;
use compact_str::{format_compact, CompactString};
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Builder for [`Grammar`].
///
/// Rules are added with their name and body; the name decides whether it is
/// a lexer rule (uppercase) or a parser rule. Nothing is resolved until
/// [`build`](Self::build), which reports every definition problem at once.
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    name: CompactString,
    kind: GrammarKind,
    rules: Vec<RuleDef>,
    tokens: Vec<TokenDef>,
}

#[derive(Debug, Clone)]
struct RuleDef {
    name: CompactString,
    body: Expr,
    fragment: bool,
}

/// Entry of the `tokens { ... }` section.
#[derive(Debug, Clone)]
struct TokenDef {
    name: CompactString,
    literal: Option<CompactString>,
}

/// Implicit lexer rule for a literal token of a combined grammar.
#[derive(Debug, Clone)]
struct LiteralRule {
    name: CompactString,
    text: CompactString,
    token_type: TokenType,
}

impl GrammarBuilder {
    pub fn new(name: impl Into<CompactString>, kind: GrammarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            rules: Vec::new(),
            tokens: Vec::new(),
        }
    }

    #[must_use]
    pub fn rule(mut self, name: impl Into<CompactString>, body: Expr) -> Self {
        self.rules.push(RuleDef {
            name: name.into(),
            body,
            fragment: false,
        });
        self
    }

    /// A lexer rule that never produces a token on its own and can only be
    /// called from other lexer rules.
    #[must_use]
    pub fn fragment(mut self, name: impl Into<CompactString>, body: Expr) -> Self {
        self.rules.push(RuleDef {
            name: name.into(),
            body,
            fragment: true,
        });
        self
    }

    /// Declares an imaginary token in the `tokens` section.
    #[must_use]
    pub fn token(mut self, name: impl Into<CompactString>) -> Self {
        self.tokens.push(TokenDef {
            name: name.into(),
            literal: None,
        });
        self
    }

    /// Declares `name='literal'` in the `tokens` section.
    #[must_use]
    pub fn token_alias(
        mut self,
        name: impl Into<CompactString>,
        literal: impl Into<CompactString>,
    ) -> Self {
        self.tokens.push(TokenDef {
            name: name.into(),
            literal: Some(literal.into()),
        });
        self
    }

    /// Resolves names, assigns token types and numbers decisions.
    pub fn build(self) -> Result<Grammar, GrammarErrors> {
        let mut errors = Vec::new();
        let mut symbols = SymbolTableBuilder::default();

        let accepted = self.register_rules(&mut symbols, &mut errors);
        let literal_rules = self.assign_token_types(&accepted, &mut symbols, &mut errors);

        let mut lowering = Lowering {
            grammar_kind: self.kind,
            symbols: &mut symbols,
            errors: &mut errors,
            decisions: Vec::new(),
            predicates: Vec::new(),
            actions: Vec::new(),
            any_token: SymbolSet::empty(),
            rule_name: CompactString::default(),
            rule_kind: RuleKind::Parser,
        };
        let max_type = lowering.symbols.max_token_type();
        if max_type >= MIN_TOKEN_TYPE {
            lowering.any_token = SymbolSet::range(MIN_TOKEN_TYPE, max_type);
        }

        let mut rules = Vec::with_capacity(accepted.len() + literal_rules.len() + 1);
        for (index, def) in accepted.iter().enumerate() {
            let kind = RuleKind::of(&def.name);
            let token_type = if kind == RuleKind::Lexer && !def.fragment {
                lowering.symbols.token_type(&def.name)
            } else {
                None
            };
            let block = lowering.lower_rule(&def.name, kind, &def.body);
            if kind == RuleKind::Lexer
                && !def.fragment
                && block.alternatives.iter().all(|alt| alt.elements.is_empty())
            {
                lowering.errors.push(GrammarError::EmptyRule {
                    name: def.name.clone(),
                });
            }
            rules.push(Rule {
                id: RuleId(index as u32),
                name: def.name.clone(),
                kind,
                fragment: def.fragment,
                synthetic: false,
                token_type,
                block,
            });
        }

        // Implicit literal rules come before user lexer rules in the token
        // dispatch decision so that keywords win over identifiers.
        let mut dispatch: Vec<RuleId> = Vec::new();
        for literal in &literal_rules {
            let id = RuleId(rules.len() as u32);
            if !lowering.symbols.define_rule(&literal.name, id) {
                continue;
            }
            let block = lowering.lower_rule(
                &literal.name,
                RuleKind::Lexer,
                &Expr::Literal(literal.text.clone()),
            );
            rules.push(Rule {
                id,
                name: literal.name.clone(),
                kind: RuleKind::Lexer,
                fragment: false,
                synthetic: true,
                token_type: Some(literal.token_type),
                block,
            });
            dispatch.push(id);
        }
        dispatch.extend(
            rules
                .iter()
                .filter(|rule| !rule.synthetic && rule.token_type.is_some())
                .map(|rule| rule.id),
        );

        let mut tokens_rule = None;
        if self.kind != GrammarKind::Parser && !dispatch.is_empty() {
            let id = RuleId(rules.len() as u32);
            if lowering.symbols.define_rule(TOKENS_RULE_NAME, id) {
                let block = lowering.dispatch_block(id, &dispatch);
                rules.push(Rule {
                    id,
                    name: TOKENS_RULE_NAME.into(),
                    kind: RuleKind::Lexer,
                    fragment: false,
                    synthetic: true,
                    token_type: None,
                    block,
                });
                tokens_rule = Some(id);
            } else {
                lowering.errors.push(GrammarError::RuleRedefinition {
                    name: TOKENS_RULE_NAME.into(),
                });
            }
        }

        let Lowering {
            decisions,
            predicates,
            actions,
            ..
        } = lowering;

        if !errors.is_empty() {
            return Err(GrammarErrors { errors });
        }

        let grammar = Grammar {
            name: self.name,
            kind: self.kind,
            rules,
            decisions,
            predicates,
            actions,
            symbols: symbols.finish(),
            tokens_rule,
        };
        debug!(
            grammar = %grammar.name,
            kind = %grammar.kind,
            rules = grammar.rules.len(),
            decisions = grammar.decisions.len(),
            tokens = grammar.symbols.token_names().count(),
            "grammar built"
        );
        Ok(grammar)
    }

    /// Gives every acceptable rule an id, in definition order.
    fn register_rules<'a>(
        &'a self,
        symbols: &mut SymbolTableBuilder,
        errors: &mut Vec<GrammarError>,
    ) -> Vec<&'a RuleDef> {
        let mut accepted = Vec::with_capacity(self.rules.len());
        for def in &self.rules {
            let misplaced = matches!(
                (self.kind, RuleKind::of(&def.name)),
                (GrammarKind::Parser, RuleKind::Lexer) | (GrammarKind::Lexer, RuleKind::Parser)
            );
            if misplaced {
                errors.push(GrammarError::MisplacedRule {
                    name: def.name.clone(),
                    grammar: self.kind,
                });
                continue;
            }
            if !symbols.define_rule(&def.name, RuleId(accepted.len() as u32)) {
                errors.push(GrammarError::RuleRedefinition {
                    name: def.name.clone(),
                });
                continue;
            }
            accepted.push(def);
        }
        accepted
    }

    /// Token types are handed out in this order: the tokens section,
    /// non-fragment lexer rules, literals of parser rules in a combined
    /// grammar, then tokens that a parser grammar only references.
    fn assign_token_types(
        &self,
        accepted: &[&RuleDef],
        symbols: &mut SymbolTableBuilder,
        errors: &mut Vec<GrammarError>,
    ) -> Vec<LiteralRule> {
        let mut literal_rules = Vec::new();

        for token in &self.tokens {
            let token_type = symbols.define_token(&token.name);
            let Some(literal) = &token.literal else {
                continue;
            };
            match self.kind {
                GrammarKind::Lexer => errors.push(GrammarError::CannotAliasTokensInLexer {
                    literal: quote(literal),
                }),
                GrammarKind::Parser => {
                    errors.push(GrammarError::LiteralNotAssociatedWithLexerRule {
                        literal: quote(literal),
                    });
                }
                GrammarKind::Combined => {
                    symbols.alias_token(&quote(literal), token_type);
                    literal_rules.push(LiteralRule {
                        name: token.name.clone(),
                        text: literal.clone(),
                        token_type,
                    });
                }
            }
        }

        for def in accepted {
            if RuleKind::of(&def.name) != RuleKind::Lexer || def.fragment {
                continue;
            }
            let token_type = symbols.define_token(&def.name);
            // A lexer rule that is exactly one literal owns that literal.
            if let Expr::Literal(text) = &def.body {
                symbols.alias_token(&quote(text), token_type);
            }
        }

        for def in accepted {
            if RuleKind::of(&def.name) != RuleKind::Parser {
                continue;
            }
            def.body.walk(&mut |expr| match expr {
                Expr::Literal(text) if self.kind == GrammarKind::Combined => {
                    let quoted = quote(text);
                    if symbols.token_type(&quoted).is_none() {
                        let token_type = symbols.define_token(&quoted);
                        literal_rules.push(LiteralRule {
                            name: format_compact!("T__{token_type}"),
                            text: text.clone(),
                            token_type,
                        });
                    }
                }
                Expr::Ref(name)
                    if self.kind == GrammarKind::Parser
                        && RuleKind::of(name) == RuleKind::Lexer =>
                {
                    symbols.define_token(name);
                }
                _ => {}
            });
        }

        literal_rules
    }
}

fn quote(text: &str) -> CompactString {
    format_compact!("'{text}'")
}

/// Turns rule bodies into blocks, numbering decisions, predicates and
/// actions in the order they are met.
struct Lowering<'a> {
    grammar_kind: GrammarKind,
    symbols: &'a mut SymbolTableBuilder,
    errors: &'a mut Vec<GrammarError>,
    decisions: Vec<DecisionInfo>,
    predicates: Vec<Arc<Predicate>>,
    actions: Vec<Action>,
    any_token: SymbolSet,
    rule_name: CompactString,
    rule_kind: RuleKind,
}

impl Lowering<'_> {
    fn lower_rule(&mut self, name: &str, kind: RuleKind, body: &Expr) -> Block {
        self.rule_name = name.into();
        self.rule_kind = kind;
        self.lower_block(body, BlockKind::Single)
    }

    fn current_rule(&self) -> RuleId {
        self.symbols.rule(&self.rule_name).unwrap_or(RuleId(u32::MAX))
    }

    fn new_decision(&mut self, kind: DecisionKind, alt_count: u32) -> DecisionId {
        let id = DecisionId(self.decisions.len() as u32);
        let rule = self.current_rule();
        self.decisions.push(DecisionInfo {
            id,
            rule,
            kind,
            alt_count,
        });
        id
    }

    fn lower_block(&mut self, body: &Expr, kind: BlockKind) -> Block {
        let alternatives: Vec<&Expr> = match body {
            Expr::Choice(alts) if !alts.is_empty() => alts.iter().collect(),
            other => vec![other],
        };
        let count = alternatives.len() as u32;
        let decision = match kind {
            BlockKind::Single if count > 1 => Some(self.new_decision(DecisionKind::Block, count)),
            BlockKind::Single => None,
            BlockKind::Optional => Some(self.new_decision(DecisionKind::Optional, count + 1)),
            BlockKind::Star => Some(self.new_decision(DecisionKind::Star, count + 1)),
            BlockKind::Plus => Some(self.new_decision(DecisionKind::Plus, count + 1)),
        };
        let alternatives = alternatives
            .into_iter()
            .enumerate()
            .map(|(i, expr)| {
                let mut elements = Vec::new();
                self.lower_into(expr, &mut elements);
                Alternative {
                    ordinal: AltId(i as u32 + 1),
                    elements,
                }
            })
            .collect();
        Block {
            kind,
            decision,
            alternatives,
        }
    }

    fn lower_into(&mut self, expr: &Expr, out: &mut Vec<Element>) {
        match expr {
            Expr::Seq(items) => {
                for item in items {
                    self.lower_into(item, out);
                }
            }
            Expr::Choice(alts) if alts.len() <= 1 => {
                for alt in alts {
                    self.lower_into(alt, out);
                }
            }
            Expr::Choice(_) => out.push(Element::Block(self.lower_block(expr, BlockKind::Single))),
            Expr::Repeat(repeat, inner) => {
                let kind = match repeat {
                    Repeat::Optional => BlockKind::Optional,
                    Repeat::ZeroOrMore => BlockKind::Star,
                    Repeat::OneOrMore => BlockKind::Plus,
                };
                out.push(Element::Block(self.lower_block(inner, kind)));
            }
            Expr::Empty => {}
            Expr::Any => out.push(Element::Match(match self.rule_kind {
                RuleKind::Lexer => SymbolSet::range(0, MAX_CHAR),
                RuleKind::Parser => self.any_token.clone(),
            })),
            Expr::Range(lo, hi) => match self.rule_kind {
                RuleKind::Lexer => {
                    out.push(Element::Match(SymbolSet::range(*lo as u32, *hi as u32)));
                }
                RuleKind::Parser => self.errors.push(GrammarError::CharRangeInParser {
                    rule: self.rule_name.clone(),
                }),
            },
            Expr::Literal(text) => self.lower_literal(text, out),
            Expr::Ref(name) => self.lower_ref(name, out),
            Expr::Predicate {
                text,
                mode,
                location,
            } => {
                let id = self.add_predicate(text, *mode, *location);
                out.push(Element::Predicate(id));
            }
            Expr::Action(text) => {
                let id = ActionId(self.actions.len() as u32);
                self.actions
                    .push(Action::new(id, text.clone(), self.rule_name.clone()));
                out.push(Element::Action(id));
            }
        }
    }

    fn add_predicate(
        &mut self,
        text: &CompactString,
        mode: PredicateMode,
        location: Option<SourceLocation>,
    ) -> PredicateId {
        let id = PredicateId(self.predicates.len() as u32);
        self.predicates.push(Arc::new(Predicate::new(
            id,
            text.clone(),
            mode,
            self.rule_name.clone(),
            location,
        )));
        id
    }

    fn lower_literal(&mut self, text: &CompactString, out: &mut Vec<Element>) {
        if self.rule_kind == RuleKind::Lexer {
            out.extend(
                text.chars()
                    .map(|c| Element::Match(SymbolSet::single(c as u32))),
            );
            return;
        }
        match self.symbols.token_type(&quote(text)) {
            Some(token_type) if self.grammar_kind == GrammarKind::Combined => {
                out.push(Element::Match(SymbolSet::single(token_type)));
            }
            _ => self
                .errors
                .push(GrammarError::LiteralNotAssociatedWithLexerRule {
                    literal: quote(text),
                }),
        }
    }

    fn lower_ref(&mut self, name: &CompactString, out: &mut Vec<Element>) {
        let target_kind = RuleKind::of(name);
        if self.rule_kind == RuleKind::Parser && target_kind == RuleKind::Lexer {
            let token_type = match self.symbols.token_type(name) {
                Some(token_type) => token_type,
                None if self.grammar_kind == GrammarKind::Parser => {
                    self.symbols.define_token(name)
                }
                None => {
                    self.errors
                        .push(GrammarError::NoTokenDefinition { name: name.clone() });
                    return;
                }
            };
            out.push(Element::Match(SymbolSet::single(token_type)));
            return;
        }

        let callable = !(self.rule_kind == RuleKind::Lexer && target_kind == RuleKind::Parser);
        match self.symbols.rule(name) {
            Some(id) if callable => out.push(Element::Rule(id)),
            _ => {
                let suggestion = did_you_mean(name, self.symbols.rule_names());
                self.errors.push(GrammarError::UndefinedRule {
                    name: name.clone(),
                    rule: self.rule_name.clone(),
                    suggestion,
                });
            }
        }
    }

    /// `Tokens : T__4 | A | B ;` over the given lexer rules.
    fn dispatch_block(&mut self, tokens: RuleId, targets: &[RuleId]) -> Block {
        self.rule_name = TOKENS_RULE_NAME.into();
        self.rule_kind = RuleKind::Lexer;
        let decision = DecisionId(self.decisions.len() as u32);
        self.decisions.push(DecisionInfo {
            id: decision,
            rule: tokens,
            kind: DecisionKind::Tokens,
            alt_count: targets.len() as u32,
        });
        Block {
            kind: BlockKind::Single,
            decision: Some(decision),
            alternatives: targets
                .iter()
                .enumerate()
                .map(|(i, &target)| Alternative {
                    ordinal: AltId(i as u32 + 1),
                    elements: vec![Element::Rule(target)],
                })
                .collect(),
        }
    }
}

/// A problem found while building a grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("rule {name} redefinition")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::rule_redefinition)))]
    RuleRedefinition { name: CompactString },

    #[error("reference to undefined rule: {name} (in rule {rule})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::undefined_rule)))]
    UndefinedRule {
        name: CompactString,
        rule: CompactString,
        /// Closest defined rule name, shown as help.
        #[cfg_attr(feature = "diagnostics", help)]
        suggestion: Option<CompactString>,
    },

    #[error("no lexer rule corresponding to token: {name}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::no_token_definition)))]
    NoTokenDefinition { name: CompactString },

    #[error("literal has no associated lexer rule: {literal}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(grammar::literal_not_associated_with_lexer_rule))
    )]
    LiteralNotAssociatedWithLexerRule { literal: CompactString },

    #[error("cannot alias {literal} in a lexer grammar")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::cannot_alias_tokens_in_lexer)))]
    CannotAliasTokensInLexer { literal: CompactString },

    #[error("rule {name} is not allowed in a {grammar} grammar")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::misplaced_rule)))]
    MisplacedRule {
        name: CompactString,
        grammar: GrammarKind,
    },

    #[error("lexer rule {name} matches the empty string")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty_rule)))]
    EmptyRule { name: CompactString },

    #[error("character range in parser rule {rule}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::char_range_in_parser)))]
    CharRangeInParser { rule: CompactString },
}

/// Every problem found by one [`GrammarBuilder::build`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("grammar has {} error(s): {}", errors.len(), summary(errors))]
pub struct GrammarErrors {
    #[cfg_attr(feature = "diagnostics", related)]
    pub errors: Vec<GrammarError>,
}

impl GrammarErrors {
    /// First error of the given shape, if any.
    pub fn find(&self, mut predicate: impl FnMut(&GrammarError) -> bool) -> Option<&GrammarError> {
        self.errors.iter().find(|error| predicate(error))
    }
}

fn summary(errors: &[GrammarError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
