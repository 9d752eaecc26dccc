//! Reference recognizer.
//!
//! Interprets the rules of an analyzed grammar directly, calling
//! [`predict`](super::predict) at every decision. It builds no tree: the
//! observable effects are the actions run through the [`SemanticHost`], the
//! tokens produced by a [`Lexer`] and the errors returned.

use super::stream::{CharStream, SymbolStream, TokenStream};
use super::token::{INVALID_TOKEN_TYPE, Token};
use super::{PredicateEvaluator, predict};
use crate::analysis::Analysis;
use crate::error::RecognitionError;
use crate::error::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::grammar::{
    Action, AltId, Alternative, Block, BlockKind, DecisionId, Element, Grammar, Rule, RuleId,
    SymbolSet, TOKENS_RULE_NAME,
};
use tracing::trace;

/// Host program state seen by predicates and changed by actions.
pub trait SemanticHost: PredicateEvaluator {
    fn execute(&mut self, action: &Action);
}

/// Recognizer over any symbol stream. See [`Lexer`] and [`Parser`].
pub struct Interpreter<'a, S, H> {
    analysis: &'a Analysis,
    input: S,
    host: H,
    diagnostics: &'a dyn Diagnostics,
}

/// Turns characters into tokens through the token dispatch decision.
pub type Lexer<'a, H> = Interpreter<'a, CharStream, H>;

/// Recognizes parser rules over tokens.
pub type Parser<'a, H> = Interpreter<'a, TokenStream, H>;

impl<'a, S: SymbolStream, H: SemanticHost> Interpreter<'a, S, H> {
    /// Reports go to [`TracingDiagnostics`] unless replaced with
    /// [`with_diagnostics`](Self::with_diagnostics).
    pub fn new(analysis: &'a Analysis, input: S, host: H) -> Self {
        Self {
            analysis,
            input,
            host,
            diagnostics: &TracingDiagnostics,
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: &'a dyn Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn input(&self) -> &S {
        &self.input
    }

    pub fn into_host(self) -> H {
        self.host
    }

    fn grammar(&self) -> &'a Grammar {
        self.analysis.grammar()
    }

    /// Recognizes rule `name` at the current input position.
    pub fn invoke(&mut self, name: &str) -> Result<(), RecognitionError> {
        let rule = self
            .grammar()
            .rule_by_name(name)
            .ok_or_else(|| RecognitionError::UnknownRule { name: name.into() })?;
        self.rule(rule.id)
    }

    /// Chooses an alternative of `decision` at the current position.
    pub fn predict(&mut self, decision: DecisionId) -> Result<AltId, RecognitionError> {
        let automaton = self.analysis.automaton(decision);
        let alt = predict(automaton, &self.input, &mut self.host, self.diagnostics)?;
        trace!(
            decision = decision.0,
            alt = alt.0,
            index = self.input.index(),
            "predicted"
        );
        Ok(alt)
    }

    fn rule(&mut self, id: RuleId) -> Result<(), RecognitionError> {
        let rule = self.grammar().rule(id);
        trace!(rule = %rule.name, index = self.input.index(), "enter rule");
        self.block(rule, &rule.block)
    }

    fn block(&mut self, rule: &'a Rule, block: &'a Block) -> Result<(), RecognitionError> {
        match block.kind {
            BlockKind::Single | BlockKind::Optional => {
                let alt = self.choose(block)?;
                match block.alternatives.get(alt.index()) {
                    Some(alternative) => self.alternative(rule, alternative),
                    // The exit alternative of `(..)?` has no body.
                    None => Ok(()),
                }
            }
            BlockKind::Star | BlockKind::Plus => {
                let mut iterations = 0usize;
                loop {
                    let alt = self.choose(block)?;
                    let Some(alternative) = block.alternatives.get(alt.index()) else {
                        break;
                    };
                    let before = self.input.index();
                    self.alternative(rule, alternative)?;
                    iterations += 1;
                    if self.input.index() == before {
                        break;
                    }
                }
                if block.kind == BlockKind::Plus && iterations == 0 {
                    return Err(RecognitionError::EarlyExit {
                        rule: rule.name.clone(),
                        decision: block.decision.unwrap_or(DecisionId(0)),
                        index: self.input.index(),
                    });
                }
                Ok(())
            }
        }
    }

    fn choose(&mut self, block: &Block) -> Result<AltId, RecognitionError> {
        match block.decision {
            Some(decision) => self.predict(decision),
            None => Ok(AltId(1)),
        }
    }

    fn alternative(
        &mut self,
        rule: &'a Rule,
        alternative: &'a Alternative,
    ) -> Result<(), RecognitionError> {
        let grammar = self.grammar();
        for element in &alternative.elements {
            match element {
                Element::Match(set) => self.match_set(rule, set)?,
                Element::Rule(callee) => self.rule(*callee)?,
                Element::Block(block) => self.block(rule, block)?,
                Element::Predicate(id) => {
                    let predicate = grammar.predicate(*id);
                    let holds = match self.analysis.static_value(*id) {
                        Some(value) => value,
                        None => self.host.eval(predicate),
                    };
                    if !holds {
                        self.diagnostics
                            .report_predicate_failure(&rule.name, predicate.text());
                        return Err(RecognitionError::FailedPredicate {
                            rule: rule.name.clone(),
                            predicate: predicate.text().into(),
                        });
                    }
                }
                Element::Action(id) => self.host.execute(grammar.action(*id)),
            }
        }
        Ok(())
    }

    fn match_set(&mut self, rule: &Rule, set: &SymbolSet) -> Result<(), RecognitionError> {
        match self.input.la(1) {
            Some(symbol) if set.contains(symbol) => {
                self.input.consume();
                Ok(())
            }
            found => Err(RecognitionError::MismatchedSymbol {
                rule: rule.name.clone(),
                expected: set.clone(),
                found,
                index: self.input.index(),
            }),
        }
    }
}

impl<H: SemanticHost> Interpreter<'_, CharStream, H> {
    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, RecognitionError> {
        if self.input.la(1).is_none() {
            return Ok(None);
        }
        let grammar = self.grammar();
        let dispatch = grammar
            .tokens_rule()
            .and_then(|rule| rule.block.decision)
            .ok_or_else(|| RecognitionError::UnknownRule {
                name: TOKENS_RULE_NAME.into(),
            })?;

        let start = self.input.index();
        let alt = self.predict(dispatch)?;
        let rule = grammar
            .token_rule_for(alt)
            .ok_or_else(|| RecognitionError::NoViableAlternative {
                rule: TOKENS_RULE_NAME.into(),
                decision: dispatch,
                symbol: self.input.la(1),
                index: start,
            })?;
        self.rule(rule.id)?;

        let stop = self.input.index();
        if stop == start {
            // A rule that matches nothing would produce tokens forever.
            return Err(RecognitionError::NoViableAlternative {
                rule: rule.name.clone(),
                decision: dispatch,
                symbol: self.input.la(1),
                index: start,
            });
        }
        let token = Token::new(
            rule.token_type.unwrap_or(INVALID_TOKEN_TYPE),
            self.input.text(start, stop),
            start,
            stop,
        );
        trace!(token = %token, rule = %rule.name, "token");
        Ok(Some(token))
    }

    /// All remaining tokens.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, RecognitionError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analyzer;
    use crate::error::diagnostics::DiagnosticQueue;
    use crate::grammar::{Expr, GrammarBuilder, GrammarKind, Predicate};

    #[derive(Default)]
    struct Recorder {
        actions: Vec<String>,
    }

    impl PredicateEvaluator for Recorder {
        fn eval(&mut self, predicate: &Predicate) -> bool {
            predicate.text() != "no"
        }
    }

    impl SemanticHost for Recorder {
        fn execute(&mut self, action: &Action) {
            self.actions.push(action.text().to_string());
        }
    }

    fn analyze(builder: GrammarBuilder) -> Analysis {
        Analyzer::new(builder.build().unwrap())
            .analyze(&DiagnosticQueue::new())
            .unwrap()
    }

    #[test]
    fn test_tokenize_longest_match() {
        let analysis = analyze(
            GrammarBuilder::new("t", GrammarKind::Lexer)
                .rule("ID", Expr::plus(Expr::range('a', 'z')))
                .rule("INT", Expr::plus(Expr::range('0', '9'))),
        );
        let mut lexer = Lexer::new(&analysis, CharStream::new("abc12x"), Recorder::default());
        let tokens = lexer.tokenize().unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["abc", "12", "x"]);
        assert_eq!(tokens[1].token_type, analysis.grammar().token_type("INT").unwrap());
        assert_eq!((tokens[1].start, tokens[1].stop), (3, 5));
    }

    #[test]
    fn test_lexer_rejects_unknown_character() {
        let analysis = analyze(
            GrammarBuilder::new("t", GrammarKind::Lexer).rule("A", Expr::lit("a")),
        );
        let mut lexer = Lexer::new(&analysis, CharStream::new("a?"), Recorder::default());
        assert!(lexer.next_token().unwrap().is_some());
        // A single token rule is chosen without lookahead; the rule itself
        // rejects the character.
        assert!(matches!(
            lexer.next_token(),
            Err(RecognitionError::MismatchedSymbol { index: 1, found: Some(0x3F), .. })
        ));
    }

    #[test]
    fn test_parser_runs_actions_and_checks_predicates() {
        let analysis = analyze(
            GrammarBuilder::new("t", GrammarKind::Parser).rule(
                "s",
                Expr::seq([
                    Expr::star(Expr::seq([Expr::token("A"), Expr::action("a")])),
                    Expr::pred("no"),
                    Expr::token("B"),
                ]),
            ),
        );
        let grammar = analysis.grammar();
        let a = grammar.token_type("A").unwrap();
        let b = grammar.token_type("B").unwrap();
        let tokens = [a, a, b]
            .into_iter()
            .enumerate()
            .map(|(i, t)| Token::new(t, "", i, i + 1));
        let mut parser = Parser::new(&analysis, TokenStream::new(tokens), Recorder::default());
        let err = parser.invoke("s").unwrap_err();
        assert_eq!(
            err,
            RecognitionError::FailedPredicate {
                rule: "s".into(),
                predicate: "no".into(),
            }
        );
        assert_eq!(parser.host().actions, ["a", "a"]);
        assert!(matches!(
            parser.invoke("missing"),
            Err(RecognitionError::UnknownRule { .. })
        ));
    }

    #[test]
    fn test_plus_requires_one_iteration() {
        let analysis = analyze(
            GrammarBuilder::new("t", GrammarKind::Parser)
                .rule("s", Expr::seq([Expr::plus(Expr::token("A")), Expr::token("B")])),
        );
        let b = analysis.grammar().token_type("B").unwrap();
        let mut parser = Parser::new(
            &analysis,
            TokenStream::new([Token::new(b, "", 0, 1)]),
            Recorder::default(),
        );
        assert!(matches!(
            parser.invoke("s"),
            Err(RecognitionError::EarlyExit { .. })
        ));
    }
}
