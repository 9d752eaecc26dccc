//! End-to-end semantic predicate tests.
//!
//! Each test builds a combined grammar, tokenizes the input with the
//! reference lexer, then runs the start rule with the reference parser. The
//! observable result is the text printed by actions through the
//! [`ScriptedHost`] (lexer and parser share one host).

use llstar::analysis::{Analysis, Analyzer};
use llstar::error::RecognitionError;
use llstar::error::diagnostics::{Diagnostic, DiagnosticQueue};
use llstar::grammar::{Expr, GrammarBuilder, GrammarKind};
use llstar::runtime::{CharStream, Lexer, Parser, TokenStream};
use llstar::testing::ScriptedHost;

fn analyze(builder: GrammarBuilder, diagnostics: &DiagnosticQueue) -> Analysis {
    let grammar = builder.build().expect("grammar should build");
    Analyzer::new(grammar)
        .analyze(diagnostics)
        .expect("analysis should converge")
}

/// Lexes and parses `input`, returning everything printed.
fn exec(
    builder: GrammarBuilder,
    start: &str,
    input: &str,
    host: ScriptedHost,
) -> Result<String, RecognitionError> {
    let diagnostics = DiagnosticQueue::new();
    let analysis = analyze(builder, &diagnostics);
    exec_with(&analysis, start, input, host, &diagnostics)
}

fn exec_with(
    analysis: &Analysis,
    start: &str,
    input: &str,
    host: ScriptedHost,
    diagnostics: &DiagnosticQueue,
) -> Result<String, RecognitionError> {
    let mut lexer =
        Lexer::new(analysis, CharStream::new(input), host).with_diagnostics(diagnostics);
    let tokens = lexer.tokenize()?;
    let host = lexer.into_host();
    let mut parser =
        Parser::new(analysis, TokenStream::new(tokens), host).with_diagnostics(diagnostics);
    parser.invoke(start)?;
    Ok(parser.into_host().output().to_string())
}

fn print(text: &str) -> Expr {
    Expr::action(format!("print:{text}"))
}

/// `a : (A|B)+ ;` over the lexer rules under test.
fn token_loop() -> Expr {
    Expr::plus(Expr::choice([Expr::token("A"), Expr::token("B")]))
}

#[test]
fn test_simple_cyclic_dfa_with_predicate() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined).rule(
        "a",
        Expr::choice([
            Expr::seq([
                Expr::pred("false"),
                Expr::star(Expr::lit("x")),
                Expr::lit("y"),
                print("alt1"),
            ]),
            Expr::seq([
                Expr::pred("true"),
                Expr::star(Expr::lit("x")),
                Expr::lit("y"),
                print("alt2"),
            ]),
        ]),
    );
    let output = exec(grammar, "a", "xxxy", ScriptedHost::new()).unwrap();
    assert_eq!(output, "alt2");
}

#[test]
fn test_simple_cyclic_dfa_with_instance_var_predicate() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined).rule(
        "a",
        Expr::choice([
            Expr::seq([
                Expr::pred("false"),
                Expr::star(Expr::lit("x")),
                Expr::lit("y"),
                print("alt1"),
            ]),
            Expr::seq([
                Expr::pred("v"),
                Expr::star(Expr::lit("x")),
                Expr::lit("y"),
                print("alt2"),
            ]),
        ]),
    );
    let host = ScriptedHost::new().with_flag("v", true);
    let output = exec(grammar, "a", "xxxy", host).unwrap();
    assert_eq!(output, "alt2");
}

#[test]
fn test_predicate_validation() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .rule("a", Expr::seq([Expr::pred("false"), Expr::lit("x")]));
    let diagnostics = DiagnosticQueue::new();
    let analysis = analyze(grammar, &diagnostics);
    let err = exec_with(&analysis, "a", "x", ScriptedHost::new(), &diagnostics).unwrap_err();

    assert_eq!(
        err,
        RecognitionError::FailedPredicate {
            rule: "a".into(),
            predicate: "false".into(),
        }
    );
    assert_eq!(err.to_string(), "rule a failed predicate: {false}?");
    assert_eq!(
        diagnostics.predicate_failures(),
        vec![Diagnostic::PredicateFailure {
            rule: "a".into(),
            predicate: "false".into(),
        }]
    );
}

#[test]
fn test_lexer_preds() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .rule("a", token_loop())
        .rule("A", Expr::seq([Expr::pred("p"), Expr::lit("a"), print("token 1")]))
        .rule("B", Expr::seq([Expr::pred("!p"), Expr::lit("a"), print("token 2")]));
    let host = ScriptedHost::new().with_flag("p", false);
    // "a" matches both A and B; the predicates pick B.
    assert_eq!(exec(grammar, "a", "a", host).unwrap(), "token 2");
}

#[test]
fn test_lexer_preds2() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .rule("a", token_loop())
        .rule("A", Expr::seq([Expr::pred("p"), Expr::lit("a"), print("token 1")]))
        .rule(
            "B",
            Expr::seq([
                Expr::plus(Expr::choice([Expr::lit("a"), Expr::lit("b")])),
                print("token 2"),
            ]),
        );
    let host = ScriptedHost::new().with_flag("p", true);
    assert_eq!(exec(grammar.clone(), "a", "a", host.clone()).unwrap(), "token 1");
    // The longer match is only possible through B.
    assert_eq!(exec(grammar, "a", "ab", host).unwrap(), "token 2");
}

#[test]
fn test_lexer_pred_in_exit_branch() {
    // p says it is fine to leave the first loop, and leaving wins over
    // another iteration of the first loop.
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .token("B")
        .rule("a", token_loop())
        .rule(
            "A",
            Expr::seq([
                Expr::star(Expr::seq([Expr::lit("a"), print("1")])),
                Expr::pred("p"),
                Expr::star(Expr::seq([Expr::lit("a"), print("2")])),
            ]),
        );
    let host = ScriptedHost::new().with_flag("p", true);
    assert_eq!(exec(grammar, "a", "aaa", host).unwrap(), "222");
}

#[test]
fn test_lexer_pred_in_exit_branch2() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .token("B")
        .rule("a", token_loop())
        .rule(
            "A",
            Expr::seq([
                Expr::star(Expr::seq([Expr::pred("p"), Expr::lit("a"), print("1")])),
                Expr::star(Expr::seq([Expr::lit("a"), print("2")])),
            ]),
        );
    let host = ScriptedHost::new().with_flag("p", true);
    assert_eq!(exec(grammar, "a", "aaa", host).unwrap(), "111");
}

#[test]
fn test_lexer_pred_in_exit_branch3() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .token("B")
        .rule("a", token_loop())
        .rule(
            "A",
            Expr::seq([
                Expr::choice([
                    Expr::seq([Expr::pred("p"), Expr::lit("a"), print("1")]),
                    Expr::empty(),
                ]),
                Expr::star(Expr::seq([Expr::lit("a"), print("2")])),
            ]),
        );
    let host = ScriptedHost::new().with_flag("p", true);
    assert_eq!(exec(grammar, "a", "aaa", host).unwrap(), "122");
}

#[test]
fn test_lexer_pred_in_exit_branch4() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .token("B")
        .rule("a", token_loop())
        .rule(
            "A",
            Expr::seq([
                Expr::plus(Expr::seq([
                    Expr::pred("n<2"),
                    Expr::lit("a"),
                    Expr::action("print:$n;n++"),
                ])),
                Expr::star(Expr::seq([Expr::lit("a"), print("x")])),
            ]),
        );
    assert_eq!(
        exec(grammar, "a", "aaaaa", ScriptedHost::new()).unwrap(),
        "01xxx"
    );
}

#[test]
fn test_lexer_preds_in_cyclic_dfa() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .rule("a", token_loop())
        .rule(
            "A",
            Expr::seq([
                Expr::pred("p"),
                Expr::plus(Expr::lit("a")),
                Expr::lit("x"),
                print("token 1"),
            ]),
        )
        .rule(
            "B",
            Expr::seq([Expr::plus(Expr::lit("a")), Expr::lit("x"), print("token 2")]),
        );
    let host = ScriptedHost::new().with_flag("p", false);
    assert_eq!(exec(grammar, "a", "aax", host).unwrap(), "token 2");
}

#[test]
fn test_lexer_preds_in_cyclic_dfa2() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .rule("a", token_loop())
        .rule(
            "A",
            Expr::seq([
                Expr::pred("p"),
                Expr::plus(Expr::lit("a")),
                Expr::lit("x"),
                Expr::opt(Expr::lit("y")),
                print("token 1"),
            ]),
        )
        .rule(
            "B",
            Expr::seq([Expr::plus(Expr::lit("a")), Expr::lit("x"), print("token 2")]),
        );
    let host = ScriptedHost::new().with_flag("p", false);
    assert_eq!(exec(grammar, "a", "aax", host).unwrap(), "token 2");
}

#[test]
fn test_gated_pred() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Combined)
        .rule("a", token_loop())
        .rule("A", Expr::seq([Expr::gate("true"), Expr::lit("a"), print("token 1;")]))
        .rule(
            "B",
            Expr::seq([
                Expr::gate("false"),
                Expr::plus(Expr::choice([Expr::lit("a"), Expr::lit("b")])),
                print("token 2;"),
            ]),
        );
    // "a" matches both A and B, but B is switched off.
    assert_eq!(
        exec(grammar, "a", "aa", ScriptedHost::new()).unwrap(),
        "token 1token 1"
    );
}

#[test]
fn test_gated_pred_switched_off_at_analysis() {
    let grammar = GrammarBuilder::new("foo", GrammarKind::Lexer)
        .rule("A", Expr::seq([Expr::gate("keywords"), Expr::lit("if")]))
        .rule("ID", Expr::plus(Expr::range('a', 'z')))
        .build()
        .unwrap();
    let analysis = Analyzer::new(grammar)
        .with_gate_resolver(|p| (p.text() == "keywords").then_some(false))
        .analyze(&DiagnosticQueue::new())
        .unwrap();
    let id = analysis.grammar().token_type("ID");

    let mut lexer = Lexer::new(&analysis, CharStream::new("if"), ScriptedHost::new());
    let token = lexer.next_token().unwrap().unwrap();
    assert_eq!(Some(token.token_type), id);
    // A gate decided at analysis time is never handed to the host.
    assert!(lexer.host().evaluated().is_empty());
}

#[test]
fn test_ambiguity_defaults_to_lowest_alternative() {
    let diagnostics = DiagnosticQueue::new();
    let analysis = analyze(
        GrammarBuilder::new("foo", GrammarKind::Combined)
            .rule(
                "a",
                Expr::choice([
                    Expr::seq([Expr::lit("x"), print("alt1")]),
                    Expr::seq([Expr::lit("x"), print("alt2")]),
                ]),
            ),
        &diagnostics,
    );
    // Reported once while building the automaton.
    assert_eq!(diagnostics.ambiguities().len(), 1);
    let output = exec_with(&analysis, "a", "x", ScriptedHost::new(), &diagnostics).unwrap();
    assert_eq!(output, "alt1");
}
