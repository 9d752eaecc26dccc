//! Reference recognizer over nested parser rules.

use llstar::analysis::{Analysis, Analyzer};
use llstar::error::RecognitionError;
use llstar::error::diagnostics::DiagnosticQueue;
use llstar::grammar::{Expr, GrammarBuilder, GrammarKind};
use llstar::runtime::{CharStream, Lexer, Parser, SymbolStream, TokenStream};
use llstar::testing::ScriptedHost;

/// ```text
/// expr : term ('+' term {+})* ;
/// term : 'x' {x} | '(' expr ')' {()} ;
/// ```
fn expressions() -> Analysis {
    let grammar = GrammarBuilder::new("calc", GrammarKind::Combined)
        .rule(
            "expr",
            Expr::seq([
                Expr::rule("term"),
                Expr::star(Expr::seq([
                    Expr::lit("+"),
                    Expr::rule("term"),
                    Expr::action("print:+"),
                ])),
            ]),
        )
        .rule(
            "term",
            Expr::choice([
                Expr::seq([Expr::lit("x"), Expr::action("print:x")]),
                Expr::seq([
                    Expr::lit("("),
                    Expr::rule("expr"),
                    Expr::lit(")"),
                    Expr::action("print:()"),
                ]),
            ]),
        )
        .build()
        .unwrap();
    let diagnostics = DiagnosticQueue::new();
    let analysis = Analyzer::new(grammar).analyze(&diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    analysis
}

fn run(analysis: &Analysis, start: &str, input: &str) -> Result<String, RecognitionError> {
    let diagnostics = DiagnosticQueue::new();
    let mut lexer = Lexer::new(analysis, CharStream::new(input), ScriptedHost::new())
        .with_diagnostics(&diagnostics);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser::new(analysis, TokenStream::new(tokens), lexer.into_host())
        .with_diagnostics(&diagnostics);
    parser.invoke(start)?;
    assert_eq!(parser.input().la(1), None, "input left over");
    Ok(parser.into_host().output().to_string())
}

#[test]
fn test_called_rule_ends_at_end_of_input() {
    let analysis = expressions();
    assert_eq!(run(&analysis, "expr", "x").unwrap(), "x");
    assert_eq!(run(&analysis, "expr", "x+(x)").unwrap(), "xx()+");
    assert_eq!(run(&analysis, "term", "(x+x)").unwrap(), "xx+()");
}

#[test]
fn test_deep_nesting() {
    let analysis = expressions();
    let input = format!("{}x{}+x", "(".repeat(12), ")".repeat(12));
    let expected = format!("x{}x+", "()".repeat(12));
    assert_eq!(run(&analysis, "expr", &input).unwrap(), expected);
}

#[test]
fn test_unbalanced_input_is_rejected() {
    let analysis = expressions();
    let err = run(&analysis, "expr", "(x+x").unwrap_err();
    assert!(matches!(
        err,
        RecognitionError::MismatchedSymbol { ref rule, found: None, .. } if rule == "term"
    ));
}
