use expect_test::expect;
use pretty_assertions::assert_eq;
use test_env_log::test;

use crate::syntax::FormatTree;
use crate::{Lexer, Syntax, SyntaxKind, Token};

use super::{ParseErrorKind, Parser};

fn parse_one(input: &str) -> Syntax {
    let mut parser = Parser::new(input);
    parser
        .next_form()
        .expect("parse error")
        .expect("no form in input")
}

#[test]
fn test_lex_tokens() {
    use Token::*;
    let input = "(define x 10) # note\n\"str\" 'c'";
    let res = Lexer::new(input).collect::<Vec<_>>();
    assert_eq!(
        res,
        vec![LParen, Atom, WS, Atom, WS, Atom, RParen, WS, Comment, LF, String, WS, Char]
    );
}

#[test]
fn test_lexer_tracks_lines() {
    let mut lexer = Lexer::new("a\nb\n\"multi\nline\"\nc");
    let mut lines = vec![];
    while let Some(tok) = lexer.next() {
        if !tok.is_trivia() {
            lines.push((lexer.slice().to_string(), lexer.line()));
        }
    }
    // the line reported is the one *after* the token was consumed
    assert_eq!(
        lines,
        vec![
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("\"multi\nline\"".to_string(), 4),
            ("c".to_string(), 5),
        ]
    );
}

#[test]
fn test_raw_newline_in_char_counts_as_line() {
    let forms = Parser::new("(a '\n')\n(b)").parse_all().expect("parse error");
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0].line, 1);
    assert_eq!(forms[1].line, 3);
}

#[test]
fn test_parse_empty() {
    let mut parser = Parser::new("  # only a comment\n  ");
    assert_eq!(parser.next_form(), Ok(None));
}

#[test]
fn test_parse_define() {
    let form = parse_one("(define x 10)");
    expect![[r#"
        Form @1
            Reserved "define" @1
            Ident "x" @1
            Int 10 @1
    "#]]
    .assert_eq(&FormatTree(&form).to_string());
}

#[test]
fn test_parse_nested_forms_with_lines() {
    let input = r#"
(trans f (a b)
    (+ a b))
(f 1 2.5)
"#;
    let forms = Parser::new(input).parse_all().expect("parse error");
    assert_eq!(forms.len(), 2);

    expect![[r#"
        Form @2
            Reserved "trans" @2
            Ident "f" @2
            Form @2
                Ident "a" @2
                Ident "b" @2
            Form @3
                Ident "+" @3
                Ident "a" @3
                Ident "b" @3
    "#]]
    .assert_eq(&FormatTree(&forms[0]).to_string());

    expect![[r#"
        Form @4
            Ident "f" @4
            Int 1 @4
            Real 2.5 @4
    "#]]
    .assert_eq(&FormatTree(&forms[1]).to_string());
}

#[test]
fn test_parse_literals() {
    let cases: &[(&str, SyntaxKind)] = &[
        ("nil", SyntaxKind::Nil),
        ("true", SyntaxKind::Bool(true)),
        ("false", SyntaxKind::Bool(false)),
        ("42", SyntaxKind::Int(42)),
        ("-42", SyntaxKind::Int(-42)),
        ("+7", SyntaxKind::Int(7)),
        ("0x1F", SyntaxKind::Int(31)),
        ("-0x10", SyntaxKind::Int(-16)),
        ("1.5", SyntaxKind::Real(1.5)),
        ("-2e3", SyntaxKind::Real(-2000.0)),
        ("'a'", SyntaxKind::Char('a')),
        ("'\\n'", SyntaxKind::Char('\n')),
        ("\"hi\\tthere\"", SyntaxKind::Str("hi\tthere".into())),
        ("-", SyntaxKind::Ident("-".into())),
        ("counter-p", SyntaxKind::Ident("counter-p".into())),
        ("a:b:c", SyntaxKind::Ident("a:b:c".into())),
        ("lambda", SyntaxKind::Reserved("lambda".into())),
    ];
    for (input, kind) in cases {
        assert_eq!(&parse_one(input).kind, kind, "input: {}", input);
    }
}

#[test]
fn test_display_round_trip() {
    let input = r#"(if (== x 'a') "yes\n" (f -1 2.0 nil))"#;
    let form = parse_one(input);
    assert_eq!(form.to_string(), input);
}

#[test]
fn test_offset_points_after_form() {
    let input = "(a b) (c d)";
    let mut parser = Parser::new(input);
    parser.next_form().expect("parse error");
    assert_eq!(parser.offset(), 5);
    assert_eq!(&input[parser.offset()..], " (c d)");
}

#[test]
fn test_incomplete_input() {
    let err = Parser::new("(define x (+ 1").next_form().unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
    assert!(err.is_incomplete());

    let err = Parser::new("(print \"abc").next_form().unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
    assert!(err.is_incomplete());
}

#[test]
fn test_invalid_input() {
    let err = Parser::new(")").next_form().unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Unexpected(")".into()));
    assert!(!err.is_incomplete());

    let err = Parser::new("(+ 12abc 1)").next_form().unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidNumber("12abc".into()));

    let err = Parser::new("\"bad \\q\"").next_form().unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidEscape('q'));
}

#[test]
fn test_error_reports_line() {
    let err = Parser::new("(a)\n(b)\n(c 99999999999999999999)")
        .parse_all()
        .unwrap_err();
    assert_eq!(err.line, 3);
    assert_eq!(
        err.to_string(),
        "line 3: invalid number `99999999999999999999`"
    );
}
