//! The reader of the Quill language.
//!
//! This crate turns source text into [`Syntax`] trees: parenthesized forms whose leaves are
//! literals, reserved keywords and identifiers. Every node carries the source line it starts on,
//! which the evaluator uses for diagnostics.

use std::collections::VecDeque;
use std::ops::Range;

use logos::{Logos, Span};

pub mod parse;
pub mod syntax;
pub mod token;

pub use parse::{ParseError, ParseErrorKind, Parser};
pub use syntax::{FormatTree, Syntax, SyntaxKind, RESERVED_KEYWORDS};
pub use token::Token;

/// The main lexer used in Quill.
pub struct Lexer<'lex> {
    /// The actual lexer that does the job.
    inner: logos::Lexer<'lex, Token>,
    /// The span of the last token
    span: Span,
    /// Tokens that have been peeked but not consumed yet.
    pending_tokens: VecDeque<(Token, Span)>,
    /// Line of the next unconsumed character, 1-based
    line: u32,
}

impl<'lex> Lexer<'lex> {
    /// Create a new lexer from string.
    pub fn new(s: &'lex str) -> Lexer<'lex> {
        Self::with_line(s, 1)
    }

    /// Create a new lexer whose first line is numbered `line`.
    pub fn with_line(s: &'lex str, line: u32) -> Lexer<'lex> {
        Lexer {
            inner: Token::lexer(s),
            span: Default::default(),
            pending_tokens: VecDeque::new(),
            line,
        }
    }

    /// The underlying source code
    pub fn source(&self) -> &'lex str {
        self.inner.source()
    }

    /// The span of the current token.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// The slice of string of the current token.
    pub fn slice(&self) -> &'lex str {
        &self.inner.source()[self.span()]
    }

    /// The line the next token starts on.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Return a copy of the current front token without really consuming it.
    pub fn peek(&mut self) -> Option<Token> {
        if self.pending_tokens.is_empty() {
            let next = self.inner.next()?;
            self.pending_tokens.push_back((next, self.inner.span()));
        }

        debug_assert!(!self.pending_tokens.is_empty());

        self.pending_tokens.front().map(|(tok, _)| *tok)
    }
}

impl<'lex> Iterator for Lexer<'lex> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        // check pending tokens or lex the next one
        let tok = if let Some((tok, span)) = self.pending_tokens.pop_front() {
            self.span = span;
            tok
        } else {
            let tok = self.inner.next()?;
            self.span = self.inner.span();
            tok
        };

        // strings and character literals may hold raw newlines
        self.line += self.slice().matches('\n').count() as u32;
        Some(tok)
    }
}
