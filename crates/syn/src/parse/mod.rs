mod error_report;
#[cfg(test)]
mod test;

pub use error_report::{ParseError, ParseErrorKind};

use crate::syntax::{classify_atom, Atom, Syntax, SyntaxKind};
use crate::token::Token;
use crate::Lexer;

pub type Result<T> = std::result::Result<T, ParseError>;

/// Reads forms one at a time from a source string.
pub struct Parser<'src> {
    /// The lexer that does the job.
    lexer: Lexer<'src>,

    /// Byte offset just past the last consumed token.
    offset: usize,
}

impl<'src> Parser<'src> {
    pub fn new(s: &'src str) -> Self {
        Self::with_line(s, 1)
    }

    /// Create a parser whose first line is numbered `line`.
    pub fn with_line(s: &'src str, line: u32) -> Self {
        Parser {
            lexer: Lexer::with_line(s, line),
            offset: 0,
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Line of the next unconsumed token.
    pub fn line(&self) -> u32 {
        self.lexer.line()
    }

    /// Read the next top-level node.
    ///
    /// Returns `Ok(None)` once only trivia is left.
    pub fn next_form(&mut self) -> Result<Option<Syntax>> {
        self.eat_trivia();
        if self.lexer.peek().is_none() {
            return Ok(None);
        }
        self.parse_node().map(Some)
    }

    /// Read every remaining node.
    pub fn parse_all(mut self) -> Result<Vec<Syntax>> {
        let mut res = vec![];
        while let Some(node) = self.next_form()? {
            res.push(node);
        }
        Ok(res)
    }

    fn eat(&mut self) -> Option<Token> {
        let tok = self.lexer.next()?;
        self.offset = self.lexer.span().end;
        Some(tok)
    }

    fn eat_trivia(&mut self) {
        while self.lexer.peek().map_or(false, Token::is_trivia) {
            self.eat();
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.lexer.span(), self.lexer.line(), kind)
    }

    fn eof(&self) -> ParseError {
        ParseError::new(
            self.offset..self.offset,
            self.lexer.line(),
            ParseErrorKind::UnexpectedEof,
        )
    }
}

/// The concrete parsing implementations.
///
/// # Note
///
/// Parsing methods skip trivia **before** the node they read, never after it, so that
/// [`Parser::offset`] points right behind the last complete node.
impl<'src> Parser<'src> {
    fn parse_node(&mut self) -> Result<Syntax> {
        self.eat_trivia();
        let line = self.lexer.line();
        let tok = self.eat().ok_or_else(|| self.eof())?;

        match tok {
            Token::LParen => self.parse_form(line),
            Token::RParen => Err(self.error(ParseErrorKind::Unexpected(")".into()))),
            Token::String => {
                let slice = self.lexer.slice();
                let s = self.unescape(&slice[1..slice.len() - 1])?;
                Ok(Syntax::new(SyntaxKind::Str(s.into()), line))
            }
            Token::Char => {
                let slice = self.lexer.slice();
                let s = self.unescape(&slice[1..slice.len() - 1])?;
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Syntax::new(SyntaxKind::Char(c), line)),
                    _ => Err(self.error(ParseErrorKind::InvalidChar(slice.into()))),
                }
            }
            Token::Atom => {
                let slice = self.lexer.slice();
                match classify_atom(slice) {
                    Atom::Kind(kind) => Ok(Syntax::new(kind, line)),
                    Atom::BadNumber => Err(self.error(ParseErrorKind::InvalidNumber(slice.into()))),
                }
            }
            Token::Error => {
                let slice = self.lexer.slice();
                let kind = if slice.starts_with('"') {
                    ParseErrorKind::UnterminatedString
                } else if slice.starts_with('\'') {
                    ParseErrorKind::InvalidChar(slice.into())
                } else {
                    ParseErrorKind::Unexpected(slice.into())
                };
                Err(self.error(kind))
            }
            Token::WS | Token::LF | Token::Comment => {
                unreachable!("trivia is skipped before reading a node")
            }
        }
    }

    fn parse_form(&mut self, line: u32) -> Result<Syntax> {
        let mut items = vec![];
        loop {
            self.eat_trivia();
            match self.lexer.peek() {
                None => return Err(self.eof()),
                Some(Token::RParen) => {
                    self.eat();
                    return Ok(Syntax::new(SyntaxKind::Form(items), line));
                }
                Some(_) => items.push(self.parse_node()?),
            }
        }
    }

    fn unescape(&self, s: &str) -> Result<String> {
        let mut res = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                res.push(c);
                continue;
            }
            let escaped = match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some(c @ ('\\' | '"' | '\'')) => c,
                Some(c) => return Err(self.error(ParseErrorKind::InvalidEscape(c))),
                None => return Err(self.error(ParseErrorKind::InvalidEscape(' '))),
            };
            res.push(escaped);
        }
        Ok(res)
    }
}
