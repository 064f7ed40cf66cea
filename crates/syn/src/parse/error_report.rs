use std::fmt::Display;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Byte range of the offending input
    pub span: Range<usize>,
    /// Line of the offending input, 1-based
    pub line: u32,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(span: Range<usize>, line: u32, kind: ParseErrorKind) -> Self {
        Self { span, line, kind }
    }

    /// Returns `true` if more input could complete the form being read.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self.kind,
            ParseErrorKind::UnexpectedEof | ParseErrorKind::UnterminatedString
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A token that cannot appear here, e.g. a stray `)`
    Unexpected(String),
    /// Input ended inside a form
    UnexpectedEof,
    UnterminatedString,
    InvalidChar(String),
    InvalidEscape(char),
    InvalidNumber(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ParseErrorKind::Unexpected(s) => write!(f, "unexpected `{}`", s),
            ParseErrorKind::UnexpectedEof => f.write_str("unexpected end of input"),
            ParseErrorKind::UnterminatedString => f.write_str("unterminated string"),
            ParseErrorKind::InvalidChar(s) => write!(f, "invalid character literal `{}`", s),
            ParseErrorKind::InvalidEscape(c) => write!(f, "invalid escape sequence `\\{}`", c),
            ParseErrorKind::InvalidNumber(s) => write!(f, "invalid number `{}`", s),
        }
    }
}

impl std::error::Error for ParseError {}
