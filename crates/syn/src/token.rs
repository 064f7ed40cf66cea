use logos::Logos;

/// Tokens of the Quill surface syntax.
///
/// Anything that is not a delimiter, a string, a character or trivia lexes as an [`Token::Atom`];
/// atoms are classified into numbers, keywords and identifiers after lexing.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    // === Aux Tokens ===
    /// Whitespace
    #[regex(r"[ \t\r\x0c]+")]
    WS,
    /// End of line
    #[token("\n")]
    LF,
    /// Line comment, up to (excluding) the end of line
    #[regex(r"#[^\n]*")]
    Comment,

    /// Anything that doesn't match
    #[error]
    Error,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // === Literal Tokens ===
    /// A double-quoted string. Escapes are resolved by the parser.
    #[regex(r#""([^"\\]|\\.)*""#)]
    String,
    /// A single-quoted character.
    #[regex(r"'([^'\\]|\\.)'")]
    Char,

    /// Numbers, booleans, keywords and identifiers
    #[regex(r#"[^\s()"'#]+"#)]
    Atom,
}

impl Token {
    /// Tokens carrying no meaning for the reader.
    pub fn is_trivia(self) -> bool {
        matches!(self, Token::WS | Token::LF | Token::Comment)
    }
}
