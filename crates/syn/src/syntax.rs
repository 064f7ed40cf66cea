use std::fmt::{Display, Formatter};

use smol_str::SmolStr;

/// Keywords the reader tags as reserved. The evaluator caches their binding on first use.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "if", "while", "block", "lambda", "gamma", "define", "trans", "const", "undef", "nameset",
    "return", "throw", "try", "abort", "assert", "eval", "load", "launch", "library",
];

/// A node read from source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Syntax {
    pub kind: SyntaxKind,
    /// Line this node starts on, 1-based
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxKind {
    Nil,
    Bool(bool),
    Int(i64),
    Real(f64),
    Char(char),
    Str(SmolStr),
    /// A reserved keyword, see [`RESERVED_KEYWORDS`]
    Reserved(SmolStr),
    /// A plain or `:`-qualified identifier
    Ident(SmolStr),
    /// A parenthesized list of nodes
    Form(Vec<Syntax>),
}

impl Syntax {
    pub fn new(kind: SyntaxKind, line: u32) -> Self {
        Syntax { kind, line }
    }

    /// Returns `true` if this node is a literal value.
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            SyntaxKind::Bool(_)
                | SyntaxKind::Int(_)
                | SyntaxKind::Real(_)
                | SyntaxKind::Char(_)
                | SyntaxKind::Str(_)
        )
    }

    pub fn as_form(&self) -> Option<&[Syntax]> {
        if let SyntaxKind::Form(v) = &self.kind {
            Some(v)
        } else {
            None
        }
    }
}

/// Outcome of classifying an atom.
pub(crate) enum Atom {
    Kind(SyntaxKind),
    /// Looks like a number but is not a valid one
    BadNumber,
}

/// Classify the text of an atom token.
pub(crate) fn classify_atom(s: &str) -> Atom {
    match s {
        "nil" => return Atom::Kind(SyntaxKind::Nil),
        "true" => return Atom::Kind(SyntaxKind::Bool(true)),
        "false" => return Atom::Kind(SyntaxKind::Bool(false)),
        _ => {}
    }

    let unsigned = s.strip_prefix(&['+', '-'][..]).unwrap_or(s);
    if unsigned.starts_with(|c: char| c.is_ascii_digit()) {
        return classify_number(s, unsigned);
    }

    if RESERVED_KEYWORDS.contains(&s) {
        Atom::Kind(SyntaxKind::Reserved(s.into()))
    } else {
        Atom::Kind(SyntaxKind::Ident(s.into()))
    }
}

fn classify_number(s: &str, unsigned: &str) -> Atom {
    let negative = s.starts_with('-');

    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        let hex = hex.replace('_', "");
        return match i64::from_str_radix(&hex, 16) {
            Ok(v) if negative => Atom::Kind(SyntaxKind::Int(-v)),
            Ok(v) => Atom::Kind(SyntaxKind::Int(v)),
            Err(_) => Atom::BadNumber,
        };
    }

    if unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .map_or(Atom::BadNumber, |v| Atom::Kind(SyntaxKind::Int(v)));
    }

    if unsigned.contains(&['.', 'e', 'E'][..]) {
        if let Ok(v) = s.parse::<f64>() {
            return Atom::Kind(SyntaxKind::Real(v));
        }
    }
    Atom::BadNumber
}

impl Display for Syntax {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SyntaxKind::Nil => f.write_str("nil"),
            SyntaxKind::Bool(b) => write!(f, "{}", b),
            SyntaxKind::Int(i) => write!(f, "{}", i),
            SyntaxKind::Real(r) => write!(f, "{:?}", r),
            SyntaxKind::Char(c) => write!(f, "'{}'", c.escape_default()),
            SyntaxKind::Str(s) => write!(f, "\"{}\"", s.escape_default()),
            SyntaxKind::Reserved(s) | SyntaxKind::Ident(s) => f.write_str(s),
            SyntaxKind::Form(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Formats a syntax tree one node per line, indented by depth, with the line of every node.
pub struct FormatTree<'a>(pub &'a Syntax);

impl<'a> Display for FormatTree<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        format_tree(self.0, 0, f)
    }
}

fn format_tree(node: &Syntax, depth: usize, f: &mut Formatter) -> std::fmt::Result {
    for _ in 0..depth {
        f.write_str("    ")?;
    }
    match &node.kind {
        SyntaxKind::Form(items) => {
            writeln!(f, "Form @{}", node.line)?;
            for item in items {
                format_tree(item, depth + 1, f)?;
            }
            Ok(())
        }
        SyntaxKind::Nil => writeln!(f, "Nil @{}", node.line),
        SyntaxKind::Bool(b) => writeln!(f, "Bool {} @{}", b, node.line),
        SyntaxKind::Int(i) => writeln!(f, "Int {} @{}", i, node.line),
        SyntaxKind::Real(r) => writeln!(f, "Real {:?} @{}", r, node.line),
        SyntaxKind::Char(c) => writeln!(f, "Char {:?} @{}", c, node.line),
        SyntaxKind::Str(s) => writeln!(f, "Str {:?} @{}", s.as_str(), node.line),
        SyntaxKind::Reserved(s) => writeln!(f, "Reserved {:?} @{}", s.as_str(), node.line),
        SyntaxKind::Ident(s) => writeln!(f, "Ident {:?} @{}", s.as_str(), node.line),
    }
}
