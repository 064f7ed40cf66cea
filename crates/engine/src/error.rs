use std::any::Any;
use std::borrow::Cow;
use std::fmt::Display;

use quill_syn::ParseError;
use quill_util::{Quark, TableError};
use smol_str::SmolStr;

use crate::args::expect_argc;
use crate::interp::Interp;
use crate::literal::{Boolean, Integer, Str};
use crate::nameset::Nameset;
use crate::object::{apply_object, object_isquark, Obj, Object};

/// The category of an [`Exception`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Identifier resolution exhausted all enclosing namesets
    UnboundIdentifier,
    /// Rebinding a constant symbol
    ConstAssign,
    /// Dispatch reached the root object without a match
    UnknownOperation,
    /// Wrong argument count for a matched operation
    Argument,
    /// Argument of the wrong runtime kind
    Type,
    Key,
    Index,
    Serialization,
    Syntax,
    Arithmetic,
    Io,
    Assertion,
    /// Raised by user code with `throw`
    User(SmolStr),
}

impl ExceptionKind {
    pub fn name(&self) -> &str {
        match self {
            ExceptionKind::UnboundIdentifier => "unbound-identifier",
            ExceptionKind::ConstAssign => "const-assign",
            ExceptionKind::UnknownOperation => "unknown-operation",
            ExceptionKind::Argument => "argument-error",
            ExceptionKind::Type => "type-error",
            ExceptionKind::Key => "key-error",
            ExceptionKind::Index => "index-error",
            ExceptionKind::Serialization => "serialize-error",
            ExceptionKind::Syntax => "syntax-error",
            ExceptionKind::Arithmetic => "arithmetic-error",
            ExceptionKind::Io => "io-error",
            ExceptionKind::Assertion => "assertion-failed",
            ExceptionKind::User(name) => name,
        }
    }
}

/// A recoverable language-level error.
///
/// Exceptions are built like compile errors: start from a kind and attach what is known.
///
/// ```
/// # use quill_engine::error::{Exception, ExceptionKind};
/// let e = Exception::new(ExceptionKind::Index)
///     .with_reason("index 3 out of range")
///     .with_line(12);
/// assert_eq!(e.to_string(), "line 12: index-error: index 3 out of range");
/// ```
#[derive(Debug, Clone)]
pub struct Exception {
    kind: ExceptionKind,
    reason: Option<Cow<'static, str>>,
    object: Obj,
    file: Option<SmolStr>,
    line: Option<u32>,
    /// Fatal to the enclosing execution context
    abort: bool,
}

impl Exception {
    pub fn new(kind: ExceptionKind) -> Exception {
        Exception {
            kind,
            reason: None,
            object: Obj::nil(),
            file: None,
            line: None,
            abort: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<Cow<'static, str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach the object the exception is about.
    pub fn with_object(mut self, object: Obj) -> Self {
        self.object = object;
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach a line unless the exception already carries a more precise one.
    pub fn or_line(mut self, line: u32) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub fn with_file(mut self, file: impl Into<SmolStr>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a file name unless the exception was raised inside another file already.
    pub fn or_file(mut self, file: impl Into<SmolStr>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.into());
        }
        self
    }

    pub fn with_abort(mut self, abort: bool) -> Self {
        self.abort = abort;
        self
    }

    pub fn kind(&self) -> &ExceptionKind {
        &self.kind
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }

    pub fn object(&self) -> &Obj {
        &self.object
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn is_abort(&self) -> bool {
        self.abort
    }

    // ====== Constructors for the common kinds ======

    pub fn unbound(name: impl Display) -> Exception {
        Exception::new(ExceptionKind::UnboundIdentifier)
            .with_reason(format!("unbound identifier `{}`", name))
    }

    pub fn const_assign(name: impl Display) -> Exception {
        Exception::new(ExceptionKind::ConstAssign)
            .with_reason(format!("cannot rebind constant symbol `{}`", name))
    }

    pub fn unknown_operation(repr: &str, quark: Quark) -> Exception {
        Exception::new(ExceptionKind::UnknownOperation)
            .with_reason(format!("invalid operation `{}` on {}", quark, repr))
    }

    pub fn not_callable(repr: &str) -> Exception {
        Exception::new(ExceptionKind::Type).with_reason(format!("{} is not callable", repr))
    }

    pub fn argument(operation: impl Display, reason: impl Display) -> Exception {
        Exception::new(ExceptionKind::Argument)
            .with_reason(format!("{}: {}", operation, reason))
    }

    /// A type mismatch: `expected` names the category, `object` is the offending value.
    pub fn type_error(expected: &str, object: &Obj) -> Exception {
        Exception::new(ExceptionKind::Type)
            .with_reason(format!("expected {}, got {}", expected, object.repr()))
            .with_object(object.clone())
    }

    pub fn index(index: impl Display, len: usize) -> Exception {
        Exception::new(ExceptionKind::Index).with_reason(format!(
            "index {} out of range for length {}",
            index, len
        ))
    }

    pub fn arithmetic(reason: impl Into<Cow<'static, str>>) -> Exception {
        Exception::new(ExceptionKind::Arithmetic).with_reason(reason)
    }

    pub fn syntax(reason: impl Into<Cow<'static, str>>) -> Exception {
        Exception::new(ExceptionKind::Syntax).with_reason(reason)
    }

    pub fn io(reason: impl Into<Cow<'static, str>>) -> Exception {
        Exception::new(ExceptionKind::Io).with_reason(reason)
    }
}

impl Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: ", file, line)?,
            (Some(file), None) => write!(f, "{}: ", file)?,
            (None, Some(line)) => write!(f, "line {}: ", line)?,
            (None, None) => {}
        }
        write!(f, "{}: {}", self.kind.name(), self.reason())
    }
}

impl std::error::Error for Exception {}

quark_zone! {
    static EXCEPTION_ZONE {
        GET_KIND = "get-kind",
        GET_REASON = "get-reason",
        GET_OBJECT = "get-object",
        GET_FILE = "get-file",
        GET_LINE = "get-line",
        ABORT_P = "abort-p",
    }
}

/// A caught exception, as bound by `try`.
impl Object for Exception {
    fn repr(&self) -> &'static str {
        "Exception"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        EXCEPTION_ZONE.contains(quark) || (hflg && object_isquark(quark))
    }

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if EXCEPTION_ZONE.contains(quark) {
            expect_argc(quark, argv, 0)?;
        }
        let res = if quark == GET_KIND {
            Str::obj(self.kind.name())
        } else if quark == GET_REASON {
            Str::obj(self.reason())
        } else if quark == GET_OBJECT {
            self.object.clone()
        } else if quark == GET_FILE {
            self.file.clone().map_or_else(Obj::nil, Str::obj)
        } else if quark == GET_LINE {
            self.line.map_or_else(Obj::nil, |l| Integer::obj(l.into()))
        } else if quark == ABORT_P {
            Boolean::obj(self.abort)
        } else {
            return apply_object(self, quark, argv);
        };
        Ok(res)
    }
}

impl From<TableError> for Exception {
    fn from(e: TableError) -> Self {
        match e {
            TableError::Key(_) => Exception::new(ExceptionKind::Key).with_reason(e.to_string()),
            TableError::Index { index, len } => Exception::index(index, len),
        }
    }
}

impl From<ParseError> for Exception {
    fn from(e: ParseError) -> Self {
        let line = e.line;
        let mut msg = e.to_string();
        // the line is carried separately
        if let Some(stripped) = msg.strip_prefix(&format!("line {}: ", line)) {
            msg = stripped.to_string();
        }
        Exception::syntax(msg).with_line(line)
    }
}

impl From<std::io::Error> for Exception {
    fn from(e: std::io::Error) -> Self {
        Exception::io(e.to_string())
    }
}

/// Non-local exits of evaluation.
#[derive(Debug, Clone)]
pub enum Unwind {
    /// A `return` travelling to the nearest function call or top-level run
    Return(Obj),
    Error(Exception),
}

impl Unwind {
    /// Attach a line to an error unless it already has one.
    pub fn or_line(self, line: u32) -> Self {
        match self {
            Unwind::Error(e) => Unwind::Error(e.or_line(line)),
            ret => ret,
        }
    }

    /// Transform the exception, leaving returns untouched.
    pub fn map_error(self, f: impl FnOnce(Exception) -> Exception) -> Self {
        match self {
            Unwind::Error(e) => Unwind::Error(f(e)),
            ret => ret,
        }
    }
}

impl From<Exception> for Unwind {
    fn from(e: Exception) -> Self {
        Unwind::Error(e)
    }
}

pub type EvalResult<T = Obj> = std::result::Result<T, Unwind>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_env_log::test;

    use super::*;

    #[test]
    fn test_display_with_file() {
        let e = Exception::unbound("x").with_line(3).or_file("main.qll");
        assert_eq!(e.to_string(), "main.qll:3: unbound-identifier: unbound identifier `x`");
    }

    #[test]
    fn test_or_keeps_innermost_location() {
        let e = Exception::arithmetic("division by zero")
            .with_file("lib.qll")
            .with_line(7)
            .or_line(2)
            .or_file("main.qll");
        assert_eq!(e.file(), Some("lib.qll"));
        assert_eq!(e.line(), Some(7));

        let e = e.with_file("other.qll");
        assert_eq!(e.file(), Some("other.qll"));
    }

    #[test]
    fn test_user_kind_name() {
        let e = Exception::new(ExceptionKind::User("oops".into()));
        assert_eq!(e.kind().name(), "oops");
        assert_eq!(e.reason(), "");
    }
}
