//! Identifiers: names resolved through the nameset chain at evaluation time.

use std::any::Any;
use std::sync::OnceLock;

use quill_util::Quark;
use smol_str::SmolStr;

use crate::error::{EvalResult, Exception};
use crate::interp::Interp;
use crate::nameset::Nameset;
use crate::object::{Obj, Object};

/// A plain identifier.
#[derive(Debug)]
pub struct Lexical {
    quark: Quark,
    line: u32,
}

impl Lexical {
    pub fn new(quark: Quark, line: u32) -> Lexical {
        Lexical { quark, line }
    }

    pub fn quark(&self) -> Quark {
        self.quark
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl Object for Lexical {
    fn repr(&self) -> &'static str {
        "Lexical"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eval(&self, _this: &Obj, _interp: &Interp, nset: &Nameset) -> EvalResult {
        nset.resolve(self.quark)
            .map_err(|e| e.or_line(self.line).into())
    }
}

/// A reserved keyword such as `if` or `define`.
///
/// The binding is looked up once, on first evaluation, and cached for the lifetime of this
/// node: rebinding the keyword afterwards does not affect code already evaluated.
#[derive(Debug)]
pub struct Reserved {
    quark: Quark,
    line: u32,
    cache: OnceLock<Obj>,
}

impl Reserved {
    pub fn new(quark: Quark, line: u32) -> Reserved {
        Reserved {
            quark,
            line,
            cache: OnceLock::new(),
        }
    }

    pub fn quark(&self) -> Quark {
        self.quark
    }

    /// Returns `true` once the binding has been cached.
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }
}

impl Object for Reserved {
    fn repr(&self) -> &'static str {
        "Reserved"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eval(&self, _this: &Obj, _interp: &Interp, nset: &Nameset) -> EvalResult {
        if let Some(obj) = self.cache.get() {
            return Ok(obj.clone());
        }
        let obj = nset
            .resolve(self.quark)
            .map_err(|e| e.or_line(self.line))?;
        Ok(self.cache.get_or_init(|| obj).clone())
    }
}

/// A `:`-separated path such as `a:b:c`.
///
/// The first segment resolves through the nameset chain; every following segment is a member
/// of the object found so far.
#[derive(Debug)]
pub struct Qualified {
    name: SmolStr,
    path: Vec<Quark>,
    line: u32,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.starts_with(|c: char| c.is_ascii_digit())
}

impl Qualified {
    /// Split and validate a qualified name.
    pub fn new(name: &str, line: u32) -> Result<Qualified, Exception> {
        let mut path = vec![];
        for segment in name.split(':') {
            if !valid_segment(segment) {
                return Err(Exception::syntax(format!(
                    "invalid segment `{}` in qualified name `{}`",
                    segment, name
                ))
                .with_line(line));
            }
            path.push(Quark::intern(segment));
        }
        Ok(Qualified {
            name: name.into(),
            path,
            line,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &[Quark] {
        &self.path
    }

    fn annotate(&self, e: Exception, segment: usize) -> Exception {
        let reason = format!(
            "{} (in `{}` at segment `{}`)",
            e.reason(),
            self.name,
            self.path[segment]
        );
        e.with_reason(reason).or_line(self.line)
    }

    /// Resolve the first `upto` segments.
    fn walk(&self, interp: &Interp, nset: &Nameset, upto: usize) -> EvalResult {
        let mut obj = nset
            .resolve(self.path[0])
            .map_err(|e| self.annotate(e, 0))?;
        for (i, &quark) in self.path[1..upto].iter().enumerate() {
            obj = obj
                .eval_member(interp, nset, quark)
                .map_err(|u| u.map_error(|e| self.annotate(e, i + 1)))?;
        }
        Ok(obj)
    }

    /// The last segment.
    pub fn last(&self) -> Quark {
        self.path[self.path.len() - 1]
    }

    /// Resolve every segment but the last. A single segment names `nset` itself.
    pub fn eval_prefix(&self, interp: &Interp, nset: &Nameset) -> EvalResult {
        match self.path.len() {
            1 => Ok(Obj::from(nset.handle())),
            len => self.walk(interp, nset, len - 1),
        }
    }

    /// Call the path as an operator: the last segment is a member of everything before it.
    pub fn call_path(&self, interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
        let last = self.path.len() - 1;
        if last == 0 {
            let op = self.walk(interp, nset, 1)?;
            return op.call(interp, nset, args);
        }
        let prefix = self.walk(interp, nset, last)?;
        prefix.call_member(interp, nset, self.path[last], args)
    }
}

impl Object for Qualified {
    fn repr(&self) -> &'static str {
        "Qualified"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eval(&self, _this: &Obj, interp: &Interp, nset: &Nameset) -> EvalResult {
        self.walk(interp, nset, self.path.len())
    }
}
