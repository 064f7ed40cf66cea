use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use quill_util::Quark;

use crate::error::{EvalResult, Exception, Unwind};
use crate::interp::Interp;
use crate::nameset::Nameset;
use crate::object::{Obj, Object};

/// Evaluate operands left to right.
pub fn eval_args(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult<Vec<Obj>> {
    args.iter().map(|arg| arg.eval(interp, nset)).collect()
}

/// Evaluate a body in order, yielding the value of the last form or nil.
pub fn eval_body(interp: &Interp, nset: &Nameset, body: &[Obj]) -> EvalResult {
    let mut res = Obj::nil();
    for form in body {
        res = form.eval(interp, nset)?;
    }
    Ok(res)
}

pub type NativeFn = fn(&Interp, &Nameset, &[Obj]) -> EvalResult;

/// A function implemented in Rust.
///
/// Special forms receive their operands unevaluated, plain functions receive them evaluated.
pub struct Builtin {
    name: &'static str,
    special: bool,
    func: NativeFn,
}

impl Builtin {
    pub fn function(name: &'static str, func: NativeFn) -> Builtin {
        Builtin {
            name,
            special: false,
            func,
        }
    }

    pub fn special(name: &'static str, func: NativeFn) -> Builtin {
        Builtin {
            name,
            special: true,
            func,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_special(&self) -> bool {
        self.special
    }
}

impl Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<builtin {}>", self.name)
    }
}

impl Object for Builtin {
    fn repr(&self) -> &'static str {
        "Builtin"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn call(&self, interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
        if self.special {
            (self.func)(interp, nset, args)
        } else {
            let argv = eval_args(interp, nset, args)?;
            (self.func)(interp, nset, &argv)
        }
    }
}

/// Where a closure's body runs.
#[derive(Debug, Clone)]
pub enum Scope {
    /// A child of the defining nameset, which the closure keeps alive
    Lexical(Arc<Nameset>),
    /// A child of the calling interpreter's global nameset
    Global,
}

/// A user function made by `lambda`, `gamma` or `trans`.
///
/// Closures defined at top level use [`Scope::Global`] rather than holding the global nameset,
/// which would otherwise own the closure bound in it.
#[derive(Debug)]
pub struct Closure {
    params: Vec<Quark>,
    body: Vec<Obj>,
    scope: Scope,
}

impl Closure {
    pub fn new(params: Vec<Quark>, body: Vec<Obj>, scope: Scope) -> Closure {
        Closure {
            params,
            body,
            scope,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Object for Closure {
    fn repr(&self) -> &'static str {
        "Closure"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn call(&self, interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
        if args.len() != self.params.len() {
            return Err(Exception::argument(
                "closure",
                format!(
                    "expected {} argument(s), got {}",
                    self.params.len(),
                    args.len()
                ),
            )
            .into());
        }
        let argv = eval_args(interp, nset, args)?;

        let local = match &self.scope {
            Scope::Lexical(parent) => parent.child(),
            Scope::Global => interp.globals().child(),
        };
        for (&param, arg) in self.params.iter().zip(argv) {
            local.bind(param, arg, false)?;
        }

        match eval_body(interp, &local, &self.body) {
            Err(Unwind::Return(value)) => Ok(value),
            res => res,
        }
    }
}
