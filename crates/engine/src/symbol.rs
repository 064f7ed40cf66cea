use std::any::Any;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use quill_util::Quark;
use smol_str::SmolStr;

use crate::args::{boolean_arg, expect_argc};
use crate::error::{EvalResult, Exception};
use crate::interp::Interp;
use crate::literal::{Boolean, Str};
use crate::nameset::Nameset;
use crate::object::{apply_object, object_isquark, Obj, Object};

quark_zone! {
    static SYMBOL_ZONE {
        GET_NAME = "get-name",
        GET_OBJECT = "get-object",
        SET_OBJECT = "set-object",
        GET_CONST = "get-const",
        SET_CONST = "set-const",
    }
}

#[derive(Debug, Default)]
struct Binding {
    object: Obj,
    constant: bool,
}

/// A named, optionally constant, binding slot.
#[derive(Debug)]
pub struct Symbol {
    quark: Quark,
    binding: RwLock<Binding>,
}

impl Symbol {
    pub fn new(quark: Quark, object: Obj) -> Symbol {
        Symbol::with_const(quark, object, false)
    }

    pub fn with_const(quark: Quark, object: Obj, constant: bool) -> Symbol {
        Symbol {
            quark,
            binding: RwLock::new(Binding { object, constant }),
        }
    }

    fn read(&self) -> RwLockReadGuard<Binding> {
        self.binding.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<Binding> {
        self.binding.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn quark(&self) -> Quark {
        self.quark
    }

    pub fn name(&self) -> SmolStr {
        self.quark.name()
    }

    pub fn get(&self) -> Obj {
        self.read().object.clone()
    }

    /// Replace the bound object. Fails on a constant symbol.
    pub fn set(&self, object: Obj) -> Result<(), Exception> {
        self.bind(object, false)
    }

    /// Replace the bound object and, when `constant` is set, freeze the symbol.
    pub fn bind(&self, object: Obj, constant: bool) -> Result<(), Exception> {
        let mut binding = self.write();
        if binding.constant {
            return Err(Exception::const_assign(self.quark));
        }
        binding.object = object;
        binding.constant = constant;
        Ok(())
    }

    pub fn is_const(&self) -> bool {
        self.read().constant
    }

    pub fn set_const(&self, constant: bool) {
        self.write().constant = constant;
    }
}

impl Object for Symbol {
    fn repr(&self) -> &'static str {
        "Symbol"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        SYMBOL_ZONE.contains(quark) || (hflg && object_isquark(quark))
    }

    /// A symbol evaluates to the object it holds.
    fn eval(&self, _this: &Obj, _interp: &Interp, _nset: &Nameset) -> EvalResult {
        Ok(self.get())
    }

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if quark == GET_NAME {
            expect_argc(quark, argv, 0)?;
            Ok(Str::obj(self.quark.name()))
        } else if quark == GET_OBJECT {
            expect_argc(quark, argv, 0)?;
            Ok(self.get())
        } else if quark == SET_OBJECT {
            expect_argc(quark, argv, 1)?;
            self.set(argv[0].clone())?;
            Ok(argv[0].clone())
        } else if quark == GET_CONST {
            expect_argc(quark, argv, 0)?;
            Ok(Boolean::obj(self.is_const()))
        } else if quark == SET_CONST {
            expect_argc(quark, argv, 1)?;
            self.set_const(boolean_arg(&argv[0])?);
            Ok(Obj::nil())
        } else {
            apply_object(self, quark, argv)
        }
    }
}
