use std::any::Any;

use crate::error::EvalResult;
use crate::interp::Interp;
use crate::nameset::Nameset;
use crate::object::{Obj, Object};

/// A literal appearing in source text.
///
/// Evaluating a constant yields a fresh copy of the literal each time, so code that mutates
/// the value it got (with `++`, say) never changes what the next evaluation sees.
#[derive(Debug)]
pub struct Constant {
    literal: Obj,
}

impl Constant {
    pub fn new(literal: Obj) -> Constant {
        debug_assert!(literal.as_literal().is_some(), "constant over a non-literal");
        Constant { literal }
    }

    /// The literal this constant copies from.
    pub fn literal(&self) -> &Obj {
        &self.literal
    }
}

impl Object for Constant {
    fn repr(&self) -> &'static str {
        "Constant"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eval(&self, _this: &Obj, _interp: &Interp, _nset: &Nameset) -> EvalResult {
        match self.literal.as_literal() {
            Some(lit) => Ok(lit.clone_literal()),
            None => Ok(self.literal.clone()),
        }
    }
}
