use std::any::Any;

use crate::error::EvalResult;
use crate::ident::Qualified;
use crate::interp::Interp;
use crate::nameset::Nameset;
use crate::object::{Obj, Object};

/// An operator applied to operands, as in `(op a b)`.
#[derive(Debug)]
pub struct Form {
    car: Obj,
    cdr: Vec<Obj>,
    line: u32,
}

impl Form {
    pub fn new(car: Obj, cdr: Vec<Obj>, line: u32) -> Form {
        Form { car, cdr, line }
    }

    pub fn car(&self) -> &Obj {
        &self.car
    }

    pub fn cdr(&self) -> &[Obj] {
        &self.cdr
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Every item of the form, operator first.
    pub fn items(&self) -> impl Iterator<Item = &Obj> {
        std::iter::once(&self.car).chain(self.cdr.iter())
    }
}

impl Object for Form {
    fn repr(&self) -> &'static str {
        "Form"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Resolves the operator and calls it with the unevaluated operands. A qualified
    /// operator calls its last segment as a member of the rest.
    fn eval(&self, _this: &Obj, interp: &Interp, nset: &Nameset) -> EvalResult {
        tracing::trace!(line = self.line, argc = self.cdr.len(), "evaluating form");
        let res = match self.car.downcast::<Qualified>() {
            Some(qualified) => qualified.call_path(interp, nset, &self.cdr),
            None => {
                let op = self.car.eval(interp, nset).map_err(|u| u.or_line(self.line))?;
                op.call(interp, nset, &self.cdr)
            }
        };
        res.map_err(|u| u.or_line(self.line))
    }
}
