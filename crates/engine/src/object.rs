use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use quill_util::Quark;
use smol_str::SmolStr;

use crate::error::{EvalResult, Exception};
use crate::function::eval_args;
use crate::interp::Interp;
use crate::literal::{Boolean, Integer, Literal, Real, Str};
use crate::nameset::Nameset;

quark_zone! {
    static OBJECT_ZONE {
        REPR = "repr",
        EQL_P = "eql-p",
        NIL_P = "nil-p",
        OPERATION_P = "operation-p",
    }
}

/// Returns `true` if `quark` is answered by every object.
pub fn object_isquark(quark: Quark) -> bool {
    OBJECT_ZONE.contains(quark)
}

/// A runtime value.
///
/// Every type taking part in evaluation implements this trait. Operations are looked up by
/// quark in [`Object::apply`]: an implementation handles its own operations, then hands the call
/// to its base ([`crate::literal::apply_literal`] or [`apply_object`]), down to the root which
/// reports an unknown operation.
pub trait Object: Any + Send + Sync {
    /// The type name of this object.
    fn repr(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_literal(&self) -> Option<&dyn Literal> {
        None
    }

    /// Returns `true` if this type defines `quark`. With `hflg` set, operations inherited
    /// from the base types count as well.
    fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        hflg && object_isquark(quark)
    }

    /// Evaluate this object. `this` is the handle the object was reached through.
    fn eval(&self, this: &Obj, _interp: &Interp, _nset: &Nameset) -> EvalResult {
        Ok(this.clone())
    }

    /// Call this object with unevaluated operands.
    fn call(&self, _interp: &Interp, _nset: &Nameset, _args: &[Obj]) -> EvalResult {
        Err(Exception::not_callable(self.repr()).into())
    }

    /// Apply the operation `quark` to already evaluated arguments.
    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        apply_object(self, quark, argv)
    }

    /// Resolve the member `quark`, as in the `b` of `a:b`.
    fn eval_member(&self, _interp: &Interp, _nset: &Nameset, quark: Quark) -> EvalResult {
        Err(Exception::unknown_operation(self.repr(), quark)
            .with_reason(format!("{} has no member `{}`", self.repr(), quark))
            .into())
    }

    /// Call the member `quark` with unevaluated operands, as in `(a:b x y)`.
    ///
    /// By default the operands are evaluated in `nset` and the operation is applied.
    fn call_member(
        &self,
        interp: &Interp,
        nset: &Nameset,
        quark: Quark,
        args: &[Obj],
    ) -> EvalResult {
        let argv = eval_args(interp, nset, args)?;
        self.apply(interp, nset, quark, &argv)
    }
}

/// The root of every dispatch chain.
///
/// An operation known somewhere in the chain but reaching this point was called with the
/// wrong number of arguments.
pub fn apply_object<T: Object + ?Sized>(obj: &T, quark: Quark, argv: &[Obj]) -> EvalResult {
    match argv.len() {
        0 if quark == REPR => return Ok(Str::obj(obj.repr())),
        0 if quark == NIL_P => return Ok(Boolean::obj(false)),
        1 if quark == EQL_P => {
            let addr = obj as *const T as *const ();
            return Ok(Boolean::obj(argv[0].addr() == addr));
        }
        1 if quark == OPERATION_P => {
            let name = crate::args::string_arg(&argv[0])?;
            return Ok(Boolean::obj(obj.isquark(Quark::intern(&name), true)));
        }
        _ => {}
    }
    if obj.isquark(quark, true) {
        Err(Exception::argument(
            quark,
            format!("wrong number of arguments ({}) for {}", argv.len(), obj.repr()),
        )
        .into())
    } else {
        Err(Exception::unknown_operation(obj.repr(), quark).into())
    }
}

/// A shared handle to an [`Object`], or nil.
///
/// Cloning shares the object. Objects are released when their last handle goes away.
#[derive(Clone, Default)]
pub struct Obj(Option<Arc<dyn Object>>);

impl Obj {
    pub fn nil() -> Obj {
        Obj(None)
    }

    pub fn new<T: Object>(object: T) -> Obj {
        Obj(Some(Arc::new(object)))
    }

    pub fn from_arc(object: Arc<dyn Object>) -> Obj {
        Obj(Some(object))
    }

    /// Returns `true` if the handle is nil.
    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&dyn Object> {
        self.0.as_deref()
    }

    pub fn downcast<T: Object>(&self) -> Option<&T> {
        self.get()?.as_any().downcast_ref()
    }

    /// Returns `true` if the object is of type `T`.
    pub fn is<T: Object>(&self) -> bool {
        self.downcast::<T>().is_some()
    }

    /// Address of the object, null for nil.
    pub fn addr(&self) -> *const () {
        match &self.0 {
            Some(obj) => Arc::as_ptr(obj) as *const (),
            None => std::ptr::null(),
        }
    }

    /// Identity comparison. Nil is identical to nil.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        self.addr() == other.addr()
    }

    pub fn repr(&self) -> &'static str {
        self.get().map_or("nil", |o| o.repr())
    }

    pub fn as_literal(&self) -> Option<&dyn Literal> {
        self.get()?.as_literal()
    }

    /// Equality the way sets and `==` see it: identity, or equal literals.
    pub fn literal_eq(&self, other: &Obj) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match self.as_literal() {
            Some(lit) => lit.literal_eq(other),
            None => false,
        }
    }

    /// The text printed for this value.
    pub fn to_display(&self) -> String {
        match self.get() {
            None => "nil".into(),
            Some(obj) => match obj.as_literal() {
                Some(lit) => lit.to_display(),
                None => format!("<{}>", obj.repr()),
            },
        }
    }

    /// The text reading back as this value, where there is one.
    pub fn to_literal(&self) -> String {
        match self.get() {
            None => "nil".into(),
            Some(obj) => match obj.as_literal() {
                Some(lit) => lit.to_literal(),
                None => format!("<{}>", obj.repr()),
            },
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.downcast::<Boolean>().map(Boolean::get)
    }

    pub fn as_int(&self) -> Option<i64> {
        self.downcast::<Integer>().map(Integer::get)
    }

    /// Integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        if let Some(i) = self.as_int() {
            Some(i as f64)
        } else {
            self.downcast::<Real>().map(Real::get)
        }
    }

    pub fn as_string(&self) -> Option<SmolStr> {
        self.downcast::<Str>().map(|s| s.get().clone())
    }

    pub fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        match self.get() {
            Some(obj) => obj.isquark(quark, hflg),
            None => quark == NIL_P,
        }
    }

    // ====== Evaluation entry points ======

    pub fn eval(&self, interp: &Interp, nset: &Nameset) -> EvalResult {
        match self.get() {
            Some(obj) => obj.eval(self, interp, nset),
            None => Ok(Obj::nil()),
        }
    }

    pub fn call(&self, interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
        match self.get() {
            Some(obj) => obj.call(interp, nset, args),
            None => Err(Exception::not_callable("nil").into()),
        }
    }

    pub fn apply(&self, interp: &Interp, nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        match self.get() {
            Some(obj) => obj.apply(interp, nset, quark, argv),
            None if quark == NIL_P && argv.is_empty() => Ok(Boolean::obj(true)),
            None => Err(Exception::unknown_operation("nil", quark).into()),
        }
    }

    pub fn eval_member(&self, interp: &Interp, nset: &Nameset, quark: Quark) -> EvalResult {
        match self.get() {
            Some(obj) => obj.eval_member(interp, nset, quark),
            None => Err(Exception::unknown_operation("nil", quark)
                .with_reason(format!("nil has no member `{}`", quark))
                .into()),
        }
    }

    pub fn call_member(
        &self,
        interp: &Interp,
        nset: &Nameset,
        quark: Quark,
        args: &[Obj],
    ) -> EvalResult {
        match self.get() {
            Some(obj) => obj.call_member(interp, nset, quark, args),
            None => {
                let argv = eval_args(interp, nset, args)?;
                self.apply(interp, nset, quark, &argv)
            }
        }
    }
}

impl Debug for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl<T: Object> From<Arc<T>> for Obj {
    fn from(object: Arc<T>) -> Self {
        Obj(Some(object))
    }
}
