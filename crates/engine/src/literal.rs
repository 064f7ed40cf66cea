//! Self-evaluating values.
//!
//! A literal evaluates to a fresh copy of itself, so mutating operations such as `++` never
//! leak into the form the literal was read from.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering as AtomicOrdering};

use quill_util::Quark;
use smol_str::SmolStr;

use crate::args::{index_arg, integer_arg};
use crate::error::{EvalResult, Exception};
use crate::interp::Interp;
use crate::nameset::Nameset;
use crate::object::{apply_object, object_isquark, Obj, Object};

/// An object with a textual form that reads back as an equal value.
pub trait Literal: Object {
    /// The text reading back as this value.
    fn to_literal(&self) -> String;

    /// The text printed for this value.
    fn to_display(&self) -> String {
        self.to_literal()
    }

    /// A fresh copy of this value.
    fn clone_literal(&self) -> Obj;

    fn literal_eq(&self, other: &Obj) -> bool;
}

quark_zone! {
    static LITERAL_ZONE {
        TO_STRING = "to-string",
        TO_LITERAL = "to-literal",
        EQ = "==",
        NEQ = "!=",
    }
}

pub fn literal_isquark(quark: Quark) -> bool {
    LITERAL_ZONE.contains(quark) || object_isquark(quark)
}

/// Operations common to every literal, falling back to [`apply_object`].
pub fn apply_literal<T: Literal + ?Sized>(lit: &T, quark: Quark, argv: &[Obj]) -> EvalResult {
    match argv.len() {
        0 if quark == TO_STRING => return Ok(Str::obj(lit.to_display())),
        0 if quark == TO_LITERAL => return Ok(Str::obj(lit.to_literal())),
        1 if quark == EQ => return Ok(Boolean::obj(lit.literal_eq(&argv[0]))),
        1 if quark == NEQ => return Ok(Boolean::obj(!lit.literal_eq(&argv[0]))),
        _ => {}
    }
    apply_object(lit, quark, argv)
}

/// Implements the [`Object`] methods every literal shares.
macro_rules! literal_object {
    ($repr:literal, $zone:ident) => {
        fn repr(&self) -> &'static str {
            $repr
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_literal(&self) -> Option<&dyn $crate::literal::Literal> {
            Some(self)
        }

        fn isquark(&self, quark: quill_util::Quark, hflg: bool) -> bool {
            $zone.contains(quark) || (hflg && $crate::literal::literal_isquark(quark))
        }

        fn eval(
            &self,
            _this: &$crate::object::Obj,
            _interp: &$crate::interp::Interp,
            _nset: &$crate::nameset::Nameset,
        ) -> $crate::error::EvalResult {
            Ok($crate::literal::Literal::clone_literal(self))
        }
    };
}

// ====== Boolean ======

quark_zone! {
    static BOOLEAN_ZONE {
        NOT = "not",
    }
}

#[derive(Debug)]
pub struct Boolean(bool);

impl Boolean {
    pub fn new(value: bool) -> Boolean {
        Boolean(value)
    }

    pub fn obj(value: bool) -> Obj {
        Obj::new(Boolean(value))
    }

    pub fn get(&self) -> bool {
        self.0
    }
}

impl Literal for Boolean {
    fn to_literal(&self) -> String {
        self.0.to_string()
    }

    fn clone_literal(&self) -> Obj {
        Boolean::obj(self.0)
    }

    fn literal_eq(&self, other: &Obj) -> bool {
        other.as_bool() == Some(self.0)
    }
}

impl Object for Boolean {
    literal_object!("Boolean", BOOLEAN_ZONE);

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if argv.is_empty() && quark == NOT {
            return Ok(Boolean::obj(!self.0));
        }
        apply_literal(self, quark, argv)
    }
}

// ====== Numbers ======

quark_zone! {
    static NUMBER_ZONE {
        ADD = "add",
        SUB = "sub",
        MUL = "mul",
        DIV = "div",
        MOD = "mod",
        NEG = "neg",
        ABS = "abs",
        LT = "<",
        LE = "<=",
        GT = ">",
        GE = ">=",
        INCR = "++",
        DECR = "--",
        ASSIGN = "=",
        ZERO_P = "zero-p",
        TO_REAL = "to-real",
        TO_INTEGER = "to-integer",
        FLOOR = "floor",
        CEILING = "ceiling",
        NAN_P = "nan-p",
    }
}

fn compare(op: Quark, ord: Option<Ordering>) -> Option<bool> {
    let ord = ord?;
    let res = if op == LT {
        ord == Ordering::Less
    } else if op == LE {
        ord != Ordering::Greater
    } else if op == GT {
        ord == Ordering::Greater
    } else if op == GE {
        ord != Ordering::Less
    } else {
        return None;
    };
    Some(res)
}

fn is_comparison(op: Quark) -> bool {
    op == LT || op == LE || op == GT || op == GE
}

fn is_arithmetic(op: Quark) -> bool {
    op == ADD || op == SUB || op == MUL || op == DIV || op == MOD
}

fn real_binary(op: Quark, a: f64, b: f64) -> Option<f64> {
    let res = if op == ADD {
        a + b
    } else if op == SUB {
        a - b
    } else if op == MUL {
        a * b
    } else if op == DIV {
        a / b
    } else if op == MOD {
        a % b
    } else {
        return None;
    };
    Some(res)
}

/// A signed 64-bit integer. `++`, `--` and `=` update it in place.
#[derive(Debug)]
pub struct Integer(AtomicI64);

impl Integer {
    pub fn new(value: i64) -> Integer {
        Integer(AtomicI64::new(value))
    }

    pub fn obj(value: i64) -> Obj {
        Obj::new(Integer::new(value))
    }

    pub fn get(&self) -> i64 {
        self.0.load(AtomicOrdering::SeqCst)
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, AtomicOrdering::SeqCst)
    }

    fn binary(&self, op: Quark, arg: &Obj) -> Result<Option<Obj>, Exception> {
        let a = self.get();
        if let Some(b) = arg.as_int() {
            if is_comparison(op) {
                return Ok(compare(op, Some(a.cmp(&b))).map(Boolean::obj));
            }
            let res = if op == ADD {
                a.checked_add(b)
            } else if op == SUB {
                a.checked_sub(b)
            } else if op == MUL {
                a.checked_mul(b)
            } else if op == DIV || op == MOD {
                if b == 0 {
                    return Err(Exception::arithmetic("division by zero"));
                }
                if op == DIV {
                    a.checked_div(b)
                } else {
                    a.checked_rem(b)
                }
            } else {
                return Ok(None);
            };
            return res
                .map(|v| Some(Integer::obj(v)))
                .ok_or_else(|| Exception::arithmetic(format!("integer overflow in `{}`", op)));
        }

        if let Some(b) = arg.downcast::<Real>().map(Real::get) {
            let a = a as f64;
            if is_comparison(op) {
                let res = compare(op, a.partial_cmp(&b)).unwrap_or(false);
                return Ok(Some(Boolean::obj(res)));
            }
            return Ok(real_binary(op, a, b).map(Real::obj));
        }

        if is_comparison(op) || is_arithmetic(op) {
            Err(Exception::type_error("integer or real", arg))
        } else {
            Ok(None)
        }
    }
}

impl Literal for Integer {
    fn to_literal(&self) -> String {
        self.get().to_string()
    }

    fn clone_literal(&self) -> Obj {
        Integer::obj(self.get())
    }

    fn literal_eq(&self, other: &Obj) -> bool {
        if let Some(v) = other.as_int() {
            v == self.get()
        } else if let Some(v) = other.downcast::<Real>() {
            v.get() == self.get() as f64
        } else {
            false
        }
    }
}

impl Object for Integer {
    literal_object!("Integer", NUMBER_ZONE);

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        match argv.len() {
            0 => {
                let v = self.get();
                if quark == NEG || quark == ABS {
                    let res = if quark == NEG {
                        v.checked_neg()
                    } else {
                        v.checked_abs()
                    };
                    return res.map(Integer::obj).ok_or_else(|| {
                        Exception::arithmetic(format!("integer overflow in `{}`", quark)).into()
                    });
                } else if quark == ZERO_P {
                    return Ok(Boolean::obj(v == 0));
                } else if quark == TO_REAL {
                    return Ok(Real::obj(v as f64));
                } else if quark == TO_INTEGER {
                    return Ok(Integer::obj(v));
                } else if quark == INCR {
                    let v = self.0.fetch_add(1, AtomicOrdering::SeqCst).wrapping_add(1);
                    return Ok(Integer::obj(v));
                } else if quark == DECR {
                    let v = self.0.fetch_sub(1, AtomicOrdering::SeqCst).wrapping_sub(1);
                    return Ok(Integer::obj(v));
                }
            }
            1 => {
                if quark == ASSIGN {
                    self.set(integer_arg(&argv[0])?);
                    return Ok(Integer::obj(self.get()));
                }
                if let Some(res) = self.binary(quark, &argv[0])? {
                    return Ok(res);
                }
            }
            _ => {}
        }
        apply_literal(self, quark, argv)
    }
}

/// A double precision floating point number.
#[derive(Debug)]
pub struct Real(AtomicU64);

impl Real {
    pub fn new(value: f64) -> Real {
        Real(AtomicU64::new(value.to_bits()))
    }

    pub fn obj(value: f64) -> Obj {
        Obj::new(Real::new(value))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(AtomicOrdering::SeqCst))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), AtomicOrdering::SeqCst)
    }
}

impl Literal for Real {
    fn to_literal(&self) -> String {
        format!("{:?}", self.get())
    }

    fn clone_literal(&self) -> Obj {
        Real::obj(self.get())
    }

    fn literal_eq(&self, other: &Obj) -> bool {
        other.as_real() == Some(self.get())
    }
}

impl Object for Real {
    literal_object!("Real", NUMBER_ZONE);

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        let v = self.get();
        match argv.len() {
            0 => {
                if quark == NEG {
                    return Ok(Real::obj(-v));
                } else if quark == ABS {
                    return Ok(Real::obj(v.abs()));
                } else if quark == ZERO_P {
                    return Ok(Boolean::obj(v == 0.0));
                } else if quark == NAN_P {
                    return Ok(Boolean::obj(v.is_nan()));
                } else if quark == FLOOR {
                    return Ok(Real::obj(v.floor()));
                } else if quark == CEILING {
                    return Ok(Real::obj(v.ceil()));
                } else if quark == TO_REAL {
                    return Ok(Real::obj(v));
                } else if quark == TO_INTEGER {
                    return Ok(Integer::obj(v as i64));
                }
            }
            1 => {
                if quark == ASSIGN {
                    let arg = crate::args::real_arg(&argv[0])?;
                    self.set(arg);
                    return Ok(Real::obj(arg));
                }
                if is_comparison(quark) || is_arithmetic(quark) {
                    let b = argv[0]
                        .as_real()
                        .ok_or_else(|| Exception::type_error("integer or real", &argv[0]))?;
                    if is_comparison(quark) {
                        if let Some(res) = compare(quark, v.partial_cmp(&b)) {
                            return Ok(Boolean::obj(res));
                        }
                        // comparisons with NaN are false
                        return Ok(Boolean::obj(false));
                    }
                    if let Some(res) = real_binary(quark, v, b) {
                        return Ok(Real::obj(res));
                    }
                }
            }
            _ => {}
        }
        apply_literal(self, quark, argv)
    }
}

// ====== Character ======

quark_zone! {
    static CHARACTER_ZONE {
        CHAR_TO_INTEGER = "to-integer",
        ALPHA_P = "alpha-p",
        DIGIT_P = "digit-p",
        BLANK_P = "blank-p",
    }
}

#[derive(Debug)]
pub struct Character(char);

impl Character {
    pub fn new(value: char) -> Character {
        Character(value)
    }

    pub fn obj(value: char) -> Obj {
        Obj::new(Character(value))
    }

    pub fn get(&self) -> char {
        self.0
    }
}

impl Literal for Character {
    fn to_literal(&self) -> String {
        format!("'{}'", self.0.escape_default())
    }

    fn to_display(&self) -> String {
        self.0.to_string()
    }

    fn clone_literal(&self) -> Obj {
        Character::obj(self.0)
    }

    fn literal_eq(&self, other: &Obj) -> bool {
        other.downcast::<Character>().map(Character::get) == Some(self.0)
    }
}

impl Object for Character {
    literal_object!("Character", CHARACTER_ZONE);

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if argv.is_empty() {
            if quark == CHAR_TO_INTEGER {
                return Ok(Integer::obj(self.0 as i64));
            } else if quark == ALPHA_P {
                return Ok(Boolean::obj(self.0.is_alphabetic()));
            } else if quark == DIGIT_P {
                return Ok(Boolean::obj(self.0.is_ascii_digit()));
            } else if quark == BLANK_P {
                return Ok(Boolean::obj(self.0.is_whitespace()));
            }
        }
        apply_literal(self, quark, argv)
    }
}

// ====== String ======

quark_zone! {
    static STRING_ZONE {
        LENGTH = "length",
        STR_ADD = "add",
        GET = "get",
        STR_LT = "<",
        STR_GT = ">",
        TO_UPPER = "to-upper",
        TO_LOWER = "to-lower",
        NIL_OR_EMPTY_P = "empty-p",
    }
}

/// An immutable character string.
#[derive(Debug)]
pub struct Str(SmolStr);

impl Str {
    pub fn new(value: impl Into<SmolStr>) -> Str {
        Str(value.into())
    }

    pub fn obj(value: impl Into<SmolStr>) -> Obj {
        Obj::new(Str::new(value))
    }

    pub fn get(&self) -> &SmolStr {
        &self.0
    }
}

impl Literal for Str {
    fn to_literal(&self) -> String {
        format!("\"{}\"", self.0.escape_default())
    }

    fn to_display(&self) -> String {
        self.0.to_string()
    }

    fn clone_literal(&self) -> Obj {
        Str::obj(self.0.clone())
    }

    fn literal_eq(&self, other: &Obj) -> bool {
        other.downcast::<Str>().map_or(false, |s| s.0 == self.0)
    }
}

impl Object for Str {
    literal_object!("String", STRING_ZONE);

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        match argv.len() {
            0 => {
                if quark == LENGTH {
                    return Ok(Integer::obj(self.0.chars().count() as i64));
                } else if quark == TO_UPPER {
                    return Ok(Str::obj(self.0.to_uppercase()));
                } else if quark == TO_LOWER {
                    return Ok(Str::obj(self.0.to_lowercase()));
                } else if quark == NIL_OR_EMPTY_P {
                    return Ok(Boolean::obj(self.0.is_empty()));
                }
            }
            1 => {
                let arg = &argv[0];
                if quark == STR_ADD {
                    let mut s = self.0.to_string();
                    s.push_str(&arg.to_display());
                    return Ok(Str::obj(s));
                } else if quark == GET {
                    let len = self.0.chars().count();
                    let i = index_arg(arg, len)?;
                    let c = self.0.chars().nth(i).ok_or_else(|| Exception::index(i, len))?;
                    return Ok(Character::obj(c));
                } else if quark == STR_LT || quark == STR_GT {
                    let other = crate::args::string_arg(arg)?;
                    let ord = self.0.as_str().cmp(other.as_str());
                    let res = if quark == STR_LT {
                        ord == Ordering::Less
                    } else {
                        ord == Ordering::Greater
                    };
                    return Ok(Boolean::obj(res));
                }
            }
            _ => {}
        }
        apply_literal(self, quark, argv)
    }
}

/// Returns `true` if `obj` is a number.
pub fn is_number(obj: &Obj) -> bool {
    obj.is::<Integer>() || obj.is::<Real>()
}
