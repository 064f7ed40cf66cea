//! Argument checking shared by builtins and operations.

use std::fmt::Display;

use quill_util::Quark;
use smol_str::SmolStr;

use crate::error::Exception;
use crate::ident::{Lexical, Reserved};
use crate::object::Obj;

/// Fail unless exactly `n` arguments were passed to `op`.
pub fn expect_argc(op: impl Display, argv: &[Obj], n: usize) -> Result<(), Exception> {
    if argv.len() != n {
        return Err(Exception::argument(
            op,
            format!("expected {} argument(s), got {}", n, argv.len()),
        ));
    }
    Ok(())
}

/// Fail unless between `min` and `max` arguments (inclusive) were passed to `op`.
pub fn expect_argc_range(
    op: impl Display,
    argv: &[Obj],
    min: usize,
    max: usize,
) -> Result<(), Exception> {
    if argv.len() < min || argv.len() > max {
        return Err(Exception::argument(
            op,
            format!(
                "expected {} to {} arguments, got {}",
                min,
                max,
                argv.len()
            ),
        ));
    }
    Ok(())
}

pub fn integer_arg(obj: &Obj) -> Result<i64, Exception> {
    obj.as_int()
        .ok_or_else(|| Exception::type_error("integer", obj))
}

/// Accepts integers as well.
pub fn real_arg(obj: &Obj) -> Result<f64, Exception> {
    obj.as_real()
        .ok_or_else(|| Exception::type_error("real", obj))
}

pub fn boolean_arg(obj: &Obj) -> Result<bool, Exception> {
    obj.as_bool()
        .ok_or_else(|| Exception::type_error("boolean", obj))
}

pub fn string_arg(obj: &Obj) -> Result<SmolStr, Exception> {
    obj.as_string()
        .ok_or_else(|| Exception::type_error("string", obj))
}

/// A non-negative index.
pub fn index_arg(obj: &Obj, len: usize) -> Result<usize, Exception> {
    let i = integer_arg(obj)?;
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| Exception::index(i, len))
}

/// The name carried by an unevaluated identifier operand, reserved keywords included.
pub fn name_arg(obj: &Obj) -> Result<Quark, Exception> {
    if let Some(lexical) = obj.downcast::<Lexical>() {
        return Ok(lexical.quark());
    }
    obj.downcast::<Reserved>()
        .map(Reserved::quark)
        .ok_or_else(|| Exception::type_error("identifier", obj))
}
