//! Turns parsed syntax into evaluable objects.

use quill_syn::{Syntax, SyntaxKind};
use quill_util::Quark;

use crate::constant::Constant;
use crate::error::Exception;
use crate::form::Form;
use crate::ident::{Lexical, Qualified, Reserved};
use crate::literal::{Boolean, Character, Integer, Real, Str};
use crate::object::Obj;

/// Build the object for one syntax node.
///
/// Literals become [`Constant`]s, identifiers become [`Lexical`], [`Qualified`] or
/// [`Reserved`] nodes and lists become [`Form`]s. The empty list is nil.
pub fn build(syntax: &Syntax) -> Result<Obj, Exception> {
    let line = syntax.line;
    let obj = match &syntax.kind {
        SyntaxKind::Nil => Obj::nil(),
        SyntaxKind::Bool(b) => Obj::new(Constant::new(Boolean::obj(*b))),
        SyntaxKind::Int(i) => Obj::new(Constant::new(Integer::obj(*i))),
        SyntaxKind::Real(r) => Obj::new(Constant::new(Real::obj(*r))),
        SyntaxKind::Char(c) => Obj::new(Constant::new(Character::obj(*c))),
        SyntaxKind::Str(s) => Obj::new(Constant::new(Str::obj(s.clone()))),
        SyntaxKind::Reserved(name) => Obj::new(Reserved::new(Quark::intern(name), line)),
        SyntaxKind::Ident(name) if name.contains(':') => Obj::new(Qualified::new(name, line)?),
        SyntaxKind::Ident(name) => Obj::new(Lexical::new(Quark::intern(name), line)),
        SyntaxKind::Form(items) => match items.split_first() {
            None => Obj::nil(),
            Some((car, cdr)) => {
                let car = build(car)?;
                let cdr = cdr.iter().map(build).collect::<Result<Vec<_>, _>>()?;
                Obj::new(Form::new(car, cdr, line))
            }
        },
    };
    Ok(obj)
}
