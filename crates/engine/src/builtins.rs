//! The global bindings every interpreter starts with.

use itertools::Itertools;
use quill_syn::Parser;
use quill_util::Quark;

use crate::args::{boolean_arg, expect_argc, expect_argc_range, integer_arg, name_arg, string_arg};
use crate::builder::build;
use crate::counter::Counter;
use crate::error::{EvalResult, Exception, ExceptionKind, Unwind};
use crate::form::Form;
use crate::function::{eval_body, Builtin, Closure, NativeFn, Scope};
use crate::ident::Qualified;
use crate::interp::Interp;
use crate::literal::{Boolean, Character, Integer, Real, Str};
use crate::nameset::Nameset;
use crate::object::Obj;
use crate::set::Set;
use crate::thread::ThreadHandle;

// operations the operator builtins dispatch to
quark_zone! {
    ADD = "add",
    SUB = "sub",
    MUL = "mul",
    DIV = "div",
    NEG = "neg",
    NOT = "not",
    EQ = "==",
    NEQ = "!=",
    LT = "<",
    LE = "<=",
    GT = ">",
    GE = ">=",
    WHAT = "what",
}

const SPECIAL_FORMS: &[(&str, NativeFn)] = &[
    ("define", define),
    ("trans", define),
    ("const", constant),
    ("undef", undef),
    ("lambda", lambda),
    ("gamma", gamma),
    ("if", if_form),
    ("while", while_form),
    ("block", block),
    ("return", return_form),
    ("try", try_form),
    ("assert", assert_form),
    ("launch", launch),
];

const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("nameset", nameset),
    ("throw", throw),
    ("abort", abort),
    ("eval", eval),
    ("load", load),
    ("library", library),
    ("wall", wall),
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", div),
    ("==", eq),
    ("!=", neq),
    ("<", lt),
    ("<=", le),
    (">", gt),
    (">=", ge),
    ("not", not),
    ("print", print),
    ("println", println),
    ("errorln", errorln),
    ("Counter", counter),
    ("Set", set),
    ("Thread", thread),
    ("nil-p", nil_p),
    ("boolean-p", boolean_p),
    ("integer-p", integer_p),
    ("real-p", real_p),
    ("number-p", number_p),
    ("character-p", character_p),
    ("string-p", string_p),
    ("counter-p", counter_p),
    ("set-p", set_p),
    ("nameset-p", nameset_p),
    ("closure-p", closure_p),
    ("thread-p", thread_p),
];

/// Bind every builtin as a constant in `globals`.
pub fn install(globals: &Nameset) {
    let special = SPECIAL_FORMS
        .iter()
        .map(|&(name, func)| (name, Builtin::special(name, func)));
    let functions = FUNCTIONS
        .iter()
        .map(|&(name, func)| (name, Builtin::function(name, func)));
    for (name, builtin) in special.chain(functions) {
        if let Err(e) = globals.bind(Quark::intern(name), Obj::new(builtin), true) {
            tracing::warn!(name, error = %e, "cannot install builtin");
        }
    }
}

// ====== Binding ======

/// Where a closure defined in `nset` runs.
fn scope_of(interp: &Interp, nset: &Nameset) -> Scope {
    if std::ptr::eq(nset, &**interp.globals()) {
        Scope::Global
    } else {
        Scope::Lexical(nset.handle())
    }
}

/// Parameter list of a closure: `()`, a single name, or a list of names.
fn params_of(obj: &Obj) -> Result<Vec<Quark>, Exception> {
    if obj.is_nil() {
        return Ok(vec![]);
    }
    if let Some(form) = obj.downcast::<Form>() {
        return form.items().map(name_arg).collect();
    }
    Ok(vec![name_arg(obj)?])
}

/// Bind `target`, a plain or qualified name, to `value`.
fn bind_target(
    interp: &Interp,
    nset: &Nameset,
    target: &Obj,
    value: Obj,
    constant: bool,
) -> EvalResult<()> {
    if let Some(qualified) = target.downcast::<Qualified>() {
        let prefix = qualified.eval_prefix(interp, nset)?;
        let scope = prefix
            .downcast::<Nameset>()
            .ok_or_else(|| Exception::type_error("nameset", &prefix))?;
        scope.bind(qualified.last(), value, constant)?;
    } else {
        nset.bind(name_arg(target)?, value, constant)?;
    }
    Ok(())
}

fn define_with(interp: &Interp, nset: &Nameset, args: &[Obj], constant: bool) -> EvalResult {
    if args.len() < 2 {
        return Err(Exception::argument("define", "expected a name and a value").into());
    }
    let value = if args.len() == 2 {
        args[1].eval(interp, nset)?
    } else {
        let params = params_of(&args[1])?;
        let body = args[2..].to_vec();
        Obj::new(Closure::new(params, body, scope_of(interp, nset)))
    };
    bind_target(interp, nset, &args[0], value.clone(), constant)?;
    Ok(value)
}

/// `(define name value)` or `(define name (params) body...)`
fn define(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    define_with(interp, nset, args, false)
}

fn constant(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    define_with(interp, nset, args, true)
}

fn undef(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    expect_argc("undef", args, 1)?;
    if let Some(qualified) = args[0].downcast::<Qualified>() {
        let prefix = qualified.eval_prefix(interp, nset)?;
        let scope = prefix
            .downcast::<Nameset>()
            .ok_or_else(|| Exception::type_error("nameset", &prefix))?;
        scope.unbind(qualified.last())?;
    } else {
        nset.unbind(name_arg(&args[0])?)?;
    }
    Ok(Obj::nil())
}

/// `(nameset)` makes a child of the current nameset, `(nameset parent)` one of `parent`.
fn nameset(_interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc_range("nameset", argv, 0, 1)?;
    match argv.first() {
        None => Ok(Obj::from(nset.child())),
        Some(parent) => {
            let parent = parent
                .downcast::<Nameset>()
                .ok_or_else(|| Exception::type_error("nameset", parent))?;
            Ok(Obj::from(parent.child()))
        }
    }
}

fn closure(args: &[Obj], scope: Scope) -> EvalResult {
    if args.is_empty() {
        return Err(Exception::argument("lambda", "missing parameter list").into());
    }
    let params = params_of(&args[0])?;
    Ok(Obj::new(Closure::new(params, args[1..].to_vec(), scope)))
}

/// A closure over the current nameset.
fn lambda(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    closure(args, scope_of(interp, nset))
}

/// A closure over the global nameset only.
fn gamma(_interp: &Interp, _nset: &Nameset, args: &[Obj]) -> EvalResult {
    closure(args, Scope::Global)
}

// ====== Control ======

fn if_form(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    expect_argc_range("if", args, 2, 3)?;
    let cond = args[0].eval(interp, nset)?;
    if boolean_arg(&cond)? {
        args[1].eval(interp, nset)
    } else if let Some(otherwise) = args.get(2) {
        otherwise.eval(interp, nset)
    } else {
        Ok(Obj::nil())
    }
}

fn while_form(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    if args.is_empty() {
        return Err(Exception::argument("while", "missing condition").into());
    }
    let mut res = Obj::nil();
    while boolean_arg(&args[0].eval(interp, nset)?)? {
        res = eval_body(interp, nset, &args[1..])?;
    }
    Ok(res)
}

/// Evaluate forms in a fresh child nameset.
fn block(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    let local = nset.child();
    eval_body(interp, &local, args)
}

fn return_form(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    expect_argc_range("return", args, 0, 1)?;
    let value = match args.first() {
        Some(arg) => arg.eval(interp, nset)?,
        None => Obj::nil(),
    };
    Err(Unwind::Return(value))
}

/// `(try form)` or `(try form handler)`.
///
/// Without a handler a caught exception becomes the value. The handler runs in a child
/// nameset with the exception bound to `what`. Abort-flagged exceptions are not caught.
fn try_form(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    expect_argc_range("try", args, 1, 2)?;
    match args[0].eval(interp, nset) {
        Err(Unwind::Error(e)) if !e.is_abort() => {
            tracing::trace!(kind = e.kind().name(), "caught exception");
            let caught = Obj::new(e);
            match args.get(1) {
                None => Ok(caught),
                Some(handler) => {
                    let local = nset.child();
                    local.bind(WHAT.get(), caught, false)?;
                    handler.eval(interp, &local)
                }
            }
        }
        res => res,
    }
}

fn throw(_interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc_range("throw", argv, 0, 3)?;
    if let Some(e) = argv.first().and_then(|o| o.downcast::<Exception>()) {
        return Err(e.clone().into());
    }
    let kind = match argv.first() {
        Some(kind) => ExceptionKind::User(string_arg(kind)?),
        None => ExceptionKind::User("user-exception".into()),
    };
    let mut e = Exception::new(kind);
    if let Some(reason) = argv.get(1) {
        e = e.with_reason(reason.to_display());
    }
    if let Some(object) = argv.get(2) {
        e = e.with_object(object.clone());
    }
    Err(e.into())
}

/// Raise an exception that no `try` catches.
fn abort(_interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc_range("abort", argv, 0, 1)?;
    let reason = argv.first().map_or_else(|| "aborted".to_string(), Obj::to_display);
    Err(Exception::new(ExceptionKind::User("abort".into()))
        .with_reason(reason)
        .with_abort(true)
        .into())
}

/// `(assert expected form)` compares when assertions are enabled.
fn assert_form(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    expect_argc("assert", args, 2)?;
    if !interp.state().assert_enabled() {
        return Ok(Obj::nil());
    }
    let expected = args[0].eval(interp, nset)?;
    let actual = args[1].eval(interp, nset)?;
    if expected.literal_eq(&actual) {
        return Ok(Obj::nil());
    }
    Err(Exception::new(ExceptionKind::Assertion)
        .with_reason(format!(
            "expected {}, got {}",
            expected.to_literal(),
            actual.to_literal()
        ))
        .with_object(actual)
        .into())
}

/// Evaluate a value again. Strings are read as source text.
fn eval(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc("eval", argv, 1)?;
    let source = match argv[0].as_string() {
        Some(source) => source,
        None => return argv[0].eval(interp, nset),
    };
    let forms = Parser::new(&source)
        .parse_all()
        .map_err(Exception::from)?;
    let mut res = Obj::nil();
    for syntax in &forms {
        res = build(syntax)?.eval(interp, nset)?;
    }
    Ok(res)
}

fn load(interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc("load", argv, 1)?;
    interp.load(&string_arg(&argv[0])?)?;
    Ok(Obj::nil())
}

fn library(interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc("library", argv, 1)?;
    let name = string_arg(&argv[0])?;
    Ok(interp.loader().load(interp, &name)?)
}

/// `(launch form)` or `(launch thread form)`. The form is evaluated on a new thread.
fn launch(interp: &Interp, nset: &Nameset, args: &[Obj]) -> EvalResult {
    expect_argc_range("launch", args, 1, 2)?;
    let handle = match args {
        [form] => interp.launch(form.clone())?,
        [thread, form] => {
            let thread = thread.eval(interp, nset)?;
            let handle = thread
                .downcast::<ThreadHandle>()
                .ok_or_else(|| Exception::type_error("thread", &thread))?;
            interp.launch_with(handle.clone(), form.clone())?
        }
        _ => unreachable!("argument count checked"),
    };
    Ok(Obj::new(handle))
}

fn wall(interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc("wall", argv, 0)?;
    interp.wait_all();
    Ok(Obj::nil())
}

fn thread(_interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc_range("Thread", argv, 0, 1)?;
    let name = argv.first().map(string_arg).transpose()?;
    Ok(Obj::new(ThreadHandle::new(name)))
}

// ====== Operators ======

/// Fold the operands with the operation `op` of the first one.
fn fold(interp: &Interp, nset: &Nameset, name: &str, op: Quark, argv: &[Obj]) -> EvalResult {
    let (first, rest) = argv
        .split_first()
        .ok_or_else(|| Exception::argument(name, "expected at least one argument"))?;
    let mut acc = first.clone();
    for arg in rest {
        acc = acc.apply(interp, nset, op, std::slice::from_ref(arg))?;
    }
    Ok(acc)
}

fn add(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    fold(interp, nset, "+", ADD.get(), argv)
}

fn sub(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    if argv.len() == 1 {
        return argv[0].apply(interp, nset, NEG.get(), &[]);
    }
    fold(interp, nset, "-", SUB.get(), argv)
}

fn mul(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    fold(interp, nset, "*", MUL.get(), argv)
}

fn div(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    fold(interp, nset, "/", DIV.get(), argv)
}

fn compare(interp: &Interp, nset: &Nameset, name: &str, op: Quark, argv: &[Obj]) -> EvalResult {
    expect_argc(name, argv, 2)?;
    if argv[0].is_nil() && (op == EQ || op == NEQ) {
        let same = argv[1].is_nil();
        return Ok(Boolean::obj(if op == EQ { same } else { !same }));
    }
    argv[0].apply(interp, nset, op, &argv[1..])
}

fn eq(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    compare(interp, nset, "==", EQ.get(), argv)
}

fn neq(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    compare(interp, nset, "!=", NEQ.get(), argv)
}

fn lt(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    compare(interp, nset, "<", LT.get(), argv)
}

fn le(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    compare(interp, nset, "<=", LE.get(), argv)
}

fn gt(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    compare(interp, nset, ">", GT.get(), argv)
}

fn ge(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    compare(interp, nset, ">=", GE.get(), argv)
}

fn not(interp: &Interp, nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc("not", argv, 1)?;
    argv[0].apply(interp, nset, NOT.get(), &[])
}

// ====== Output ======

fn display(argv: &[Obj]) -> String {
    argv.iter().map(Obj::to_display).join("")
}

fn print(interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    interp.output().write(&display(argv))?;
    Ok(Obj::nil())
}

fn println(interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    interp.output().writeln(&display(argv))?;
    Ok(Obj::nil())
}

fn errorln(interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    interp.error().errorln(&display(argv))?;
    Ok(Obj::nil())
}

// ====== Constructors ======

/// `(Counter end)` counts from zero, `(Counter start end)` from `start`.
fn counter(_interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    expect_argc_range("Counter", argv, 0, 2)?;
    let counter = match argv {
        [] => Counter::new(0, 0),
        [end] => Counter::new(0, integer_arg(end)?),
        [start, end] => Counter::new(integer_arg(start)?, integer_arg(end)?),
        _ => unreachable!("argument count checked"),
    };
    Ok(Obj::new(counter))
}

fn set(_interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
    Ok(Obj::new(Set::from_objs(argv.iter().cloned())))
}

// ====== Predicates ======

macro_rules! type_predicates {
    ($($name:ident($text:literal) => $test:expr),* $(,)?) => {
        $(
            fn $name(_interp: &Interp, _nset: &Nameset, argv: &[Obj]) -> EvalResult {
                expect_argc($text, argv, 1)?;
                let test: fn(&Obj) -> bool = $test;
                Ok(Boolean::obj(test(&argv[0])))
            }
        )*
    };
}

type_predicates! {
    nil_p("nil-p") => |o| o.is_nil(),
    boolean_p("boolean-p") => |o| o.is::<Boolean>(),
    integer_p("integer-p") => |o| o.is::<Integer>(),
    real_p("real-p") => |o| o.is::<Real>(),
    number_p("number-p") => crate::literal::is_number,
    character_p("character-p") => |o| o.is::<Character>(),
    string_p("string-p") => |o| o.is::<Str>(),
    counter_p("counter-p") => |o| o.is::<Counter>(),
    set_p("set-p") => |o| o.is::<Set>(),
    nameset_p("nameset-p") => |o| o.is::<Nameset>(),
    closure_p("closure-p") => |o| o.is::<Closure>() || o.is::<Builtin>(),
    thread_p("thread-p") => |o| o.is::<ThreadHandle>(),
}
