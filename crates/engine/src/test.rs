use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use quill_util::Quark;
use test_env_log::test;

use crate::constant::Constant;
use crate::error::{Exception, ExceptionKind};
use crate::ident::Reserved;
use crate::interp::{Interp, InterpOptions};
use crate::literal::{Integer, Str};
use crate::loader::Library;
use crate::object::Obj;
use crate::stream::{OutputBuffer, Streams};

struct Harness {
    interp: Interp,
    out: Arc<OutputBuffer>,
    err: Arc<OutputBuffer>,
}

impl Harness {
    fn with_options(options: InterpOptions) -> Harness {
        let (streams, out, err) = Streams::buffered("");
        let interp = Interp::new(InterpOptions {
            streams: Some(streams),
            ..options
        });
        Harness { interp, out, err }
    }

    fn new() -> Harness {
        Harness::with_options(InterpOptions {
            assert: true,
            seed: Some(0),
            ..InterpOptions::default()
        })
    }

    fn eval(&self, source: &str) -> Obj {
        self.interp.eval_str(source).unwrap()
    }

    fn literal(&self, source: &str) -> String {
        self.eval(source).to_literal()
    }

    fn int(&self, source: &str) -> i64 {
        let res = self.eval(source);
        res.as_int()
            .unwrap_or_else(|| panic!("`{}` gave {:?}", source, res))
    }

    /// Evaluate `source` inside `try` and return the caught exception.
    fn caught(&self, source: &str) -> Exception {
        let res = self.eval(&format!("(try {})", source));
        res.downcast::<Exception>()
            .unwrap_or_else(|| panic!("`{}` did not raise, gave {:?}", source, res))
            .clone()
    }

    fn bound(&self, name: &str) -> bool {
        self.interp.globals().exists(Quark::intern(name))
    }
}

#[test]
fn test_define_and_resolve() {
    let h = Harness::new();
    h.eval("(define x 10)");
    let x = h.interp.globals().resolve(Quark::intern("x")).unwrap();
    assert_eq!(x.as_int(), Some(10));
    assert_eq!(h.int("(+ x 5)"), 15);
    assert_eq!(h.int("(- x)"), -10);
    assert_eq!(h.literal("(* 2 2.5)"), "5.0");
}

#[test]
fn test_constants_evaluate_to_fresh_values() {
    let h = Harness::new();
    h.eval("(define bump () (define y 0) (y:++) y)");
    assert_eq!(h.int("(bump)"), 1);
    assert_eq!(h.int("(bump)"), 1);
}

#[test]
fn test_constant_yields_distinct_copies() {
    let h = Harness::new();
    let node = Obj::new(Constant::new(Integer::obj(7)));
    let a = node.eval(&h.interp, h.interp.globals()).unwrap();
    let b = node.eval(&h.interp, h.interp.globals()).unwrap();
    assert!(!a.ptr_eq(&b));
    assert!(a.literal_eq(&b));
}

/// Rebinding a reserved keyword does not reach a node that already resolved it.
#[test]
fn test_reserved_caches_first_binding() {
    let h = Harness::new();
    let globals = h.interp.globals();
    let node = Obj::new(Reserved::new(Quark::intern("if"), 1));

    let first = node.eval(&h.interp, globals).unwrap();
    assert_eq!(first.repr(), "Builtin");

    let child = globals.child();
    child
        .bind(Quark::intern("if"), Integer::obj(1), false)
        .unwrap();
    let again = node.eval(&h.interp, &child).unwrap();
    assert!(again.ptr_eq(&first));

    let fresh = Obj::new(Reserved::new(Quark::intern("if"), 1));
    assert_eq!(fresh.eval(&h.interp, &child).unwrap().as_int(), Some(1));
}

#[test]
fn test_dispatch_errors() {
    let h = Harness::new();
    h.eval("(define n 5)");
    assert_eq!(
        h.caught("(n:frobnicate)").kind(),
        &ExceptionKind::UnknownOperation
    );
    assert_eq!(h.caught("(n:add)").kind(), &ExceptionKind::Argument);
    assert_eq!(h.caught("(n:add \"x\")").kind(), &ExceptionKind::Type);
    assert_eq!(h.caught("(/ n 0)").kind(), &ExceptionKind::Arithmetic);
    assert_eq!(h.caught("(n)").kind(), &ExceptionKind::Type);
    assert_eq!(h.literal("(n:repr)"), "\"Integer\"");
    assert_eq!(h.literal("(n:operation-p \"abs\")"), "true");
    assert_eq!(h.literal("(n:operation-p \"length\")"), "false");
}

#[test]
fn test_integer_overflow() {
    let h = Harness::new();
    h.eval("(define m (- (- 0 9223372036854775807) 1))");
    assert_eq!(h.caught("(m:neg)").kind(), &ExceptionKind::Arithmetic);
    assert_eq!(h.caught("(m:abs)").kind(), &ExceptionKind::Arithmetic);
    assert_eq!(h.caught("(- m)").kind(), &ExceptionKind::Arithmetic);
    assert_eq!(h.caught("(* m 2)").kind(), &ExceptionKind::Arithmetic);
    assert_eq!(h.int("(define n (+ m 1))\n(n:abs)"), i64::MAX);
}

#[test]
fn test_qualified_names() {
    let h = Harness::new();
    h.eval(
        "(define ns (nameset))
         (define ns:v 3)
         (define ns:inner (nameset))
         (define ns:inner:w 4)",
    );
    assert_eq!(h.int("ns:v"), 3);
    assert_eq!(h.int("ns:inner:w"), 4);
    assert_eq!(h.literal("(ns:exists-p \"v\")"), "true");
    assert_eq!(h.int("(ns:length)"), 2);
    assert!(!h.bound("v"));

    let e = h.caught("ns:missing");
    assert_eq!(e.kind(), &ExceptionKind::UnboundIdentifier);
    assert!(
        e.reason().contains("(in `ns:missing` at segment `missing`)"),
        "{}",
        e.reason()
    );

    h.eval("(undef ns:v)");
    assert_eq!(h.literal("(ns:exists-p \"v\")"), "false");
}

#[test]
fn test_closures() {
    let h = Harness::new();
    h.eval(
        "(define sq (x) (* x x))
         (define early (x) (if (> x 0) (return 1)) 0)
         (define make (n) (lambda (x) (+ x n)))
         (define add3 (make 3))",
    );
    assert_eq!(h.int("(sq 7)"), 49);
    assert_eq!(h.int("(early 5)"), 1);
    assert_eq!(h.int("(early -1)"), 0);
    assert_eq!(h.int("(add3 4)"), 7);
    assert_eq!(h.caught("(sq 1 2)").kind(), &ExceptionKind::Argument);
    assert_eq!(h.literal("(closure-p sq)"), "true");
}

#[test]
fn test_constant_bindings() {
    let h = Harness::new();
    h.eval("(const k 1)");
    assert_eq!(h.caught("(define k 2)").kind(), &ExceptionKind::ConstAssign);
    assert_eq!(h.caught("(define if 2)").kind(), &ExceptionKind::ConstAssign);
    assert_eq!(h.int("k"), 1);
}

#[test]
fn test_try_and_throw() {
    let h = Harness::new();
    let reason = h.eval("(try (throw \"oops\" \"bad thing\") (what:get-reason))");
    assert_eq!(reason.as_string().as_deref(), Some("bad thing"));
    let kind = h.eval("(try (throw \"oops\") (what:get-kind))");
    assert_eq!(kind.as_string().as_deref(), Some("oops"));

    let e = h.caught("(throw \"custom\" \"why\" 42)");
    assert_eq!(e.kind(), &ExceptionKind::User("custom".into()));
    assert_eq!(e.object().as_int(), Some(42));

    assert_eq!(h.int("(try 7)"), 7);
}

#[test]
fn test_assert() {
    let h = Harness::new();
    assert!(h.eval("(assert 2 (+ 1 1))").is_nil());
    assert_eq!(
        h.caught("(assert 3 (+ 1 1))").kind(),
        &ExceptionKind::Assertion
    );

    let quiet = Harness::with_options(InterpOptions::default());
    assert!(quiet.eval("(assert 3 4)").is_nil());
}

#[test]
fn test_loop_continues_after_error() {
    let h = Harness::new();
    h.eval("(define a 1)\n(nowhere)\n(define b 2)");
    assert!(h.bound("a"));
    assert!(h.bound("b"));
    let err = h.err.contents();
    assert!(err.contains("line 2: unbound-identifier"), "{}", err);
}

#[test]
fn test_abort_stops_loop() {
    let h = Harness::new();
    let res = h.interp.eval_str("(define p 1)\n(try (abort \"stop\"))\n(define q 2)");
    let e = res.unwrap_err();
    assert!(e.is_abort());
    assert_eq!(e.reason(), "stop");
    assert!(h.bound("p"));
    assert!(!h.bound("q"));
}

#[test]
fn test_load_stops_at_first_error() {
    let h = Harness::new();
    let path = std::env::temp_dir().join(format!("quill-load-{}.qll", std::process::id()));
    std::fs::write(&path, "(define la 1)\n(define lb (nope))\n(define lc 3)\n").unwrap();

    let res = h.interp.load(path.to_str().unwrap());
    std::fs::remove_file(&path).unwrap();

    let e = res.unwrap_err();
    assert_eq!(e.kind(), &ExceptionKind::UnboundIdentifier);
    assert_eq!(e.line(), Some(2));
    let file = e.file().unwrap();
    assert!(file.ends_with(".qll"), "{}", file);
    assert!(h.bound("la"));
    assert!(!h.bound("lc"));
}

#[test]
fn test_load_missing_file() {
    let h = Harness::new();
    let e = h.caught("(load \"/definitely/not/here\")");
    assert_eq!(e.kind(), &ExceptionKind::Io);
}

#[test]
fn test_launched_threads_share_globals() {
    let h = Harness::new();
    h.eval(
        "(define t1 (launch (define from-one 1)))
         (define t2 (launch (define from-two 2)))
         (wall)",
    );
    assert!(h.bound("from-one"));
    assert!(h.bound("from-two"));
    assert_eq!(h.int("(t1:wait)"), 1);
    assert_eq!(h.literal("(t2:end-p)"), "true");
}

#[test]
fn test_abort_ends_launched_thread() {
    let h = Harness::new();
    h.eval("(define th (launch (abort \"halt\")))\n(wall)");
    assert_eq!(h.literal("(th:end-p)"), "true");

    let e = h.interp.eval_str("(th:wait)").unwrap_err();
    assert!(e.is_abort());
    assert_eq!(e.reason(), "halt");
    assert!(h.err.contents().contains("halt"));

    // the root interpreter keeps going
    assert_eq!(h.int("(+ 1 1)"), 2);
}

#[test]
fn test_launched_threads_waiting_together() {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let h = Harness::new();
        h.eval("(define w1 (launch (wall)))\n(define w2 (launch (wall)))");
        std::thread::sleep(std::time::Duration::from_millis(100));
        h.eval("(wall)");
        let done = h.literal("(w1:end-p)") == "true" && h.literal("(w2:end-p)") == "true";
        tx.send(done).unwrap();
    });
    let done = rx
        .recv_timeout(std::time::Duration::from_secs(10))
        .expect("wall never returned");
    assert!(done);
}

#[test]
fn test_launch_named_thread() {
    let h = Harness::new();
    h.eval("(define th (Thread \"worker\"))\n(launch th (+ 1 2))");
    assert_eq!(h.int("(th:wait)"), 3);
    assert_eq!(h.literal("(th:get-name)"), "\"worker\"");
    assert_eq!(h.caught("(launch th 1)").kind(), &ExceptionKind::Argument);
}

#[test]
fn test_counter_loop() {
    let h = Harness::new();
    let n = h.int(
        "(define c (Counter 3))
         (define n 0)
         (while (c:valid-p) (n:++) (c:step))
         n",
    );
    assert_eq!(n, 3);
    assert_eq!(h.literal("c"), "Counter(0 3 3)");
}

#[test]
fn test_set_through_language() {
    let h = Harness::new();
    h.eval("(define s (Set 1 2 2 3))");
    assert_eq!(h.int("(s:length)"), 3);
    h.eval("(s:add 4)");
    assert_eq!(h.literal("(s:exists-p 4)"), "true");
    assert_eq!(h.literal("(s:remove 1)"), "true");
    assert_eq!(h.int("(s:length)"), 3);

    let sum = h.int(
        "(define it (s:iterator))
         (define sum 0)
         (while (not (it:end-p)) (sum:= (+ sum (it:get-object))) (it:next))
         sum",
    );
    assert_eq!(sum, 9);

    let picked = h.int("(define sub (s:get-random-subset 2))\n(sub:length)");
    assert!((1..=2).contains(&picked), "{}", picked);
    assert_eq!(h.caught("(s:get 10)").kind(), &ExceptionKind::Index);
}

#[test]
fn test_eval() {
    let h = Harness::new();
    assert_eq!(h.int("(eval \"(+ 1 2)\")"), 3);
    assert_eq!(h.caught("(eval \"(+ 1\")").kind(), &ExceptionKind::Syntax);
}

#[test]
fn test_print() {
    let h = Harness::new();
    h.eval("(println \"a\" 1 true)\n(print \"b\")");
    assert_eq!(h.out.take(), "a1true\nb");
}

struct TestLibrary {
    inits: AtomicUsize,
}

impl Library for TestLibrary {
    fn name(&self) -> &str {
        "testlib"
    }

    fn init(&self, interp: &Interp) -> Result<Obj, Exception> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        interp
            .globals()
            .bind(Quark::intern("lib-answer"), Integer::obj(42), false)?;
        Ok(Str::obj("ready"))
    }
}

#[test]
fn test_library_loads_once() {
    let lib = Arc::new(TestLibrary {
        inits: AtomicUsize::new(0),
    });
    let h = Harness::with_options(InterpOptions {
        libraries: vec![lib.clone()],
        ..InterpOptions::default()
    });
    assert_eq!(h.literal("(library \"testlib\")"), "\"ready\"");
    assert!(h.eval("(library \"testlib\")").is_nil());
    assert_eq!(h.int("lib-answer"), 42);
    assert_eq!(lib.inits.load(Ordering::SeqCst), 1);
    assert_eq!(h.caught("(library \"nope\")").kind(), &ExceptionKind::Io);
}
