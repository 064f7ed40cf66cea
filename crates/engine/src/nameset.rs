use std::any::Any;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use quill_util::{HashTable, Quark};

use crate::args::{expect_argc, string_arg};
use crate::error::{EvalResult, Exception};
use crate::interp::Interp;
use crate::literal::{Boolean, Integer};
use crate::object::{apply_object, object_isquark, Obj, Object};
use crate::symbol::Symbol;

quark_zone! {
    static NAMESET_ZONE {
        EXISTS_P = "exists-p",
        GET_PARENT = "get-parent",
        LENGTH = "length",
        SYMBOL = "symbol",
        CHILD = "child",
        DUP = "dup",
        UNBIND = "unbind",
    }
}

/// A scope of symbol bindings, chained to an optional parent scope.
///
/// Namesets are always owned by an [`Arc`]. A child refers to its parent through a [`Weak`]
/// pointer, so binding a nameset inside one of its descendants does not keep the chain alive
/// on its own.
///
/// The binding table lock is never held while user code runs: lookups clone the symbol out
/// and release the lock before anything is evaluated.
#[derive(Debug)]
pub struct Nameset {
    table: RwLock<HashTable<Quark, Arc<Symbol>>>,
    parent: Option<Weak<Nameset>>,
    me: Weak<Nameset>,
}

impl Nameset {
    /// Create a root nameset.
    pub fn new() -> Arc<Nameset> {
        Nameset::with_parent(None)
    }

    fn with_parent(parent: Option<Weak<Nameset>>) -> Arc<Nameset> {
        Arc::new_cyclic(|me| Nameset {
            table: RwLock::new(HashTable::new()),
            parent,
            me: me.clone(),
        })
    }

    /// Create a nameset whose parent is `self`.
    pub fn child(&self) -> Arc<Nameset> {
        Nameset::with_parent(Some(self.me.clone()))
    }

    /// A sibling holding copies of the local symbols. Objects are shared, not cloned.
    pub fn dup(&self) -> Arc<Nameset> {
        let copy = Nameset::with_parent(self.parent.clone());
        {
            let mut table = copy.write();
            for symbol in self.symbols() {
                let quark = symbol.quark();
                let symbol = Symbol::with_const(quark, symbol.get(), symbol.is_const());
                table.add(quark, Arc::new(symbol));
            }
        }
        copy
    }

    /// The owning handle of this nameset.
    pub fn handle(&self) -> Arc<Nameset> {
        self.me
            .upgrade()
            .expect("a nameset is only reachable through its Arc")
    }

    pub fn parent(&self) -> Option<Arc<Nameset>> {
        self.parent.as_ref()?.upgrade()
    }

    fn read(&self) -> RwLockReadGuard<HashTable<Quark, Arc<Symbol>>> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<HashTable<Quark, Arc<Symbol>>> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind `quark` in this nameset, creating the symbol if needed.
    ///
    /// Rebinding a constant symbol fails with a const-assign error and leaves it untouched.
    pub fn bind(&self, quark: Quark, object: Obj, constant: bool) -> Result<(), Exception> {
        let mut table = self.write();
        if let Some(symbol) = table.get(&quark) {
            return symbol.bind(object, constant);
        }
        table.add(quark, Arc::new(Symbol::with_const(quark, object, constant)));
        tracing::trace!(name = %quark, constant, "bound new symbol");
        Ok(())
    }

    pub fn bind_name(&self, name: &str, object: Obj) -> Result<(), Exception> {
        self.bind(Quark::intern(name), object, false)
    }

    /// The symbol bound to `quark` in this nameset only.
    pub fn find_local(&self, quark: Quark) -> Option<Arc<Symbol>> {
        self.read().get(&quark).cloned()
    }

    /// The symbol bound to `quark` here or in the nearest enclosing nameset.
    pub fn find_symbol(&self, quark: Quark) -> Option<Arc<Symbol>> {
        if let Some(symbol) = self.find_local(quark) {
            return Some(symbol);
        }
        let mut parent = self.parent();
        while let Some(nset) = parent {
            if let Some(symbol) = nset.find_local(quark) {
                return Some(symbol);
            }
            parent = nset.parent();
        }
        None
    }

    /// The object bound to `quark`, if any.
    pub fn find(&self, quark: Quark) -> Option<Obj> {
        self.find_symbol(quark).map(|s| s.get())
    }

    /// The object bound to `quark`, failing with an unbound-identifier error.
    pub fn resolve(&self, quark: Quark) -> Result<Obj, Exception> {
        self.find(quark).ok_or_else(|| Exception::unbound(quark))
    }

    pub fn exists(&self, quark: Quark) -> bool {
        self.find_symbol(quark).is_some()
    }

    pub fn exists_local(&self, quark: Quark) -> bool {
        self.read().exists(&quark)
    }

    /// Remove the local binding of `quark`.
    pub fn unbind(&self, quark: Quark) -> Result<(), Exception> {
        let mut table = self.write();
        match table.get(&quark) {
            None => return Err(Exception::unbound(quark)),
            Some(symbol) if symbol.is_const() => return Err(Exception::const_assign(quark)),
            Some(_) => {}
        }
        table.remove(&quark);
        Ok(())
    }

    /// A snapshot of the local symbols.
    pub fn symbols(&self) -> Vec<Arc<Symbol>> {
        self.read().values().cloned().collect()
    }

    /// Number of local bindings.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Object for Nameset {
    fn repr(&self) -> &'static str {
        "Nameset"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        NAMESET_ZONE.contains(quark) || (hflg && object_isquark(quark))
    }

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if quark == EXISTS_P {
            expect_argc(quark, argv, 1)?;
            let name = string_arg(&argv[0])?;
            Ok(Boolean::obj(self.exists_local(Quark::intern(&name))))
        } else if quark == GET_PARENT {
            expect_argc(quark, argv, 0)?;
            Ok(self.parent().map_or_else(Obj::nil, Obj::from))
        } else if quark == LENGTH {
            expect_argc(quark, argv, 0)?;
            Ok(Integer::obj(self.len() as i64))
        } else if quark == SYMBOL {
            expect_argc(quark, argv, 1)?;
            let name = string_arg(&argv[0])?;
            let quark = Quark::intern(&name);
            self.find_local(quark)
                .map(Obj::from)
                .ok_or_else(|| Exception::unbound(quark).into())
        } else if quark == CHILD {
            expect_argc(quark, argv, 0)?;
            Ok(Obj::from(self.child()))
        } else if quark == DUP {
            expect_argc(quark, argv, 0)?;
            Ok(Obj::from(self.dup()))
        } else if quark == UNBIND {
            expect_argc(quark, argv, 1)?;
            let name = string_arg(&argv[0])?;
            self.unbind(Quark::intern(&name))?;
            Ok(Obj::nil())
        } else {
            apply_object(self, quark, argv)
        }
    }

    /// Members of a nameset are its local bindings.
    fn eval_member(&self, _interp: &Interp, _nset: &Nameset, quark: Quark) -> EvalResult {
        match self.find_local(quark) {
            Some(symbol) => Ok(symbol.get()),
            None => Err(Exception::unbound(quark).into()),
        }
    }

    /// Calls a bound member with operands evaluated in the caller's nameset, or applies one of
    /// the nameset's own operations.
    fn call_member(
        &self,
        interp: &Interp,
        nset: &Nameset,
        quark: Quark,
        args: &[Obj],
    ) -> EvalResult {
        match self.find_local(quark) {
            Some(symbol) => symbol.get().call(interp, nset, args),
            None => {
                let argv = crate::function::eval_args(interp, nset, args)?;
                self.apply(interp, nset, quark, &argv)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_env_log::test;

    use super::*;
    use crate::error::ExceptionKind;

    fn q(name: &str) -> Quark {
        Quark::intern(name)
    }

    #[test]
    fn test_child_sees_parent_bindings() {
        let root = Nameset::new();
        root.bind(q("outer"), Integer::obj(1), false).unwrap();
        let child = root.child();
        child.bind(q("inner"), Integer::obj(2), false).unwrap();

        assert_eq!(child.resolve(q("outer")).unwrap().as_int(), Some(1));
        assert_eq!(child.resolve(q("inner")).unwrap().as_int(), Some(2));
        assert!(root.find(q("inner")).is_none());
        assert!(child.exists(q("outer")));
        assert!(!child.exists_local(q("outer")));
    }

    #[test]
    fn test_child_shadows_parent() {
        let root = Nameset::new();
        root.bind(q("x"), Integer::obj(1), false).unwrap();
        let child = root.child();
        child.bind(q("x"), Integer::obj(2), false).unwrap();
        assert_eq!(child.resolve(q("x")).unwrap().as_int(), Some(2));
        assert_eq!(root.resolve(q("x")).unwrap().as_int(), Some(1));
    }

    #[test]
    fn test_unbound_identifier() {
        let root = Nameset::new();
        let err = root.child().resolve(q("nowhere-bound")).unwrap_err();
        assert_eq!(err.kind(), &ExceptionKind::UnboundIdentifier);
        assert!(err.reason().contains("nowhere-bound"));
    }

    #[test]
    fn test_const_symbol_rejects_rebind() {
        let root = Nameset::new();
        root.bind(q("pi"), Integer::obj(3), true).unwrap();
        let err = root.bind(q("pi"), Integer::obj(4), false).unwrap_err();
        assert_eq!(err.kind(), &ExceptionKind::ConstAssign);
        assert_eq!(root.resolve(q("pi")).unwrap().as_int(), Some(3));

        let err = root.unbind(q("pi")).unwrap_err();
        assert_eq!(err.kind(), &ExceptionKind::ConstAssign);
    }

    #[test]
    fn test_unbind() {
        let root = Nameset::new();
        root.bind(q("tmp"), Obj::nil(), false).unwrap();
        assert_eq!(root.len(), 1);
        root.unbind(q("tmp")).unwrap();
        assert!(root.is_empty());
        assert_eq!(
            root.unbind(q("tmp")).unwrap_err().kind(),
            &ExceptionKind::UnboundIdentifier
        );
    }

    #[test]
    fn test_unbind_in_child_keeps_parent_binding() {
        let root = Nameset::new();
        root.bind(q("shared"), Integer::obj(1), false).unwrap();
        let child = root.child();
        child.bind(q("shared"), Integer::obj(2), false).unwrap();

        child.unbind(q("shared")).unwrap();
        assert!(!child.exists_local(q("shared")));
        assert_eq!(child.resolve(q("shared")).unwrap().as_int(), Some(1));
        assert_eq!(root.resolve(q("shared")).unwrap().as_int(), Some(1));

        // only local bindings can be removed
        assert_eq!(
            child.unbind(q("shared")).unwrap_err().kind(),
            &ExceptionKind::UnboundIdentifier
        );
        assert!(root.exists_local(q("shared")));
    }

    #[test]
    fn test_parent_is_weak() {
        let root = Nameset::new();
        let child = root.child();
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &root));
        drop(root);
        assert!(child.parent().is_none());
    }

    #[test]
    fn test_dup_copies_local_symbols() {
        let root = Nameset::new();
        let nset = root.child();
        nset.bind(q("a"), Integer::obj(1), false).unwrap();
        nset.bind(q("b"), Integer::obj(2), true).unwrap();

        let copy = nset.dup();
        assert_eq!(copy.len(), 2);
        assert!(Arc::ptr_eq(&copy.parent().unwrap(), &root));
        assert!(copy.find_local(q("b")).unwrap().is_const());

        copy.bind(q("a"), Integer::obj(10), false).unwrap();
        assert_eq!(nset.resolve(q("a")).unwrap().as_int(), Some(1));
    }

    #[test]
    fn test_handle_is_self() {
        let root = Nameset::new();
        assert!(Arc::ptr_eq(&root.handle(), &root));
    }
}
