use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use quill_util::Quark;
use rand::Rng;

use crate::args::{expect_argc, index_arg, integer_arg};
use crate::error::{EvalResult, Exception};
use crate::interp::Interp;
use crate::literal::{Boolean, Integer};
use crate::nameset::Nameset;
use crate::object::{apply_object, object_isquark, Obj, Object};

quark_zone! {
    static SET_ZONE {
        ADD = "add",
        REMOVE = "remove",
        MERGE = "merge",
        EXISTS_P = "exists-p",
        LENGTH = "length",
        GET = "get",
        RESET = "reset",
        EMPTY_P = "empty-p",
        GET_RANDOM_SUBSET = "get-random-subset",
        ITERATOR = "iterator",
    }
}

type Items = Arc<RwLock<Vec<Obj>>>;

fn read(items: &Items) -> RwLockReadGuard<Vec<Obj>> {
    items.read().unwrap_or_else(|e| e.into_inner())
}

fn write(items: &Items) -> RwLockWriteGuard<Vec<Obj>> {
    items.write().unwrap_or_else(|e| e.into_inner())
}

/// An insertion-ordered collection without duplicates.
///
/// Two elements are duplicates when they are the same object or equal literals.
#[derive(Debug, Default)]
pub struct Set {
    items: Items,
}

impl Set {
    pub fn new() -> Set {
        Set::default()
    }

    pub fn from_objs(objs: impl IntoIterator<Item = Obj>) -> Set {
        let set = Set::new();
        for obj in objs {
            set.add(obj);
        }
        set
    }

    /// Add `obj` unless an equal element is present. Returns `true` if it was added.
    pub fn add(&self, obj: Obj) -> bool {
        let mut items = write(&self.items);
        if items.iter().any(|o| o.literal_eq(&obj)) {
            return false;
        }
        items.push(obj);
        true
    }

    /// Remove the element equal to `obj`. Later elements move down one position.
    pub fn remove(&self, obj: &Obj) -> bool {
        let mut items = write(&self.items);
        match items.iter().position(|o| o.literal_eq(obj)) {
            Some(i) => {
                items.remove(i);
                true
            }
            None => false,
        }
    }

    /// Add every element of `other`.
    pub fn merge(&self, other: &Set) {
        for obj in other.to_vec() {
            self.add(obj);
        }
    }

    pub fn exists(&self, obj: &Obj) -> bool {
        read(&self.items).iter().any(|o| o.literal_eq(obj))
    }

    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Result<Obj, Exception> {
        let items = read(&self.items);
        items
            .get(index)
            .cloned()
            .ok_or_else(|| Exception::index(index, items.len()))
    }

    pub fn reset(&self) {
        write(&self.items).clear();
    }

    pub fn to_vec(&self) -> Vec<Obj> {
        read(&self.items).clone()
    }

    /// Draw `n` random elements. Repeated draws collapse, so the result may be smaller.
    pub fn random_subset<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Set {
        let items = self.to_vec();
        let res = Set::new();
        if items.is_empty() {
            return res;
        }
        for _ in 0..n {
            let idx = rng.gen_range(0..items.len());
            res.add(items[idx].clone());
        }
        res
    }

    pub fn iterator(&self) -> SetIterator {
        SetIterator {
            items: self.items.clone(),
            pos: AtomicUsize::new(0),
        }
    }
}

impl Object for Set {
    fn repr(&self) -> &'static str {
        "Set"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        SET_ZONE.contains(quark) || (hflg && object_isquark(quark))
    }

    fn apply(&self, interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if quark == ADD {
            expect_argc(quark, argv, 1)?;
            self.add(argv[0].clone());
            Ok(argv[0].clone())
        } else if quark == REMOVE {
            expect_argc(quark, argv, 1)?;
            Ok(Boolean::obj(self.remove(&argv[0])))
        } else if quark == MERGE {
            expect_argc(quark, argv, 1)?;
            let other = argv[0]
                .downcast::<Set>()
                .ok_or_else(|| Exception::type_error("set", &argv[0]))?;
            self.merge(other);
            Ok(Obj::nil())
        } else if quark == EXISTS_P {
            expect_argc(quark, argv, 1)?;
            Ok(Boolean::obj(self.exists(&argv[0])))
        } else if quark == LENGTH {
            expect_argc(quark, argv, 0)?;
            Ok(Integer::obj(self.len() as i64))
        } else if quark == GET {
            expect_argc(quark, argv, 1)?;
            Ok(self.get(index_arg(&argv[0], self.len())?)?)
        } else if quark == RESET {
            expect_argc(quark, argv, 0)?;
            self.reset();
            Ok(Obj::nil())
        } else if quark == EMPTY_P {
            expect_argc(quark, argv, 0)?;
            Ok(Boolean::obj(self.is_empty()))
        } else if quark == GET_RANDOM_SUBSET {
            expect_argc(quark, argv, 1)?;
            let n = integer_arg(&argv[0])?;
            let n = usize::try_from(n)
                .map_err(|_| Exception::argument(quark, "size must not be negative"))?;
            let subset = interp.state().with_rng(|rng| self.random_subset(n, rng));
            Ok(Obj::new(subset))
        } else if quark == ITERATOR {
            expect_argc(quark, argv, 0)?;
            Ok(Obj::new(self.iterator()))
        } else {
            apply_object(self, quark, argv)
        }
    }
}

quark_zone! {
    static ITERATOR_ZONE {
        BEGIN = "begin",
        END = "end",
        NEXT = "next",
        PREV = "prev",
        END_P = "end-p",
        VALID_P = "valid-p",
        GET_OBJECT = "get-object",
    }
}

/// A cursor over a [`Set`]. It sees later changes to the set.
#[derive(Debug)]
pub struct SetIterator {
    items: Items,
    pos: AtomicUsize,
}

impl SetIterator {
    pub fn begin(&self) {
        self.pos.store(0, Ordering::SeqCst);
    }

    /// Move past the last element.
    pub fn end(&self) {
        self.pos.store(read(&self.items).len(), Ordering::SeqCst);
    }

    pub fn next(&self) {
        self.pos.fetch_add(1, Ordering::SeqCst);
    }

    /// Move back one element, stopping at the first.
    pub fn prev(&self) {
        let _ = self
            .pos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |p| p.checked_sub(1));
    }

    pub fn is_end(&self) -> bool {
        self.pos.load(Ordering::SeqCst) >= read(&self.items).len()
    }

    pub fn is_valid(&self) -> bool {
        !self.is_end()
    }

    pub fn get_object(&self) -> Result<Obj, Exception> {
        let items = read(&self.items);
        let pos = self.pos.load(Ordering::SeqCst);
        items
            .get(pos)
            .cloned()
            .ok_or_else(|| Exception::index(pos, items.len()))
    }
}

impl Object for SetIterator {
    fn repr(&self) -> &'static str {
        "SetIterator"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        ITERATOR_ZONE.contains(quark) || (hflg && object_isquark(quark))
    }

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if !argv.is_empty() {
            return apply_object(self, quark, argv);
        }
        if quark == BEGIN {
            self.begin();
        } else if quark == END {
            self.end();
        } else if quark == NEXT {
            self.next();
        } else if quark == PREV {
            self.prev();
        } else if quark == END_P {
            return Ok(Boolean::obj(self.is_end()));
        } else if quark == VALID_P {
            return Ok(Boolean::obj(self.is_valid()));
        } else if quark == GET_OBJECT {
            return Ok(self.get_object()?);
        } else {
            return apply_object(self, quark, argv);
        }
        Ok(Obj::nil())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_env_log::test;

    use super::*;
    use crate::literal::Str;

    fn ints(set: &Set) -> Vec<i64> {
        set.to_vec().iter().filter_map(Obj::as_int).collect()
    }

    #[test]
    fn test_add_skips_duplicates() {
        let set = Set::new();
        assert!(set.add(Integer::obj(1)));
        assert!(set.add(Integer::obj(2)));
        assert!(!set.add(Integer::obj(1)));
        assert!(set.add(Str::obj("1")));
        assert_eq!(set.len(), 3);

        let shared = Obj::new(Set::new());
        assert!(set.add(shared.clone()));
        assert!(!set.add(shared));
    }

    #[test]
    fn test_remove_compacts() {
        let set = Set::from_objs((0..5).map(Integer::obj));
        assert!(set.remove(&Integer::obj(2)));
        assert!(!set.remove(&Integer::obj(2)));
        assert_eq!(ints(&set), vec![0, 1, 3, 4]);
        assert_eq!(set.get(2).unwrap().as_int(), Some(3));
    }

    #[test]
    fn test_get_out_of_range() {
        let set = Set::from_objs([Integer::obj(7)]);
        let err = set.get(1).unwrap_err();
        assert_eq!(err.kind(), &crate::error::ExceptionKind::Index);
    }

    #[test]
    fn test_merge() {
        let a = Set::from_objs((0..3).map(Integer::obj));
        let b = Set::from_objs((2..5).map(Integer::obj));
        a.merge(&b);
        assert_eq!(ints(&a), vec![0, 1, 2, 3, 4]);

        // merging into itself must not deadlock
        a.merge(&a);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn test_random_subset() {
        let set = Set::from_objs((0..10).map(Integer::obj));
        let mut rng = StdRng::seed_from_u64(7);
        let subset = set.random_subset(4, &mut rng);
        assert!(subset.len() >= 1 && subset.len() <= 4);
        for obj in subset.to_vec() {
            assert!(set.exists(&obj));
        }

        let mut rng = StdRng::seed_from_u64(7);
        let again = set.random_subset(4, &mut rng);
        assert_eq!(ints(&subset), ints(&again));

        assert!(Set::new().random_subset(3, &mut rng).is_empty());
    }

    #[test]
    fn test_iterator() {
        let set = Set::from_objs((0..3).map(Integer::obj));
        let it = set.iterator();
        let mut seen = vec![];
        while it.is_valid() {
            seen.push(it.get_object().unwrap().as_int().unwrap());
            it.next();
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(it.is_end());
        assert!(it.get_object().is_err());

        it.prev();
        assert_eq!(it.get_object().unwrap().as_int(), Some(2));
        it.begin();
        it.prev();
        assert_eq!(it.get_object().unwrap().as_int(), Some(0));
    }
}
