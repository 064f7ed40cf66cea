//! Process-wide string interning.
//!
//! A [`Quark`] is a small integer standing for an interned string. The same string always interns
//! to the same quark, and a quark is never reused or removed for the lifetime of the registry that
//! produced it.

use std::fmt::{Debug, Display};
use std::sync::{Mutex, OnceLock};

use fnv::FnvHashMap;
use smol_str::SmolStr;

/// An interned string identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quark(u32);

impl Quark {
    /// Intern `name` into the global registry.
    pub fn intern(name: &str) -> Quark {
        QuarkRegistry::global().intern(name)
    }

    /// The string this quark was interned from.
    pub fn name(self) -> SmolStr {
        QuarkRegistry::global().name(self)
    }

    /// The raw integer value of this quark.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl Debug for Quark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Quark({}, {:?})", self.0, self.name())
    }
}

impl Display for Quark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.name(), f)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    list: Vec<SmolStr>,
    index: FnvHashMap<SmolStr, u32>,
}

/// A table mapping strings to quarks and back.
///
/// All interning goes through a single lock. Interning happens mostly while reading source and
/// binding names, so contention stays low.
#[derive(Debug, Default)]
pub struct QuarkRegistry {
    inner: Mutex<RegistryInner>,
}

static GLOBAL_REGISTRY: OnceLock<QuarkRegistry> = OnceLock::new();

impl QuarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry behind [`Quark::intern`] and [`Quark::name`].
    pub fn global() -> &'static QuarkRegistry {
        GLOBAL_REGISTRY.get_or_init(QuarkRegistry::new)
    }

    pub fn intern(&self, s: &str) -> Quark {
        let mut inner = self.lock();
        if let Some(&idx) = inner.index.get(s) {
            return Quark(idx);
        }
        let idx = u32::try_from(inner.list.len()).expect("quark registry overflow");
        let s = SmolStr::new(s);
        inner.list.push(s.clone());
        inner.index.insert(s, idx);
        Quark(idx)
    }

    /// Reverse lookup.
    ///
    /// # Panics
    ///
    /// Panics if the quark was not produced by this registry.
    pub fn name(&self, quark: Quark) -> SmolStr {
        self.lock()
            .list
            .get(quark.0 as usize)
            .cloned()
            .expect("quark does not belong to this registry")
    }

    /// Returns the quark of `s` if it has been interned already.
    pub fn get(&self, s: &str) -> Option<Quark> {
        self.lock().index.get(s).map(|&idx| Quark(idx))
    }

    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // The registry is append-only, a poisoned lock still holds a consistent table.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{Quark, QuarkRegistry};

    #[test]
    fn test_intern_is_stable() {
        let reg = QuarkRegistry::new();
        let a = reg.intern("counter-p");
        let b = reg.intern("counter-p");
        let c = reg.intern("set-p");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.name(a), "counter-p");
        assert_eq!(reg.name(c), "set-p");
    }

    #[test]
    fn test_get_does_not_intern() {
        let reg = QuarkRegistry::new();
        assert_eq!(reg.get("missing"), None);
        assert!(reg.is_empty());
        let q = reg.intern("missing");
        assert_eq!(reg.get("missing"), Some(q));
    }

    #[test]
    fn test_global_round_trip() {
        for s in ["x", "add", "a:b", "", "héllo"] {
            let q = Quark::intern(s);
            assert_eq!(q, Quark::intern(s));
            assert_eq!(q.name(), s);
        }
    }

    #[test]
    fn test_concurrent_intern() {
        let reg = Arc::new(QuarkRegistry::new());
        let handles = (0..4)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| reg.intern(&format!("name-{}", i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        let results = handles
            .into_iter()
            .map(|h| h.join().expect("interning thread panicked"))
            .collect::<Vec<_>>();

        assert_eq!(reg.len(), 100);
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
    }
}
