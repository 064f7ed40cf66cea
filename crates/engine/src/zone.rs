//! Per-type operation tables keyed by quark.
//!
//! Every object type declares the operations it answers with [`quark_zone!`]. The macro
//! emits one lazily interned [`LazyQuark`] per operation plus a [`QuarkZone`] listing all of
//! them, which backs `isquark` queries.

use std::sync::OnceLock;

use quill_util::Quark;

/// A quark interned in the global registry on first use.
pub struct LazyQuark {
    name: &'static str,
    quark: OnceLock<Quark>,
}

impl LazyQuark {
    pub const fn new(name: &'static str) -> LazyQuark {
        LazyQuark {
            name,
            quark: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Quark {
        *self.quark.get_or_init(|| Quark::intern(self.name))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq<LazyQuark> for Quark {
    fn eq(&self, other: &LazyQuark) -> bool {
        *self == other.get()
    }
}

/// The set of operations an object type defines itself.
pub struct QuarkZone {
    names: &'static [&'static str],
    quarks: OnceLock<Vec<Quark>>,
}

impl QuarkZone {
    pub const fn new(names: &'static [&'static str]) -> QuarkZone {
        QuarkZone {
            names,
            quarks: OnceLock::new(),
        }
    }

    fn quarks(&self) -> &[Quark] {
        self.quarks
            .get_or_init(|| self.names.iter().map(|n| Quark::intern(n)).collect())
    }

    pub fn contains(&self, quark: Quark) -> bool {
        self.quarks().contains(&quark)
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }
}

/// Declare the operation quarks of a type.
///
/// ```ignore
/// quark_zone! {
///     static ZONE {
///         ADD = "add",
///         SUB = "sub",
///     }
/// }
/// if quark == ADD { /* ... */ }
/// ```
///
/// Without the `static ZONE { .. }` wrapper only the quarks are declared, for code that
/// dispatches to operations of other types.
macro_rules! quark_zone {
    ($(#[$meta:meta])* $vis:vis static $zone:ident { $($name:ident = $text:literal),* $(,)? }) => {
        $(
            static $name: $crate::zone::LazyQuark = $crate::zone::LazyQuark::new($text);
        )*
        $(#[$meta])*
        $vis static $zone: $crate::zone::QuarkZone =
            $crate::zone::QuarkZone::new(&[$($text),*]);
    };
    ($($name:ident = $text:literal),* $(,)?) => {
        $(
            static $name: $crate::zone::LazyQuark = $crate::zone::LazyQuark::new($text);
        )*
    };
}

#[cfg(test)]
mod tests {
    use test_env_log::test;

    use super::*;

    quark_zone! {
        static TEST_ZONE {
            FIRST = "zone-test-first",
            SECOND = "zone-test-second",
        }
    }

    #[test]
    fn test_zone_membership() {
        assert!(TEST_ZONE.contains(Quark::intern("zone-test-first")));
        assert!(TEST_ZONE.contains(SECOND.get()));
        assert!(!TEST_ZONE.contains(Quark::intern("zone-test-third")));
        assert_eq!(TEST_ZONE.names().len(), 2);
    }

    quark_zone! {
        LOOSE = "zone-test-loose",
    }

    #[test]
    fn test_quarks_without_zone() {
        assert!(Quark::intern("zone-test-loose") == LOOSE);
        assert!(!TEST_ZONE.contains(LOOSE.get()));
    }

    #[test]
    fn test_lazy_quark_matches_interned() {
        let q = Quark::intern("zone-test-first");
        assert!(q == FIRST);
        assert!(!(q == SECOND));
        assert_eq!(FIRST.name(), "zone-test-first");
    }
}
