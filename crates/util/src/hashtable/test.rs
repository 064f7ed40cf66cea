use pretty_assertions::assert_eq;
use test_env_log::test;

use super::{next_size, HashTable, TableError};
use crate::quark::Quark;

#[test]
fn test_add_and_get() {
    let mut table = HashTable::<String, u32>::new();
    assert!(table.is_empty());

    assert_eq!(table.add("hello".into(), 1), None);
    assert_eq!(table.add("world".into(), 2), None);

    assert_eq!(table.len(), 2);
    assert_eq!(table.get("hello"), Some(&1));
    assert_eq!(table.get("world"), Some(&2));
    assert_eq!(table.get("World"), None, "tables are case-sensitive by default");
    assert!(table.exists("hello"));
    assert!(!table.exists("nope"));
}

#[test]
fn test_replace_returns_previous() {
    let mut table = HashTable::<String, &str>::new();
    table.add("k".into(), "first");
    let prev = table.add("k".into(), "second");

    assert_eq!(prev, Some("first"));
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("k"), Some(&"second"));
}

#[test]
fn test_value_identity_is_kept() {
    use std::sync::Arc;

    let mut table = HashTable::<String, Arc<String>>::new();
    let v = Arc::new("payload".to_string());
    table.add("key".into(), v.clone());

    let got = table.get("key").expect("key should exist");
    assert!(Arc::ptr_eq(got, &v));
    assert_eq!(Arc::strong_count(&v), 2);

    drop(table.remove("key"));
    assert_eq!(Arc::strong_count(&v), 1, "removing releases the table's reference");
}

#[test]
fn test_remove() {
    let mut table = HashTable::<String, u32>::new();
    for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
        table.add(k.to_string(), i as u32);
    }

    assert_eq!(table.remove("b"), Some(1));
    assert!(!table.exists("b"));
    assert_eq!(table.get("b"), None);
    assert_eq!(table.len(), 3);

    assert_eq!(table.remove("b"), None, "removing twice is a no-op");
    assert_eq!(table.len(), 3);

    for k in ["a", "c", "d"] {
        assert!(table.exists(k), "{} should survive removal of b", k);
    }
}

#[test]
fn test_remove_inside_chain() {
    // the smallest table keeps several keys per chain
    let mut table = HashTable::<String, u32>::with_size(1);
    assert_eq!(table.size(), 7);
    for i in 0..4 {
        table.add(format!("k{}", i), i);
    }
    assert_eq!(table.remove("k2"), Some(2));
    assert_eq!(table.remove("k0"), Some(0));
    assert_eq!(table.get("k1"), Some(&1));
    assert_eq!(table.get("k3"), Some(&3));
    assert_eq!(table.len(), 2);
}

#[test]
fn test_lookup_fails_with_key_error() {
    let mut table = HashTable::<String, u32>::new();
    table.add("present".into(), 7);

    assert_eq!(table.lookup("present"), Ok(&7));
    assert_eq!(
        table.lookup("absent"),
        Err(TableError::Key("absent".to_string()))
    );
}

#[test]
fn test_load_factor_invariant() {
    let mut table = HashTable::<String, usize>::new();
    let mut last_size = table.size();

    for i in 0..5000 {
        table.add(format!("key-{}", i * 7919), i);
        assert!(
            table.len() * 10 <= table.size() * 7,
            "length {} exceeds 70% of size {}",
            table.len(),
            table.size()
        );
        assert!(table.size() >= last_size, "tables never shrink");
        last_size = table.size();
    }

    assert_eq!(table.len(), 5000);
    for i in 0..5000 {
        assert_eq!(table.get(format!("key-{}", i * 7919).as_str()), Some(&i));
    }
}

#[test]
fn test_resize_never_shrinks() {
    let mut table = HashTable::<String, u32>::with_size(100);
    let size = table.size();
    table.add("x".into(), 1);

    table.resize(10);
    assert_eq!(table.size(), size);

    table.resize(size + 1);
    assert!(table.size() > size);
    assert_eq!(table.get("x"), Some(&1));
}

#[test]
fn test_next_size() {
    assert_eq!(next_size(0), 7);
    assert_eq!(next_size(7), 7);
    assert_eq!(next_size(8), 17);
    assert_eq!(next_size(18), 37);
}

#[test]
fn test_case_insensitive() {
    let mut table = HashTable::<String, u32>::with_ci(true);
    table.add("World".into(), 1);

    for k in ["WORLD", "world", "WoRlD", "World"] {
        assert_eq!(table.get(k), Some(&1), "lookup of {} failed", k);
    }

    table.add("world".into(), 2);
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("WORLD"), Some(&2));
}

#[test]
fn test_set_ci_clears_table() {
    let mut table = HashTable::<String, u32>::new();
    table.add("a".into(), 1);
    table.add("b".into(), 2);

    table.set_ci(true);
    assert!(table.is_ci());
    assert!(table.is_empty());
    assert_eq!(table.get("a"), None);
}

#[test]
fn test_positional_access() {
    let mut table = HashTable::<String, u32>::new();
    for i in 0..10 {
        table.add(format!("n{}", i), i);
    }

    let mut seen = (0..table.len())
        .map(|i| {
            let k = table.get_key(i).expect("key in range").clone();
            let v = *table.get_obj(i).expect("value in range");
            assert_eq!(table.get(k.as_str()), Some(&v));
            v
        })
        .collect::<Vec<_>>();
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());

    assert_eq!(
        table.get_key(10).err(),
        Some(TableError::Index { index: 10, len: 10 })
    );
    assert!(table.get_obj(42).is_err());
}

#[test]
fn test_iter_matches_positional_order() {
    let mut table = HashTable::<String, u32>::new();
    for i in 0..20 {
        table.add(format!("n{}", i), i);
    }
    assert_eq!(table.iter().len(), 20);
    for (i, (k, v)) in table.iter().enumerate() {
        assert_eq!(table.get_key(i), Ok(k));
        assert_eq!(table.get_obj(i), Ok(v));
    }
}

#[test]
fn test_quark_keys() {
    let mut table = HashTable::<Quark, &str>::with_ci(true);
    let a = Quark::intern("Alpha");
    let b = Quark::intern("alpha");
    table.add(a, "upper");
    table.add(b, "lower");

    assert_eq!(table.len(), 2, "quark keys ignore the case flag");
    assert_eq!(table.get(&a), Some(&"upper"));
    assert_eq!(table.get(&b), Some(&"lower"));
}
