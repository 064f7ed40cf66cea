//! A resizable hash table with open (chained) buckets.
//!
//! Every bucket is a singly linked list of nodes. A node owns its key, the precomputed hash of
//! the key and one value. The table grows when its length exceeds 70% of the bucket count; the
//! new bucket count is taken from a sequence of primes, so the table never shrinks.

use std::borrow::Borrow;
use std::fmt::{Debug, Display};
use std::hash::Hasher;

use fnv::FnvHasher;
use smol_str::SmolStr;

use crate::quark::Quark;

/// Bucket counts used by the table, roughly doubling each step.
const SIZE_SEQUENCE: &[usize] = &[
    7, 17, 37, 79, 163, 331, 673, 1361, 2729, 5471, 10949, 21911, 43853, 87719, 175447, 350899,
    701819, 1403641, 2807303, 5614657, 11229331, 22458671, 44917381, 89834777, 179669557,
    359339171, 718678369, 1437356741,
];

const DEFAULT_SIZE: usize = 17;

/// Smallest bucket count from the size sequence that is at least `min`.
pub fn next_size(min: usize) -> usize {
    SIZE_SEQUENCE
        .iter()
        .copied()
        .find(|&s| s >= min)
        .unwrap_or(min | 1)
}

fn threshold(size: usize) -> usize {
    size * 7 / 10
}

/// Keys that can be stored in a [`HashTable`].
///
/// Both methods receive the case flag of the table. Keys without a notion of case simply ignore it.
pub trait TableKey {
    fn hash_key(&self, ci: bool) -> u64;
    fn eq_key(&self, other: &Self, ci: bool) -> bool;
}

impl TableKey for str {
    fn hash_key(&self, ci: bool) -> u64 {
        let mut hasher = FnvHasher::default();
        if ci {
            self.chars()
                .flat_map(char::to_lowercase)
                .for_each(|c| hasher.write_u32(c as u32));
        } else {
            hasher.write(self.as_bytes());
        }
        hasher.finish()
    }

    fn eq_key(&self, other: &Self, ci: bool) -> bool {
        if ci {
            self.chars()
                .flat_map(char::to_lowercase)
                .eq(other.chars().flat_map(char::to_lowercase))
        } else {
            self == other
        }
    }
}

impl TableKey for String {
    fn hash_key(&self, ci: bool) -> u64 {
        self.as_str().hash_key(ci)
    }

    fn eq_key(&self, other: &Self, ci: bool) -> bool {
        self.as_str().eq_key(other.as_str(), ci)
    }
}

impl TableKey for SmolStr {
    fn hash_key(&self, ci: bool) -> u64 {
        self.as_str().hash_key(ci)
    }

    fn eq_key(&self, other: &Self, ci: bool) -> bool {
        self.as_str().eq_key(other.as_str(), ci)
    }
}

impl TableKey for Quark {
    fn hash_key(&self, _ci: bool) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write_u32(self.index());
        hasher.finish()
    }

    fn eq_key(&self, other: &Self, _ci: bool) -> bool {
        self == other
    }
}

/// Error returned by the failing accessors of [`HashTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// No entry with the given key.
    Key(String),
    /// Positional access out of range.
    Index { index: usize, len: usize },
}

impl Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::Key(key) => write!(f, "no entry for key `{}`", key),
            TableError::Index { index, len } => {
                write!(f, "index {} out of range for table of length {}", index, len)
            }
        }
    }
}

impl std::error::Error for TableError {}

struct Node<K, V> {
    key: K,
    hash: u64,
    value: V,
    next: Option<Box<Node<K, V>>>,
}

type Bucket<K, V> = Option<Box<Node<K, V>>>;

fn empty_buckets<K, V>(size: usize) -> Vec<Bucket<K, V>> {
    std::iter::repeat_with(|| None).take(size).collect()
}

pub struct HashTable<K, V> {
    buckets: Vec<Bucket<K, V>>,
    len: usize,
    thrs: usize,
    /// Case-insensitive key comparison
    ci: bool,
}

impl<K: TableKey, V> HashTable<K, V> {
    pub fn new() -> Self {
        Self::with_size(DEFAULT_SIZE)
    }

    /// Create a table with at least `size` buckets.
    pub fn with_size(size: usize) -> Self {
        let size = next_size(size.max(1));
        HashTable {
            buckets: empty_buckets(size),
            len: 0,
            thrs: threshold(size),
            ci: false,
        }
    }

    /// Create an empty table with the given case mode.
    pub fn with_ci(ci: bool) -> Self {
        let mut table = Self::new();
        table.ci = ci;
        table
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current bucket count.
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    /// Change the case mode of this table.
    ///
    /// Changing the mode **clears the table**: entries hashed under the old comparison would not
    /// be reachable under the new one.
    pub fn set_ci(&mut self, ci: bool) {
        self.reset();
        self.ci = ci;
    }

    /// Remove every entry and shrink back to the default bucket count.
    pub fn reset(&mut self) {
        let size = next_size(DEFAULT_SIZE);
        self.buckets = empty_buckets(size);
        self.thrs = threshold(size);
        self.len = 0;
    }

    fn index_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Insert or replace the value under `key`. Returns the replaced value, if any.
    pub fn add(&mut self, key: K, value: V) -> Option<V> {
        let ci = self.ci;
        let hash = key.hash_key(ci);
        let idx = self.index_of(hash);

        let mut cur = self.buckets[idx].as_deref_mut();
        while let Some(node) = cur {
            if node.hash == hash && node.key.eq_key(&key, ci) {
                return Some(std::mem::replace(&mut node.value, value));
            }
            cur = node.next.as_deref_mut();
        }

        let next = self.buckets[idx].take();
        self.buckets[idx] = Some(Box::new(Node {
            key,
            hash,
            value,
            next,
        }));
        self.len += 1;

        if self.len > self.thrs {
            self.resize(next_size(self.size() + 1));
        }
        None
    }

    /// Non-failing lookup.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: TableKey + ?Sized,
    {
        self.find_node(key).map(|node| &node.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: TableKey + ?Sized,
    {
        let ci = self.ci;
        let hash = key.hash_key(ci);
        let idx = self.index_of(hash);
        let mut cur = self.buckets[idx].as_deref_mut();
        while let Some(node) = cur {
            if node.hash == hash && <K as Borrow<Q>>::borrow(&node.key).eq_key(key, ci) {
                return Some(&mut node.value);
            }
            cur = node.next.as_deref_mut();
        }
        None
    }

    /// Lookup that fails with [`TableError::Key`] when the key is absent.
    pub fn lookup<Q>(&self, key: &Q) -> Result<&V, TableError>
    where
        K: Borrow<Q>,
        Q: TableKey + Display + ?Sized,
    {
        self.get(key)
            .ok_or_else(|| TableError::Key(key.to_string()))
    }

    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: TableKey + ?Sized,
    {
        self.find_node(key).is_some()
    }

    fn find_node<Q>(&self, key: &Q) -> Option<&Node<K, V>>
    where
        K: Borrow<Q>,
        Q: TableKey + ?Sized,
    {
        let hash = key.hash_key(self.ci);
        let mut cur = self.buckets[self.index_of(hash)].as_deref();
        while let Some(node) = cur {
            if node.hash == hash && <K as Borrow<Q>>::borrow(&node.key).eq_key(key, self.ci) {
                return Some(node);
            }
            cur = node.next.as_deref();
        }
        None
    }

    /// Unlink the entry under `key` and return its value. Does nothing if the key is absent.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: TableKey + ?Sized,
    {
        let ci = self.ci;
        let hash = key.hash_key(ci);
        let idx = self.index_of(hash);

        let mut link = &mut self.buckets[idx];
        loop {
            let found = match link.as_deref() {
                None => return None,
                Some(node) => {
                    node.hash == hash && <K as Borrow<Q>>::borrow(&node.key).eq_key(key, ci)
                }
            };
            if found {
                break;
            }
            link = &mut link.as_mut()?.next;
        }

        let mut node = link.take()?;
        *link = node.next.take();
        self.len -= 1;
        Some(node.value)
    }

    /// Rehash every entry into at least `size` buckets.
    ///
    /// Does nothing unless `size` is larger than the current bucket count.
    pub fn resize(&mut self, size: usize) {
        if size <= self.size() {
            return;
        }
        let size = next_size(size);
        tracing::debug!(from = self.size(), to = size, len = self.len, "resizing hash table");

        let old = std::mem::replace(&mut self.buckets, empty_buckets(size));
        for mut chain in old {
            while let Some(mut node) = chain {
                chain = node.next.take();
                let idx = (node.hash % size as u64) as usize;
                node.next = self.buckets[idx].take();
                self.buckets[idx] = Some(node);
            }
        }
        self.thrs = threshold(size);
    }

    /// Key of the `index`-th entry in enumeration order.
    pub fn get_key(&self, index: usize) -> Result<&K, TableError> {
        self.iter()
            .nth(index)
            .map(|(k, _)| k)
            .ok_or(TableError::Index {
                index,
                len: self.len,
            })
    }

    /// Value of the `index`-th entry in enumeration order.
    pub fn get_obj(&self, index: usize) -> Result<&V, TableError> {
        self.iter()
            .nth(index)
            .map(|(_, v)| v)
            .ok_or(TableError::Index {
                index,
                len: self.len,
            })
    }

    /// Iterate over all entries. The order is unspecified but stable until the next mutation.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            node: None,
            remaining: self.len,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K: TableKey, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TableKey + Debug, V: Debug> Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> Drop for HashTable<K, V> {
    fn drop(&mut self) {
        // unlink chains iteratively so that long chains don't recurse on drop
        for bucket in self.buckets.iter_mut() {
            let mut chain = bucket.take();
            while let Some(mut node) = chain {
                chain = node.next.take();
            }
        }
    }
}

pub struct Iter<'a, K, V> {
    buckets: std::slice::Iter<'a, Bucket<K, V>>,
    node: Option<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                self.remaining -= 1;
                return Some((&node.key, &node.value));
            }
            self.node = self.buckets.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K: TableKey, V> IntoIterator for &'a HashTable<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test;
