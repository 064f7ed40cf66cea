//! Shared data structures of the Quill runtime: the quark registry and the chained hash table
//! that backs name resolution.

pub mod hashtable;
pub mod quark;

pub use hashtable::{HashTable, TableError, TableKey};
pub use quark::{Quark, QuarkRegistry};
