//! A set-trie over bitsets for lattice pruning.
//!
//! [`SetTrie`] stores sets of small non-negative integers and answers the
//! queries a lattice search keeps asking:
//!
//! - insert a set;
//! - find some stored subset of a query;
//! - enumerate every stored superset of a query;
//! - pop every stored generalization (subset) of an invalid set.
//!
//! What the integers mean is up to the caller.
//!
//! ```
//! use bitset_trie::{BitSet, SetTrie};
//!
//! let mut trie = SetTrie::new();
//! trie.insert("{1, 3}".parse::<BitSet>().unwrap());
//! trie.insert(BitSet::from(&[2][..]));
//! trie.insert(BitSet::from(&[1, 2, 3][..]));
//!
//! let query = BitSet::from(&[1, 2, 3][..]);
//! assert!(trie.contains_subset(&query));
//!
//! let mut supersets = 0;
//! trie.for_each_superset(&BitSet::from(&[2][..]), |_| supersets += 1);
//! assert_eq!(supersets, 2);
//!
//! let popped = trie.pop_generalizations(&query);
//! assert_eq!(popped.len(), 3);
//! assert!(trie.is_empty());
//! ```
mod bits;
mod trie;

pub use bits::{BitSet, BitSetLike, Ones, ParseBitSetError};
pub use trie::{Iter, SetTrie};
