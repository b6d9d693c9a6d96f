//! Ordered sets of small non-negative integers, as seen by the set-trie.
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use thiserror::Error;

const WORD_BITS: usize = u64::BITS as usize;

/// An ordered set of non-negative integers.
///
/// The trie never materializes a set. It only asks for the next member at or
/// after a position, so any sorted container can serve as a query.
pub trait BitSetLike {
    /// Returns the smallest member `>= from`, or `None` if there is none.
    fn next_set_bit(&self, from: usize) -> Option<usize>;

    /// Iterates the members `>= from` in ascending order.
    fn ones_from(&self, from: usize) -> Ones<'_, Self> {
        Ones {
            set: self,
            next: Some(from),
        }
    }

    /// Iterates all members in ascending order.
    fn ones(&self) -> Ones<'_, Self> {
        self.ones_from(0)
    }

    /// returns true if every member of `self` is a member of `other`
    fn is_subset_of<O>(&self, other: &O) -> bool
    where
        O: BitSetLike + ?Sized,
    {
        self.ones().all(|bit| other.next_set_bit(bit) == Some(bit))
    }
}

impl<T> BitSetLike for &T
where
    T: BitSetLike + ?Sized,
{
    fn next_set_bit(&self, from: usize) -> Option<usize> {
        (**self).next_set_bit(from)
    }
}

impl BitSetLike for BTreeSet<usize> {
    fn next_set_bit(&self, from: usize) -> Option<usize> {
        self.range(from..).next().copied()
    }
}

/// Ascending iterator over the members of a [`BitSetLike`].
///
/// The iterator doubles as the descent cursor of the trie: a clone taken after
/// yielding bit `b` resumes at `b + 1`.
pub struct Ones<'a, T: ?Sized> {
    set: &'a T,
    next: Option<usize>,
}

impl<'a, T: ?Sized> Ones<'a, T> {
    /// A cursor over the same set resuming strictly after `bit`.
    pub(crate) fn after(&self, bit: usize) -> Self {
        Ones {
            set: self.set,
            next: bit.checked_add(1),
        }
    }
}

impl<T: ?Sized> Clone for Ones<'_, T> {
    fn clone(&self) -> Self {
        Ones {
            set: self.set,
            next: self.next,
        }
    }
}

impl<T> Iterator for Ones<'_, T>
where
    T: BitSetLike + ?Sized,
{
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self.set.next_set_bit(self.next?) {
            Some(bit) => {
                self.next = bit.checked_add(1);
                Some(bit)
            }
            None => {
                self.next = None;
                None
            }
        }
    }
}

impl<T> std::iter::FusedIterator for Ones<'_, T> where T: BitSetLike + ?Sized {}

/// A growable bitset backed by 64-bit words.
///
/// Trailing zero words are never kept, so two bitsets with the same members
/// compare and hash equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "Vec<usize>", into = "Vec<usize>"))]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// adds `bit`, returns true if it was not a member before
    pub fn insert(&mut self, bit: usize) -> bool {
        let (index, mask) = locate(bit);
        if index >= self.words.len() {
            self.words.resize(index + 1, 0);
        }
        let word = &mut self.words[index];
        let added = *word & mask == 0;
        *word |= mask;
        added
    }

    /// removes `bit`, returns true if it was a member
    pub fn remove(&mut self, bit: usize) -> bool {
        let (index, mask) = locate(bit);
        let Some(word) = self.words.get_mut(index) else {
            return false;
        };
        let removed = *word & mask != 0;
        *word &= !mask;
        self.trim();
        removed
    }

    pub fn contains(&self, bit: usize) -> bool {
        let (index, mask) = locate(bit);
        self.words.get(index).map_or(false, |word| word & mask != 0)
    }

    /// number of members
    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn iter(&self) -> Ones<'_, Self> {
        self.ones()
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

fn locate(bit: usize) -> (usize, u64) {
    (bit / WORD_BITS, 1 << (bit % WORD_BITS))
}

impl BitSetLike for BitSet {
    fn next_set_bit(&self, from: usize) -> Option<usize> {
        let mut index = from / WORD_BITS;
        let mut word = *self.words.get(index)? & (!0u64 << (from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(index * WORD_BITS + word.trailing_zeros() as usize);
            }
            index += 1;
            word = *self.words.get(index)?;
        }
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = Ones<'a, BitSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<usize> for BitSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for bit in iter {
            self.insert(bit);
        }
    }
}

impl From<&[usize]> for BitSet {
    fn from(bits: &[usize]) -> Self {
        bits.iter().copied().collect()
    }
}

impl From<Vec<usize>> for BitSet {
    fn from(bits: Vec<usize>) -> Self {
        bits.into_iter().collect()
    }
}

impl From<BitSet> for Vec<usize> {
    fn from(set: BitSet) -> Self {
        set.iter().collect()
    }
}

impl Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, bit) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", bit)?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseBitSetError {
    #[error("invalid bit index `{token}`")]
    InvalidIndex { token: String },

    #[error("unbalanced braces in bitset literal")]
    UnbalancedBraces,
}

/// Accepts `{1, 3}`, `1,3`, `{}` and the empty string.
impl FromStr for BitSet {
    type Err = ParseBitSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = match s.strip_prefix('{') {
            Some(rest) => rest
                .strip_suffix('}')
                .ok_or(ParseBitSetError::UnbalancedBraces)?,
            None if s.ends_with('}') => return Err(ParseBitSetError::UnbalancedBraces),
            None => s,
        };
        if body.trim().is_empty() {
            return Ok(BitSet::new());
        }
        body.split(',')
            .map(str::trim)
            .map(|token| {
                token
                    .parse::<usize>()
                    .map_err(|_| ParseBitSetError::InvalidIndex {
                        token: token.to_owned(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut set = BitSet::new();
        assert!(set.is_empty());
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert!(set.insert(130));
        assert!(set.contains(3));
        assert!(set.contains(130));
        assert!(!set.contains(4));
        assert!(!set.contains(10_000));
        assert_eq!(set.len(), 2);

        assert!(set.remove(130));
        assert!(!set.remove(130));
        assert!(!set.remove(10_000));
        assert_eq!(set.len(), 1);
        assert!(set.remove(3));
        assert!(set.is_empty());
    }

    #[test]
    fn test_eq_ignores_capacity() {
        let mut grown = BitSet::from(&[1, 200][..]);
        grown.remove(200);
        assert_eq!(grown, BitSet::from(&[1][..]));

        let mut emptied = BitSet::from(&[65][..]);
        emptied.remove(65);
        assert_eq!(emptied, BitSet::new());
    }

    #[test]
    fn test_next_set_bit() {
        let set = BitSet::from(&[0, 5, 63, 64, 200][..]);
        assert_eq!(set.next_set_bit(0), Some(0));
        assert_eq!(set.next_set_bit(1), Some(5));
        assert_eq!(set.next_set_bit(6), Some(63));
        assert_eq!(set.next_set_bit(64), Some(64));
        assert_eq!(set.next_set_bit(65), Some(200));
        assert_eq!(set.next_set_bit(201), None);
        assert_eq!(set.next_set_bit(100_000), None);
        assert_eq!(BitSet::new().next_set_bit(0), None);
    }

    #[test]
    fn test_ones() {
        let set = BitSet::from(&[2, 4, 64, 127, 128][..]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 4, 64, 127, 128]);
        assert_eq!(set.ones_from(5).collect::<Vec<_>>(), vec![64, 127, 128]);

        let mut ones = set.ones();
        assert_eq!(ones.next(), Some(2));
        let rest = ones.clone();
        assert_eq!(rest.collect::<Vec<_>>(), vec![4, 64, 127, 128]);
        assert_eq!(ones.after(64).collect::<Vec<_>>(), vec![127, 128]);
    }

    #[test]
    fn test_ones_at_usize_max() {
        let set: BTreeSet<usize> = [3, usize::MAX].into_iter().collect();
        assert_eq!(set.ones().collect::<Vec<_>>(), vec![3, usize::MAX]);
        assert_eq!(set.ones().after(usize::MAX).next(), None);
    }

    #[test]
    fn test_is_subset_of() {
        let small = BitSet::from(&[1, 3][..]);
        let big = BitSet::from(&[1, 2, 3][..]);
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(BitSet::new().is_subset_of(&small));

        let tree: BTreeSet<usize> = [1, 3, 9].into_iter().collect();
        assert!(small.is_subset_of(&tree));
        assert!(!big.is_subset_of(&tree));
    }

    #[test]
    fn test_display_and_parse() {
        let set = BitSet::from(&[1, 3, 70][..]);
        assert_eq!(set.to_string(), "{1, 3, 70}");
        assert_eq!(format!("{:?}", set), "{1, 3, 70}");
        assert_eq!("{1, 3, 70}".parse::<BitSet>(), Ok(set.clone()));
        assert_eq!(" 70,3 ,1 ".parse::<BitSet>(), Ok(set));
        assert_eq!("{}".parse::<BitSet>(), Ok(BitSet::new()));
        assert_eq!("".parse::<BitSet>(), Ok(BitSet::new()));
        assert_eq!(BitSet::new().to_string(), "{}");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "{1, x}".parse::<BitSet>(),
            Err(ParseBitSetError::InvalidIndex {
                token: "x".to_owned()
            })
        );
        assert_eq!(
            "1,,2".parse::<BitSet>(),
            Err(ParseBitSetError::InvalidIndex {
                token: String::new()
            })
        );
        assert_eq!(
            "{1, 2".parse::<BitSet>(),
            Err(ParseBitSetError::UnbalancedBraces)
        );
        assert_eq!(
            "1, 2}".parse::<BitSet>(),
            Err(ParseBitSetError::UnbalancedBraces)
        );
        assert_eq!(
            ParseBitSetError::InvalidIndex {
                token: "-1".to_owned()
            }
            .to_string(),
            "invalid bit index `-1`"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_as_indices() {
        let set = BitSet::from(&[0, 64, 65][..]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[0,64,65]");
        let back: BitSet = serde_json::from_str("[65,0,64,0]").unwrap();
        assert_eq!(back, set);
    }
}
