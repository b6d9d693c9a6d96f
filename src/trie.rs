use std::collections::BTreeMap;
use std::ops::ControlFlow;

use log::trace;

use crate::bits::{BitSet, BitSetLike, Ones};

/// A node is an element in the set-trie.
///
/// The edge labels on the path from the root spell the set stored here, in
/// ascending order. Every node other than the root holds a set or has children.
#[derive(Debug, Clone)]
struct Node<S> {
    children: BTreeMap<usize, Node<S>>,
    leaf_set: Option<S>,
}

impl<S> Default for Node<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Node<S> {
    const fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            leaf_set: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.leaf_set.is_none() && self.children.is_empty()
    }

    /// Runs `f` on the child at `bit`, if any, and drops the edge when `f`
    /// reports the child empty.
    fn descend(&mut self, bit: usize, f: impl FnOnce(&mut Node<S>) -> bool) {
        if let Some(child) = self.children.get_mut(&bit) {
            if f(child) {
                self.children.remove(&bit);
            }
        }
    }

    /// children reachable through the remaining bits of the query
    fn branches<'n, 'q, Q>(&'n self, ones: Ones<'q, Q>) -> Branches<'n, 'q, S, Q>
    where
        Q: BitSetLike + ?Sized,
    {
        Branches { node: self, ones }
    }

    fn try_for_each<'n, B, F>(&'n self, f: &mut F) -> ControlFlow<B>
    where
        F: FnMut(&'n S) -> ControlFlow<B>,
    {
        if let Some(set) = &self.leaf_set {
            f(set)?;
        }
        for child in self.children.values() {
            child.try_for_each(f)?;
        }
        ControlFlow::Continue(())
    }
}

impl<S: BitSetLike> Node<S> {
    fn find_subset<Q>(&self, ones: Ones<'_, Q>) -> Option<&S>
    where
        Q: BitSetLike + ?Sized,
    {
        if let Some(set) = &self.leaf_set {
            return Some(set);
        }
        self.branches(ones)
            .find_map(|(rest, child)| child.find_subset(rest))
    }

    fn collect_subsets<'n, Q>(&'n self, ones: Ones<'_, Q>, found: &mut Vec<&'n S>)
    where
        Q: BitSetLike + ?Sized,
    {
        found.extend(self.leaf_set.as_ref());
        for (rest, child) in self.branches(ones) {
            child.collect_subsets(rest, found);
        }
    }

    /// Visits every stored superset of the query below this node.
    ///
    /// Once the query is exhausted the whole subtree qualifies and is emitted
    /// without further descent. Otherwise only edges up to the next query bit
    /// can still cover it; a larger label has skipped that bit for good.
    fn try_for_each_superset<'n, Q, B, F>(&'n self, ones: Ones<'_, Q>, f: &mut F) -> ControlFlow<B>
    where
        Q: BitSetLike + ?Sized,
        F: FnMut(&'n S) -> ControlFlow<B>,
    {
        let Some(next_bit) = ones.clone().next() else {
            return self.try_for_each(f);
        };
        for (&label, child) in self.children.range(..=next_bit) {
            child.try_for_each_superset(ones.after(label), f)?;
        }
        ControlFlow::Continue(())
    }

    /// Moves every stored subset of the query into `popped`, pruning on the
    /// way back up. Returns whether this node is now empty.
    fn pop_generalizations<Q>(&mut self, mut ones: Ones<'_, Q>, popped: &mut Vec<S>) -> bool
    where
        Q: BitSetLike + ?Sized,
    {
        popped.extend(self.leaf_set.take());
        if let Some(&last) = self.children.keys().next_back() {
            while let Some(bit) = ones.next() {
                if bit > last {
                    break;
                }
                let rest = ones.clone();
                self.descend(bit, |child| child.pop_generalizations(rest, popped));
            }
        }
        self.is_empty()
    }
}

impl<S: BitSetLike + PartialEq> Node<S> {
    /// Follows the exact path of `set`. Returns whether this node is now empty.
    fn remove(&mut self, mut ones: Ones<'_, S>, set: &S, removed: &mut Option<S>) -> bool {
        match ones.next() {
            None => {
                if self.leaf_set.as_ref() == Some(set) {
                    *removed = self.leaf_set.take();
                }
            }
            Some(bit) => self.descend(bit, |child| child.remove(ones, set, removed)),
        }
        self.is_empty()
    }
}

struct Branches<'n, 'q, S, Q: ?Sized> {
    node: &'n Node<S>,
    ones: Ones<'q, Q>,
}

impl<'n, 'q, S, Q> Iterator for Branches<'n, 'q, S, Q>
where
    Q: BitSetLike + ?Sized,
{
    /// the child and the query cursor positioned just past its edge
    type Item = (Ones<'q, Q>, &'n Node<S>);

    fn next(&mut self) -> Option<Self::Item> {
        let last = *self.node.children.keys().next_back()?;
        while let Some(bit) = self.ones.next() {
            if bit > last {
                break;
            }
            if let Some(child) = self.node.children.get(&bit) {
                return Some((self.ones.clone(), child));
            }
        }
        None
    }
}

/// A set-trie is a trie which stores sets of small integers.
///
/// Every stored set sits at the node reached by following its members in
/// ascending order, so branches are sorted and a child label is always bigger
/// than its parent label. Storing the same set twice keeps one occupant, the
/// last one inserted. Nodes are created on insert and pruned the moment a
/// removal leaves them with no set and no children; there is no size counter.
///
/// Queries accept any [`BitSetLike`], not only the stored type `S`.
#[derive(Clone, Debug)]
pub struct SetTrie<S = BitSet> {
    root: Node<S>,
}

impl<S> Default for SetTrie<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SetTrie<S> {
    #[must_use]
    pub const fn new() -> Self {
        Self { root: Node::new() }
    }

    /// returns true if no set is stored
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// counts the stored sets by walking the whole trie
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn clear(&mut self) {
        self.root = Node::new();
    }

    /// Iterates over every stored set, ordered lexicographically by members.
    pub fn iter(&self) -> Iter<'_, S> {
        Iter {
            stack: vec![&self.root],
        }
    }

    /// Calls `visit` once for every stored set.
    pub fn for_each_set<F>(&self, mut visit: F)
    where
        F: FnMut(&S),
    {
        let _ = self.root.try_for_each(&mut |set: &S| {
            visit(set);
            ControlFlow::<()>::Continue(())
        });
    }
}

impl<S: BitSetLike> SetTrie<S> {
    /// Stores `set`, replacing an equal set already stored. Always returns true.
    pub fn insert(&mut self, set: S) -> bool {
        self.replace(set);
        true
    }

    /// Stores `set` and returns the occupant it displaced, if any.
    pub fn replace(&mut self, set: S) -> Option<S> {
        let mut node = &mut self.root;
        for bit in set.ones() {
            node = node.children.entry(bit).or_default();
        }
        node.leaf_set.replace(set)
    }

    /// Returns some stored set that is a subset of `query`.
    ///
    /// Which one is unspecified when several qualify; the first one met on a
    /// path along the query's bits wins.
    pub fn find_subset<Q>(&self, query: &Q) -> Option<&S>
    where
        Q: BitSetLike + ?Sized,
    {
        self.root.find_subset(query.ones())
    }

    /// returns true if a subset of `query` (or `query` itself) is stored
    pub fn contains_subset<Q>(&self, query: &Q) -> bool
    where
        Q: BitSetLike + ?Sized,
    {
        self.find_subset(query).is_some()
    }

    /// returns every stored subset of `query`
    pub fn subsets<Q>(&self, query: &Q) -> Vec<&S>
    where
        Q: BitSetLike + ?Sized,
    {
        let mut found = Vec::new();
        self.root.collect_subsets(query.ones(), &mut found);
        found
    }

    /// Calls `visit` once for every stored superset of `query`, in no
    /// particular order.
    pub fn for_each_superset<Q, F>(&self, query: &Q, mut visit: F)
    where
        Q: BitSetLike + ?Sized,
        F: FnMut(&S),
    {
        let _ = self.try_for_each_superset(query, |set| {
            visit(set);
            ControlFlow::<()>::Continue(())
        });
    }

    /// Like [`for_each_superset`](Self::for_each_superset), but stops as soon
    /// as `visit` breaks and hands back its value.
    pub fn try_for_each_superset<'a, Q, B, F>(&'a self, query: &Q, mut visit: F) -> ControlFlow<B>
    where
        Q: BitSetLike + ?Sized,
        F: FnMut(&'a S) -> ControlFlow<B>,
    {
        self.root.try_for_each_superset(query.ones(), &mut visit)
    }

    /// returns every stored superset of `query`
    pub fn supersets<Q>(&self, query: &Q) -> Vec<&S>
    where
        Q: BitSetLike + ?Sized,
    {
        let mut found = Vec::new();
        let _ = self.try_for_each_superset(query, |set| {
            found.push(set);
            ControlFlow::<()>::Continue(())
        });
        found
    }

    /// returns true if a superset of `query` (or `query` itself) is stored
    pub fn contains_superset<Q>(&self, query: &Q) -> bool
    where
        Q: BitSetLike + ?Sized,
    {
        self.try_for_each_superset(query, |_| ControlFlow::Break(()))
            .is_break()
    }

    /// Removes and returns every stored set that is a subset of `invalid`,
    /// including `invalid` itself when it is stored.
    ///
    /// Emptied nodes are pruned during the same traversal.
    pub fn pop_generalizations<Q>(&mut self, invalid: &Q) -> Vec<S>
    where
        Q: BitSetLike + ?Sized,
    {
        let mut popped = Vec::new();
        self.root.pop_generalizations(invalid.ones(), &mut popped);
        trace!("popped {} generalizations", popped.len());
        popped
    }
}

impl<S: BitSetLike + PartialEq> SetTrie<S> {
    /// returns true if exactly `set` is stored
    pub fn contains(&self, set: &S) -> bool {
        let mut node = &self.root;
        for bit in set.ones() {
            match node.children.get(&bit) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.leaf_set.as_ref() == Some(set)
    }

    /// Removes `set` if it is the occupant of its own path.
    ///
    /// Anything else is a silent no-op: a missing path, or a node holding a
    /// set that does not compare equal.
    pub fn remove(&mut self, set: &S) -> Option<S> {
        let mut removed = None;
        self.root.remove(set.ones(), set, &mut removed);
        if removed.is_none() {
            trace!("remove: set not stored, nothing removed");
        }
        removed
    }
}

impl<S: BitSetLike> FromIterator<S> for SetTrie<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut trie = SetTrie::new();
        trie.extend(iter);
        trie
    }
}

impl<S: BitSetLike> Extend<S> for SetTrie<S> {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for set in iter {
            self.insert(set);
        }
    }
}

/// Iterator over all sets of a [`SetTrie`], see [`SetTrie::iter`].
pub struct Iter<'a, S> {
    stack: Vec<&'a Node<S>>,
}

impl<'a, S> Iterator for Iter<'a, S> {
    type Item = &'a S;

    fn next(&mut self) -> Option<&'a S> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.values().rev());
            if let Some(set) = &node.leaf_set {
                return Some(set);
            }
        }
        None
    }
}

impl<'a, S> IntoIterator for &'a SetTrie<S> {
    type Item = &'a S;
    type IntoIter = Iter<'a, S>;

    fn into_iter(self) -> Iter<'a, S> {
        self.iter()
    }
}
