//! An owning ordered set on top of [`AvlTree`].

use alloc::boxed::Box;
use core::{
    borrow::Borrow,
    fmt,
    iter::FusedIterator,
    marker::PhantomPinned,
    pin::Pin,
    ptr::{self, NonNull},
};

use cordyceps::Linked;

use crate::{AvlTree, DuplicateValue, EmptyTree, Links, NotFound, TreeNode};

/// An ordered set based on an [AVL tree].
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet<T: Ord> {
    tree: AvlTree<SetNode<T>>,
}

struct SetNode<T> {
    links: Links<SetNode<T>>,
    value: T,
    _unpin: PhantomPinned,
}

impl<T> SetNode<T> {
    fn new(value: T) -> Box<Self> {
        Box::new(SetNode {
            links: Links::new(),
            value,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<T> Linked<Links<SetNode<T>>> for SetNode<T> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<T>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<T: Ord> TreeNode<Links<SetNode<T>>> for SetNode<T> {
    type Key = T;

    fn key(&self) -> &Self::Key {
        &self.value
    }
}

// Unwraps a value handed out by the tree.
fn value_of<T>(node: Pin<&SetNode<T>>) -> &T {
    &Pin::get_ref(node).value
}

impl<T: Ord> AvlSet<T> {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree, or -1 if the set is empty.
    pub fn height(&self) -> i32 {
        self.tree.height()
    }

    /// Adds `value` to the set.
    ///
    /// If an equal value is already present, the set is left unchanged and `value` is returned
    /// inside the error.
    pub fn insert(&mut self, value: T) -> Result<(), DuplicateValue<T>> {
        self.tree
            .insert(SetNode::new(value))
            .map_err(|DuplicateValue(node)| DuplicateValue(node.value))
    }

    /// Removes the value equal to `value` from the set and returns it.
    pub fn remove<Q>(&mut self, value: &Q) -> Result<T, NotFound>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).map(|node| node.value)
    }

    /// Returns `true` if the set contains a value equal to `value`.
    #[inline]
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains(value)
    }

    /// Returns a reference to the value in the set equal to `value`.
    #[inline]
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(value).map(value_of)
    }

    /// Returns the minimum value in the set, or [`EmptyTree`] if there is none.
    pub fn minimum(&self) -> Result<&T, EmptyTree> {
        self.tree.minimum().map(value_of)
    }

    /// Returns the maximum value in the set, or [`EmptyTree`] if there is none.
    pub fn maximum(&self) -> Result<&T, EmptyTree> {
        self.tree.maximum().map(value_of)
    }

    /// Returns the minimum value in the set.
    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.tree.first().map(value_of)
    }

    /// Returns the maximum value in the set.
    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.tree.last().map(value_of)
    }

    /// Removes and returns the minimum value in the set.
    #[inline]
    pub fn pop_first(&mut self) -> Option<T> {
        self.tree.pop_first().map(|node| node.value)
    }

    /// Removes and returns the maximum value in the set.
    #[inline]
    pub fn pop_last(&mut self) -> Option<T> {
        self.tree.pop_last().map(|node| node.value)
    }

    /// Returns the smallest value in the set greater than `value`.
    ///
    /// Returns `Ok(None)` if `value` is the maximum, and [`NotFound`] if `value` is not in the
    /// set.
    pub fn successor<Q>(&self, value: &Q) -> Result<Option<&T>, NotFound>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .successor(value)
            .map(|next| next.map(value_of))
    }

    /// Returns the largest value in the set less than `value`.
    ///
    /// Returns `Ok(None)` if `value` is the minimum, and [`NotFound`] if `value` is not in the
    /// set.
    pub fn predecessor<Q>(&self, value: &Q) -> Result<Option<&T>, NotFound>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .predecessor(value)
            .map(|prev| prev.map(value_of))
    }

    /// Returns an iterator over the values of the set in ascending order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// Retains only the values for which `keep` returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        let mut cursor = self.tree.cursor_first_mut();

        while let Some(retained) = cursor.get().map(|node| keep(&node.value)) {
            if retained {
                cursor.move_next();
            } else {
                cursor.remove_current();
            }
        }
    }

    /// Clears the set, removing all values.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Writes the shape of the underlying tree as a Graphviz digraph.
    pub fn dotgraph<W>(&self, name: &str, w: W) -> fmt::Result
    where
        W: fmt::Write,
        T: fmt::Display,
    {
        self.tree.dotgraph(name, w)
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<T: Ord> Default for AvlSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + fmt::Debug> fmt::Debug for AvlSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Ord> Extend<T> for AvlSet<T> {
    /// Adds every value of `iter` to the set, skipping values already present.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            // Duplicates are not an error when merging.
            let _ = self.insert(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for AvlSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = AvlSet::new();
        set.extend(iter);
        set
    }
}

impl<'a, T: Ord> IntoIterator for &'a AvlSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Ord> IntoIterator for AvlSet<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { set: self }
    }
}

/// An iterator over the values of an [`AvlSet`] in ascending order.
pub struct Iter<'a, T: Ord> {
    inner: crate::Iter<'a, SetNode<T>>,
}

impl<'a, T: Ord> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| &node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Ord> ExactSizeIterator for Iter<'_, T> {}

impl<T: Ord> FusedIterator for Iter<'_, T> {}

/// An owning iterator over the values of an [`AvlSet`] in ascending order.
pub struct IntoIter<T: Ord> {
    set: AvlSet<T>,
}

impl<T: Ord> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.set.pop_first()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.set.len(), Some(self.set.len()))
    }
}

impl<T: Ord> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.set.pop_last()
    }
}

impl<T: Ord> ExactSizeIterator for IntoIter<T> {}

impl<T: Ord> FusedIterator for IntoIter<T> {}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::{format, prelude::v1::*, vec};

    use super::*;

    #[test]
    fn insert_remove_contains() {
        let mut set = AvlSet::new();

        assert!(set.insert(5).is_ok());
        assert!(set.insert(3).is_ok());
        assert_eq!(set.insert(5), Err(DuplicateValue(5)));
        assert_eq!(set.len(), 2);

        assert!(set.contains(&3));
        assert_eq!(set.get(&5), Some(&5));
        assert_eq!(set.remove(&3), Ok(3));
        assert_eq!(set.remove(&3), Err(NotFound));
        assert!(!set.contains(&3));
        set.assert_invariants();
    }

    #[test]
    fn borrowed_lookups() {
        let mut set = AvlSet::new();
        set.extend(["pear", "apple", "fig"].map(String::from));

        assert!(set.contains("fig"));
        assert_eq!(set.successor("apple"), Ok(Some(&String::from("fig"))));
        assert_eq!(set.predecessor("apple"), Ok(None));
        assert_eq!(set.remove("pear"), Ok(String::from("pear")));
        assert_eq!(set.successor("pear"), Err(NotFound));
    }

    #[test]
    fn minimum_maximum() {
        let mut set: AvlSet<i32> = AvlSet::new();
        assert_eq!(set.minimum(), Err(EmptyTree));
        assert_eq!(set.maximum(), Err(EmptyTree));
        assert_eq!(set.height(), -1);

        set.extend([4, -2, 9, 0]);
        assert_eq!(set.minimum(), Ok(&-2));
        assert_eq!(set.maximum(), Ok(&9));
        assert_eq!(set.first(), Some(&-2));
        assert_eq!(set.last(), Some(&9));

        assert_eq!(set.pop_first(), Some(-2));
        assert_eq!(set.pop_last(), Some(9));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![0, 4]);
        set.assert_invariants();
    }

    #[test]
    fn retain_keeps_matching() {
        let mut set: AvlSet<u32> = (0..100).collect();

        set.retain(|v| v % 3 == 0);
        set.assert_invariants();

        assert_eq!(set.len(), 34);
        assert!(set.iter().all(|v| v % 3 == 0));
    }

    #[test]
    fn extend_skips_duplicates() {
        let set: AvlSet<u32> = [3, 1, 3, 2, 1].into_iter().collect();

        assert_eq!(set.len(), 3);
        assert_eq!(format!("{set:?}"), "{1, 2, 3}");
    }

    #[test]
    fn into_iter_both_ends() {
        let set: AvlSet<u32> = (1..=5).collect();
        let mut iter = set.into_iter();

        assert_eq!(iter.len(), 5);
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next_back(), Some(5));
        assert_eq!(iter.collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn drop_releases_values() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        let mut set = AvlSet::new();

        for key in 0..10 {
            assert!(set.insert(Tracked(key, tracker.clone())).is_ok());
        }
        assert_eq!(Rc::strong_count(&tracker), 11);

        // A rejected duplicate is handed back, not leaked.
        let dup = set.insert(Tracked(4, tracker.clone())).unwrap_err();
        drop(dup);
        assert_eq!(Rc::strong_count(&tracker), 11);

        drop(set);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    struct Tracked(u32, std::rc::Rc<()>);

    impl PartialEq for Tracked {
        fn eq(&self, other: &Self) -> bool {
            self.0 == other.0
        }
    }

    impl Eq for Tracked {}

    impl PartialOrd for Tracked {
        fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for Tracked {
        fn cmp(&self, other: &Self) -> core::cmp::Ordering {
            self.0.cmp(&other.0)
        }
    }
}
