use core::iter::FusedIterator;

use crate::{AvlTree, Link, Links, TreeNode};

/// An iterator over the elements of an [`AvlTree`] in ascending key order.
///
/// Created by [`AvlTree::iter`].
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree AvlTree<T>,

    // The next element to yield.
    next: Link<T>,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            tree,

            next: tree.first_raw(),
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;

        // Either the leftmost node of the right subtree, or the first ancestor reached from a
        // left child. Past the maximum there is neither, and iteration ends.
        self.next = unsafe { self.tree.successor_raw(cur) };
        self.len -= 1;

        Some(unsafe { cur.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter {
            tree: self.tree,
            next: self.next,
            len: self.len,
        }
    }
}
