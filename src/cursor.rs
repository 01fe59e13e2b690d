//! Cursors over an [`AvlTree`].
//!
//! A cursor rests on an element or on the empty slot past both ends of the tree. Stepping past the
//! maximum or the minimum lands on that slot, and stepping off it wraps around to the opposite
//! end, so repeated steps in one direction cycle through the tree.

use core::{marker::PhantomData, pin::Pin, ptr::NonNull};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

// A position in a tree, shared by both cursor flavours.
struct Position<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: NonNull<AvlTree<T>>,
    at: Link<T>,
}

impl<T> Clone for Position<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Position<T> where T: TreeNode<Links<T>> + ?Sized {}

impl<T> Position<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    // Starts at the `end`-most element: `Dir::Left` for the minimum, `Dir::Right` for the maximum.
    fn at_end(tree: NonNull<AvlTree<T>>, end: Dir) -> Position<T> {
        let mut pos = Position { tree, at: None };
        pos.at = unsafe { pos.neighbor(!end) };
        pos
    }

    // The element one step in `dir`, or `None` for the empty slot.
    //
    // # Safety
    //
    // `tree` must be live and `at` must be linked into it.
    unsafe fn neighbor(&self, dir: Dir) -> Link<T> {
        let tree = unsafe { self.tree.as_ref() };

        match self.at {
            Some(node) => unsafe { tree.neighbor_raw(node, dir) },
            None => match dir {
                Dir::Right => tree.first_raw(),
                Dir::Left => tree.last_raw(),
            },
        }
    }

    unsafe fn step(&mut self, dir: Dir) {
        self.at = unsafe { self.neighbor(dir) };
    }

    // Unlinks the current element and steps in `dir`.
    //
    // The neighbor is computed first: unlinking never moves other elements, so it stays valid.
    unsafe fn unlink_and_step(&mut self, dir: Dir) -> Option<T::Handle> {
        let node = self.at?;

        unsafe {
            self.step(dir);
            Some(self.tree.as_mut().remove_at(node))
        }
    }
}

/// A read-only cursor over an [`AvlTree`].
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pos: Position<T>,
    _tree: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree AvlTree<T>, end: Dir) -> Cursor<'tree, T> {
        Cursor {
            pos: Position::at_end(tree.into(), end),
            _tree: PhantomData,
        }
    }

    /// Steps to the next larger element, or off the maximum onto the empty slot.
    pub fn move_next(&mut self) {
        unsafe { self.pos.step(Dir::Right) }
    }

    /// Steps to the next smaller element, or off the minimum onto the empty slot.
    pub fn move_prev(&mut self) {
        unsafe { self.pos.step(Dir::Left) }
    }

    /// Returns the current element, or `None` on the empty slot.
    pub fn get(&self) -> Option<&'tree T> {
        self.pos.at.map(|node| unsafe { node.as_ref() })
    }

    /// Returns the element [`move_next`](Self::move_next) would land on.
    pub fn peek_next(&self) -> Option<&'tree T> {
        self.peek(Dir::Right)
    }

    /// Returns the element [`move_prev`](Self::move_prev) would land on.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        self.peek(Dir::Left)
    }

    fn peek(&self, dir: Dir) -> Option<&'tree T> {
        unsafe { self.pos.neighbor(dir).map(|node| node.as_ref()) }
    }
}

/// A cursor over an [`AvlTree`] which can unlink the element it rests on.
///
/// Read access goes through [`as_cursor`](Self::as_cursor).
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pos: Position<T>,
    _tree: PhantomData<&'tree mut AvlTree<T>>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree mut AvlTree<T>, end: Dir) -> CursorMut<'tree, T> {
        CursorMut {
            pos: Position::at_end(tree.into(), end),
            _tree: PhantomData,
        }
    }

    /// Returns a read-only cursor at the same position.
    ///
    /// `self` stays borrowed for as long as the returned cursor lives.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            pos: self.pos,
            _tree: PhantomData,
        }
    }

    /// See [`Cursor::move_next`].
    pub fn move_next(&mut self) {
        unsafe { self.pos.step(Dir::Right) }
    }

    /// See [`Cursor::move_prev`].
    pub fn move_prev(&mut self) {
        unsafe { self.pos.step(Dir::Left) }
    }

    /// Shorthand for `self.as_cursor().get()`.
    pub fn get(&self) -> Option<&T> {
        self.as_cursor().get()
    }

    /// Returns the current element pinned and mutable, or `None` on the empty slot.
    ///
    /// # Safety
    ///
    /// The element's key must keep comparing the same way against every other key in the tree.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        self.pos
            .at
            .map(|mut node| unsafe { Pin::new_unchecked(node.as_mut()) })
    }

    /// Unlinks the current element and steps to the next one.
    ///
    /// On the empty slot this returns `None` and changes nothing.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        unsafe { self.pos.unlink_and_step(Dir::Right) }
    }

    /// Unlinks the current element and steps to the previous one.
    ///
    /// On the empty slot this returns `None` and changes nothing.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        unsafe { self.pos.unlink_and_step(Dir::Left) }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::{prelude::v1::*, vec};

    use crate::{model::TestNode, AvlTree};

    fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
        let mut tree = AvlTree::new();
        for &key in keys {
            assert!(tree.insert(TestNode::new(key)).is_ok());
        }
        tree
    }

    #[test]
    fn empty_tree_stays_on_slot() {
        let mut tree = tree_of(&[]);

        let mut cursor = tree.cursor_first();
        assert!(cursor.get().is_none());
        cursor.move_next();
        cursor.move_prev();
        assert!(cursor.get().is_none());
        assert!(cursor.peek_next().is_none());

        let mut cursor = tree.cursor_last_mut();
        assert!(cursor.remove_current().is_none());
        assert!(cursor.remove_current_and_move_prev().is_none());
    }

    #[test]
    fn steps_wrap_through_slot() {
        let tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

        let mut cursor = tree.cursor_first();
        let mut forward = Vec::new();
        while let Some(node) = cursor.get() {
            forward.push(node.key);
            cursor.move_next();
        }
        assert_eq!(forward, vec![1, 2, 3, 4, 5, 6, 7]);

        // Off the slot, forward wraps to the minimum and backward to the maximum.
        assert_eq!(cursor.peek_next().map(|n| n.key), Some(1));
        assert_eq!(cursor.peek_prev().map(|n| n.key), Some(7));

        let mut cursor = tree.cursor_last();
        let mut backward = Vec::new();
        while let Some(node) = cursor.get() {
            backward.push(node.key);
            cursor.move_prev();
        }
        assert_eq!(backward, vec![7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn removal_keeps_neighbors_across_splice() {
        // Removing 4 splices its successor 5 into the root slot.
        let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

        let mut cursor = tree.cursor_first_mut();
        while cursor.get().map(|n| n.key) != Some(4) {
            cursor.move_next();
        }

        assert_eq!(cursor.remove_current().map(|n| n.key), Some(4));
        assert_eq!(cursor.get().map(|n| n.key), Some(5));

        assert_eq!(
            cursor.remove_current_and_move_prev().map(|n| n.key),
            Some(5)
        );
        assert_eq!(cursor.get().map(|n| n.key), Some(3));
        assert_eq!(cursor.as_cursor().peek_next().map(|n| n.key), Some(6));

        tree.assert_invariants();
        let keys: Vec<u32> = tree.iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![1, 2, 3, 6, 7]);
    }

    #[test]
    fn remove_last_from_maximum_lands_on_slot() {
        let mut tree = tree_of(&[1, 2]);

        let mut cursor = tree.cursor_last_mut();
        assert_eq!(cursor.remove_current().map(|n| n.key), Some(2));
        assert!(cursor.get().is_none());

        cursor.move_next();
        assert_eq!(cursor.remove_current().map(|n| n.key), Some(1));
        assert!(cursor.get().is_none());

        tree.assert_invariants();
        assert!(tree.is_empty());
    }
}
