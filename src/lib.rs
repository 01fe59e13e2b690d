//! An intrusive AVL tree.
//!
//! [`AvlTree`] links caller-allocated elements that embed a [`Links`] field, in the style of the
//! intrusive collections in [`cordyceps`]. Every element carries a pointer to its parent, which
//! lets the in-order successor, the iterators and the cursors walk the tree without an auxiliary
//! stack.
//!
//! [`AvlSet`] wraps the tree into an owning ordered set for plain values.
//!
//! Conventions used in comments:
//! - The height of an absent subtree is -1; a leaf has height 0.
//! - The balance factor of a node is `h(left) - h(right)`.
//!
//! The invariants of the tree, which hold between public operations, are:
//! 1. Keys in a node's left subtree are strictly less than its own key, keys in its right
//!    subtree strictly greater.
//! 2. Every balance factor is -1, 0 or 1.
//! 3. Every cached height equals `1 + max(h(left), h(right))`.
//! 4. Every child's parent pointer points back at the node that links it, and the root has no
//!    parent.
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

use core::{borrow::Borrow, cmp::Ordering, pin::Pin, ptr::NonNull};

use cordyceps::Linked;

mod balance;
mod cursor;
#[cfg(feature = "alloc")]
mod debug;
mod error;
mod iter;
mod links;
#[cfg(any(test, feature = "model"))]
pub mod model;
#[cfg(feature = "alloc")]
pub mod set;

pub use cursor::{Cursor, CursorMut};
pub use error::{DuplicateValue, EmptyTree, NotFound};
pub use iter::Iter;
pub use links::Links;
#[cfg(feature = "alloc")]
pub use set::AvlSet;

use links::Dir;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Elements are linked in by handle and handed back when removed. Dropping the tree drops every
/// element still linked into it.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree.
    ///
    /// A tree with a single element has height 0; an empty tree has height -1.
    pub fn height(&self) -> i32 {
        i32::from(self.height_of(self.root))
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree with nonzero length");
            return;
        };

        unsafe {
            assert_eq!(
                self.links(root).parent(),
                None,
                "root must not have a parent"
            );

            let height = self.assert_invariants_at(root);

            // An AVL tree of height `h` holds at least `N(h) = N(h - 1) + N(h - 2) + 1` nodes.
            let (mut min_prev, mut min_nodes) = (0_usize, 1_usize);
            for _ in 0..height {
                (min_prev, min_nodes) = (min_nodes, min_nodes.saturating_add(min_prev + 1));
            }
            assert!(
                self.len >= min_nodes,
                "height {height} exceeds the AVL bound for {} nodes",
                self.len
            );
        }

        // In-order traversal via parent links must visit every node in strictly ascending order.
        let mut count = 0;
        let mut prev: Option<&T> = None;
        for node in self.iter() {
            if let Some(prev) = prev {
                assert!(prev.key() < node.key(), "in-order keys not strictly ascending");
            }

            prev = Some(node);
            count += 1;
        }
        assert_eq!(count, self.len, "length does not match linked node count");
    }

    // Checks the local invariants of every node in the subtree and returns its height.
    unsafe fn assert_invariants_at(&self, node: NonNull<T>) -> i8 {
        unsafe {
            let mut child_heights = [-1_i8; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = self.links(node).child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = self
                        .links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent, "child parent pointer points elsewhere");

                    let expected = match dir {
                        Dir::Left => Ordering::Less,
                        Dir::Right => Ordering::Greater,
                    };
                    assert_eq!(child.as_ref().key().cmp(node.as_ref().key()), expected);

                    child_heights[dir as usize] = self.assert_invariants_at(child);
                }
            }

            let [left, right] = child_heights;
            let height = 1 + left.max(right);
            assert_eq!(self.links(node).height(), height, "stale cached height");
            assert!((left - right).abs() <= 1, "balance factor out of range");

            height
        }
    }

    /// Returns a reference to the element corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains an element corresponding to `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = self.links(cur).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = self.links(cur).right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    /// Returns the minimum element of the tree, or [`EmptyTree`] if there is none.
    pub fn minimum(&self) -> Result<Pin<&T>, EmptyTree> {
        self.first().ok_or(EmptyTree)
    }

    /// Returns the maximum element of the tree, or [`EmptyTree`] if there is none.
    pub fn maximum(&self) -> Result<Pin<&T>, EmptyTree> {
        self.last().ok_or(EmptyTree)
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.min_in_subtree(root).0 })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.max_in_subtree(root) })
    }

    /// Returns the element following the one corresponding to `key`.
    ///
    /// Returns `Ok(None)` if `key` belongs to the maximum element, and [`NotFound`] if no
    /// element corresponds to `key`.
    pub fn successor<Q>(&self, key: &Q) -> Result<Option<Pin<&T>>, NotFound>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key).ok_or(NotFound)?;

        unsafe {
            Ok(self
                .successor_raw(node)
                .map(|next| Pin::new_unchecked(next.as_ref())))
        }
    }

    /// Returns the element preceding the one corresponding to `key`.
    ///
    /// Returns `Ok(None)` if `key` belongs to the minimum element, and [`NotFound`] if no
    /// element corresponds to `key`.
    pub fn predecessor<Q>(&self, key: &Q) -> Result<Option<Pin<&T>>, NotFound>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key).ok_or(NotFound)?;

        unsafe {
            Ok(self
                .predecessor_raw(node)
                .map(|prev| Pin::new_unchecked(prev.as_ref())))
        }
    }

    // Returns the in-order successor of `node`, which must be linked into this tree.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    // Returns the in-order predecessor of `node`, which must be linked into this tree.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    // Returns the in-order neighbor of `node` on the `dir` side.
    //
    // If `node` has a `dir` subtree, the neighbor is the `!dir`-most node of that subtree.
    // Otherwise it is the first ancestor reached by climbing out of a `!dir` child. Climbing
    // past the root means `node` is the extreme element in direction `dir`.
    unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(mut cur) = self.links(node).child(dir) {
                while let Some(next) = self.links(cur).child(!dir) {
                    cur = next;
                }

                return Some(cur);
            }

            let mut cur = node;
            loop {
                let parent = self.links(cur).parent()?;

                if self.which_child(parent, cur) == !dir {
                    return Some(parent);
                }

                cur = parent;
            }
        }
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing at the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::new(self, Dir::Left)
    }

    /// Returns a cursor pointing at the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::new(self, Dir::Right)
    }

    /// Returns a mutable cursor pointing at the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::new(self, Dir::Left)
    }

    /// Returns a mutable cursor pointing at the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::new(self, Dir::Right)
    }

    /// Inserts an item into the tree.
    ///
    /// If an element with an equal key is already present, the tree is left unchanged and
    /// `item` is returned inside the error.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Result<(), DuplicateValue<T::Handle>> {
        let ptr = T::into_ptr(item);

        unsafe { self.links_mut(ptr).clear() };

        let root = match self.root {
            Some(root) => root,
            None => {
                // Tree is empty. Set `item` as the root and return.
                log::trace!("insert: new root");
                self.root = Some(ptr);
                self.len += 1;
                return Ok(());
            }
        };

        let mut parent = root;
        let mut depth = 1_usize;

        // Descend the tree, looking for a vacant child slot.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => {
                    log::trace!("insert: duplicate key at depth {depth}, rejected");
                    return Err(DuplicateValue(unsafe { T::from_ptr(ptr) }));
                }
                Ordering::Greater => Dir::Right,
            };

            unsafe {
                match self.links(parent).child(dir) {
                    // Descend.
                    Some(child) => {
                        parent = child;
                        depth += 1;
                    }

                    // Set `item` as child.
                    None => {
                        self.links_mut(parent).set_child(dir, Some(ptr));
                        self.links_mut(ptr).set_parent(Some(parent));

                        log::trace!("insert: new {dir:?} leaf at depth {depth}");
                        break;
                    }
                }
            }
        }

        self.len += 1;
        unsafe { self.rebalance_inserted(ptr) };

        Ok(())
    }

    /// Removes the element corresponding to `key` from the tree and returns it.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<T::Handle, NotFound>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key).ok_or(NotFound)?;
        Ok(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` has two children.
        //
        //    `node`'s successor (the least node in its right subtree) is unlinked from its slot,
        //    its right child is elevated to replace it, and the successor then takes over
        //    `node`'s place, children and height. Structurally this is a removal matching case 2
        //    or 3 at the successor's old slot.
        //
        // 2. `node` has one child, which is elevated to replace it.
        //
        // 3. `node` is a leaf and is simply unlinked.
        //
        // In every case the height may have dropped for each ancestor of the vacated slot, so all
        // of them are rebalanced, bottom-up, all the way to the root.

        unsafe {
            let parent = self.links(node).parent();
            let left = self.links(node).left();
            let right = self.links(node).right();

            let rebalance_from = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);
                    let successor_right = self.links(successor).right();

                    let vacated = match successor_parent {
                        Some(successor_parent) => {
                            // Elevate the successor's right child to replace it.
                            self.replace_child(successor_parent, successor, successor_right);
                            self.maybe_set_parent(successor_right, Some(successor_parent));

                            self.links_mut(successor).set_right(Some(right));
                            self.links_mut(right).set_parent(Some(successor));

                            successor_parent
                        }

                        // The successor is `right` itself and keeps its right subtree.
                        None => successor,
                    };

                    self.replace_child_or_set_root(parent, node, Some(successor));

                    // Transfer the position of `node` to `successor`.
                    let node_height = self.links(node).height();

                    self.links_mut(successor).set_parent(parent);
                    self.links_mut(successor).set_height(node_height);
                    self.links_mut(successor).set_left(Some(left));
                    // Right link is updated above iff successor != right.

                    self.links_mut(left).set_parent(Some(successor));

                    log::trace!("remove: two children, successor spliced in");
                    Some(vacated)
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    self.links_mut(child).set_parent(parent);

                    log::trace!("remove: one child elevated");
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);

                    log::trace!("remove: leaf unlinked");
                    parent
                }
            };

            self.links_mut(node).clear();
            self.len -= 1;

            self.rebalance_removed(rebalance_from);

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| self.links(cur).parent());

                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Link<T>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { self.links(cur).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        let mut cur = root;

        while let Some(right) = unsafe { self.links(cur).right() } {
            cur = right;
        }

        cur
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(&mut self, parent: NonNull<T>, old_child: NonNull<T>, new_child: Link<T>) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            debug_assert!(
                new_child.is_none() || self.links(parent).child(!dir) != new_child,
                "`new_child` must not be a child of `parent`"
            );

            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    // Returns which child of `parent` the node `child` is.
    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if self.links(parent).left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(
                    self.links(parent).right(),
                    Some(child),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
