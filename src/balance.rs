//! Height bookkeeping, rotations and bottom-up rebalancing.

use core::ptr::NonNull;

use crate::{AvlTree, Dir, Link, Links, TreeNode};

// What changed below the node being rebalanced. Decides between single and double rotations.
enum Cause<T: ?Sized> {
    // `item` was just linked in as a leaf somewhere below.
    Inserted(NonNull<T>),
    // A node was unlinked somewhere below.
    Removed,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the cached height of the subtree rooted at `node`, or -1 if `node` is absent.
    #[inline]
    pub(crate) fn height_of(&self, node: Link<T>) -> i8 {
        node.map(|n| unsafe { self.links(n).height() }).unwrap_or(-1)
    }

    /// Returns the balance factor of `node`, or 0 if `node` is absent.
    #[inline]
    fn balance_of(&self, node: Link<T>) -> i8 {
        let Some(node) = node else {
            return 0;
        };

        let links = unsafe { self.links(node) };
        self.height_of(links.left()) - self.height_of(links.right())
    }

    // Recomputes the cached height of `node` from its children.
    #[inline]
    unsafe fn update_height(&mut self, node: NonNull<T>) {
        unsafe {
            let links = self.links(node);
            let height = 1 + self.height_of(links.left()).max(self.height_of(links.right()));
            self.links_mut(node).set_height(height);
        }
    }

    // Performs a rotation, moving `up` up and its parent `down` down.
    //
    // `up`'s inner subtree moves across to `down`, and `up` takes `down`'s place under `down`'s
    // former parent (or as the tree root). Heights of affected nodes are not updated.
    unsafe fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        debug_assert_ne!(self.root, Some(up), "`up` must not be the tree root");

        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if self.links(down).right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            let across = self.links(up).child(dir);
            self.links_mut(down).set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            self.links_mut(up).set_child(dir, Some(down));
            let parent = self.links_mut(down).set_parent(Some(up));
            self.links_mut(up).set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));
        }
    }

    /// Fixes a left-left imbalance at `node`: its left child becomes the subtree root.
    ///
    /// Returns the new subtree root.
    pub(crate) unsafe fn rotate_left_left(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            let pivot = self
                .links(node)
                .left()
                .expect("left-left rotation requires a left child");

            log::trace!("rotate left-left at height {}", self.links(node).height());

            self.rotate_at(node, pivot);
            self.update_height(node);
            self.update_height(pivot);

            pivot
        }
    }

    /// Fixes a right-right imbalance at `node`: its right child becomes the subtree root.
    ///
    /// Returns the new subtree root.
    pub(crate) unsafe fn rotate_right_right(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            let pivot = self
                .links(node)
                .right()
                .expect("right-right rotation requires a right child");

            log::trace!("rotate right-right at height {}", self.links(node).height());

            self.rotate_at(node, pivot);
            self.update_height(node);
            self.update_height(pivot);

            pivot
        }
    }

    /// Fixes a left-right imbalance at `node`: the right child of its left child becomes the
    /// subtree root.
    ///
    /// Returns the new subtree root.
    pub(crate) unsafe fn rotate_left_right(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            let left = self
                .links(node)
                .left()
                .expect("left-right rotation requires a left child");

            self.rotate_right_right(left);
            self.rotate_left_left(node)
        }
    }

    /// Fixes a right-left imbalance at `node`: the left child of its right child becomes the
    /// subtree root.
    ///
    /// Returns the new subtree root.
    pub(crate) unsafe fn rotate_right_left(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            let right = self
                .links(node)
                .right()
                .expect("right-left rotation requires a right child");

            self.rotate_left_left(right);
            self.rotate_right_right(node)
        }
    }

    // Refreshes the height of `node` and rotates if it has become unbalanced.
    //
    // Returns the root of the subtree formerly rooted at `node`.
    unsafe fn rebalance_at(&mut self, node: NonNull<T>, cause: Cause<T>) -> NonNull<T> {
        unsafe {
            self.update_height(node);

            let balance = self.balance_of(Some(node));
            debug_assert!(
                (-2..=2).contains(&balance),
                "balance factor {balance} out of range"
            );

            match balance {
                2 => {
                    let left = self
                        .links(node)
                        .left()
                        .expect("left-heavy node has no left child");

                    let single = match cause {
                        Cause::Inserted(item) => item.as_ref().key() < left.as_ref().key(),
                        Cause::Removed => self.balance_of(Some(left)) >= 0,
                    };

                    if single {
                        self.rotate_left_left(node)
                    } else {
                        self.rotate_left_right(node)
                    }
                }

                -2 => {
                    let right = self
                        .links(node)
                        .right()
                        .expect("right-heavy node has no right child");

                    let single = match cause {
                        Cause::Inserted(item) => item.as_ref().key() > right.as_ref().key(),
                        Cause::Removed => self.balance_of(Some(right)) <= 0,
                    };

                    if single {
                        self.rotate_right_right(node)
                    } else {
                        self.rotate_right_left(node)
                    }
                }

                _ => node,
            }
        }
    }

    // Performs a bottom-up rebalance of the tree after `node` was linked in as a leaf.
    //
    // Ascends until a subtree's height is unchanged. A rotation restores the height the subtree
    // had before the insertion, so at most one rotation is performed.
    pub(crate) unsafe fn rebalance_inserted(&mut self, node: NonNull<T>) {
        let mut opt_cur = unsafe { self.links(node).parent() };

        while let Some(cur) = opt_cur {
            unsafe {
                let old_height = self.links(cur).height();
                let local_root = self.rebalance_at(cur, Cause::Inserted(node));

                if local_root != cur || self.links(cur).height() == old_height {
                    break;
                }

                opt_cur = self.links(cur).parent();
            }
        }
    }

    // Performs a bottom-up rebalance of the tree after a node was unlinked below `start`.
    //
    // A rotation after a removal may shrink the subtree, so every ancestor up to the root is
    // checked.
    pub(crate) unsafe fn rebalance_removed(&mut self, start: Link<T>) {
        let mut opt_cur = start;

        while let Some(cur) = opt_cur {
            unsafe {
                let local_root = self.rebalance_at(cur, Cause::Removed);
                opt_cur = self.links(local_root).parent();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::{prelude::v1::*, vec};

    use super::*;
    use crate::model::TestNode;

    fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
        let mut tree = AvlTree::new();

        for &key in keys {
            assert!(tree.insert(TestNode::new(key)).is_ok());
            tree.assert_invariants();
        }

        tree
    }

    // Returns `(root, left child, right child)` keys.
    fn top(tree: &AvlTree<TestNode>) -> (u32, Option<u32>, Option<u32>) {
        let root = tree.root.expect("tree is empty");

        unsafe {
            let links = tree.links(root);
            (
                root.as_ref().key,
                links.left().map(|l| l.as_ref().key),
                links.right().map(|r| r.as_ref().key),
            )
        }
    }

    fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
        tree.iter().map(|node| node.key).collect()
    }

    #[test]
    fn oracle_on_absent_node() {
        let tree: AvlTree<TestNode> = AvlTree::new();

        assert_eq!(tree.height_of(None), -1);
        assert_eq!(tree.balance_of(None), 0);
        assert_eq!(tree.height(), -1);
    }

    #[test]
    fn oracle_on_small_tree() {
        let tree = tree_of(&[2, 1]);
        let root = tree.root;

        assert_eq!(tree.height_of(root), 1);
        assert_eq!(tree.balance_of(root), 1);

        let left = unsafe { tree.links(root.unwrap()).left() };
        assert_eq!(tree.height_of(left), 0);
        assert_eq!(tree.balance_of(left), 0);
    }

    #[test]
    fn insert_rotate_left_left() {
        let tree = tree_of(&[30, 20, 10]);

        assert_eq!(top(&tree), (20, Some(10), Some(30)));
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn insert_rotate_right_right() {
        let tree = tree_of(&[10, 20, 30]);

        assert_eq!(top(&tree), (20, Some(10), Some(30)));
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn insert_rotate_left_right() {
        let tree = tree_of(&[30, 10, 20]);

        assert_eq!(top(&tree), (20, Some(10), Some(30)));
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn insert_rotate_right_left() {
        let tree = tree_of(&[10, 30, 20]);

        assert_eq!(top(&tree), (20, Some(10), Some(30)));
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn insert_rotation_below_root() {
        // 4 -> 5 -> 6 goes right-right below the root 2.
        let tree = tree_of(&[2, 1, 4, 5, 6]);

        assert_eq!(top(&tree), (2, Some(1), Some(5)));
        assert_eq!(keys(&tree), vec![1, 2, 4, 5, 6]);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn remove_rotate_right_right() {
        let mut tree = tree_of(&[2, 1, 3, 4]);

        assert!(tree.remove(&1).is_ok());
        tree.assert_invariants();

        assert_eq!(top(&tree), (3, Some(2), Some(4)));
    }

    #[test]
    fn remove_rotate_with_balanced_child() {
        // The right child of the root is balanced after removing 1, which calls for a single
        // rotation.
        let mut tree = tree_of(&[2, 1, 4, 3, 5]);

        assert!(tree.remove(&1).is_ok());
        tree.assert_invariants();

        assert_eq!(top(&tree), (4, Some(2), Some(5)));
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn remove_rotate_right_left() {
        let mut tree = tree_of(&[2, 1, 4, 3]);

        assert!(tree.remove(&1).is_ok());
        tree.assert_invariants();

        assert_eq!(top(&tree), (3, Some(2), Some(4)));
    }

    #[test]
    fn remove_rotate_left_right() {
        let mut tree = tree_of(&[3, 1, 4, 2]);

        assert!(tree.remove(&4).is_ok());
        tree.assert_invariants();

        assert_eq!(top(&tree), (2, Some(1), Some(3)));
    }

    #[test]
    fn remove_rotates_at_root() {
        let mut tree = tree_of(&[5, 3, 7, 2, 4, 6, 1]);
        assert_eq!(tree.height(), 3);

        // Leaves the root left-heavy by two.
        assert!(tree.remove(&6).is_ok());
        tree.assert_invariants();
        assert_eq!(top(&tree), (3, Some(2), Some(5)));

        assert!(tree.remove(&7).is_ok());
        tree.assert_invariants();

        assert_eq!(keys(&tree), vec![1, 2, 3, 4, 5]);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn remove_rebalances_every_ancestor() {
        // A Fibonacci tree of height 4, inserted level by level so no rotation happens while
        // building it:
        //
        //            8
        //        5       11
        //      3   7   10  12
        //     2 4 6   9
        //    1
        let mut tree = tree_of(&[8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
        assert_eq!(tree.height(), 4);
        assert_eq!(top(&tree), (8, Some(5), Some(11)));

        // Rotates at 11, which shrinks the right subtree and then rotates at the root.
        assert!(tree.remove(&12).is_ok());
        tree.assert_invariants();

        assert_eq!(top(&tree), (5, Some(3), Some(8)));
        assert_eq!(tree.height(), 3);
        assert_eq!(keys(&tree), (1..=11).collect::<Vec<_>>());
    }
}
