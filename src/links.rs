use core::{cell::UnsafeCell, marker::PhantomPinned, mem, ops::Not};

use crate::Link;

/// Intrusive links embedded in every element of an [`AvlTree`](crate::AvlTree).
///
/// Holds the child and parent pointers along with the cached height of the subtree rooted at
/// the element. None of the pointers own their target.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: i8,
    _unpin: PhantomPinned,
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    // Resets the links to the state of a freshly created leaf.
    #[inline]
    pub(crate) fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 0;
    }

    #[inline]
    pub(crate) fn height(&self) -> i8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    pub(crate) fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    pub(crate) fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    pub(crate) fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    pub(crate) fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    pub(crate) fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    pub(crate) fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    pub(crate) fn set_height(&mut self, height: i8) {
        self.inner.get_mut().height = height;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> core::fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}
