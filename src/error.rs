use thiserror::Error;

/// The value being inserted compares equal to one already in the tree.
///
/// The rejected handle (or value, for [`AvlSet`](crate::AvlSet)) is handed back unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("value already present in tree")]
pub struct DuplicateValue<H>(pub H);

impl<H> DuplicateValue<H> {
    /// Returns the rejected item.
    pub fn into_inner(self) -> H {
        self.0
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("value not found in tree")]
pub struct NotFound;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("tree is empty")]
pub struct EmptyTree;
