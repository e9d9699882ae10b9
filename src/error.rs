//! Errors reported by [`BalancedTree`](crate::BalancedTree).

/// The ways an insert or removal can be refused.
///
/// Neither is a fault: the tree is left exactly as it was.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The key was already present when inserting.
    #[error("key {0} is already in the tree")]
    DuplicateKey(i32),

    /// The key was absent when removing.
    #[error("key {0} is not in the tree")]
    KeyNotFound(i32),
}

impl Error {
    /// Returns the key the operation was attempted with.
    pub fn key(&self) -> i32 {
        match *self {
            Error::DuplicateKey(key) | Error::KeyNotFound(key) => key,
        }
    }
}
