use std::collections::TryReserveError;

/// Errors reported by [`AvlSet`](crate::AvlSet) and [`WorkQueue`](crate::WorkQueue).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The key is already present; the set was not modified.
    #[error("key {0} is already present")]
    DuplicateKey(i32),
    /// The key is not present; the set was not modified.
    #[error("key {0} not found")]
    KeyNotFound(i32),
    /// Popped from an empty work queue.
    #[error("the work queue is empty")]
    EmptyQueue,
    /// Growing the work queue failed to allocate.
    #[error("failed to grow the work queue")]
    AllocationFailure(#[from] TryReserveError),
}
