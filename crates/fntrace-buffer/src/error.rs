use thiserror::Error;

/// Errors a pool can return from `borrow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BorrowError {
    /// Steady state: the pool has nothing left to lend right now.
    #[error("no slices available")]
    NoSlicesAvailable,
    /// Transient contention: every bounded CAS attempt lost the race.
    #[error("CAS attempts exhausted under contention")]
    CasAttemptsExhausted,
}

/// Returned by `Pool::return_slice` when the lease was not originally lent by that pool.
///
/// This is not propagated as a `std::error::Error` — it is a routing signal, not a failure:
/// the caller is expected to hand the wrapped lease to whichever pool actually owns it.
#[derive(Debug)]
pub struct NotOwnedByThisPool<T>(pub T);
