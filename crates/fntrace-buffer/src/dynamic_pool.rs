//! A pool that heap-allocates per borrow, within a global budget. §4.3.

use crate::error::{BorrowError, NotOwnedByThisPool};
use crate::invariants::debug_assert_within_budget;
use crate::pool::{Lease, Pool, PoolId};
use crate::slice::OwnedSlice;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct DynamicBufferSlicePool {
    id: PoolId,
    max_slice_capacity: usize,
    capacity: usize,
    borrow_cas_attempts: usize,
    borrowed_items_size: AtomicUsize,
}

impl DynamicBufferSlicePool {
    #[must_use]
    pub fn new(max_slice_capacity: usize, capacity: usize, borrow_cas_attempts: usize) -> Self {
        Self {
            id: PoolId::next(),
            max_slice_capacity,
            capacity,
            borrow_cas_attempts,
            borrowed_items_size: AtomicUsize::new(0),
        }
    }

    /// Events currently lent out.
    #[must_use]
    pub fn size(&self) -> usize {
        self.borrowed_items_size.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Pool for DynamicBufferSlicePool {
    fn id(&self) -> PoolId {
        self.id
    }

    fn borrow(&self, preferred_capacity: usize) -> Result<Lease, BorrowError> {
        for _ in 0..self.borrow_cas_attempts {
            let snapshot = self.borrowed_items_size.load(Ordering::Acquire);
            let remaining = self.capacity.saturating_sub(snapshot);
            let buffer_size = preferred_capacity
                .min(self.max_slice_capacity)
                .min(self.capacity)
                .min(remaining);

            if self
                .borrowed_items_size
                .compare_exchange(
                    snapshot,
                    snapshot + buffer_size,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                continue;
            }

            debug_assert_within_budget!(snapshot + buffer_size, self.capacity);

            if buffer_size < 1 {
                return Err(BorrowError::NoSlicesAvailable);
            }
            return Ok(Lease::Dynamic {
                slice: OwnedSlice::with_capacity(buffer_size),
                owner: self.id,
                capacity: buffer_size,
            });
        }
        Err(BorrowError::CasAttemptsExhausted)
    }

    fn return_slice(&self, lease: Lease) -> Result<(), NotOwnedByThisPool<Lease>> {
        match lease {
            Lease::Dynamic {
                slice,
                owner,
                capacity,
            } if owner == self.id => {
                drop(slice);
                self.borrowed_items_size.fetch_sub(capacity, Ordering::AcqRel);
                Ok(())
            }
            other => Err(NotOwnedByThisPool(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrow_never_exceeds_capacity() {
        let pool = DynamicBufferSlicePool::new(4, 10, 8);
        let a = pool.borrow(6).unwrap();
        assert_eq!(a.capacity(), 4); // capped by max_slice_capacity
        let b = pool.borrow(6).unwrap();
        assert_eq!(b.capacity(), 4);
        assert_eq!(pool.size(), 8);
        let c = pool.borrow(6).unwrap();
        assert_eq!(c.capacity(), 2); // capped by remaining budget
        assert_eq!(pool.size(), 10);
    }

    #[test]
    fn exhausted_budget_yields_no_slices_available() {
        let pool = DynamicBufferSlicePool::new(4, 4, 8);
        let _lease = pool.borrow(4).unwrap();
        assert_eq!(pool.borrow(4).unwrap_err(), BorrowError::NoSlicesAvailable);
    }

    #[test]
    fn returning_releases_budget() {
        let pool = DynamicBufferSlicePool::new(4, 4, 8);
        let lease = pool.borrow(4).unwrap();
        pool.return_slice(lease).unwrap();
        assert_eq!(pool.size(), 0);
        assert!(pool.borrow(4).is_ok());
    }

    #[test]
    fn concurrent_borrowers_never_overshoot_budget() {
        use std::sync::Arc;
        let pool = Arc::new(DynamicBufferSlicePool::new(1, 64, 64));
        let handles: Vec<_> = (0..128)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.borrow(1))
            })
            .collect();
        let leases: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter_map(Result::ok)
            .collect();
        let total: usize = leases.iter().map(Lease::capacity).sum();
        assert!(total <= 64);
        assert_eq!(pool.size(), total);
    }
}
