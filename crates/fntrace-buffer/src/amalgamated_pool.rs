//! Reserved + Dynamic composed under a common interface, reserved-preferred. §4.4.

use crate::dynamic_pool::DynamicBufferSlicePool;
use crate::error::{BorrowError, NotOwnedByThisPool};
use crate::pool::{Lease, Pool, PoolId};
use crate::reserved_pool::ReservedBufferSlicePool;

pub struct AmalgamatedPool {
    id: PoolId,
    reserved: ReservedBufferSlicePool,
    dynamic: DynamicBufferSlicePool,
}

impl AmalgamatedPool {
    #[must_use]
    pub fn new(reserved: ReservedBufferSlicePool, dynamic: DynamicBufferSlicePool) -> Self {
        Self {
            id: PoolId::next(),
            reserved,
            dynamic,
        }
    }

    /// Returns each lease in `leases` to whichever of this pool's two children owns it, and
    /// yields the un-routable remainder for the caller to dispose or route elsewhere.
    #[must_use]
    pub fn return_all(&self, leases: Vec<Lease>) -> Vec<Lease> {
        leases
            .into_iter()
            .filter_map(|lease| self.return_slice(lease).err().map(|e| e.0))
            .collect()
    }
}

impl Pool for AmalgamatedPool {
    fn id(&self) -> PoolId {
        self.id
    }

    fn borrow(&self, preferred_capacity: usize) -> Result<Lease, BorrowError> {
        match self.reserved.borrow(preferred_capacity) {
            Ok(lease) => Ok(lease),
            Err(BorrowError::NoSlicesAvailable) => self.dynamic.borrow(preferred_capacity),
            Err(other) => Err(other),
        }
    }

    fn return_slice(&self, lease: Lease) -> Result<(), NotOwnedByThisPool<Lease>> {
        let lease = match self.reserved.return_slice(lease) {
            Ok(()) => return Ok(()),
            Err(NotOwnedByThisPool(lease)) => lease,
        };
        self.dynamic.return_slice(lease)
    }
}
