use crate::error::{BorrowError, NotOwnedByThisPool};
use crate::reserved_pool::ReservedSlice;
use crate::slice::{OwnedSlice, SliceChunks};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a pool instance so a [`Lease`] can be routed back to whichever pool lent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A slice lent out by a pool, tagged with enough information to route it back on return.
///
/// This is the "tagged sum variant implementing a common slice capability" the heterogeneous
/// reserved/dynamic slice types are modeled as: the reserved pool lends a view into its arena,
/// the dynamic pool lends a heap-allocated buffer, and callers (the circular slice buffer, the
/// flush queue) treat both uniformly through this type.
pub enum Lease {
    Reserved {
        slice: ReservedSlice,
        owner: PoolId,
        index: usize,
    },
    Dynamic {
        slice: OwnedSlice,
        owner: PoolId,
        capacity: usize,
    },
}

impl Lease {
    #[must_use]
    pub fn owner(&self) -> PoolId {
        match self {
            Self::Reserved { owner, .. } | Self::Dynamic { owner, .. } => *owner,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        match self {
            Self::Reserved { slice, .. } => slice.capacity(),
            Self::Dynamic { slice, .. } => slice.capacity(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Reserved { slice, .. } => slice.size(),
            Self::Dynamic { slice, .. } => slice.size(),
        }
    }

    #[must_use]
    pub fn empty(&self) -> bool {
        match self {
            Self::Reserved { slice, .. } => slice.empty(),
            Self::Dynamic { slice, .. } => slice.empty(),
        }
    }

    #[must_use]
    pub fn full(&self) -> bool {
        match self {
            Self::Reserved { slice, .. } => slice.full(),
            Self::Dynamic { slice, .. } => slice.full(),
        }
    }

    #[must_use]
    pub fn will_wrap_on_next_push(&self) -> bool {
        match self {
            Self::Reserved { slice, .. } => slice.will_wrap_on_next_push(),
            Self::Dynamic { slice, .. } => slice.will_wrap_on_next_push(),
        }
    }

    pub fn push(&mut self, event: crate::event::Event) {
        match self {
            Self::Reserved { slice, .. } => slice.push(event),
            Self::Dynamic { slice, .. } => slice.push(event),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Self::Reserved { slice, .. } => slice.clear(),
            Self::Dynamic { slice, .. } => slice.clear(),
        }
    }

    #[must_use]
    pub fn contiguous_memory_chunks(&self) -> SliceChunks<'_> {
        match self {
            Self::Reserved { slice, .. } => slice.contiguous_memory_chunks(),
            Self::Dynamic { slice, .. } => slice.contiguous_memory_chunks(),
        }
    }
}

/// A lender of fixed-size [`Lease`]s. Implemented by the reserved pool, the dynamic pool, and
/// their [`crate::amalgamated_pool::AmalgamatedPool`] composition.
pub trait Pool {
    fn id(&self) -> PoolId;

    /// Borrows a slice. `preferred_capacity` is a hint; some pools (the reserved pool) ignore it.
    fn borrow(&self, preferred_capacity: usize) -> Result<Lease, BorrowError>;

    /// Returns a previously borrowed slice. Fails if this pool did not lend it, handing the
    /// lease back to the caller so it can be routed to the correct owner.
    fn return_slice(&self, lease: Lease) -> Result<(), NotOwnedByThisPool<Lease>>;
}
