//! A pool carved once from a contiguous arena; lends views into that arena. §4.2.

use crate::error::{BorrowError, NotOwnedByThisPool};
use crate::event::{Event, EMPTY_EVENT};
use crate::invariants::{debug_assert_all_returned, debug_assert_was_free};
use crate::pool::{Lease, Pool, PoolId};
use crate::slice::{Slice, SliceStorage};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct Arena {
    events: UnsafeCell<Box<[Event]>>,
    slice_offsets: Box<[usize]>,
    slice_capacities: Box<[usize]>,
    borrowed: Box<[AtomicBool]>,
    size: AtomicUsize,
}

// SAFETY: each `ReservedStorage` only ever touches the sub-range `[offset, offset+len)` it was
// handed at borrow time, and the reserved pool's CAS borrow protocol guarantees that range is
// never concurrently handed out twice (invariant R1). Disjoint-range access from multiple
// threads is therefore race-free even though the storage itself uses `UnsafeCell`.
unsafe impl Sync for Arena {}
unsafe impl Send for Arena {}

/// Backing storage for a slice lent by the [`ReservedBufferSlicePool`]: a view into the pool's
/// shared arena, kept alive by the `Arc` rather than by a borrow-checked lifetime.
pub struct ReservedStorage {
    arena: Arc<Arena>,
    offset: usize,
    len: usize,
}

impl AsRef<[Event]> for ReservedStorage {
    fn as_ref(&self) -> &[Event] {
        // SAFETY: see `Arena`'s `unsafe impl Sync` above.
        let base = unsafe { (*self.arena.events.get()).as_ptr() };
        unsafe { std::slice::from_raw_parts(base.add(self.offset), self.len) }
    }
}

impl AsMut<[Event]> for ReservedStorage {
    fn as_mut(&mut self) -> &mut [Event] {
        // SAFETY: see `Arena`'s `unsafe impl Sync` above.
        let base = unsafe { (*self.arena.events.get()).as_mut_ptr() };
        unsafe { std::slice::from_raw_parts_mut(base.add(self.offset), self.len) }
    }
}

impl SliceStorage for ReservedStorage {}

pub type ReservedSlice = Slice<ReservedStorage>;

/// A pool carved once, at construction, into `ceil(capacity / max_slice_capacity)` unowned
/// slices. Borrowing is a bounded linear scan with a CAS per candidate slot (invariants R1/R2).
pub struct ReservedBufferSlicePool {
    id: PoolId,
    arena: Arc<Arena>,
}

impl ReservedBufferSlicePool {
    #[must_use]
    pub fn new(max_slice_capacity: usize, capacity: usize) -> Self {
        let events = vec![EMPTY_EVENT; capacity].into_boxed_slice();
        let slice_count = if max_slice_capacity == 0 || capacity == 0 {
            usize::from(capacity > 0)
        } else {
            capacity.div_ceil(max_slice_capacity)
        };

        let mut slice_offsets = Vec::with_capacity(slice_count);
        let mut slice_capacities = Vec::with_capacity(slice_count);
        let mut offset = 0;
        let mut remaining = capacity;
        for _ in 0..slice_count {
            let this_capacity = if max_slice_capacity == 0 {
                remaining
            } else {
                remaining.min(max_slice_capacity)
            };
            slice_offsets.push(offset);
            slice_capacities.push(this_capacity);
            offset += this_capacity;
            remaining -= this_capacity;
        }

        let borrowed = (0..slice_count)
            .map(|_| AtomicBool::new(false))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            id: PoolId::next(),
            arena: Arc::new(Arena {
                events: UnsafeCell::new(events),
                slice_offsets: slice_offsets.into_boxed_slice(),
                slice_capacities: slice_capacities.into_boxed_slice(),
                borrowed,
                size: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn slice_count(&self) -> usize {
        self.arena.borrowed.len()
    }

    /// Events currently lent out across all borrowed slices.
    #[must_use]
    pub fn size(&self) -> usize {
        self.arena.size.load(Ordering::Acquire)
    }
}

impl Pool for ReservedBufferSlicePool {
    fn id(&self) -> PoolId {
        self.id
    }

    fn borrow(&self, _preferred_capacity: usize) -> Result<Lease, BorrowError> {
        for index in 0..self.arena.borrowed.len() {
            let was_borrowed = self.arena.borrowed[index]
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err();
            if was_borrowed {
                continue;
            }
            debug_assert_was_free!(false, index);
            let len = self.arena.slice_capacities[index];
            self.arena.size.fetch_add(len, Ordering::AcqRel);
            let storage = ReservedStorage {
                arena: Arc::clone(&self.arena),
                offset: self.arena.slice_offsets[index],
                len,
            };
            return Ok(Lease::Reserved {
                slice: Slice::new(storage),
                owner: self.id,
                index,
            });
        }
        Err(BorrowError::NoSlicesAvailable)
    }

    fn return_slice(&self, lease: Lease) -> Result<(), NotOwnedByThisPool<Lease>> {
        match lease {
            Lease::Reserved { slice, owner, index } if owner == self.id => {
                let len = slice.capacity();
                drop(slice);
                self.arena.borrowed[index].store(false, Ordering::Release);
                self.arena.size.fetch_sub(len, Ordering::AcqRel);
                Ok(())
            }
            other => Err(NotOwnedByThisPool(other)),
        }
    }
}

impl Drop for ReservedBufferSlicePool {
    fn drop(&mut self) {
        debug_assert_all_returned!(self.arena.size.load(Ordering::Acquire));
    }
}
