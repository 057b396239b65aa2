//! Property-based tests for the slice, pool, and circular-buffer invariants (S1/S2, D1, C1).
//!
//! Coverage:
//! - `Slice<Box<[Event]>>`: bounded size and wrap tracking under arbitrary push sequences.
//! - `DynamicBufferSlicePool`: borrowed budget never exceeds capacity.
//! - `CircularSliceBuffer`: logical size never exceeds acquired capacity, and the buffer always
//!   retains exactly the last `min(pushes, capacity)` events in order (Testable Property 1).

use fntrace_buffer::{
    AmalgamatedPool, CircularSliceBuffer, DynamicBufferSlicePool, Event, EventType, OwnedSlice,
    Pool, ReservedBufferSlicePool,
};
use proptest::prelude::*;
use std::sync::Arc;

fn entry(id: u64) -> Event {
    Event::new(0, EventType::FunctionEntry, id, 0)
}

fn read_buffer(buf: &CircularSliceBuffer) -> Vec<u64> {
    buf.contiguous_memory_chunks()
        .into_iter()
        .flat_map(|c| c.iter().map(|e| e.payload_1))
        .collect()
}

proptest! {
    /// S1: `size <= capacity` holds for a `Slice` after any sequence of pushes.
    #[test]
    fn prop_slice_bounded_count(capacity in 1usize..32, pushes in 0usize..200) {
        let mut slice = OwnedSlice::with_capacity(capacity);
        for i in 0..pushes {
            slice.push(entry(i as u64));
        }
        prop_assert!(slice.size() <= capacity);
    }

    /// S1: once `pushes >= capacity`, the slice holds exactly the last `capacity` values in order.
    #[test]
    fn prop_slice_retains_last_capacity_pushes(capacity in 1usize..16, extra in 0usize..50) {
        let pushes = capacity + extra;
        let mut slice = OwnedSlice::with_capacity(capacity);
        for i in 0..pushes {
            slice.push(entry(i as u64));
        }
        let got: Vec<u64> = slice
            .contiguous_memory_chunks()
            .iter()
            .flat_map(|c| c.iter().map(|e| e.payload_1))
            .collect();
        let expected: Vec<u64> = ((pushes - capacity) as u64..pushes as u64).collect();
        prop_assert_eq!(got, expected);
    }

    /// D1: a dynamic pool never lends more than its configured capacity, single-threaded.
    #[test]
    fn prop_dynamic_pool_never_overshoots_budget(
        capacity in 1usize..64,
        max_slice in 1usize..16,
        requests in prop::collection::vec(1usize..32, 0..30),
    ) {
        let pool = DynamicBufferSlicePool::new(max_slice, capacity, 8);
        let mut leases = Vec::new();
        for request in requests {
            if let Ok(lease) = pool.borrow(request) {
                leases.push(lease);
            }
            prop_assert!(pool.size() <= capacity);
        }
        for lease in leases {
            pool.return_slice(lease).unwrap();
        }
        prop_assert_eq!(pool.size(), 0);
    }

    /// C1 / Testable Property 1: a circular slice buffer backed by a single reserved slice
    /// retains exactly the last `min(pushes, capacity)` events in push order.
    #[test]
    fn prop_circular_buffer_preserves_last_k(capacity in 1usize..16, extra in 0usize..40) {
        let pool: Arc<dyn Pool + Send + Sync> = Arc::new(AmalgamatedPool::new(
            ReservedBufferSlicePool::new(capacity, capacity),
            DynamicBufferSlicePool::new(capacity, 0, 8),
        ));
        let mut buf = CircularSliceBuffer::new(pool, capacity);
        let pushes = capacity + extra;
        for i in 0..pushes {
            buf.push(entry(i as u64));
        }
        prop_assert!(buf.size() <= capacity);
        let got = read_buffer(&buf);
        let expected: Vec<u64> = ((pushes - capacity) as u64..pushes as u64).collect();
        prop_assert_eq!(got, expected);
    }
}
