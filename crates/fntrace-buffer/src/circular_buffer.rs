//! A logical ring spanning multiple borrowed slices. §4.5.

use crate::event::Event;
use crate::invariants::debug_assert_buffer_bounded;
use crate::pool::{Lease, Pool};
use std::sync::Arc;

/// An ordered list of borrowed slices presented as one logical ring of capacity `capacity`.
///
/// Not `Clone`/`Copy` (invariant C3): moving a `CircularSliceBuffer` transfers ownership of its
/// borrows via ordinary Rust move semantics: no explicit code is needed beyond omitting those
/// derives.
pub struct CircularSliceBuffer {
    pool: Arc<dyn Pool + Send + Sync>,
    capacity: usize,
    slices: Vec<Lease>,
    acquired_slices_capacity: usize,
    insertion_cursor: usize,
    size: usize,
}

impl CircularSliceBuffer {
    #[must_use]
    pub fn new(pool: Arc<dyn Pool + Send + Sync>, capacity: usize) -> Self {
        Self {
            pool,
            capacity,
            slices: Vec::new(),
            acquired_slices_capacity: 0,
            insertion_cursor: 0,
            size: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn full(&self) -> bool {
        self.size >= self.capacity
    }

    /// Pushes an event. Never fails; overwrites the logically oldest event once the buffer's
    /// acquired capacity is exhausted and the pool has nothing further to lend.
    pub fn push(&mut self, event: Event) {
        if self.capacity == 0 {
            return;
        }

        if let Some(current) = self.slices.get(self.insertion_cursor) {
            if current.will_wrap_on_next_push() {
                self.insertion_cursor += 1;
            }
        }

        if self.insertion_cursor >= self.slices.len() {
            if self.acquired_slices_capacity >= self.capacity {
                self.insertion_cursor = 0;
            } else {
                let preferred = self.capacity - self.size;
                match self.pool.borrow(preferred) {
                    Ok(lease) => {
                        self.acquired_slices_capacity += lease.capacity();
                        self.slices.push(lease);
                        self.insertion_cursor = self.slices.len() - 1;
                    }
                    Err(_) => {
                        self.insertion_cursor = 0;
                    }
                }
            }
        }

        if let Some(slice) = self.slices.get_mut(self.insertion_cursor) {
            slice.push(event);
            self.size = (self.size + 1).min(self.acquired_slices_capacity);
            debug_assert_buffer_bounded!(self.size, self.acquired_slices_capacity);
        }
    }

    /// The logically-ordered sequence of spans, oldest to newest. See §4.5 for the exact
    /// ordering derivation around the insertion cursor.
    #[must_use]
    pub fn contiguous_memory_chunks(&self) -> Vec<&[Event]> {
        if self.slices.is_empty() {
            return Vec::new();
        }
        let idx = self.insertion_cursor.min(self.slices.len() - 1);
        let current_chunks = self.slices[idx].contiguous_memory_chunks();
        let mut parts: Vec<&[Event]> = current_chunks.iter().collect();
        let (before_cursor_wrap, after_cursor_wrap) = if parts.len() == 2 {
            let after = parts.remove(1);
            let before = parts.remove(0);
            (Some(before), Some(after))
        } else {
            (None, parts.pop())
        };

        let mut out = Vec::new();
        if let Some(chunk) = before_cursor_wrap {
            out.push(chunk);
        }
        for slice in &self.slices[idx + 1..] {
            out.extend(slice.contiguous_memory_chunks().iter());
        }
        for slice in &self.slices[..idx] {
            out.extend(slice.contiguous_memory_chunks().iter());
        }
        if let Some(chunk) = after_cursor_wrap {
            out.push(chunk);
        }
        out
    }

    /// Returns every slice to the pool; resets size, cursor, and acquired capacity.
    pub fn clear(&mut self) {
        for lease in self.slices.drain(..) {
            let _ = self.pool.return_slice(lease);
        }
        self.acquired_slices_capacity = 0;
        self.insertion_cursor = 0;
        self.size = 0;
    }
}

impl Drop for CircularSliceBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amalgamated_pool::AmalgamatedPool;
    use crate::dynamic_pool::DynamicBufferSlicePool;
    use crate::event::EventType;
    use crate::reserved_pool::ReservedBufferSlicePool;

    fn entry(id: u64) -> Event {
        Event::new(0, EventType::FunctionEntry, id, 0)
    }

    fn pool(reserved_cap: usize, max_slice: usize, dynamic_cap: usize) -> Arc<dyn Pool + Send + Sync> {
        Arc::new(AmalgamatedPool::new(
            ReservedBufferSlicePool::new(max_slice, reserved_cap),
            DynamicBufferSlicePool::new(max_slice, dynamic_cap, 8),
        ))
    }

    fn read_all(buf: &CircularSliceBuffer) -> Vec<u64> {
        buf.contiguous_memory_chunks()
            .into_iter()
            .flat_map(|c| c.iter().map(|e| e.payload_1))
            .collect()
    }

    #[test]
    fn property_1_slice_ring_preserves_last_k_in_order() {
        let pool = pool(4, 4, 0);
        let mut buf = CircularSliceBuffer::new(pool, 4);
        for i in 0..10u64 {
            buf.push(entry(i));
        }
        assert_eq!(read_all(&buf), vec![6, 7, 8, 9]);
    }

    #[test]
    fn acquires_slices_lazily_up_to_capacity() {
        let pool = pool(8, 2, 0);
        let mut buf = CircularSliceBuffer::new(pool, 8);
        assert!(buf.empty());
        for i in 0..3u64 {
            buf.push(entry(i));
        }
        assert_eq!(read_all(&buf), vec![0, 1, 2]);
    }

    #[test]
    fn wraps_at_outer_capacity_once_fully_acquired() {
        // capacity 2, max_slice 2: exactly one slice acquired, so wrap is also slice-level wrap.
        let pool = pool(2, 2, 0);
        let mut buf = CircularSliceBuffer::new(pool, 2);
        for i in 1..=5u64 {
            buf.push(entry(i));
        }
        assert_eq!(read_all(&buf), vec![4, 5]);
    }

    #[test]
    fn falls_back_to_wrap_when_pool_refuses_further_loans() {
        // reserved_capacity=2, max_slice=2, dynamic_capacity=0: matches Scenario B.
        let pool = pool(2, 2, 0);
        let mut buf = CircularSliceBuffer::new(pool, 2);
        for i in 1..=5u64 {
            buf.push(entry(i));
        }
        assert_eq!(read_all(&buf), vec![4, 5]);
    }

    #[test]
    fn clear_returns_all_slices_to_pool() {
        let pool = pool(4, 4, 0);
        let raw_pool = Arc::clone(&pool);
        let mut buf = CircularSliceBuffer::new(pool, 4);
        buf.push(entry(1));
        buf.clear();
        assert!(buf.empty());
        assert!(read_all(&buf).is_empty());
        // The slice should be lendable again since it was returned.
        assert!(raw_pool.borrow(4).is_ok());
    }
}
