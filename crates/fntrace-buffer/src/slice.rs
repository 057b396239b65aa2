//! Fixed-capacity ring of [`Event`], owned or borrowed, with no bounds-check failures on push.

use crate::event::Event;
use crate::invariants::{debug_assert_cursor_in_range, debug_assert_slice_bounded};

/// Backing storage for a [`Slice`]. Implemented for `Box<[Event]>` (owned, dynamic pool) and
/// `&mut [Event]` (unowned, reserved pool) so both share one push/wrap implementation.
pub trait SliceStorage: AsRef<[Event]> + AsMut<[Event]> {}

impl SliceStorage for Box<[Event]> {}
impl SliceStorage for &mut [Event] {}

/// One logically contiguous run of Events, oldest-to-newest within the run.
pub type Chunk<'a> = &'a [Event];

/// The result of [`Slice::contiguous_memory_chunks`]: one or two chunks, oldest to newest.
#[derive(Debug, Clone, Copy)]
pub struct SliceChunks<'a> {
    first: Chunk<'a>,
    second: Option<Chunk<'a>>,
}

impl<'a> SliceChunks<'a> {
    /// Iterates the chunks in oldest-to-newest order.
    pub fn iter(&self) -> impl Iterator<Item = Chunk<'a>> + '_ {
        std::iter::once(self.first).chain(self.second)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.first.len() + self.second.map_or(0, <[Event]>::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fixed-capacity ring of Events. See invariants S1 (bounded count, overwrite-on-full) and
/// S2 (`will_wrap_on_next_push`).
pub struct Slice<S: SliceStorage> {
    storage: S,
    size: usize,
    insertion_cursor: usize,
}

impl<S: SliceStorage> Slice<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            size: 0,
            insertion_cursor: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    #[must_use]
    pub fn full(&self) -> bool {
        self.size >= self.capacity()
    }

    /// True iff the slice has completed a full lap: it is full and its insertion cursor has
    /// wrapped back to the start, so the *next* push will overwrite the oldest element.
    #[must_use]
    pub fn will_wrap_on_next_push(&self) -> bool {
        self.capacity() == 0 || (self.full() && self.insertion_cursor == 0)
    }

    /// Pushes an event. Never fails; overwrites the oldest element once full.
    pub fn push(&mut self, event: Event) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        self.storage.as_mut()[self.insertion_cursor] = event;
        self.insertion_cursor = (self.insertion_cursor + 1) % capacity;
        self.size = (self.size + 1).min(capacity);
        debug_assert_slice_bounded!(self.size, capacity);
        debug_assert_cursor_in_range!(self.insertion_cursor, capacity);
    }

    /// Resets size and cursor to zero. Backing memory is left as-is.
    pub fn clear(&mut self) {
        self.size = 0;
        self.insertion_cursor = 0;
    }

    /// The sole read path: one or two spans enumerating the logical contents oldest-to-newest.
    #[must_use]
    pub fn contiguous_memory_chunks(&self) -> SliceChunks<'_> {
        let buf = self.storage.as_ref();
        if self.size == 0 {
            return SliceChunks {
                first: &buf[0..0],
                second: None,
            };
        }
        if self.insertion_cursor == 0 || self.insertion_cursor == self.size {
            SliceChunks {
                first: &buf[0..self.size],
                second: None,
            }
        } else {
            SliceChunks {
                first: &buf[self.insertion_cursor..],
                second: Some(&buf[..self.insertion_cursor]),
            }
        }
    }
}

/// An owned slice: allocates its own backing array, used by the dynamic pool.
pub type OwnedSlice = Slice<Box<[Event]>>;

impl OwnedSlice {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(vec![Event::new(0, crate::event::EventType::FunctionEntry, 0, 0); capacity].into_boxed_slice())
    }
}

/// An unowned slice: writes into externally owned memory, used by the reserved pool.
pub type UnownedSlice<'a> = Slice<&'a mut [Event]>;
