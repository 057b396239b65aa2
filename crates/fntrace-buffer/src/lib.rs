//! Lock-free buffer-slice pools and a sliced circular buffer.
//!
//! Three pool implementations lend fixed-size [`Lease`]s of [`Event`] storage: a
//! [`reserved_pool::ReservedBufferSlicePool`] carved once from a pre-allocated arena, a
//! [`dynamic_pool::DynamicBufferSlicePool`] that heap-allocates within a budget, and an
//! [`amalgamated_pool::AmalgamatedPool`] that prefers the former and falls back to the latter.
//! [`circular_buffer::CircularSliceBuffer`] presents a logical ring of events spanning however
//! many slices it has lazily acquired from one of these pools.

mod amalgamated_pool;
mod circular_buffer;
mod dynamic_pool;
mod error;
mod event;
mod invariants;
mod pool;
mod reserved_pool;
mod slice;

pub use amalgamated_pool::AmalgamatedPool;
pub use circular_buffer::CircularSliceBuffer;
pub use dynamic_pool::DynamicBufferSlicePool;
pub use error::{BorrowError, NotOwnedByThisPool};
pub use event::{Event, EventType, EMPTY_EVENT};
pub use pool::{Lease, Pool, PoolId};
pub use reserved_pool::{ReservedBufferSlicePool, ReservedSlice};
pub use slice::{Chunk, OwnedSlice, Slice, SliceChunks, SliceStorage, UnownedSlice};
