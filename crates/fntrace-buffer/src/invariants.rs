//! Debug-only assertion macros for the pool and buffer invariants.
//!
//! Active only under `#[cfg(debug_assertions)]`, zero overhead in release builds.

// =============================================================================
// S1/S2: Slice ring
// =============================================================================

/// `size <= capacity` always holds for a slice.
macro_rules! debug_assert_slice_bounded {
    ($size:expr, $capacity:expr) => {
        debug_assert!(
            $size <= $capacity,
            "S1 violated: slice size {} exceeds capacity {}",
            $size,
            $capacity
        )
    };
}

/// `insertion_cursor` always lies in `[0, capacity)` for a non-empty slice.
macro_rules! debug_assert_cursor_in_range {
    ($cursor:expr, $capacity:expr) => {
        debug_assert!(
            $capacity == 0 || $cursor < $capacity,
            "S2 violated: insertion cursor {} outside [0, {})",
            $cursor,
            $capacity
        )
    };
}

// =============================================================================
// R1/R3: Reserved pool
// =============================================================================

/// Every borrowed-flag index returned as lent must have been observed `false` immediately
/// before the CAS that flipped it (checked by the caller, which holds the pre-CAS snapshot).
macro_rules! debug_assert_was_free {
    ($was_borrowed:expr, $index:expr) => {
        debug_assert!(
            !$was_borrowed,
            "R1 violated: slot {} was already borrowed before CAS",
            $index
        )
    };
}

/// All slices must be returned before the reserved pool is dropped.
macro_rules! debug_assert_all_returned {
    ($outstanding:expr) => {
        debug_assert!(
            $outstanding == 0,
            "R3 violated: {} slice(s) still borrowed at pool drop",
            $outstanding
        )
    };
}

// =============================================================================
// D1: Dynamic pool budget
// =============================================================================

/// `borrowed_items_size <= capacity` always holds for a dynamic pool.
macro_rules! debug_assert_within_budget {
    ($borrowed:expr, $capacity:expr) => {
        debug_assert!(
            $borrowed <= $capacity,
            "D1 violated: borrowed {} exceeds capacity {}",
            $borrowed,
            $capacity
        )
    };
}

// =============================================================================
// C1: Circular slice buffer bounds
// =============================================================================

/// `size <= acquired_slices_capacity` always holds for a circular slice buffer.
macro_rules! debug_assert_buffer_bounded {
    ($size:expr, $acquired:expr) => {
        debug_assert!(
            $size <= $acquired,
            "C1 violated: buffer size {} exceeds acquired capacity {}",
            $size,
            $acquired
        )
    };
}

pub(crate) use debug_assert_all_returned;
pub(crate) use debug_assert_buffer_bounded;
pub(crate) use debug_assert_cursor_in_range;
pub(crate) use debug_assert_slice_bounded;
pub(crate) use debug_assert_was_free;
pub(crate) use debug_assert_within_budget;
