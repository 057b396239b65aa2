//! Per-thread collector around one circular slice buffer. §4.6.
//!
//! A logger's state lives behind `Arc<Mutex<..>>`, shared with the runtime manager's registry,
//! rather than behind a raw thread-local: `SetPool` is driven by the manager, which runs on
//! whatever thread calls `Initialize`/`Deinitialize`, not the logger's owning thread. The buffer
//! and its control state (pool, capacity) are two separate `std::sync::Mutex`es so no guard is
//! ever held across the `.await` in `set_pool`/`flush`.

use fntrace_buffer::{CircularSliceBuffer, Event, Pool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::flush_queue::FlushQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoggerId(u64);

impl LoggerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

struct Control {
    pool: Option<Arc<dyn Pool + Send + Sync>>,
    preferred_capacity: usize,
    flush_buffer_when_full: bool,
}

impl LoggerShared {
    /// Directly attaches a pool to a brand-new logger (no existing buffer to flush first).
    /// Used by the runtime manager when creating a logger under an already-initialized pool, a
    /// synchronous path that avoids requiring an async context on the hot `LogEvent` path.
    pub(crate) fn attach_fresh_pool(&self, pool: Arc<dyn Pool + Send + Sync>) {
        debug_assert!(self.buffer.lock().unwrap().is_none(), "attach_fresh_pool called on a logger with an existing buffer");
        let preferred_capacity = {
            let mut control = self.control.lock().unwrap();
            control.pool = Some(Arc::clone(&pool));
            control.preferred_capacity
        };
        *self.buffer.lock().unwrap() = Some(CircularSliceBuffer::new(pool, preferred_capacity));
    }
}

pub(crate) struct LoggerShared {
    control: Mutex<Control>,
    buffer: Mutex<Option<CircularSliceBuffer>>,
    flush_queue: Arc<FlushQueue>,
    thread_id: u64,
}

impl LoggerShared {
    /// `SetPool(pool)`: a `None` pool flushes-and-detaches; `Some` pool (re)builds a fresh
    /// buffer with the logger's configured preferred capacity.
    pub(crate) async fn set_pool(&self, pool: Option<Arc<dyn Pool + Send + Sync>>) {
        let previous = self.buffer.lock().unwrap().take();
        if let Some(buffer) = previous {
            if buffer.size() > 0 {
                self.flush_queue.enqueue(buffer, self.thread_id).await;
            }
        }

        let preferred_capacity = {
            let mut control = self.control.lock().unwrap();
            control.pool = pool.clone();
            control.preferred_capacity
        };
        let fresh = pool.map(|p| CircularSliceBuffer::new(p, preferred_capacity));
        *self.buffer.lock().unwrap() = fresh;
    }

    /// Returns `true` if the buffer just became full and `flush_buffer_when_full` is set.
    fn log_event(&self, event: Event) -> bool {
        let mut buffer = self.buffer.lock().unwrap();
        let Some(buffer) = buffer.as_mut() else {
            return false;
        };
        buffer.push(event);
        self.control.lock().unwrap().flush_buffer_when_full && buffer.full()
    }

    /// Swaps out the current buffer for a fresh one and enqueues the old one if non-empty.
    async fn flush(&self) {
        let swapped = {
            let control = self.control.lock().unwrap();
            let Some(pool) = control.pool.clone() else { return };
            let preferred_capacity = control.preferred_capacity;
            drop(control);

            let mut buffer = self.buffer.lock().unwrap();
            let Some(current) = buffer.as_mut() else { return };
            if current.size() == 0 {
                return;
            }
            Some(std::mem::replace(current, CircularSliceBuffer::new(pool, preferred_capacity)))
        };
        if let Some(full_buffer) = swapped {
            self.flush_queue.enqueue(full_buffer, self.thread_id).await;
        }
    }

    fn clear(&self) {
        if let Some(buffer) = self.buffer.lock().unwrap().as_mut() {
            buffer.clear();
        }
    }
}

/// The per-thread front end. Constructed by the runtime manager's thread-local accessor.
pub struct EventLogger {
    id: LoggerId,
    shared: Arc<LoggerShared>,
    on_drop_unsubscribe: Option<Arc<dyn Fn(LoggerId) + Send + Sync>>,
}

impl EventLogger {
    pub(crate) fn new(
        flush_queue: Arc<FlushQueue>,
        preferred_capacity: usize,
        flush_buffer_when_full: bool,
        thread_id: u64,
    ) -> (Self, Arc<LoggerShared>) {
        let shared = Arc::new(LoggerShared {
            control: Mutex::new(Control {
                pool: None,
                preferred_capacity,
                flush_buffer_when_full,
            }),
            buffer: Mutex::new(None),
            flush_queue,
            thread_id,
        });
        let logger = Self {
            id: LoggerId::next(),
            shared: Arc::clone(&shared),
            on_drop_unsubscribe: None,
        };
        (logger, shared)
    }

    /// Registers a callback invoked (with this logger's id) on drop, used by the runtime
    /// manager to remove the logger from its registry without the logger holding a back-reference
    /// to the manager.
    pub(crate) fn with_unsubscribe_hook(mut self, hook: Arc<dyn Fn(LoggerId) + Send + Sync>) -> Self {
        self.on_drop_unsubscribe = Some(hook);
        self
    }

    #[must_use]
    pub fn id(&self) -> LoggerId {
        self.id
    }

    /// Pushes `event`. Dropped if the logger is unbound (no pool) or has no active buffer.
    /// Flushes immediately if `flush_buffer_when_full` and the push just filled the buffer.
    pub fn log_event(&self, event: Event) {
        if self.shared.log_event(event) {
            // Hand the async enqueue off to the ambient runtime: `log_event` is a synchronous
            // hot-path call reachable from threads with no Tokio context, so this must not
            // panic when there is none to hand off to.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let shared = Arc::clone(&self.shared);
                handle.spawn(async move { shared.flush().await });
            }
        }
    }

    /// Moves the current buffer onto the flush queue and allocates a fresh one. No-op if the
    /// buffer is absent or empty.
    pub async fn flush(&self) {
        self.shared.flush().await;
    }

    /// Clears the current buffer without enqueuing it.
    pub fn clear(&self) {
        self.shared.clear();
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        // Drop cannot `.await`; flushing a non-empty buffer and unsubscribing are both
        // best-effort, run on the ambient runtime if one is attached to this thread.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            handle.spawn(async move { shared.flush().await });
        }
        if let Some(hook) = &self.on_drop_unsubscribe {
            hook(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::flush_queue::FlushQueueConfig;
    use crate::writer::FileTraceWriter;
    use fntrace_buffer::{AmalgamatedPool, DynamicBufferSlicePool, EventType, ReservedBufferSlicePool};
    use std::time::Duration;

    fn pool() -> Arc<dyn Pool + Send + Sync> {
        Arc::new(AmalgamatedPool::new(
            ReservedBufferSlicePool::new(4, 4),
            DynamicBufferSlicePool::new(4, 4, 4),
        ))
    }

    fn flush_queue() -> Arc<FlushQueue> {
        let clock = Arc::new(ManualClock::new(0));
        FlushQueue::new(
            FlushQueueConfig {
                trace_file_directory: std::env::temp_dir(),
                retention_duration: Duration::from_secs(3600),
                session_id: 1,
                process_id: 1,
                max_buffer_flush_attempts: 3,
                flush_all_events: true,
            },
            clock.clone(),
            clock,
            Arc::new(FileTraceWriter),
        )
    }

    #[tokio::test]
    async fn events_dropped_before_pool_is_set() {
        let (logger, shared) = EventLogger::new(flush_queue(), 4, false, 1);
        logger.log_event(Event::new(0, EventType::FunctionEntry, 1, 0));
        assert!(shared.buffer.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn set_pool_builds_a_fresh_buffer_and_accepts_events() {
        let (logger, shared) = EventLogger::new(flush_queue(), 4, false, 1);
        shared.set_pool(Some(pool())).await;
        logger.log_event(Event::new(0, EventType::FunctionEntry, 7, 0));
        assert_eq!(shared.buffer.lock().unwrap().as_ref().unwrap().size(), 1);
    }

    #[tokio::test]
    async fn flush_moves_buffer_and_leaves_a_fresh_empty_one() {
        let (logger, shared) = EventLogger::new(flush_queue(), 4, false, 1);
        shared.set_pool(Some(pool())).await;
        logger.log_event(Event::new(0, EventType::FunctionEntry, 1, 0));
        logger.flush().await;
        assert_eq!(shared.buffer.lock().unwrap().as_ref().unwrap().size(), 0);
    }

    #[tokio::test]
    async fn clear_empties_buffer_without_enqueuing() {
        let (logger, shared) = EventLogger::new(flush_queue(), 4, false, 1);
        shared.set_pool(Some(pool())).await;
        logger.log_event(Event::new(0, EventType::FunctionEntry, 1, 0));
        logger.clear();
        assert_eq!(shared.buffer.lock().unwrap().as_ref().unwrap().size(), 0);
    }
}
