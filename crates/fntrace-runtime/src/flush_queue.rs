//! Background writer with retention, retry, and manual-flush barrier semantics. §4.7.

use crate::clock::{SteadyClock, SystemClock};
use crate::trace::Header;
use crate::writer::TraceWriter;
use fntrace_buffer::CircularSliceBuffer;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;

/// One buffer awaiting a write attempt.
struct FlushRecord {
    buffer: CircularSliceBuffer,
    enqueue_timestamp_ns: i64,
    thread_id: u64,
    id: u64,
    remaining_attempts: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Idle,
    Running,
    Draining,
}

type CompletionCallback = Box<dyn FnOnce() + Send>;

struct Inner {
    deque: VecDeque<FlushRecord>,
    pending_flush_ids: Option<HashSet<u64>>,
    last_manual_flush_timestamp_ns: i64,
    pending_callback: Option<CompletionCallback>,
}

/// Options controlling the flush queue's worker. Mirrors the spec's `{trace_file_directory,
/// retention_duration, trace_writer, session_id, process_id, max_buffer_flush_attempts,
/// flush_all_events}` option bag.
pub struct FlushQueueConfig {
    pub trace_file_directory: PathBuf,
    pub retention_duration: Duration,
    pub session_id: u64,
    pub process_id: i64,
    pub max_buffer_flush_attempts: i32,
    pub flush_all_events: bool,
}

/// `{Idle -> Running -> Draining -> Idle}`. `run`/`drain_and_stop` are idempotent.
pub struct FlushQueue {
    state: Mutex<QueueState>,
    inner: Mutex<Inner>,
    notify: Notify,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    config: FlushQueueConfig,
    system_clock: Arc<dyn SystemClock>,
    steady_clock: Arc<dyn SteadyClock>,
    writer: Arc<dyn TraceWriter>,
}

impl FlushQueue {
    #[must_use]
    pub fn new(
        config: FlushQueueConfig,
        system_clock: Arc<dyn SystemClock>,
        steady_clock: Arc<dyn SteadyClock>,
        writer: Arc<dyn TraceWriter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState::Idle),
            inner: Mutex::new(Inner {
                deque: VecDeque::new(),
                pending_flush_ids: None,
                last_manual_flush_timestamp_ns: i64::MIN,
                pending_callback: None,
            }),
            notify: Notify::new(),
            next_id: AtomicU64::new(0),
            worker: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
            config,
            system_clock,
            steady_clock,
            writer,
        })
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.deque.len()
    }

    pub async fn empty(&self) -> bool {
        self.size().await == 0
    }

    /// Idle -> Running: spawns the background worker. No-op if already running or draining.
    pub async fn run(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if *state != QueueState::Idle {
            return;
        }
        *state = QueueState::Running;
        drop(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let queue = Arc::clone(self);
        let handle = tokio::spawn(async move { queue.worker_loop(shutdown_rx).await });
        *self.worker.lock().await = Some(handle);
    }

    /// Running -> Draining: the worker exits once the queue empties. No-op if not running.
    pub async fn drain_and_stop(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().await;
            if *state != QueueState::Running {
                return;
            }
            *state = QueueState::Draining;
        }
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        self.notify.notify_waiters();
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
        *self.state.lock().await = QueueState::Idle;
    }

    /// Drops the buffer if the queue is not running; otherwise stamps and enqueues it.
    pub async fn enqueue(&self, buffer: CircularSliceBuffer, thread_id: u64) {
        if *self.state.lock().await != QueueState::Running {
            return;
        }
        let record = FlushRecord {
            buffer,
            enqueue_timestamp_ns: self.steady_clock.now_ns(),
            thread_id,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            remaining_attempts: self.config.max_buffer_flush_attempts,
        };
        self.inner.lock().await.deque.push_back(record);
        self.notify.notify_waiters();
    }

    /// Advances the manual-flush barrier and registers `callback` to fire exactly once, after
    /// every record enqueued on or before this instant reaches a terminal state. A `None`
    /// callback just advances the barrier with no completion notification.
    ///
    /// `callback` must not call back into this queue synchronously: it runs while the worker
    /// still holds `inner`'s lock released, but reentering `flush`/`enqueue` from within the
    /// callback on the same task would deadlock against the worker's next iteration.
    pub async fn flush(&self, callback: Option<CompletionCallback>) {
        let now = self.steady_clock.now_ns();
        let mut inner = self.inner.lock().await;
        inner.last_manual_flush_timestamp_ns = now;
        let covered: HashSet<u64> = inner
            .deque
            .iter()
            .filter(|record| record.enqueue_timestamp_ns <= now)
            .map(|record| record.id)
            .collect();
        if covered.is_empty() {
            drop(inner);
            if let Some(cb) = callback {
                cb();
            }
            return;
        }
        inner.pending_flush_ids = Some(covered);
        inner.pending_callback = callback;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Empties the queue and discards any pending barrier; does not invoke the callback.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.deque.clear();
        inner.pending_flush_ids = None;
        inner.pending_callback = None;
    }

    async fn worker_loop(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut tick = tokio::time::interval(Duration::from_millis(1));
        loop {
            let draining = *self.state.lock().await == QueueState::Draining;
            if draining && self.empty().await {
                return;
            }

            self.process_one(draining).await;

            if draining {
                continue;
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tick.tick() => {}
                _ = &mut shutdown_rx => {}
            }
        }
    }

    /// Pops and processes (at most) one record per the §4.7 worker algorithm. `draining`
    /// bypasses the manual-flush barrier wait (step 4) so `drain_and_stop` can't spin forever
    /// on a record that never catches up to a barrier; the retention check above it still
    /// applies unconditionally.
    async fn process_one(self: &Arc<Self>, draining: bool) {
        let record = {
            let mut inner = self.inner.lock().await;
            inner.deque.pop_front()
        };
        let Some(mut record) = record else { return };

        if !self.config.flush_all_events {
            let now = self.steady_clock.now_ns();
            let expired = now > record.enqueue_timestamp_ns + i64::try_from(self.config.retention_duration.as_nanos()).unwrap_or(i64::MAX);
            if expired {
                self.settle(record.id).await;
                return;
            }

            if !draining {
                let mut inner = self.inner.lock().await;
                let barrier_not_yet_reached = record.enqueue_timestamp_ns > inner.last_manual_flush_timestamp_ns
                    && !inner
                        .pending_flush_ids
                        .as_ref()
                        .is_some_and(|ids| ids.contains(&record.id));
                if barrier_not_yet_reached {
                    inner.deque.push_back(record);
                    return;
                }
            }
        }

        let header = Header {
            version: crate::trace::TRACE_FORMAT_VERSION,
            session_id: self.config.session_id,
            process_id: self.config.process_id,
            thread_id: record.thread_id,
            system_clock_timestamp_ns: self.system_clock.now_ns(),
            steady_clock_timestamp_ns: self.steady_clock.now_ns(),
            event_count: i32::try_from(record.buffer.size()).unwrap_or(i32::MAX),
        };
        let path = self.config.trace_file_directory.join(header.file_name());
        let writer = Arc::clone(&self.writer);

        let (buffer, result) = tokio::task::spawn_blocking(move || {
            let result = writer.write(&path, &header, &record.buffer);
            (record.buffer, result)
        })
        .await
        .expect("trace writer task panicked");
        record.buffer = buffer;

        match result {
            Ok(()) => self.settle(record.id).await,
            Err(_) => {
                record.remaining_attempts -= 1;
                if record.remaining_attempts > 0 {
                    self.inner.lock().await.deque.push_back(record);
                } else {
                    self.settle(record.id).await;
                }
            }
        }
    }

    /// Removes `id` from the pending-flush set; fires the completion callback once that set
    /// empties.
    async fn settle(&self, id: u64) {
        let callback = {
            let mut inner = self.inner.lock().await;
            if let Some(ids) = inner.pending_flush_ids.as_mut() {
                ids.remove(&id);
                if ids.is_empty() {
                    inner.pending_flush_ids = None;
                    inner.pending_callback.take()
                } else {
                    None
                }
            } else {
                None
            }
        };
        if let Some(cb) = callback {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::WriteError;
    use fntrace_buffer::{AmalgamatedPool, DynamicBufferSlicePool, Event, EventType, Pool, ReservedBufferSlicePool};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    struct CountingWriter {
        fail_first_n: usize,
        calls: AtomicUsize,
        written_paths: StdMutex<Vec<PathBuf>>,
    }

    impl TraceWriter for CountingWriter {
        fn write(&self, path: &std::path::Path, _header: &Header, _buffer: &CircularSliceBuffer) -> Result<(), WriteError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first_n {
                return Err(WriteError::FailedToOpenFile {
                    path: path.to_path_buf(),
                    source: std::io::Error::other("injected failure"),
                });
            }
            self.written_paths.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn pool() -> Arc<dyn Pool + Send + Sync> {
        Arc::new(AmalgamatedPool::new(
            ReservedBufferSlicePool::new(4, 4),
            DynamicBufferSlicePool::new(4, 4, 4),
        ))
    }

    fn buffer_with_one_event() -> CircularSliceBuffer {
        let mut buffer = CircularSliceBuffer::new(pool(), 4);
        buffer.push(Event::new(1, EventType::FunctionEntry, 1, 0));
        buffer
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fntrace-flush-queue-test-{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn scenario_d_retries_then_succeeds() {
        let clock = Arc::new(ManualClock::new(0));
        let writer = Arc::new(CountingWriter {
            fail_first_n: 2,
            calls: AtomicUsize::new(0),
            written_paths: StdMutex::new(Vec::new()),
        });
        let queue = FlushQueue::new(
            FlushQueueConfig {
                trace_file_directory: test_dir("scenario-d"),
                retention_duration: Duration::from_secs(3600),
                session_id: 1,
                process_id: 1,
                max_buffer_flush_attempts: 3,
                flush_all_events: true,
            },
            clock.clone(),
            clock.clone(),
            writer.clone(),
        );
        queue.run().await;
        queue.enqueue(buffer_with_one_event(), 1).await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        queue.flush(Some(Box::new(move || { let _ = tx.send(()); }))).await;
        tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();

        assert_eq!(writer.written_paths.lock().unwrap().len(), 1);
        queue.drain_and_stop().await;
    }

    #[tokio::test]
    async fn scenario_c_retention_drop_writes_nothing() {
        let clock = Arc::new(ManualClock::new(0));
        let writer = Arc::new(CountingWriter {
            fail_first_n: 0,
            calls: AtomicUsize::new(0),
            written_paths: StdMutex::new(Vec::new()),
        });
        let queue = FlushQueue::new(
            FlushQueueConfig {
                trace_file_directory: test_dir("scenario-c"),
                retention_duration: Duration::from_nanos(1),
                session_id: 1,
                process_id: 1,
                max_buffer_flush_attempts: 3,
                flush_all_events: false,
            },
            clock.clone(),
            clock.clone(),
            writer.clone(),
        );
        queue.run().await;
        queue.enqueue(buffer_with_one_event(), 1).await;
        clock.advance_ns(10_000_000);
        queue.drain_and_stop().await;

        assert_eq!(writer.written_paths.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn clear_discards_queue_without_callback() {
        let clock = Arc::new(ManualClock::new(0));
        let writer = Arc::new(CountingWriter {
            fail_first_n: 0,
            calls: AtomicUsize::new(0),
            written_paths: StdMutex::new(Vec::new()),
        });
        let queue = FlushQueue::new(
            FlushQueueConfig {
                trace_file_directory: test_dir("clear"),
                retention_duration: Duration::from_secs(3600),
                session_id: 1,
                process_id: 1,
                max_buffer_flush_attempts: 3,
                flush_all_events: true,
            },
            clock.clone(),
            clock.clone(),
            writer.clone(),
        );
        queue.enqueue(buffer_with_one_event(), 1).await;
        // Not running yet, so the enqueue above was a no-op; verify via size() instead.
        assert_eq!(queue.size().await, 0);
        queue.run().await;
        queue.enqueue(buffer_with_one_event(), 1).await;
        queue.clear().await;
        assert!(queue.empty().await);
        queue.drain_and_stop().await;
    }
}
