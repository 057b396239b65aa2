//! Lifecycle, enable gate, thread-local logger binding. §4.9.

use crate::clock::{RealSteadyClock, RealSystemClock, SteadyClock, SystemClock};
use crate::config::Config;
use crate::error::DirectoryError;
use crate::event_logger::{EventLogger, LoggerId, LoggerShared};
use crate::flush_queue::{FlushQueue, FlushQueueConfig};
use crate::trace::{Header, HEADER_SIZE_BYTES};
use crate::writer::{FileTraceWriter, TraceWriter};
use fntrace_buffer::{
    AmalgamatedPool, DynamicBufferSlicePool, Event, EventType, Pool, ReservedBufferSlicePool,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type CompletionCallback = Box<dyn FnOnce() + Send>;

/// A thread-local logger is created per `(manager, thread)` pair on first use; keying on the
/// manager's own id (rather than a single `Option<EventLogger>`) lets more than one
/// `RuntimeManager` coexist on the same thread, which test suites routinely do.
thread_local! {
    static THREAD_LOGGERS: RefCell<HashMap<u64, EventLogger>> = RefCell::new(HashMap::new());
}

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(0);

fn current_thread_id() -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

fn matches_trace_file_convention(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(stem) = name.strip_suffix(".trace") else {
        return false;
    };
    let parts: Vec<&str> = stem.split('-').collect();
    parts.len() == 3 && parts.iter().all(|p| p.len() == 16 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

fn list_trace_files(dir: &Path) -> Result<Vec<PathBuf>, DirectoryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DirectoryError::FailedToReadDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| matches_trace_file_convention(path))
        .collect())
}

/// Report returned by [`RuntimeManager::delete_flushed_trace_files_older_than`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub deleted_files: u64,
    pub deleted_bytes: u64,
}

/// Process-singleton-like owner of the pool, the flush queue, and the set of subscribed
/// thread-local loggers. Outlives every [`EventLogger`] it creates.
pub struct RuntimeManager {
    manager_id: u64,
    initialized: AtomicBool,
    enabled: AtomicBool,
    config: Config,
    pool: Mutex<Option<Arc<dyn Pool + Send + Sync>>>,
    flush_queue: Arc<FlushQueue>,
    loggers: Mutex<HashMap<LoggerId, Arc<LoggerShared>>>,
    steady_clock: Arc<dyn SteadyClock>,
}

impl RuntimeManager {
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_clocks_and_writer(
            config,
            Arc::new(RealSystemClock),
            Arc::new(RealSteadyClock::default()),
            Arc::new(FileTraceWriter),
        )
    }

    /// Construction hook used by tests to inject deterministic clocks and a fake writer.
    #[must_use]
    pub fn with_clocks_and_writer(
        config: Config,
        system_clock: Arc<dyn SystemClock>,
        steady_clock: Arc<dyn SteadyClock>,
        writer: Arc<dyn TraceWriter>,
    ) -> Arc<Self> {
        let flush_queue = FlushQueue::new(
            FlushQueueConfig {
                trace_file_directory: config.trace_file_path.clone(),
                retention_duration: config.event_buffer_retention_duration,
                session_id: config.session_id,
                process_id: i64::from(std::process::id()),
                max_buffer_flush_attempts: config.max_flush_buffer_to_file_attempts,
                flush_all_events: config.flush_all_events,
            },
            system_clock,
            Arc::clone(&steady_clock),
            writer,
        );
        Arc::new(Self {
            manager_id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            initialized: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            config,
            pool: Mutex::new(None),
            flush_queue,
            loggers: Mutex::new(HashMap::new()),
            steady_clock,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Idempotent. Builds the amalgamated pool, starts the flush queue, and backfills every
    /// already-subscribed logger with the new pool.
    pub async fn initialize(self: &Arc<Self>) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        let pool: Arc<dyn Pool + Send + Sync> = Arc::new(AmalgamatedPool::new(
            ReservedBufferSlicePool::new(
                self.config.max_reserved_event_buffer_slice_capacity,
                self.config.reserved_event_pool_capacity,
            ),
            DynamicBufferSlicePool::new(
                self.config.max_dynamic_event_buffer_slice_capacity,
                self.config.dynamic_event_pool_capacity,
                self.config.dynamic_event_slice_borrow_cas_attempts,
            ),
        ));
        *self.pool.lock().unwrap() = Some(Arc::clone(&pool));
        self.flush_queue.run().await;

        let loggers: Vec<Arc<LoggerShared>> = self.loggers.lock().unwrap().values().cloned().collect();
        for shared in &loggers {
            shared.set_pool(Some(Arc::clone(&pool))).await;
        }
    }

    /// Idempotent. Disables logging, detaches every logger's pool, flushes (or clears) the
    /// queue's contents, drains the worker, and drops the pool.
    pub async fn deinitialize(self: &Arc<Self>) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        self.enabled.store(false, Ordering::Release);

        let loggers: Vec<Arc<LoggerShared>> = self.loggers.lock().unwrap().values().cloned().collect();
        for shared in &loggers {
            shared.set_pool(None).await;
        }

        if self.config.flush_all_events {
            let (tx, rx) = tokio::sync::oneshot::channel();
            self.flush_queue
                .flush(Some(Box::new(move || {
                    let _ = tx.send(());
                })))
                .await;
            let _ = rx.await;
        } else {
            self.flush_queue.clear().await;
        }
        self.flush_queue.drain_and_stop().await;
        *self.pool.lock().unwrap() = None;
    }

    /// No-op if not initialized.
    pub fn enable(&self) {
        if self.initialized() {
            self.enabled.store(true, Ordering::Release);
        }
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    fn create_and_subscribe_logger(self: &Arc<Self>) -> EventLogger {
        let (mut logger, shared) = EventLogger::new(
            Arc::clone(&self.flush_queue),
            self.config.thread_event_buffer_capacity,
            self.config.flush_all_events,
            current_thread_id(),
        );
        if let Some(pool) = self.pool.lock().unwrap().clone() {
            shared.attach_fresh_pool(pool);
        }
        self.loggers.lock().unwrap().insert(logger.id(), Arc::clone(&shared));

        let manager = Arc::clone(self);
        logger = logger.with_unsubscribe_hook(Arc::new(move |id: LoggerId| {
            manager.loggers.lock().unwrap().remove(&id);
        }));
        logger
    }

    fn with_thread_logger<R>(self: &Arc<Self>, f: impl FnOnce(&EventLogger) -> R) -> R {
        THREAD_LOGGERS.with(|loggers| {
            let mut loggers = loggers.borrow_mut();
            let logger = loggers
                .entry(self.manager_id)
                .or_insert_with(|| self.create_and_subscribe_logger());
            f(logger)
        })
    }

    /// Hot path. No-op if disabled. Stamps the event with the current steady-clock time.
    pub fn log_event(self: &Arc<Self>, event_type: EventType, payload_1: u64, payload_2: u32) {
        if !self.enabled() {
            return;
        }
        let event = Event::new(self.steady_clock.now_ns(), event_type, payload_1, payload_2);
        self.with_thread_logger(|logger| logger.log_event(event));
    }

    /// Hot path variant that takes an explicit timestamp rather than sampling the clock.
    pub fn log_event_at(self: &Arc<Self>, event_type: EventType, steady_clock_ns: i64, payload_1: u64, payload_2: u32) {
        if !self.enabled() {
            return;
        }
        let event = Event::new(steady_clock_ns, event_type, payload_1, payload_2);
        self.with_thread_logger(|logger| logger.log_event(event));
    }

    pub fn log_function_entry(self: &Arc<Self>, function_id: u64) {
        self.log_event(EventType::FunctionEntry, function_id, 0);
    }

    pub fn log_function_exit(self: &Arc<Self>, function_id: u64) {
        self.log_event(EventType::FunctionExit, function_id, 0);
    }

    /// Flushes every subscribed logger's current buffer onto the queue, then advances the
    /// queue's manual-flush barrier so `callback` fires once all of them reach a terminal state.
    pub async fn flush(self: &Arc<Self>, callback: Option<CompletionCallback>) {
        let loggers: Vec<Arc<LoggerShared>> = self.loggers.lock().unwrap().values().cloned().collect();
        for shared in &loggers {
            shared.flush().await;
        }
        self.flush_queue.flush(callback).await;
    }

    /// Clears every subscribed logger's current buffer without enqueuing it.
    pub fn clear(&self) {
        let loggers: Vec<Arc<LoggerShared>> = self.loggers.lock().unwrap().values().cloned().collect();
        for shared in &loggers {
            shared.clear();
        }
    }

    /// Lists files under `dir` matching the trace file name convention. Directory-read errors
    /// surface as an empty result; there is no separate error channel for offline helpers.
    pub fn flushed_trace_files(&self, dir: PathBuf, callback: Box<dyn FnOnce(Vec<PathBuf>) + Send + 'static>) {
        tokio::task::spawn_blocking(move || {
            callback(list_trace_files(&dir).unwrap_or_default());
        });
    }

    /// Deletes every matching trace file whose header's `system_clock_timestamp_ns` is at or
    /// before `cutoff_seconds` (converted to nanoseconds), then reports the tally.
    pub fn delete_flushed_trace_files_older_than(
        &self,
        cutoff_seconds: i64,
        dir: PathBuf,
        callback: Box<dyn FnOnce(GcReport) + Send + 'static>,
    ) {
        tokio::task::spawn_blocking(move || {
            let cutoff_ns = cutoff_seconds.saturating_mul(1_000_000_000);
            let mut report = GcReport::default();
            for path in list_trace_files(&dir).unwrap_or_default() {
                let Ok(bytes) = std::fs::read(&path) else { continue };
                if bytes.len() < HEADER_SIZE_BYTES {
                    continue;
                }
                let header = Header::from_bytes(bytes[..HEADER_SIZE_BYTES].try_into().unwrap());
                if header.system_clock_timestamp_ns > cutoff_ns {
                    continue;
                }
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                if std::fs::remove_file(&path).is_ok() {
                    report.deleted_files += 1;
                    report.deleted_bytes += size;
                }
            }
            callback(report);
        });
    }
}
