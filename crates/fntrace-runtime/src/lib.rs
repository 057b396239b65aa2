//! Function-call trace collection: per-thread event loggers feeding a background flush queue
//! that serializes framed trace files, bound together by a runtime manager with an
//! enable/disable gate and thread-lifetime integration.
//!
//! Built on [`fntrace_buffer`]'s lock-free slice pools and circular slice buffer.

pub mod clock;
pub mod config;
pub mod error;
pub mod event_logger;
pub mod flush_queue;
pub mod runtime_manager;
pub mod trace;
pub mod writer;

pub use clock::{ManualClock, RealSteadyClock, RealSystemClock, SteadyClock, SystemClock};
pub use config::{Config, ConfigBuilder};
pub use error::{DirectoryError, WriteError};
pub use event_logger::{EventLogger, LoggerId};
pub use flush_queue::{FlushQueue, FlushQueueConfig};
pub use runtime_manager::{GcReport, RuntimeManager};
pub use trace::{event_from_bytes, event_to_bytes, Header, EVENT_SIZE_BYTES, HEADER_SIZE_BYTES, TRACE_FORMAT_VERSION};
pub use writer::{FileTraceWriter, TraceWriter};

pub use fntrace_buffer::{Event, EventType};
