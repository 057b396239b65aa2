//! Serializes a header and a circular slice buffer's events to a trace file. §4.8.

use crate::error::WriteError;
use crate::trace::{event_to_bytes, Header};
use fntrace_buffer::CircularSliceBuffer;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;

/// Writes one trace file. Implemented by [`FileTraceWriter`] in production; tests inject fakes
/// to exercise the flush queue's retry path (Scenario D).
pub trait TraceWriter: Send + Sync {
    fn write(&self, path: &Path, header: &Header, buffer: &CircularSliceBuffer) -> Result<(), WriteError>;
}

/// Truncate-creates the file, writes the big-endian header, then each contiguous chunk's events
/// in order. No footer, no fsync: a crash mid-write leaves a truncated file that readers detect
/// via `event_count` versus trailing byte count.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTraceWriter;

impl TraceWriter for FileTraceWriter {
    fn write(&self, path: &Path, header: &Header, buffer: &CircularSliceBuffer) -> Result<(), WriteError> {
        let file = File::create(path).map_err(|source| WriteError::FailedToOpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        out.write_all(&header.to_bytes())
            .map_err(|source| WriteError::FailedToOpenFile {
                path: path.to_path_buf(),
                source,
            })?;
        for chunk in buffer.contiguous_memory_chunks() {
            for event in chunk {
                out.write_all(&event_to_bytes(*event))
                    .map_err(|source| WriteError::FailedToOpenFile {
                        path: path.to_path_buf(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}
