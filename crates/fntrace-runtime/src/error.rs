use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors the trace file writer can return. §4.8, §7.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to open trace file {path}: {source}")]
    FailedToOpenFile { path: PathBuf, source: io::Error },
}

/// Errors the runtime manager's offline directory helpers can return. §4.9, §7.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read trace directory {path}: {source}")]
    FailedToReadDirectory { path: PathBuf, source: io::Error },
}
