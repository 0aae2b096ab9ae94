//! Error types for the tail stream library.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tail stream operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be opened.
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read failed part way through the stream.
    #[error("Read failed at offset {position}: {source}")]
    Read {
        position: u64,
        #[source]
        source: std::io::Error,
    },

    /// Other I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// The requested byte range ends before it starts.
    #[error("Invalid range: end {end} is before start {start}")]
    InvalidRange { start: u64, end: u64 },

    /// Reads must fetch at least one byte.
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    /// Text encoding identifier that is not supported.
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// Stream has ended or was dropped.
    #[error("Stream closed")]
    StreamClosed,
}

/// A convenient Result type for tail stream operations.
pub type Result<T> = std::result::Result<T, Error>;
