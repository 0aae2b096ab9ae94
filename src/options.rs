//! Stream configuration.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Chunk size used for both the initial read and tail reads.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Text encoding applied to chunks read from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8; invalid sequences are replaced with U+FFFD.
    Utf8,
    /// One character per byte.
    Latin1,
    /// Lowercase hexadecimal, two characters per byte.
    Hex,
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "hex" => Ok(Encoding::Hex),
            _ => Err(Error::UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "utf8",
            Encoding::Latin1 => "latin1",
            Encoding::Hex => "hex",
        };
        f.write_str(name)
    }
}

/// Options controlling which bytes are read and how they are delivered.
///
/// ```rust
/// use fs_tail_stream::StreamOptions;
///
/// let options = StreamOptions::new().start(7).end(14);
/// assert!(!options.is_tailing());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// First byte offset to read.
    pub start: u64,
    /// Exclusive end offset. Setting it disables tail mode.
    pub end: Option<u64>,
    /// Keep reading bytes appended after the initial read.
    pub tail: bool,
    /// Decode chunks as text. `None` yields raw bytes.
    pub encoding: Option<Encoding>,
    /// Maximum bytes per read.
    pub chunk_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            tail: false,
            encoding: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    pub fn end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn tail(mut self, tail: bool) -> Self {
        self.tail = tail;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Whether the stream follows the file after the initial read.
    pub fn is_tailing(&self) -> bool {
        self.tail && self.end.is_none()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(end) = self.end {
            if end < self.start {
                return Err(Error::InvalidRange {
                    start: self.start,
                    end,
                });
            }
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidChunkSize(self.chunk_size));
        }
        Ok(())
    }
}
