//! File reading for the initial bounded read and the tail loop.

use crate::error::{Error, Result};
use crate::options::StreamOptions;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Opens the file that both read phases share.
pub(crate) async fn open_file(path: &Path) -> Result<File> {
    File::open(path).await.map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads up to `buf.len()` bytes at `position`.
pub(crate) async fn read_at(file: &mut File, position: u64, buf: &mut [u8]) -> Result<usize> {
    let read = async {
        file.seek(SeekFrom::Start(position)).await?;
        file.read(buf).await
    };
    read.await.map_err(|source| Error::Read { position, source })
}

/// Reads `[start, end)`, or `[start, EOF)` without an end, one chunk at a time.
#[derive(Debug)]
pub(crate) struct BulkReader {
    start: u64,
    end: Option<u64>,
    chunk_size: usize,
    consumed: u64,
}

impl BulkReader {
    pub(crate) fn new(options: &StreamOptions) -> Self {
        Self {
            start: options.start,
            end: options.end,
            chunk_size: options.chunk_size,
            consumed: 0,
        }
    }

    /// Returns the next chunk, or `None` once the range or the file is exhausted.
    pub(crate) async fn next_chunk(&mut self, file: &mut File) -> Result<Option<Vec<u8>>> {
        let offset = self.start + self.consumed;
        let want = match self.end {
            Some(end) => end.saturating_sub(offset).min(self.chunk_size as u64) as usize,
            None => self.chunk_size,
        };
        if want == 0 {
            return Ok(None);
        }

        let mut buf = vec![0; want];
        let n = read_at(file, offset, &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        self.consumed += n as u64;
        Ok(Some(buf))
    }

    /// Read size the tail loop continues with.
    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Offset the tail loop resumes from once this phase is done.
    pub(crate) fn resume_position(&self, bytes_written_manually: u64) -> u64 {
        self.start + self.consumed + bytes_written_manually
    }
}

/// Phase of the tail loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadState {
    /// Synced, no pass has run yet.
    Idle,
    /// A pass is draining the file.
    Reading,
    /// Drained, waiting for a notification.
    Parked,
    /// No further reads.
    Closed,
}

/// What the tail loop does after a read completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Park,
    End,
}

/// State machine for the tail loop.
///
/// At most one pass is active. Notifications that land mid-pass are folded
/// into a single extra read before parking.
#[derive(Debug)]
pub(crate) struct IncrementalReader {
    state: ReadState,
    rerun: bool,
    closing: bool,
}

impl IncrementalReader {
    pub(crate) fn new() -> Self {
        Self {
            state: ReadState::Idle,
            rerun: false,
            closing: false,
        }
    }

    pub(crate) fn state(&self) -> ReadState {
        self.state
    }

    /// Handles a change notification. Returns true when a pass must start.
    pub(crate) fn on_change(&mut self, synced: bool) -> bool {
        match self.state {
            ReadState::Closed => false,
            ReadState::Reading => {
                self.rerun = true;
                false
            }
            ReadState::Idle | ReadState::Parked if synced => {
                self.state = ReadState::Reading;
                true
            }
            ReadState::Idle | ReadState::Parked => false,
        }
    }

    /// Handles a completed read of `n` bytes.
    pub(crate) fn on_read(&mut self, n: usize) -> Step {
        if n > 0 {
            return Step::Continue;
        }
        if std::mem::take(&mut self.rerun) {
            return Step::Continue;
        }
        if self.closing {
            self.state = ReadState::Closed;
            Step::End
        } else {
            self.state = ReadState::Parked;
            Step::Park
        }
    }

    /// Handles `close()`. Returns true when the stream may end right away;
    /// otherwise the pass in flight ends the stream once it drains.
    pub(crate) fn on_close(&mut self) -> bool {
        match self.state {
            ReadState::Reading => {
                self.closing = true;
                false
            }
            _ => {
                self.state = ReadState::Closed;
                true
            }
        }
    }

    /// Stops all further reads after a failure.
    pub(crate) fn halt(&mut self) {
        self.state = ReadState::Closed;
        self.rerun = false;
    }
}
