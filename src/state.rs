//! Stream state shared between the read task and the stream handle.

use crate::position::PositionTracker;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Point-in-time view of a stream's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamState {
    /// Offset the next tail read starts from.
    pub position: u64,
    /// Bytes injected through the write side.
    pub bytes_written_manually: u64,
    /// A read is outstanding.
    pub reading: bool,
    /// The change watcher is subscribed.
    pub watching: bool,
    /// The initial read reached its end.
    pub synced: bool,
    /// End of stream has been signalled.
    pub ended: bool,
}

/// Written by the read task; the write side only bumps the manual byte count.
///
/// Sends made under the `ended` lock land either before or after the end
/// marker, never across it.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub(crate) position: PositionTracker,
    bytes_written_manually: AtomicU64,
    reading: AtomicBool,
    watching: AtomicBool,
    synced: AtomicBool,
    ended: Mutex<bool>,
}

impl SharedState {
    pub(crate) fn new(start: u64) -> Self {
        Self {
            position: PositionTracker::new(start),
            ..Self::default()
        }
    }

    pub(crate) fn snapshot(&self) -> StreamState {
        StreamState {
            position: self.position.get(),
            bytes_written_manually: self.bytes_written_manually(),
            reading: self.is_reading(),
            watching: self.is_watching(),
            synced: self.is_synced(),
            ended: self.is_ended(),
        }
    }

    pub(crate) fn add_written(&self, n: u64) {
        self.bytes_written_manually.fetch_add(n, Ordering::AcqRel);
    }

    pub(crate) fn bytes_written_manually(&self) -> u64 {
        self.bytes_written_manually.load(Ordering::Acquire)
    }

    pub(crate) fn set_reading(&self, reading: bool) {
        self.reading.store(reading, Ordering::Release);
    }

    pub(crate) fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    pub(crate) fn set_watching(&self, watching: bool) {
        self.watching.store(watching, Ordering::Release);
    }

    pub(crate) fn is_watching(&self) -> bool {
        self.watching.load(Ordering::Acquire)
    }

    /// Returns false if the stream was already synced.
    pub(crate) fn mark_synced(&self) -> bool {
        !self.synced.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Runs `send` unless the stream has ended.
    pub(crate) fn send_if_open<T>(&self, send: impl FnOnce() -> T) -> Option<T> {
        let ended = self.lock_ended();
        (!*ended).then(send)
    }

    /// Marks the stream ended and runs `send` under the same lock.
    /// Returns false if the stream had already ended.
    pub(crate) fn end_with(&self, send: impl FnOnce()) -> bool {
        let mut ended = self.lock_ended();
        if *ended {
            return false;
        }
        *ended = true;
        send();
        true
    }

    pub(crate) fn is_ended(&self) -> bool {
        *self.lock_ended()
    }

    fn lock_ended(&self) -> MutexGuard<'_, bool> {
        self.ended.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
