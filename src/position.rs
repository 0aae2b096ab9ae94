//! Byte offset tracking for the tail reader.

use std::sync::atomic::{AtomicU64, Ordering};

/// Offset of the next byte to read. Never moves backwards.
#[derive(Debug, Default)]
pub(crate) struct PositionTracker(AtomicU64);

impl PositionTracker {
    pub(crate) fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Moves past `n` bytes that were just read.
    pub(crate) fn advance(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::AcqRel) + n
    }

    /// Jumps to `position` unless it lies behind the current offset.
    pub(crate) fn resume_at(&self, position: u64) -> u64 {
        self.0.fetch_max(position, Ordering::AcqRel).max(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_offset() {
        assert_eq!(PositionTracker::new(7).get(), 7);
        assert_eq!(PositionTracker::default().get(), 0);
    }

    #[test]
    fn test_advance_accumulates() {
        let tracker = PositionTracker::new(10);
        assert_eq!(tracker.advance(5), 15);
        assert_eq!(tracker.advance(0), 15);
        assert_eq!(tracker.advance(3), 18);
        assert_eq!(tracker.get(), 18);
    }

    #[test]
    fn test_resume_never_moves_backwards() {
        let tracker = PositionTracker::new(10);
        assert_eq!(tracker.resume_at(25), 25);
        assert_eq!(tracker.resume_at(12), 25);
        assert_eq!(tracker.get(), 25);
    }
}
