//! Monotonic event-time watermark.
//!
//! Each pipeline stage owns exactly one [`WatermarkTracker`]. It is advanced
//! only by in-band watermark messages that originate at the source, so there
//! is a single writer per stage and no shared mutable watermark.

use crate::error::{Result, StreamError};
use crate::window::{MIN_WATERMARK, TimestampMs};

/// Tracks the stage's notion of "event time has passed this point".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatermarkTracker {
    current: TimestampMs,
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: MIN_WATERMARK }
    }

    #[must_use]
    pub const fn current(&self) -> TimestampMs {
        self.current
    }

    /// Move the watermark to `candidate` and return the new value.
    ///
    /// Equal candidates are accepted as no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::WatermarkRegression`] when `candidate` is below the
    /// current watermark; the watermark is left unchanged.
    pub fn advance(&mut self, candidate: TimestampMs) -> Result<TimestampMs> {
        if candidate < self.current {
            return Err(StreamError::WatermarkRegression {
                current: self.current,
                attempted: candidate,
            });
        }
        self.current = candidate;
        Ok(self.current)
    }

    /// True when an element at `ts` is behind the watermark by more than `allowed_lateness_ms`.
    #[must_use]
    pub fn is_late(&self, ts: TimestampMs, allowed_lateness_ms: i64) -> bool {
        ts < self.current.saturating_sub(allowed_lateness_ms)
    }

    /// True once the watermark has reached `ts`.
    #[must_use]
    pub fn has_passed(&self, ts: TimestampMs) -> bool {
        self.current >= ts
    }
}
