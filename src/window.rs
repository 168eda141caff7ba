//! Event-time primitives: timestamps, elements, fixed windows and their assigner.

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Milliseconds since UNIX epoch (UTC).
pub type TimestampMs = i64;

/// Largest event time an element may carry.
///
/// Kept well below `i64::MAX` so `window.end + allowed_lateness` cannot overflow.
pub const MAX_TIMESTAMP: TimestampMs = i64::MAX / 4;

/// Watermark value before any progress has been observed.
pub const MIN_WATERMARK: TimestampMs = i64::MIN;

/// Watermark that signals end of input; every window fires and closes.
pub const END_OF_TIME: TimestampMs = i64::MAX;

/// A closed-open time range: [start, end).
#[derive(Copy, Clone, Debug, Serialize, Deserialize, Eq)]
pub struct Window {
    pub start: TimestampMs,
    pub end: TimestampMs,
}

impl Window {
    #[inline]
    #[must_use]
    pub fn new(start: TimestampMs, end: TimestampMs) -> Self {
        debug_assert!(end >= start);
        Self { start, end }
    }

    /// Compute the tumbling window [win_start, win_start + size) for a timestamp.
    /// `size_ms` > 0; `offset_ms` may be negative or positive.
    #[inline]
    #[must_use]
    pub fn tumble(ts: TimestampMs, size_ms: i64, offset_ms: i64) -> Self {
        debug_assert!(size_ms > 0);
        // normalized position relative to offset
        let rel = ts - offset_ms;
        let k = div_floor(rel, size_ms);
        let win_start = k * size_ms + offset_ms;
        Self { start: win_start, end: win_start + size_ms }
    }

    /// Latest timestamp that still belongs to the window.
    #[inline]
    #[must_use]
    pub fn max_timestamp(&self) -> TimestampMs {
        self.end - 1
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, ts: TimestampMs) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Watermark at which the window is garbage collected.
    #[inline]
    #[must_use]
    pub fn gc_time(&self, allowed_lateness_ms: i64) -> TimestampMs {
        self.end.saturating_add(allowed_lateness_ms)
    }
}

/// Floor division for i64 (unlike `/` which truncates toward zero).
#[inline]
fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r > 0) != (b > 0)) { q - 1 } else { q }
}

// Hash/Ord so Windows can be used as keys and sorted deterministically.
impl PartialEq for Window {
    #[inline] fn eq(&self, other: &Self) -> bool { self.start == other.start && self.end == other.end }
}
impl Hash for Window {
    #[inline] fn hash<H: Hasher>(&self, state: &mut H) { self.start.hash(state); self.end.hash(state); }
}
impl Ord for Window {
    #[inline] fn cmp(&self, o: &Self) -> std::cmp::Ordering {
        self.start.cmp(&o.start).then(self.end.cmp(&o.end))
    }
}
impl PartialOrd for Window {
    #[inline] fn partial_cmp(&self, o: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(o)) }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// An element with event-time semantics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Element<T> {
    pub value: T,
    pub event_time: TimestampMs,
}

impl<T> Element<T> {
    #[inline] pub fn new(value: T, event_time: TimestampMs) -> Self { Self { value, event_time } }
}

/// Assigns each timestamp to exactly one fixed-size, non-overlapping window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedWindows {
    size_ms: i64,
    offset_ms: i64,
}

impl FixedWindows {
    /// Windows of `size_ms` aligned to the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if `size_ms` is not positive.
    pub fn new(size_ms: i64) -> Result<Self> {
        if size_ms <= 0 {
            return Err(StreamError::InvalidConfig(format!(
                "window size must be positive, got {size_ms}ms"
            )));
        }
        Ok(Self { size_ms, offset_ms: 0 })
    }

    /// Shift window boundaries by `offset_ms` (`0 <= offset < size`).
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if the offset is outside `[0, size)`.
    pub fn with_offset(self, offset_ms: i64) -> Result<Self> {
        if !(0..self.size_ms).contains(&offset_ms) {
            return Err(StreamError::InvalidConfig(format!(
                "window offset {offset_ms}ms must be within [0, {})",
                self.size_ms
            )));
        }
        Ok(Self { offset_ms, ..self })
    }

    #[must_use]
    pub fn size_ms(&self) -> i64 {
        self.size_ms
    }

    #[must_use]
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// The window `ts` falls into.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidTimestamp`] for negative timestamps or ones
    /// beyond [`MAX_TIMESTAMP`]; out-of-range values are rejected, never clamped.
    pub fn assign(&self, ts: TimestampMs) -> Result<Window> {
        if ts < 0 {
            return Err(StreamError::InvalidTimestamp { ts, reason: "negative event time" });
        }
        if ts > MAX_TIMESTAMP {
            return Err(StreamError::InvalidTimestamp { ts, reason: "event time beyond maximum" });
        }
        Ok(Window::tumble(ts, self.size_ms, self.offset_ms))
    }
}
