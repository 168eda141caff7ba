//! Watermark-driven pane firing with allowed lateness.
//!
//! A [`TriggerEngine`] owns every [`WindowState`] of one pipeline stage. It is
//! driven by two inputs, elements and watermark advances, and answers with the
//! panes those inputs cause to fire.
//!
//! Per window the firing status moves
//! `Pending → FiredOnTime → FiredLate(1) → FiredLate(2) → … → closed`:
//!
//! - the watermark reaching `window.end` fires the `ON_TIME` pane, unless the
//!   window has nothing buffered (fire-if-non-empty);
//! - an element admitted after the watermark passed `window.end` fires a
//!   `LATE` pane immediately;
//! - the watermark reaching `window.end + allowed_lateness` closes the window
//!   and drops its state. A pane fired in that same step is marked `is_last`.
//!
//! Elements with `event_time < watermark - allowed_lateness` are dropped before
//! they touch any window state.
//!
//! All mutation goes through `&mut self`; the runner keeps the engine inside a
//! single task so each window has exactly one writer.

use crate::dedup::{DedupScope, Deduplicator};
use crate::error::{Result, StreamError};
use crate::pane::{Pane, PaneInfo, PaneTiming};
use crate::watermark::WatermarkTracker;
use crate::window::{END_OF_TIME, Element, FixedWindows, TimestampMs, Window};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hash;
use tracing::debug;

/// What a pane carries relative to earlier panes of the same window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationMode {
    /// Each pane holds only the values admitted since the previous firing.
    #[default]
    Discarding,
    /// Each pane holds every value admitted to the window so far.
    Accumulating,
}

/// Windowing, lateness and dedup settings for one engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowingStrategy {
    pub window_size_ms: i64,
    pub window_offset_ms: i64,
    pub allowed_lateness_ms: i64,
    pub accumulation: AccumulationMode,
    pub dedup_scope: DedupScope,
}

impl WindowingStrategy {
    /// Fixed windows of `window_size_ms`, no lateness, discarding panes, per-window dedup.
    #[must_use]
    pub fn fixed(window_size_ms: i64) -> Self {
        Self {
            window_size_ms,
            window_offset_ms: 0,
            allowed_lateness_ms: 0,
            accumulation: AccumulationMode::Discarding,
            dedup_scope: DedupScope::Window,
        }
    }

    #[must_use]
    pub fn with_allowed_lateness(mut self, allowed_lateness_ms: i64) -> Self {
        self.allowed_lateness_ms = allowed_lateness_ms;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, window_offset_ms: i64) -> Self {
        self.window_offset_ms = window_offset_ms;
        self
    }

    #[must_use]
    pub fn with_accumulation(mut self, accumulation: AccumulationMode) -> Self {
        self.accumulation = accumulation;
        self
    }

    #[must_use]
    pub fn with_dedup_scope(mut self, dedup_scope: DedupScope) -> Self {
        self.dedup_scope = dedup_scope;
        self
    }

    fn assigner(&self) -> Result<FixedWindows> {
        if self.allowed_lateness_ms < 0 {
            return Err(StreamError::InvalidConfig(format!(
                "allowed lateness must not be negative, got {}ms",
                self.allowed_lateness_ms
            )));
        }
        FixedWindows::new(self.window_size_ms)?.with_offset(self.window_offset_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FiringStatus {
    Pending,
    FiredOnTime,
    /// Number of late panes fired so far.
    FiredLate(u64),
}

/// Mutable state of one open window.
#[derive(Debug)]
pub struct WindowState<T> {
    window: Window,
    status: FiringStatus,
    next_index: u64,
    buffered: Vec<T>,
    seen: Deduplicator<T>,
}

impl<T: Clone + Eq + Hash> WindowState<T> {
    fn new(window: Window) -> Self {
        Self {
            window,
            status: FiringStatus::Pending,
            next_index: 0,
            buffered: Vec::new(),
            seen: Deduplicator::new(),
        }
    }

    #[must_use]
    pub fn window(&self) -> Window {
        self.window
    }

    #[must_use]
    pub fn status(&self) -> FiringStatus {
        self.status
    }

    /// Values waiting for the next pane, in first-seen order.
    #[must_use]
    pub fn buffered(&self) -> &[T] {
        &self.buffered
    }

    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    fn fire(&mut self, timing: PaneTiming, strategy: &WindowingStrategy) -> Pane<T> {
        let payload = match strategy.accumulation {
            AccumulationMode::Discarding => {
                if strategy.dedup_scope == DedupScope::Pane {
                    self.seen.clear();
                }
                std::mem::take(&mut self.buffered)
            }
            AccumulationMode::Accumulating => self.buffered.clone(),
        };
        let index = self.next_index;
        self.next_index += 1;
        self.status = match (timing, self.status) {
            (PaneTiming::OnTime, _) => FiringStatus::FiredOnTime,
            (PaneTiming::Late, FiringStatus::FiredLate(n)) => FiringStatus::FiredLate(n + 1),
            (PaneTiming::Late, _) => FiringStatus::FiredLate(1),
        };
        Pane {
            window: self.window,
            info: PaneInfo {
                index,
                timing,
                is_first: index == 0,
                is_last: false,
            },
            payload,
        }
    }
}

/// Result of offering one element to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementOutcome<T> {
    /// Admitted and buffered until the window fires.
    Buffered { window: Window },
    /// Already seen within the dedup scope; nothing changed.
    Duplicate { window: Window },
    /// Behind the watermark by more than the allowed lateness.
    Dropped { window: Window, watermark: TimestampMs },
    /// Admitted after the watermark passed the window; this late pane fired.
    FiredLate(Pane<T>),
}

/// Counters kept by an engine over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TriggerStats {
    pub elements_admitted: u64,
    pub duplicates_dropped: u64,
    pub late_elements_dropped: u64,
    pub invalid_timestamps: u64,
    pub panes_on_time: u64,
    pub panes_late: u64,
    pub windows_closed: u64,
}

/// Per-stage windowing state machine.
pub struct TriggerEngine<T> {
    strategy: WindowingStrategy,
    assigner: FixedWindows,
    watermark: WatermarkTracker,
    windows: BTreeMap<Window, WindowState<T>>,
    global_seen: Deduplicator<T>,
    stats: TriggerStats,
}

impl<T: Clone + Eq + Hash> TriggerEngine<T> {
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] for a non-positive window size, an
    /// offset outside `[0, size)` or a negative allowed lateness.
    pub fn new(strategy: WindowingStrategy) -> Result<Self> {
        let assigner = strategy.assigner()?;
        Ok(Self {
            strategy,
            assigner,
            watermark: WatermarkTracker::new(),
            windows: BTreeMap::new(),
            global_seen: Deduplicator::new(),
            stats: TriggerStats::default(),
        })
    }

    #[must_use]
    pub fn strategy(&self) -> &WindowingStrategy {
        &self.strategy
    }

    #[must_use]
    pub fn watermark(&self) -> TimestampMs {
        self.watermark.current()
    }

    #[must_use]
    pub fn stats(&self) -> TriggerStats {
        self.stats
    }

    #[must_use]
    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn window_state(&self, window: &Window) -> Option<&WindowState<T>> {
        self.windows.get(window)
    }

    /// Keys held by the global dedup scope (always 0 for other scopes).
    #[must_use]
    pub fn global_dedup_keys(&self) -> usize {
        self.global_seen.len()
    }

    /// Offer one element.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidTimestamp`] when the element cannot be
    /// assigned to a window. The engine state is left untouched.
    pub fn process_element(&mut self, element: Element<T>) -> Result<ElementOutcome<T>> {
        let window = match self.assigner.assign(element.event_time) {
            Ok(window) => window,
            Err(e) => {
                self.stats.invalid_timestamps += 1;
                return Err(e);
            }
        };

        if self.watermark.is_late(element.event_time, self.strategy.allowed_lateness_ms) {
            self.stats.late_elements_dropped += 1;
            return Ok(ElementOutcome::Dropped {
                window,
                watermark: self.watermark.current(),
            });
        }

        let scope = self.strategy.dedup_scope;
        if scope == DedupScope::Global && !self.global_seen.admit(element.value.clone()) {
            self.stats.duplicates_dropped += 1;
            return Ok(ElementOutcome::Duplicate { window });
        }

        let state = self
            .windows
            .entry(window)
            .or_insert_with(|| WindowState::new(window));
        if scope != DedupScope::Global && !state.seen.admit(element.value.clone()) {
            self.stats.duplicates_dropped += 1;
            return Ok(ElementOutcome::Duplicate { window });
        }
        state.buffered.push(element.value);
        self.stats.elements_admitted += 1;

        if self.watermark.has_passed(window.end) {
            let pane = state.fire(PaneTiming::Late, &self.strategy);
            self.stats.panes_late += 1;
            debug!(%window, index = pane.info.index, "late pane fired");
            return Ok(ElementOutcome::FiredLate(pane));
        }
        Ok(ElementOutcome::Buffered { window })
    }

    /// Advance the watermark and return the panes that fire, in window order.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::WatermarkRegression`] when `candidate` is below
    /// the current watermark. Nothing fires and the watermark is unchanged.
    pub fn advance_watermark(&mut self, candidate: TimestampMs) -> Result<Vec<Pane<T>>> {
        let watermark = self.watermark.advance(candidate)?;
        let lateness = self.strategy.allowed_lateness_ms;

        let mut panes = Vec::new();
        let mut expired = Vec::new();
        // Fixed-size windows ordered by start are also ordered by end.
        for (window, state) in &mut self.windows {
            if window.end > watermark {
                break;
            }
            if state.status == FiringStatus::Pending && !state.buffered.is_empty() {
                panes.push(state.fire(PaneTiming::OnTime, &self.strategy));
                self.stats.panes_on_time += 1;
            }
            if watermark >= window.gc_time(lateness) {
                expired.push(*window);
            }
        }

        for window in expired {
            if let Some(state) = self.windows.remove(&window) {
                debug!(%window, watermark, panes = state.next_index, "window closed");
            }
            self.stats.windows_closed += 1;
            if let Some(pane) = panes.iter_mut().find(|p| p.window == window) {
                pane.info.is_last = true;
            }
        }
        Ok(panes)
    }

    /// Fire and close every remaining window, as at end of input.
    pub fn finish(&mut self) -> Vec<Pane<T>> {
        // END_OF_TIME is the maximum timestamp, so it can never regress.
        self.advance_watermark(END_OF_TIME).unwrap_or_default()
    }
}
