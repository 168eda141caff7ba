//! Structured observation events for every pipeline stage.
//!
//! Purely a side channel: each helper emits one `tracing` event tagged
//! `[lens]` carrying the stage, element, window, timestamp and pane fields,
//! and nothing in the pipeline depends on it.

use crate::pane::{Pane, PaneInfo};
use crate::sink::OutputIdentity;
use crate::window::{Element, TimestampMs, Window};
use std::fmt;
use tracing::{debug, info, warn};

/// Stage an event was observed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Source,
    Assign,
    Dedup,
    Fire,
    Delay,
    Commit,
    /// An upstream pane identity handed to the downstream consumer.
    EmittedFile,
    /// A second-stage pane committed by the downstream consumer.
    FileProcessed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "Source",
            Self::Assign => "Assign",
            Self::Dedup => "Dedup",
            Self::Fire => "Fire",
            Self::Delay => "Delay",
            Self::Commit => "Commit",
            Self::EmittedFile => "Emitted File",
            Self::FileProcessed => "File processed",
        })
    }
}

pub fn element<T: fmt::Display>(stage: Stage, element: &Element<T>) {
    debug!(
        stage = %stage,
        element = %element.value,
        timestamp = element.event_time,
        "[lens]"
    );
}

pub fn duplicate<T: fmt::Display>(element: &Element<T>, window: &Window) {
    debug!(
        stage = %Stage::Dedup,
        element = %element.value,
        window = %window,
        timestamp = element.event_time,
        "[lens] duplicate discarded"
    );
}

pub fn late_dropped(
    stage: Stage,
    element: &dyn fmt::Display,
    window: &Window,
    timestamp: TimestampMs,
    watermark: TimestampMs,
) {
    info!(
        stage = %stage,
        element = %element,
        window = %window,
        timestamp,
        watermark,
        "[lens] late data dropped"
    );
}

pub fn invalid_timestamp(
    stage: Stage,
    element: &dyn fmt::Display,
    timestamp: TimestampMs,
    error: &dyn std::error::Error,
) {
    warn!(
        stage = %stage,
        element = %element,
        timestamp,
        error = %error,
        "[lens] element rejected"
    );
}

pub fn pane<T>(stage: Stage, pane: &Pane<T>) {
    info!(
        stage = %stage,
        window = %pane.window,
        timestamp = pane.window.max_timestamp(),
        elements = pane.payload.len(),
        pane_index = pane.info.index,
        pane_timing = %pane.info.timing,
        is_first = pane.info.is_first,
        is_last = pane.info.is_last,
        "[lens]"
    );
}

pub fn identity(stage: Stage, identity: &OutputIdentity, info: &PaneInfo) {
    info!(
        stage = %stage,
        element = %identity,
        window = %identity.window,
        timestamp = identity.window.max_timestamp(),
        pane_index = info.index,
        pane_timing = %info.timing,
        is_first = info.is_first,
        is_last = info.is_last,
        "[lens]"
    );
}
