//! Error taxonomy for the streaming core.
//!
//! Late data is not an error: dropped elements surface as
//! [`ElementOutcome::Dropped`](crate::trigger::ElementOutcome::Dropped) and a counter.

use crate::window::TimestampMs;
use thiserror::Error;

/// Errors raised by the windowing core and its collaborators.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The element's event time is outside the valid range; the element is rejected.
    #[error("invalid event timestamp {ts}: {reason}")]
    InvalidTimestamp { ts: TimestampMs, reason: &'static str },

    /// The sink collaborator failed to persist a pane. Runs abort on this.
    #[error("failed to write pane output {identity}")]
    SinkWriteFailure {
        identity: String,
        #[source]
        source: std::io::Error,
    },

    /// A caller tried to move the watermark backwards; the watermark is left unchanged.
    #[error("watermark regression rejected: current {current}, attempted {attempted}")]
    WatermarkRegression {
        current: TimestampMs,
        attempted: TimestampMs,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
