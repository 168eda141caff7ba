//! # Ironpane
//!
//! A small **event-time streaming engine** in the style of Apache Beam's
//! windowing model: fixed windows, watermark-driven panes, allowed lateness,
//! deduplication, and windowed file output with deterministic names.
//!
//! ## Key Features
//!
//! - **Fixed windows** - every element lands in exactly one `[start, end)` window
//! - **Watermark-driven firing** - one `ON_TIME` pane per window, then `LATE` panes
//! - **Allowed lateness** - late elements are admitted until `end + lateness`, dropped after
//! - **Deduplication** - global, per-window or per-pane scope
//! - **Deterministic sink** - one output per `(window, timing)`, idempotent on replay
//! - **Downstream consumer** - a second windowing stage over emitted pane identities
//!
//! ## Quick Start
//!
//! ```
//! use ironpane::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let strategy = WindowingStrategy::fixed(5_000).with_allowed_lateness(60_000);
//! let mut engine = TriggerEngine::new(strategy)?;
//!
//! engine.process_element(Element::new("a", 1_000))?;
//! engine.process_element(Element::new("b", 2_000))?;
//!
//! let panes = engine.advance_watermark(5_000)?;
//! assert_eq!(panes.len(), 1);
//! assert_eq!(panes[0].timing(), PaneTiming::OnTime);
//! assert_eq!(panes[0].payload, vec!["a", "b"]);
//!
//! // Within lateness: fires a LATE pane right away.
//! let outcome = engine.process_element(Element::new("c", 3_000))?;
//! assert!(matches!(outcome, ElementOutcome::FiredLate(ref p) if p.index() == 1));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Windows and watermarks
//!
//! [`FixedWindows`] maps an event timestamp to its [`Window`]. A
//! [`WatermarkTracker`] holds the monotone estimate of event-time progress;
//! it never moves backwards.
//!
//! ### Panes
//!
//! A [`Pane`] is one firing of a window. The [`TriggerEngine`] fires at most
//! one `ON_TIME` pane (index 0) when the watermark reaches the window end, and
//! one `LATE` pane per late arrival afterwards, with strictly increasing
//! indices. A window closes once the watermark passes `end + allowed_lateness`.
//!
//! ### Sink
//!
//! [`SinkAdapter`] names each pane by an [`OutputIdentity`]
//! (`<base>/<start>-<end>-<TIMING>-<shard>-of-<n>.txt`) and hands the bytes to
//! a [`PaneWriter`]. Writing the same identity twice keeps the first write.
//!
//! ### Runner
//!
//! [`Runner`] wires source, windowing, delay, sink and downstream consumer as
//! tokio tasks over bounded channels and returns a [`RunReport`].
//!
//! ## Module Overview
//!
//! - [`window`] - timestamps, windows and the fixed-window assigner
//! - [`watermark`] - monotone watermark tracking
//! - [`dedup`] - deduplication scopes and the seen-set
//! - [`pane`] - pane metadata
//! - [`trigger`] - the firing state machine
//! - [`sink`] - output identities and writers
//! - [`consumer`] - the second windowing stage
//! - [`source`] - the numbered test source
//! - [`runner`] - staged async execution
//! - [`lens`] - per-stage observation events
//! - [`metrics`] - run counters and gauges
//! - [`config`] - run configuration and CLI
//! - [`testing`] - writers, builders and assertions for tests

pub mod config;
pub mod consumer;
pub mod dedup;
pub mod error;
pub mod lens;
pub mod metrics;
pub mod pane;
pub mod runner;
pub mod sink;
pub mod source;
pub mod testing;
pub mod trigger;
pub mod watermark;
pub mod window;

// Re-exports
pub use config::{Cli, PipelineConfig};
pub use consumer::{ConsumerOutcome, DownstreamConsumer};
pub use dedup::{DedupScope, Deduplicator};
pub use error::StreamError;
pub use metrics::MetricsCollector;
pub use pane::{Pane, PaneInfo, PaneTiming};
pub use runner::{RunReport, Runner};
pub use sink::{FileSystemWriter, OutputIdentity, PaneWriter, SinkAdapter};
pub use source::{SequenceSource, SourceConfig, StreamItem, Straggler};
pub use trigger::{
    AccumulationMode, ElementOutcome, FiringStatus, TriggerEngine, TriggerStats, WindowState,
    WindowingStrategy,
};
pub use watermark::WatermarkTracker;
pub use window::{END_OF_TIME, Element, FixedWindows, MIN_WATERMARK, TimestampMs, Window};
