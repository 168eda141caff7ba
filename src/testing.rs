//! Testing utilities for windowed pipelines.
//!
//! - **Assertions**: pane-level checks (index ordering, one `ON_TIME` per window, payloads)
//! - **Timeline builder**: script elements and watermarks, replay them into an engine
//! - **Mock I/O**: in-memory and failing [`PaneWriter`](crate::sink::PaneWriter)s,
//!   and a reader for file-system output
//!
//! # Quick Start
//!
//! ```
//! use ironpane::testing::*;
//! use ironpane::{PaneTiming, TriggerEngine, Window, WindowingStrategy};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut engine = TriggerEngine::new(WindowingStrategy::fixed(5_000))?;
//! let panes = TimelineBuilder::new()
//!     .elements([(1, 0), (2, 1_000), (3, 2_000)])
//!     .watermark(5_000)
//!     .replay(&mut engine);
//!
//! assert_eq!(panes.len(), 1);
//! assert_pane(&panes[0], Window::new(0, 5_000), PaneTiming::OnTime, 0);
//! assert_payload_unordered(&panes[0], &[3, 1, 2]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod mock_io;

pub use assertions::*;
pub use builders::*;
pub use mock_io::*;
