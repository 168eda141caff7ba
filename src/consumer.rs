//! Second windowing stage over emitted pane identities.
//!
//! The consumer re-windows each [`OutputIdentity`] with its own watermark and
//! lateness, deduplicating globally on the identity itself. An identity whose
//! window this consumer's watermark has already moved past (beyond its own
//! lateness) is dropped and produces no second-stage pane, so lateness losses
//! cascade from one stage to the next.

use crate::dedup::DedupScope;
use crate::error::{Result, StreamError};
use crate::lens::{self, Stage};
use crate::pane::Pane;
use crate::sink::{OutputIdentity, PaneWriter, SinkAdapter};
use crate::trigger::{ElementOutcome, TriggerEngine, TriggerStats, WindowingStrategy};
use crate::window::{Element, TimestampMs};
use tracing::warn;

/// What happened to one received identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumerOutcome {
    /// Buffered until the consumer's window fires.
    Accepted,
    /// Seen before; ignored.
    Duplicate,
    /// Too late for the consumer's own watermark; ignored.
    Dropped,
    /// Admitted late and immediately committed as this second-stage output.
    Committed(OutputIdentity),
}

pub struct DownstreamConsumer<W> {
    engine: TriggerEngine<String>,
    sink: SinkAdapter<W>,
    identities_dropped: u64,
    committed: Vec<OutputIdentity>,
}

impl<W: PaneWriter> DownstreamConsumer<W> {
    /// The strategy's dedup scope is forced to [`DedupScope::Global`].
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if the strategy is invalid.
    pub fn new(strategy: WindowingStrategy, sink: SinkAdapter<W>) -> Result<Self> {
        let engine = TriggerEngine::new(strategy.with_dedup_scope(DedupScope::Global))?;
        Ok(Self {
            engine,
            sink,
            identities_dropped: 0,
            committed: Vec::new(),
        })
    }

    /// Re-admit an upstream identity at its window's last instant.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::SinkWriteFailure`] if a resulting late pane cannot
    /// be written, or [`StreamError::InvalidTimestamp`] for identities whose
    /// window lies outside the valid range.
    pub fn receive(&mut self, identity: &OutputIdentity) -> Result<ConsumerOutcome> {
        let element = Element::new(identity.to_string(), identity.window.max_timestamp());
        match self.engine.process_element(element)? {
            ElementOutcome::Buffered { .. } => Ok(ConsumerOutcome::Accepted),
            ElementOutcome::Duplicate { .. } => Ok(ConsumerOutcome::Duplicate),
            ElementOutcome::Dropped { window, watermark } => {
                self.identities_dropped += 1;
                lens::late_dropped(
                    Stage::FileProcessed,
                    identity,
                    &window,
                    identity.window.max_timestamp(),
                    watermark,
                );
                Ok(ConsumerOutcome::Dropped)
            }
            ElementOutcome::FiredLate(pane) => Ok(ConsumerOutcome::Committed(self.commit(&pane)?)),
        }
    }

    /// Advance the consumer's watermark and commit whatever fires.
    ///
    /// A regressing watermark is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::SinkWriteFailure`] if a pane cannot be written.
    pub fn advance_watermark(&mut self, watermark: TimestampMs) -> Result<Vec<OutputIdentity>> {
        match self.engine.advance_watermark(watermark) {
            Ok(panes) => self.commit_all(&panes),
            Err(e @ StreamError::WatermarkRegression { .. }) => {
                warn!(error = %e, "ignoring consumer watermark");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Fire and commit everything still open.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::SinkWriteFailure`] if a pane cannot be written.
    pub fn finish(&mut self) -> Result<Vec<OutputIdentity>> {
        let panes = self.engine.finish();
        self.commit_all(&panes)
    }

    #[must_use]
    pub fn watermark(&self) -> TimestampMs {
        self.engine.watermark()
    }

    #[must_use]
    pub fn stats(&self) -> TriggerStats {
        self.engine.stats()
    }

    #[must_use]
    pub fn identities_dropped(&self) -> u64 {
        self.identities_dropped
    }

    /// Second-stage identities committed so far, in commit order.
    #[must_use]
    pub fn committed(&self) -> &[OutputIdentity] {
        &self.committed
    }

    fn commit(&mut self, pane: &Pane<String>) -> Result<OutputIdentity> {
        let identity = self.sink.commit(pane)?;
        lens::identity(Stage::FileProcessed, &identity, &pane.info);
        self.committed.push(identity.clone());
        Ok(identity)
    }

    fn commit_all(&mut self, panes: &[Pane<String>]) -> Result<Vec<OutputIdentity>> {
        panes.iter().map(|pane| self.commit(pane)).collect()
    }
}
