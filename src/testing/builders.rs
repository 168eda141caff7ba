//! Scripted element/watermark timelines.

use crate::error::StreamError;
use crate::pane::Pane;
use crate::source::StreamItem;
use crate::trigger::{ElementOutcome, TriggerEngine};
use crate::window::{Element, TimestampMs};
use std::hash::Hash;

/// A fluent builder for an ordered sequence of elements and watermarks.
///
/// # Example
///
/// ```
/// use ironpane::testing::TimelineBuilder;
/// use ironpane::StreamItem;
///
/// let items = TimelineBuilder::new()
///     .element("a", 1_000)
///     .watermark(5_000)
///     .build();
///
/// assert_eq!(items.len(), 2);
/// assert_eq!(items[1], StreamItem::Watermark(5_000));
/// ```
#[derive(Clone, Debug)]
pub struct TimelineBuilder<T> {
    items: Vec<StreamItem<T>>,
}

impl<T> Default for TimelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimelineBuilder<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn element(mut self, value: T, event_time: TimestampMs) -> Self {
        self.items.push(StreamItem::Element(Element::new(value, event_time)));
        self
    }

    /// Add `(value, event_time)` pairs in order.
    #[must_use]
    pub fn elements(mut self, elements: impl IntoIterator<Item = (T, TimestampMs)>) -> Self {
        self.items.extend(
            elements
                .into_iter()
                .map(|(value, ts)| StreamItem::Element(Element::new(value, ts))),
        );
        self
    }

    #[must_use]
    pub fn watermark(mut self, watermark: TimestampMs) -> Self {
        self.items.push(StreamItem::Watermark(watermark));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn build(self) -> Vec<StreamItem<T>> {
        self.items
    }
}

impl<T: Clone + Eq + Hash> TimelineBuilder<T> {
    /// Feed the timeline into `engine` and return every pane it fires, in order.
    ///
    /// Rejected timestamps and regressing watermarks are skipped, as the runner
    /// does; the engine's stats still count them.
    ///
    /// # Panics
    ///
    /// Panics on any other engine error.
    pub fn replay(self, engine: &mut TriggerEngine<T>) -> Vec<Pane<T>> {
        let mut panes = Vec::new();
        for item in self.items {
            match item {
                StreamItem::Element(element) => match engine.process_element(element) {
                    Ok(ElementOutcome::FiredLate(pane)) => panes.push(pane),
                    Ok(_) | Err(StreamError::InvalidTimestamp { .. }) => {}
                    Err(e) => panic!("unexpected engine error: {e}"),
                },
                StreamItem::Watermark(watermark) => match engine.advance_watermark(watermark) {
                    Ok(fired) => panes.extend(fired),
                    Err(StreamError::WatermarkRegression { .. }) => {}
                    Err(e) => panic!("unexpected engine error: {e}"),
                },
            }
        }
        panes
    }
}
