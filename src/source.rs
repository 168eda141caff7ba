//! Numbered event source with in-band watermarks.
//!
//! Tick `n` produces element `n` stamped `start_ms + n * interval_ms`, then a
//! watermark equal to that timestamp. A [`Straggler`] setting holds back every
//! N-th element for a few ticks; it is released with its original timestamp
//! after the watermark moved on, which is how late data enters a run.

use crate::watermark::WatermarkTracker;
use crate::window::{END_OF_TIME, Element, TimestampMs};
use serde::Serialize;
use std::collections::VecDeque;

/// Messages flowing from the source into the windowing stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamItem<T> {
    Element(Element<T>),
    Watermark(TimestampMs),
}

/// Hold back every `every`-th element for `delay_ticks` ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Straggler {
    pub every: u64,
    pub delay_ticks: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceConfig {
    pub start_ms: TimestampMs,
    pub interval_ms: i64,
    /// Stop after this many elements; `None` runs until stopped.
    pub limit: Option<u64>,
    pub straggler: Option<Straggler>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            start_ms: 0,
            interval_ms: 1_000,
            limit: None,
            straggler: None,
        }
    }
}

pub struct SequenceSource {
    config: SourceConfig,
    next_seq: u64,
    held: VecDeque<(u64, Element<u64>)>,
    watermark: WatermarkTracker,
    finished: bool,
}

impl SequenceSource {
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            next_seq: 0,
            held: VecDeque::new(),
            watermark: WatermarkTracker::new(),
            finished: false,
        }
    }

    /// Elements generated so far, including ones still held back.
    #[must_use]
    pub fn produced(&self) -> u64 {
        self.next_seq
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Items of the next tick, or `None` once the source has finished.
    ///
    /// Reaching the configured limit behaves like [`stop`](Self::stop).
    pub fn next_tick(&mut self) -> Option<Vec<StreamItem<u64>>> {
        if self.finished {
            return None;
        }
        if self.config.limit.is_some_and(|limit| self.next_seq >= limit) {
            return Some(self.stop());
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let ts = self.timestamp_of(seq);
        let mut items = Vec::new();

        while self.held.front().is_some_and(|(due, _)| *due <= seq) {
            if let Some((_, element)) = self.held.pop_front() {
                items.push(StreamItem::Element(element));
            }
        }

        let element = Element::new(seq, ts);
        match self.config.straggler {
            Some(s) if s.every > 0 && (seq + 1) % s.every == 0 => {
                self.held.push_back((seq + s.delay_ticks, element));
            }
            _ => items.push(StreamItem::Element(element)),
        }

        if let Ok(watermark) = self.watermark.advance(ts) {
            items.push(StreamItem::Watermark(watermark));
        }
        Some(items)
    }

    /// Release held elements and the end-of-input watermark, then finish.
    pub fn stop(&mut self) -> Vec<StreamItem<u64>> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut items: Vec<_> = self
            .held
            .drain(..)
            .map(|(_, element)| StreamItem::Element(element))
            .collect();
        items.push(StreamItem::Watermark(END_OF_TIME));
        items
    }

    fn timestamp_of(&self, seq: u64) -> TimestampMs {
        let seq = i64::try_from(seq).unwrap_or(i64::MAX);
        self.config
            .start_ms
            .saturating_add(seq.saturating_mul(self.config.interval_ms))
    }
}

impl Iterator for SequenceSource {
    type Item = Vec<StreamItem<u64>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tick()
    }
}
