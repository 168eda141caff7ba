//! First-seen-wins deduplication.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Key space and lifetime over which "already seen" is tracked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// Across all windows for the whole run. State is never evicted.
    #[default]
    Global,
    /// Within one window, across all of its panes, until the window closes.
    Window,
    /// Within the values buffered for the next pane only.
    Pane,
}

impl fmt::Display for DedupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::Window => "window",
            Self::Pane => "pane",
        })
    }
}

impl FromStr for DedupScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "window" => Ok(Self::Window),
            "pane" => Ok(Self::Pane),
            other => Err(format!(
                "unknown dedup scope '{other}' (expected global, window or pane)"
            )),
        }
    }
}

/// Admits each key once; later arrivals of the same key are rejected.
///
/// Global instances grow without bound. That is acceptable for bounded demo
/// runs; long-running pipelines should watch the `dedup_keys_global` gauge.
#[derive(Clone, Debug)]
pub struct Deduplicator<K> {
    seen: HashSet<K>,
}

impl<K> Default for Deduplicator<K> {
    fn default() -> Self {
        Self { seen: HashSet::new() }
    }
}

impl<K: Eq + Hash> Deduplicator<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records `key` the first time it is seen, `false` afterwards.
    pub fn admit(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
