//! Emitted window snapshots and their firing metadata.

use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When a pane fired relative to the watermark passing its window's end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaneTiming {
    /// Fired by the watermark reaching the end of the window.
    OnTime,
    /// Fired by an element admitted after the watermark passed the window.
    Late,
}

impl PaneTiming {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "ON_TIME",
            Self::Late => "LATE",
        }
    }
}

impl fmt::Display for PaneTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaneTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON_TIME" => Ok(Self::OnTime),
            "LATE" => Ok(Self::Late),
            other => Err(format!("unknown pane timing '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaneInfo {
    /// Position of the pane within its window, starting at 0.
    pub index: u64,
    pub timing: PaneTiming,
    pub is_first: bool,
    /// Only set when the pane fired in the same step that closed its window.
    pub is_last: bool,
}

/// One immutable firing of a window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pane<T> {
    pub window: Window,
    pub info: PaneInfo,
    pub payload: Vec<T>,
}

impl<T> Pane<T> {
    #[must_use]
    pub fn index(&self) -> u64 {
        self.info.index
    }

    #[must_use]
    pub fn timing(&self) -> PaneTiming {
        self.info.timing
    }
}
