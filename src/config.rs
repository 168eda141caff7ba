//! Run configuration and its command-line front end.

use crate::dedup::DedupScope;
use crate::error::{Result, StreamError};
use crate::source::{SourceConfig, Straggler};
use crate::trigger::{AccumulationMode, WindowingStrategy};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

const FILES_FOLDER: &str = "files";
const FILES_AFTER_DISTINCT_FOLDER: &str = "files-after-distinct";

/// Everything one pipeline run needs. Durations are milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    pub allowed_lateness_ms: i64,
    pub window_size_ms: i64,
    pub source: SourceConfig,
    /// Emit one tick per `source.interval_ms` of wall-clock time.
    pub pace_source: bool,
    /// Wall-clock delay applied to every pane before it is committed.
    pub sink_delay_ms: u64,
    pub output_root: PathBuf,
    pub consumer_allowed_lateness_ms: i64,
    pub dedup_scope: DedupScope,
    pub accumulation: AccumulationMode,
    pub metrics_json: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            allowed_lateness_ms: 0,
            window_size_ms: 5_000,
            source: SourceConfig::default(),
            pace_source: true,
            sink_delay_ms: 10_000,
            output_root: PathBuf::from("."),
            consumer_allowed_lateness_ms: 0,
            dedup_scope: DedupScope::Global,
            accumulation: AccumulationMode::Discarding,
            metrics_json: None,
        }
    }
}

impl PipelineConfig {
    fn run_folder(&self) -> String {
        format!("pipe_with_lateness_{}s", self.allowed_lateness_ms / 1_000)
    }

    /// Base path of first-stage pane outputs.
    #[must_use]
    pub fn files_base_path(&self) -> String {
        format!("{}/{FILES_FOLDER}", self.run_folder())
    }

    /// Base path of the downstream consumer's outputs.
    #[must_use]
    pub fn distinct_base_path(&self) -> String {
        format!("{}/{FILES_AFTER_DISTINCT_FOLDER}", self.run_folder())
    }

    #[must_use]
    pub fn upstream_strategy(&self) -> WindowingStrategy {
        WindowingStrategy::fixed(self.window_size_ms)
            .with_allowed_lateness(self.allowed_lateness_ms)
            .with_accumulation(self.accumulation)
            .with_dedup_scope(self.dedup_scope)
    }

    #[must_use]
    pub fn consumer_strategy(&self) -> WindowingStrategy {
        WindowingStrategy::fixed(self.window_size_ms)
            .with_allowed_lateness(self.consumer_allowed_lateness_ms)
            .with_dedup_scope(DedupScope::Global)
    }

    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.window_size_ms <= 0 {
            return Err(invalid(format!(
                "window size must be positive, got {}ms",
                self.window_size_ms
            )));
        }
        if self.allowed_lateness_ms < 0 || self.consumer_allowed_lateness_ms < 0 {
            return Err(invalid("allowed lateness must not be negative".to_string()));
        }
        if self.source.interval_ms <= 0 {
            return Err(invalid(format!(
                "source interval must be positive, got {}ms",
                self.source.interval_ms
            )));
        }
        if self.source.start_ms < 0 {
            return Err(invalid("source start must not be negative".to_string()));
        }
        if self
            .source
            .straggler
            .is_some_and(|s| s.every == 0 || s.delay_ticks == 0)
        {
            return Err(invalid("straggler period and delay must both be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> StreamError {
    StreamError::InvalidConfig(msg)
}

fn secs_to_ms(secs: u64) -> Result<i64> {
    secs.checked_mul(1_000)
        .and_then(|ms| i64::try_from(ms).ok())
        .ok_or_else(|| invalid(format!("{secs}s does not fit in milliseconds")))
}

/// Fixed-window streaming demo with allowed lateness and windowed file output.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Allowed lateness in seconds
    #[arg(default_value_t = 0)]
    pub allowed_lateness_secs: u64,

    /// Fixed window size in seconds
    #[arg(long, default_value_t = 5)]
    pub window_secs: u64,

    /// Event-time distance between generated elements, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub interval_ms: u64,

    /// Stop after this many elements (runs until Ctrl-C when absent)
    #[arg(long)]
    pub limit: Option<u64>,

    /// Generate elements as fast as possible instead of one per interval
    #[arg(long)]
    pub no_pacing: bool,

    /// Delay applied to every pane before it is committed, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub delay_ms: u64,

    /// Directory under which the pipe_with_lateness_* folders are created
    #[arg(long, default_value = ".")]
    pub output_root: PathBuf,

    /// Allowed lateness of the downstream consumer (defaults to the upstream value)
    #[arg(long)]
    pub consumer_lateness_secs: Option<u64>,

    /// Deduplication scope of the first stage: global, window or pane
    #[arg(long, default_value_t = DedupScope::Global)]
    pub dedup_scope: DedupScope,

    /// Emit cumulative panes instead of discarding fired elements
    #[arg(long)]
    pub accumulate: bool,

    /// Hold back every N-th element to produce late data
    #[arg(long, requires = "straggle_ticks")]
    pub straggle_every: Option<u64>,

    /// Number of ticks a held-back element is delayed
    #[arg(long, requires = "straggle_every")]
    pub straggle_ticks: Option<u64>,

    /// Write run metrics as JSON to this path
    #[arg(long)]
    pub metrics_json: Option<PathBuf>,
}

impl Cli {
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if the arguments describe an invalid run.
    pub fn into_config(self) -> Result<PipelineConfig> {
        let allowed_lateness_ms = secs_to_ms(self.allowed_lateness_secs)?;
        let consumer_allowed_lateness_ms = match self.consumer_lateness_secs {
            Some(secs) => secs_to_ms(secs)?,
            None => allowed_lateness_ms,
        };
        let interval_ms = i64::try_from(self.interval_ms)
            .map_err(|_| invalid(format!("interval {}ms is too large", self.interval_ms)))?;
        let straggler = match (self.straggle_every, self.straggle_ticks) {
            (Some(every), Some(delay_ticks)) => Some(Straggler { every, delay_ticks }),
            _ => None,
        };

        let config = PipelineConfig {
            allowed_lateness_ms,
            window_size_ms: secs_to_ms(self.window_secs)?,
            source: SourceConfig {
                start_ms: 0,
                interval_ms,
                limit: self.limit,
                straggler,
            },
            pace_source: !self.no_pacing,
            sink_delay_ms: self.delay_ms,
            output_root: self.output_root,
            consumer_allowed_lateness_ms,
            dedup_scope: self.dedup_scope,
            accumulation: if self.accumulate {
                AccumulationMode::Accumulating
            } else {
                AccumulationMode::Discarding
            },
            metrics_json: self.metrics_json,
        };
        config.validate()?;
        Ok(config)
    }
}
