//! Run metrics: counters and gauges with print and JSON export.
//!
//! # Example
//!
//! ```
//! use ironpane::metrics::MetricsCollector;
//!
//! let metrics = MetricsCollector::new();
//! metrics.record_start();
//! metrics.increment_counter("panes_on_time", 2);
//! metrics.increment_counter("panes_on_time", 1);
//! metrics.set_gauge("watermark_ms", 65_000.0);
//! metrics.record_end();
//!
//! assert_eq!(metrics.counter("panes_on_time"), Some(3));
//! assert!(metrics.to_json()["watermark_ms"]["value"].is_number());
//! ```

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(f64),
}

impl MetricValue {
    fn to_json(self) -> Value {
        match self {
            Self::Counter(c) => json!(c),
            Self::Gauge(g) => json!(g),
        }
    }
}

struct Entry {
    value: MetricValue,
    description: Option<&'static str>,
}

/// Thread-safe, clonable handle onto one run's metrics.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

#[derive(Default)]
struct MetricsCollectorInner {
    metrics: BTreeMap<String, Entry>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsCollectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_start(&self) {
        self.lock().start_time = Some(Instant::now());
    }

    pub fn record_end(&self) {
        self.lock().end_time = Some(Instant::now());
    }

    /// Elapsed run time, once both start and end were recorded.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to a counter, creating it at zero first.
    ///
    /// A gauge registered under the same name is replaced by the counter.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut inner = self.lock();
        let entry = inner.metrics.entry(name.to_string()).or_insert(Entry {
            value: MetricValue::Counter(0),
            description: None,
        });
        entry.value = match entry.value {
            MetricValue::Counter(c) => MetricValue::Counter(c.saturating_add(value)),
            MetricValue::Gauge(_) => MetricValue::Counter(value),
        };
    }

    pub fn set_counter(&self, name: &str, value: u64) {
        self.set(name, MetricValue::Counter(value));
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        self.set(name, MetricValue::Gauge(value));
    }

    fn set(&self, name: &str, value: MetricValue) {
        let mut inner = self.lock();
        inner
            .metrics
            .entry(name.to_string())
            .and_modify(|e| e.value = value)
            .or_insert(Entry { value, description: None });
    }

    /// Attach a human-readable description to an existing metric.
    pub fn describe(&self, name: &str, description: &'static str) {
        if let Some(entry) = self.lock().metrics.get_mut(name) {
            entry.description = Some(description);
        }
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        let value = self.lock().metrics.get(name)?.value;
        match value {
            MetricValue::Counter(c) => Some(c),
            MetricValue::Gauge(_) => None,
        }
    }

    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        let value = self.lock().metrics.get(name)?.value;
        match value {
            MetricValue::Gauge(g) => Some(g),
            MetricValue::Counter(_) => None,
        }
    }

    /// All metrics as `{ name: { value, description? } }`, plus `execution_time_ms`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let inner = self.lock();
        let mut metrics_json = serde_json::Map::new();

        for (name, entry) in &inner.metrics {
            let mut metric_obj = serde_json::Map::new();
            metric_obj.insert("value".to_string(), entry.value.to_json());
            if let Some(desc) = entry.description {
                metric_obj.insert("description".to_string(), json!(desc));
            }
            metrics_json.insert(name.clone(), Value::Object(metric_obj));
        }

        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            let elapsed_ms = end.duration_since(start).as_millis();
            metrics_json.insert(
                "execution_time_ms".to_string(),
                json!({
                    "value": elapsed_ms,
                    "description": "Total pipeline execution time in milliseconds",
                }),
            );
        }
        drop(inner);
        Value::Object(metrics_json)
    }

    /// Print all metrics to stdout, sorted by name.
    pub fn print(&self) {
        println!("\n========== Pipeline Metrics ==========");

        let inner = self.lock();
        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            let elapsed = end.duration_since(start);
            println!(
                "Execution Time: {:.3}s ({} ms)",
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            );
            println!("--------------------------------------");
        }

        for (name, entry) in &inner.metrics {
            let value = entry.value.to_json();
            match entry.description {
                Some(desc) => println!("{name}: {value} ({desc})"),
                None => println!("{name}: {value}"),
            }
        }
        drop(inner);
        println!("======================================\n");
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file =
            File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Names and values of every metric.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, MetricValue> {
        self.lock()
            .metrics
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value))
            .collect()
    }
}
