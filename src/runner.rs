//! Staged execution of one pipeline run.
//!
//! ```text
//! source ─▶ windowing ─▶ delay ─▶ sink ─▶ consumer
//! ```
//!
//! Stages are tokio tasks connected by bounded `mpsc` channels and exchange
//! elements/panes and watermarks in-band. The windowing stage is the single
//! owner of the upstream [`TriggerEngine`]; sink and consumer do blocking file
//! I/O and run on the blocking pool.
//!
//! The delay stage forwards each pane from its own task after the configured
//! delay. Watermarks pass straight through, so a delayed pane can reach the
//! consumer after its watermark has moved past the pane's window.

use crate::config::PipelineConfig;
use crate::consumer::DownstreamConsumer;
use crate::error::StreamError;
use crate::lens::{self, Stage};
use crate::metrics::MetricsCollector;
use crate::pane::{Pane, PaneInfo};
use crate::sink::{OutputIdentity, PaneWriter, SinkAdapter};
use crate::source::{SequenceSource, StreamItem};
use crate::trigger::{ElementOutcome, TriggerEngine, TriggerStats};
use crate::window::{END_OF_TIME, MIN_WATERMARK, TimestampMs};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{error, info, warn};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Output of the windowing stage.
#[derive(Debug)]
enum Fired<T> {
    Pane(Pane<T>),
    Watermark(TimestampMs),
}

/// Output of the sink stage.
#[derive(Debug)]
enum Emitted {
    Identity { identity: OutputIdentity, info: PaneInfo },
    Watermark(TimestampMs),
}

/// What a finished run produced.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub source_elements: u64,
    pub upstream: TriggerStats,
    pub global_dedup_keys: usize,
    /// Last source watermark before end of input.
    pub final_watermark: TimestampMs,
    /// First-stage identities in commit order.
    pub committed: Vec<OutputIdentity>,
    pub consumer: TriggerStats,
    pub consumer_identities_dropped: u64,
    /// Second-stage identities in commit order.
    pub consumer_committed: Vec<OutputIdentity>,
}

impl RunReport {
    #[allow(clippy::cast_precision_loss)]
    pub fn record_into(&self, metrics: &MetricsCollector) {
        let up = &self.upstream;
        metrics.set_counter("source_elements", self.source_elements);
        metrics.set_counter("elements_admitted", up.elements_admitted);
        metrics.set_counter("duplicates_dropped", up.duplicates_dropped);
        metrics.set_counter("late_elements_dropped", up.late_elements_dropped);
        metrics.set_counter("invalid_timestamps", up.invalid_timestamps);
        metrics.set_counter("panes_on_time", up.panes_on_time);
        metrics.set_counter("panes_late", up.panes_late);
        metrics.set_counter("windows_closed", up.windows_closed);
        metrics.set_counter("panes_committed", self.committed.len() as u64);
        metrics.set_counter("consumer_identities_dropped", self.consumer_identities_dropped);
        metrics.set_counter("consumer_panes_committed", self.consumer_committed.len() as u64);
        metrics.set_gauge("dedup_keys_global", self.global_dedup_keys as f64);
        metrics.set_gauge("watermark_ms", self.final_watermark as f64);
        metrics.describe(
            "dedup_keys_global",
            "Keys retained by the unbounded global dedup scope",
        );
        metrics.describe(
            "consumer_identities_dropped",
            "Pane identities the downstream consumer dropped as too late",
        );
    }
}

#[derive(Default)]
pub struct Runner {
    pub config: PipelineConfig,
}

impl Runner {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the source finishes or `shutdown` resolves.
    ///
    /// Both sink stages write through clones of `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or when any stage fails; a
    /// [`StreamError::SinkWriteFailure`] is reported in preference to the
    /// channel-closed errors it causes in neighbouring stages.
    pub async fn run<W, F>(&self, writer: W, shutdown: F) -> Result<RunReport>
    where
        W: PaneWriter + Clone + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let config = &self.config;
        config.validate()?;
        let engine = TriggerEngine::<u64>::new(config.upstream_strategy())?;
        let sink = SinkAdapter::new(config.files_base_path(), writer.clone());
        let consumer = DownstreamConsumer::new(
            config.consumer_strategy(),
            SinkAdapter::new(config.distinct_base_path(), writer),
        )?;

        info!(
            allowed_lateness_ms = config.allowed_lateness_ms,
            window_size_ms = config.window_size_ms,
            dedup_scope = %config.dedup_scope,
            files = %sink.base_path(),
            "starting pipeline"
        );

        let (source_tx, source_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (fired_tx, fired_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (delayed_tx, delayed_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (emitted_tx, emitted_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let pacing = config
            .pace_source
            .then(|| Duration::from_millis(config.source.interval_ms.unsigned_abs()));
        let delay = Duration::from_millis(config.sink_delay_ms);

        let source = tokio::spawn(source_stage(
            SequenceSource::new(config.source.clone()),
            pacing,
            shutdown,
            source_tx,
        ));
        let windowing = tokio::spawn(windowing_stage(engine, source_rx, fired_tx));
        let delayed = tokio::spawn(delay_stage(delay, fired_rx, delayed_tx));
        let sink = tokio::task::spawn_blocking(move || sink_stage(&sink, delayed_rx, emitted_tx));
        let consumer = tokio::task::spawn_blocking(move || consumer_stage(consumer, emitted_rx));

        let results = (
            join("source", source).await,
            join("windowing", windowing).await,
            join("delay", delayed).await,
            join("sink", sink).await,
            join("consumer", consumer).await,
        );
        let (source_elements, windowing, (), committed, consumer) = match results {
            (Ok(s), Ok(w), Ok(d), Ok(k), Ok(c)) => (s, w, d, k, c),
            (s, w, d, k, c) => {
                let mut failures: Vec<anyhow::Error> =
                    [s.err(), w.err(), d.err(), k.err(), c.err()]
                        .into_iter()
                        .flatten()
                        .collect();
                // A failing stage closes its channels; report the stage that failed first.
                let root = failures
                    .iter()
                    .position(|e| !is_channel_closed(e))
                    .unwrap_or(0);
                return Err(failures.swap_remove(root));
            }
        };

        let report = RunReport {
            source_elements,
            upstream: windowing.stats,
            global_dedup_keys: windowing.global_dedup_keys,
            final_watermark: windowing.last_watermark,
            committed,
            consumer: consumer.stats,
            consumer_identities_dropped: consumer.identities_dropped,
            consumer_committed: consumer.committed,
        };
        info!(
            elements = report.source_elements,
            panes = report.committed.len(),
            consumer_panes = report.consumer_committed.len(),
            consumer_dropped = report.consumer_identities_dropped,
            "pipeline finished"
        );
        Ok(report)
    }

    /// Run until the source reaches its element limit.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_to_completion<W>(&self, writer: W) -> Result<RunReport>
    where
        W: PaneWriter + Clone + 'static,
    {
        self.run(writer, std::future::pending()).await
    }
}

async fn join<T>(stage: &'static str, handle: JoinHandle<Result<T>>) -> Result<T> {
    handle
        .await
        .with_context(|| format!("{stage} stage did not complete"))?
        .with_context(|| format!("{stage} stage failed"))
}

fn is_channel_closed(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<StreamError>(),
        Some(StreamError::ChannelClosed(_))
    )
}

async fn forward<T>(tx: &Sender<T>, item: T, stage: &'static str) -> Result<()> {
    tx.send(item)
        .await
        .map_err(|_| StreamError::ChannelClosed(stage))?;
    Ok(())
}

async fn source_stage<F>(
    mut source: SequenceSource,
    pacing: Option<Duration>,
    shutdown: F,
    tx: Sender<StreamItem<u64>>,
) -> Result<u64>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = pacing.map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut elements = 0u64;

    while !source.is_finished() {
        let pace = async {
            match ticker.as_mut() {
                Some(t) => {
                    t.tick().await;
                }
                None => tokio::task::yield_now().await,
            }
        };
        let stopping = tokio::select! {
            biased;
            () = &mut shutdown => true,
            () = pace => false,
        };
        let items = if stopping {
            info!(produced = source.produced(), "source stopped");
            source.stop()
        } else {
            match source.next_tick() {
                Some(items) => items,
                None => break,
            }
        };
        for item in items {
            if let StreamItem::Element(element) = &item {
                lens::element(Stage::Source, element);
                elements += 1;
            }
            forward(&tx, item, "source").await?;
        }
    }
    Ok(elements)
}

struct WindowingReport {
    stats: TriggerStats,
    global_dedup_keys: usize,
    last_watermark: TimestampMs,
}

async fn windowing_stage(
    mut engine: TriggerEngine<u64>,
    mut rx: Receiver<StreamItem<u64>>,
    tx: Sender<Fired<u64>>,
) -> Result<WindowingReport> {
    let mut last_watermark = MIN_WATERMARK;

    while let Some(item) = rx.recv().await {
        match item {
            StreamItem::Element(element) => {
                lens::element(Stage::Assign, &element);
                match engine.process_element(element.clone()) {
                    Ok(ElementOutcome::Buffered { .. }) => {}
                    Ok(ElementOutcome::Duplicate { window }) => lens::duplicate(&element, &window),
                    Ok(ElementOutcome::Dropped { window, watermark }) => lens::late_dropped(
                        Stage::Assign,
                        &element.value,
                        &window,
                        element.event_time,
                        watermark,
                    ),
                    Ok(ElementOutcome::FiredLate(pane)) => {
                        lens::pane(Stage::Fire, &pane);
                        forward(&tx, Fired::Pane(pane), "windowing").await?;
                    }
                    Err(e @ StreamError::InvalidTimestamp { .. }) => lens::invalid_timestamp(
                        Stage::Assign,
                        &element.value,
                        element.event_time,
                        &e,
                    ),
                    Err(e) => return Err(e.into()),
                }
            }
            StreamItem::Watermark(watermark) => match engine.advance_watermark(watermark) {
                Ok(panes) => {
                    for pane in panes {
                        lens::pane(Stage::Fire, &pane);
                        forward(&tx, Fired::Pane(pane), "windowing").await?;
                    }
                    if watermark < END_OF_TIME {
                        last_watermark = watermark;
                    }
                    forward(&tx, Fired::Watermark(watermark), "windowing").await?;
                }
                Err(e @ StreamError::WatermarkRegression { .. }) => {
                    warn!(error = %e, "ignoring source watermark");
                }
                Err(e) => return Err(e.into()),
            },
        }
    }

    // Upstream ended without an end-of-input watermark; flush best-effort.
    if engine.watermark() < END_OF_TIME {
        for pane in engine.finish() {
            lens::pane(Stage::Fire, &pane);
            forward(&tx, Fired::Pane(pane), "windowing").await?;
        }
        forward(&tx, Fired::Watermark(END_OF_TIME), "windowing").await?;
    }

    Ok(WindowingReport {
        stats: engine.stats(),
        global_dedup_keys: engine.global_dedup_keys(),
        last_watermark,
    })
}

/// Forwards each pane from its own task after `delay`.
///
/// Watermarks pass through as they arrive, so a delayed pane reaches the sink
/// behind whatever watermark the source has reached by then. Only the
/// end-of-input watermark waits for the panes still in flight.
async fn delay_stage(
    delay: Duration,
    mut rx: Receiver<Fired<u64>>,
    tx: Sender<Fired<u64>>,
) -> Result<()> {
    let mut in_flight = JoinSet::new();
    let mut end_of_input = false;
    let mut open = true;

    while open || !in_flight.is_empty() {
        tokio::select! {
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                joined.context("delayed pane task did not complete")??;
            }
            item = rx.recv(), if open => match item {
                None => open = false,
                Some(Fired::Pane(pane)) if delay.is_zero() => {
                    forward(&tx, Fired::Pane(pane), "delay").await?;
                }
                Some(Fired::Pane(pane)) => {
                    lens::pane(Stage::Delay, &pane);
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        sleep(delay).await;
                        forward(&tx, Fired::Pane(pane), "delay").await
                    });
                }
                Some(Fired::Watermark(END_OF_TIME)) => end_of_input = true,
                Some(Fired::Watermark(watermark)) => {
                    forward(&tx, Fired::Watermark(watermark), "delay").await?;
                }
            }
        }
    }
    if end_of_input {
        forward(&tx, Fired::Watermark(END_OF_TIME), "delay").await?;
    }
    Ok(())
}

fn sink_stage<W: PaneWriter>(
    sink: &SinkAdapter<W>,
    mut rx: Receiver<Fired<u64>>,
    tx: Sender<Emitted>,
) -> Result<Vec<OutputIdentity>> {
    let mut committed = Vec::new();
    while let Some(item) = rx.blocking_recv() {
        let out = match item {
            Fired::Pane(pane) => {
                let identity = sink.commit(&pane).inspect_err(|e| {
                    error!(error = %e, window = %pane.window, "pane commit failed");
                })?;
                lens::identity(Stage::Commit, &identity, &pane.info);
                committed.push(identity.clone());
                Emitted::Identity {
                    identity,
                    info: pane.info,
                }
            }
            Fired::Watermark(watermark) => Emitted::Watermark(watermark),
        };
        tx.blocking_send(out)
            .map_err(|_| StreamError::ChannelClosed("sink"))?;
    }
    Ok(committed)
}

struct ConsumerReport {
    stats: TriggerStats,
    identities_dropped: u64,
    committed: Vec<OutputIdentity>,
}

fn consumer_stage<W: PaneWriter>(
    mut consumer: DownstreamConsumer<W>,
    mut rx: Receiver<Emitted>,
) -> Result<ConsumerReport> {
    while let Some(item) = rx.blocking_recv() {
        match item {
            Emitted::Identity { identity, info } => {
                lens::identity(Stage::EmittedFile, &identity, &info);
                consumer.receive(&identity)?;
            }
            Emitted::Watermark(watermark) => {
                consumer.advance_watermark(watermark)?;
            }
        }
    }
    consumer.finish()?;
    Ok(ConsumerReport {
        stats: consumer.stats(),
        identities_dropped: consumer.identities_dropped(),
        committed: consumer.committed().to_vec(),
    })
}
