use anyhow::{Context, Result};
use clap::Parser;
use ironpane::config::Cli;
use ironpane::metrics::MetricsCollector;
use ironpane::runner::Runner;
use ironpane::sink::FileSystemWriter;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = fmt::layer().with_target(false).with_filter(filter);
    tracing_subscriber::registry().with(log_layer).init();
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, draining pipeline"),
        Err(e) => {
            warn!(error = %e, "cannot listen for interrupts; running until the source finishes");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let config = Cli::parse()
        .into_config()
        .context("invalid command-line arguments")?;
    let writer = FileSystemWriter::new(config.output_root.clone());
    let metrics_path = config.metrics_json.clone();
    let runner = Runner::new(config);

    let metrics = MetricsCollector::new();
    metrics.record_start();
    let report = runner.run(writer, ctrl_c()).await?;
    metrics.record_end();

    report.record_into(&metrics);
    metrics.print();
    if let Some(path) = metrics_path {
        metrics
            .save_to_file(&path)
            .with_context(|| format!("saving metrics to {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
    }
    Ok(())
}
