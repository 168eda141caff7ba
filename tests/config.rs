use clap::Parser;
use ironpane::config::{Cli, PipelineConfig};
use ironpane::{AccumulationMode, DedupScope, StreamError, Straggler};

fn parse(args: &[&str]) -> anyhow::Result<PipelineConfig> {
    let cli = Cli::try_parse_from(std::iter::once("ironpane").chain(args.iter().copied()))?;
    Ok(cli.into_config()?)
}

#[test]
fn defaults_match_the_reference_run() -> anyhow::Result<()> {
    let config = parse(&[])?;
    assert_eq!(config, PipelineConfig::default());
    assert_eq!(config.upstream_strategy().dedup_scope, DedupScope::Global);
    assert_eq!(config.files_base_path(), "pipe_with_lateness_0s/files");
    assert_eq!(
        config.distinct_base_path(),
        "pipe_with_lateness_0s/files-after-distinct"
    );
    Ok(())
}

#[test]
fn positional_lateness_applies_to_both_stages() -> anyhow::Result<()> {
    let config = parse(&["60"])?;
    assert_eq!(config.allowed_lateness_ms, 60_000);
    assert_eq!(config.consumer_allowed_lateness_ms, 60_000);
    assert_eq!(config.files_base_path(), "pipe_with_lateness_60s/files");
    assert_eq!(config.upstream_strategy().allowed_lateness_ms, 60_000);
    assert_eq!(config.consumer_strategy().dedup_scope, DedupScope::Global);

    let config = parse(&["60", "--consumer-lateness-secs", "0"])?;
    assert_eq!(config.consumer_allowed_lateness_ms, 0);
    Ok(())
}

#[test]
fn options_map_onto_the_config() -> anyhow::Result<()> {
    let config = parse(&[
        "10",
        "--window-secs",
        "2",
        "--limit",
        "20",
        "--no-pacing",
        "--delay-ms",
        "0",
        "--dedup-scope",
        "pane",
        "--accumulate",
        "--straggle-every",
        "5",
        "--straggle-ticks",
        "7",
    ])?;

    assert_eq!(config.window_size_ms, 2_000);
    assert_eq!(config.source.limit, Some(20));
    assert!(!config.pace_source);
    assert_eq!(config.sink_delay_ms, 0);
    assert_eq!(config.dedup_scope, DedupScope::Pane);
    assert_eq!(config.accumulation, AccumulationMode::Accumulating);
    assert_eq!(
        config.source.straggler,
        Some(Straggler {
            every: 5,
            delay_ticks: 7
        })
    );
    Ok(())
}

#[test]
fn straggler_flags_come_in_pairs() {
    assert!(Cli::try_parse_from(["ironpane", "--straggle-every", "5"]).is_err());
}

#[test]
fn invalid_values_are_config_errors() {
    let err = Cli::try_parse_from(["ironpane", "--window-secs", "0"])
        .map_err(anyhow::Error::from)
        .and_then(|cli| cli.into_config().map_err(anyhow::Error::from))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StreamError>(),
        Some(StreamError::InvalidConfig(_))
    ));

    assert!(Cli::try_parse_from(["ironpane", "--dedup-scope", "session"]).is_err());
    assert!(parse(&["--straggle-every", "0", "--straggle-ticks", "3"]).is_err());
}
