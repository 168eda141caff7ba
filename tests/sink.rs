use anyhow::Result;
use ironpane::sink::render_payload;
use ironpane::testing::{FailingWriter, RecordingWriter, read_outputs};
use ironpane::*;

const BASE: &str = "pipe_with_lateness_60s/files";

fn pane(start: i64, index: u64, timing: PaneTiming, payload: Vec<u64>) -> Pane<u64> {
    Pane {
        window: Window::new(start, start + 5_000),
        info: PaneInfo {
            index,
            timing,
            is_first: index == 0,
            is_last: false,
        },
        payload,
    }
}

#[test]
fn identity_names_window_timing_and_shard() {
    let id = OutputIdentity::new(BASE, Window::new(0, 5_000), PaneTiming::OnTime);
    assert_eq!(id.to_string(), "pipe_with_lateness_60s/files/0-5000-ON_TIME-0-of-1.txt");
    assert_eq!(id.file_name(), "0-5000-ON_TIME-0-of-1.txt");

    let late = OutputIdentity::new("", Window::new(5_000, 10_000), PaneTiming::Late);
    assert_eq!(late.to_string(), "5000-10000-LATE-0-of-1.txt");
}

#[test]
fn identity_parses_back() -> Result<()> {
    let id: OutputIdentity = "pipe_with_lateness_60s/files/10000-15000-LATE-0-of-1.txt"
        .parse()
        .map_err(anyhow::Error::msg)?;
    assert_eq!(id.base_path, BASE);
    assert_eq!(id.window, Window::new(10_000, 15_000));
    assert_eq!(id.timing, PaneTiming::Late);
    assert_eq!((id.shard_index, id.num_shards), (0, 1));

    assert!("notes.txt".parse::<OutputIdentity>().is_err());
    assert!("5000-0-LATE-0-of-1.txt".parse::<OutputIdentity>().is_err());
    assert!("0-5000-EARLY-0-of-1.txt".parse::<OutputIdentity>().is_err());
    Ok(())
}

#[test]
fn pane_timing_renders_upper_snake_case() -> Result<()> {
    assert_eq!(PaneTiming::OnTime.to_string(), "ON_TIME");
    assert_eq!(serde_json::to_string(&PaneTiming::Late)?, "\"LATE\"");
    assert_eq!("ON_TIME".parse::<PaneTiming>(), Ok(PaneTiming::OnTime));
    Ok(())
}

#[test]
fn payload_is_one_value_per_line() {
    assert_eq!(render_payload(&[1, 2, 3]), b"1\n2\n3\n");
    assert!(render_payload::<u64>(&[]).is_empty());
}

#[test]
fn committing_twice_is_idempotent() -> Result<()> {
    let writer = RecordingWriter::new();
    let sink = SinkAdapter::new(BASE, writer.clone());
    let p = pane(0, 0, PaneTiming::OnTime, vec![0, 1, 2]);

    let first = sink.commit(&p)?;
    let second = sink.commit(&p)?;
    assert_eq!(first, second);
    assert_eq!(first, sink.identity_for(&p));
    assert_eq!(writer.attempts().len(), 2);
    assert_eq!(writer.len(), 1);
    assert_eq!(writer.lines(&first), vec!["0", "1", "2"]);
    Ok(())
}

#[test]
fn late_panes_of_a_window_share_one_identity() -> Result<()> {
    let writer = RecordingWriter::new();
    let sink = SinkAdapter::new(BASE, writer.clone());

    let a = sink.commit(&pane(0, 1, PaneTiming::Late, vec![2]))?;
    let b = sink.commit(&pane(0, 2, PaneTiming::Late, vec![3]))?;
    assert_eq!(a, b);
    // First write wins.
    assert_eq!(writer.lines(&a), vec!["2"]);
    assert_eq!(writer.identities_under(BASE), vec![a]);
    Ok(())
}

#[test]
fn writer_failure_is_a_sink_write_failure() {
    let sink = SinkAdapter::new(BASE, FailingWriter::new());
    let err = sink
        .commit(&pane(0, 0, PaneTiming::OnTime, vec![1]))
        .unwrap_err();

    match err {
        StreamError::SinkWriteFailure { identity, source } => {
            assert_eq!(identity, format!("{BASE}/0-5000-ON_TIME-0-of-1.txt"));
            assert!(source.to_string().contains("injected"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn file_system_writer_keeps_first_write() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let writer = FileSystemWriter::new(dir.path());
    let sink = SinkAdapter::new(BASE, writer.clone());

    let id = sink.commit(&pane(5_000, 0, PaneTiming::OnTime, vec![5, 6]))?;
    let path = writer.path_for(&id);
    assert_eq!(std::fs::read_to_string(&path)?, "5\n6\n");

    sink.commit(&pane(5_000, 0, PaneTiming::OnTime, vec![7]))?;
    assert_eq!(std::fs::read_to_string(&path)?, "5\n6\n");

    let outputs = read_outputs(dir.path())?;
    assert_eq!(outputs, vec![(id, vec!["5".to_string(), "6".to_string()])]);
    Ok(())
}

#[test]
fn file_system_writer_reports_io_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // A regular file where the base directory should be.
    std::fs::write(dir.path().join("blocked"), b"")?;
    let sink = SinkAdapter::new("blocked", FileSystemWriter::new(dir.path()));

    let err = sink
        .commit(&pane(0, 0, PaneTiming::OnTime, vec![1]))
        .unwrap_err();
    assert!(matches!(err, StreamError::SinkWriteFailure { .. }));
    Ok(())
}
