//! Mock writers and output readers for tests.

use crate::sink::{OutputIdentity, PaneWriter};
use anyhow::{Context, Result};
use glob::glob;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Recorded {
    outputs: BTreeMap<OutputIdentity, Vec<u8>>,
    attempts: Vec<OutputIdentity>,
}

/// In-memory [`PaneWriter`]. Clones share the same storage.
///
/// Like the file-system writer, the first write of an identity wins; every
/// attempt is still logged.
///
/// # Example
///
/// ```
/// use ironpane::testing::RecordingWriter;
/// use ironpane::{OutputIdentity, PaneTiming, PaneWriter, Window};
///
/// let writer = RecordingWriter::new();
/// let id = OutputIdentity::new("out", Window::new(0, 5_000), PaneTiming::OnTime);
/// writer.write(&id, b"1\n").unwrap();
/// writer.write(&id, b"2\n").unwrap();
///
/// assert_eq!(writer.lines(&id), vec!["1"]);
/// assert_eq!(writer.attempts().len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct RecordingWriter {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored payloads keyed by identity.
    #[must_use]
    pub fn outputs(&self) -> BTreeMap<OutputIdentity, Vec<u8>> {
        self.lock().outputs.clone()
    }

    /// Every write call, in call order, including repeats.
    #[must_use]
    pub fn attempts(&self) -> Vec<OutputIdentity> {
        self.lock().attempts.clone()
    }

    /// Stored identities whose base path is `base_path`.
    #[must_use]
    pub fn identities_under(&self, base_path: &str) -> Vec<OutputIdentity> {
        self.lock()
            .outputs
            .keys()
            .filter(|id| id.base_path == base_path)
            .cloned()
            .collect()
    }

    /// Payload lines of one identity; empty if it was never written.
    #[must_use]
    pub fn lines(&self, identity: &OutputIdentity) -> Vec<String> {
        self.lock()
            .outputs
            .get(identity)
            .map(|bytes| String::from_utf8_lossy(bytes).lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaneWriter for RecordingWriter {
    fn write(&self, identity: &OutputIdentity, payload: &[u8]) -> io::Result<()> {
        let mut recorded = self.lock();
        recorded.attempts.push(identity.clone());
        recorded
            .outputs
            .entry(identity.clone())
            .or_insert_with(|| payload.to_vec());
        Ok(())
    }
}

/// [`PaneWriter`] that fails, optionally after a number of successful writes.
#[derive(Clone, Debug, Default)]
pub struct FailingWriter {
    succeed_first: usize,
    calls: Arc<AtomicUsize>,
}

impl FailingWriter {
    /// Fails every write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts the first `n` writes, then fails.
    #[must_use]
    pub fn after(n: usize) -> Self {
        Self {
            succeed_first: n,
            calls: Arc::default(),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PaneWriter for FailingWriter {
    fn write(&self, identity: &OutputIdentity, _payload: &[u8]) -> io::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.succeed_first {
            return Ok(());
        }
        Err(io::Error::other(format!("injected write failure for {identity}")))
    }
}

/// Read every pane output under `root`, sorted by identity.
///
/// # Errors
///
/// Returns an error if a file cannot be read or its path is not a pane
/// output identity.
pub fn read_outputs(root: &Path) -> Result<Vec<(OutputIdentity, Vec<String>)>> {
    let pattern = format!("{}/**/*.txt", root.display());
    let paths = glob(&pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut outputs = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
        let identity: OutputIdentity = relative
            .to_string_lossy()
            .parse()
            .map_err(anyhow::Error::msg)?;
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        outputs.push((identity, contents.lines().map(str::to_string).collect()));
    }
    outputs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(outputs)
}
