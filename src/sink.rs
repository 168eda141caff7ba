//! Windowed output: deterministic pane identities and the write collaborator.
//!
//! [`SinkAdapter::commit`] turns a pane into an [`OutputIdentity`] plus a
//! newline-delimited payload and hands both to a [`PaneWriter`] exactly once.
//! It never retries; a writer error comes back as
//! [`StreamError::SinkWriteFailure`].
//!
//! Identities look like
//! `<base>/<windowStart>-<windowEnd>-<TIMING>-<shard>-of-<shards>.txt`. They do
//! not include the pane index, so repeated LATE panes of a window share one
//! identity and writers keep the first write.

use crate::error::{Result, StreamError};
use crate::pane::{Pane, PaneTiming};
use crate::window::Window;
use regex::Regex;
use std::fmt;
use std::fs::create_dir_all;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tempfile::NamedTempFile;
use tracing::debug;

/// Every pane is written as a single shard.
pub const NUM_SHARDS: u32 = 1;

static IDENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<base>.*)/)?(?P<start>-?\d+)-(?P<end>-?\d+)-(?P<timing>ON_TIME|LATE)-(?P<shard>\d+)-of-(?P<shards>\d+)\.txt$",
    )
    .expect("identity pattern is valid")
});

/// Stable name of one committed pane.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputIdentity {
    pub base_path: String,
    pub window: Window,
    pub timing: PaneTiming,
    pub shard_index: u32,
    pub num_shards: u32,
}

impl OutputIdentity {
    #[must_use]
    pub fn new(base_path: impl Into<String>, window: Window, timing: PaneTiming) -> Self {
        Self {
            base_path: base_path.into(),
            window,
            timing,
            shard_index: 0,
            num_shards: NUM_SHARDS,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}-of-{}.txt",
            self.window.start, self.window.end, self.timing, self.shard_index, self.num_shards
        )
    }

    /// Path of the output relative to a writer's root.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.base_path).join(self.file_name())
    }
}

impl fmt::Display for OutputIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.base_path.is_empty() {
            f.write_str(&self.file_name())
        } else {
            write!(f, "{}/{}", self.base_path, self.file_name())
        }
    }
}

impl FromStr for OutputIdentity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let caps = IDENTITY_RE
            .captures(s)
            .ok_or_else(|| format!("not a pane output identity: '{s}'"))?;
        let num = |name: &str| -> std::result::Result<i64, String> {
            caps[name]
                .parse::<i64>()
                .map_err(|e| format!("bad {name} in '{s}': {e}"))
        };
        let shard = |name: &str| -> std::result::Result<u32, String> {
            caps[name]
                .parse::<u32>()
                .map_err(|e| format!("bad {name} in '{s}': {e}"))
        };
        let (start, end) = (num("start")?, num("end")?);
        if end < start {
            return Err(format!("window end precedes start in '{s}'"));
        }
        Ok(Self {
            base_path: caps.name("base").map_or_else(String::new, |m| m.as_str().to_string()),
            window: Window::new(start, end),
            timing: caps["timing"].parse()?,
            shard_index: shard("shard")?,
            num_shards: shard("shards")?,
        })
    }
}

/// Durable persistence collaborator.
///
/// Implementations must be idempotent per identity: writing an identity that
/// was already written succeeds without persisting twice.
pub trait PaneWriter: Send + Sync {
    /// # Errors
    ///
    /// Returns the underlying I/O error if the payload cannot be persisted.
    fn write(&self, identity: &OutputIdentity, payload: &[u8]) -> io::Result<()>;
}

impl<W: PaneWriter + ?Sized> PaneWriter for Arc<W> {
    fn write(&self, identity: &OutputIdentity, payload: &[u8]) -> io::Result<()> {
        (**self).write(identity, payload)
    }
}

/// Writes each identity as a file under `root`, first write wins.
///
/// Payloads go to a temporary file in the target directory and are moved into
/// place without clobbering, so a reader never observes a partial file.
#[derive(Clone, Debug)]
pub struct FileSystemWriter {
    root: PathBuf,
}

impl FileSystemWriter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, identity: &OutputIdentity) -> PathBuf {
        self.root.join(identity.relative_path())
    }
}

impl PaneWriter for FileSystemWriter {
    fn write(&self, identity: &OutputIdentity, payload: &[u8]) -> io::Result<()> {
        let path = self.path_for(identity);
        let dir = path.parent().unwrap_or(self.root.as_path());
        create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(payload)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "output already present; keeping first write");
                Ok(())
            }
            Err(e) => Err(e.error),
        }
    }
}

/// Render values one per line, newline-terminated.
#[must_use]
pub fn render_payload<T: fmt::Display>(values: &[T]) -> Vec<u8> {
    let mut out = String::new();
    for v in values {
        out.push_str(&v.to_string());
        out.push('\n');
    }
    out.into_bytes()
}

/// Commits panes under one base path through a [`PaneWriter`].
#[derive(Clone, Debug)]
pub struct SinkAdapter<W> {
    base_path: String,
    writer: W,
}

impl<W: PaneWriter> SinkAdapter<W> {
    #[must_use]
    pub fn new(base_path: impl Into<String>, writer: W) -> Self {
        Self {
            base_path: base_path.into(),
            writer,
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    #[must_use]
    pub fn identity_for<T>(&self, pane: &Pane<T>) -> OutputIdentity {
        OutputIdentity::new(self.base_path.clone(), pane.window, pane.info.timing)
    }

    /// Persist `pane` once and return its identity.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::SinkWriteFailure`] if the writer fails.
    pub fn commit<T: fmt::Display>(&self, pane: &Pane<T>) -> Result<OutputIdentity> {
        let identity = self.identity_for(pane);
        let payload = render_payload(&pane.payload);
        self.writer
            .write(&identity, &payload)
            .map_err(|source| StreamError::SinkWriteFailure {
                identity: identity.to_string(),
                source,
            })?;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_pattern_compiles() {
        let re = LazyLock::force(&IDENTITY_RE);
        let caps = re
            .captures("out/files/-5000-0-LATE-0-of-1.txt")
            .expect("identity should match");
        assert_eq!(&caps["base"], "out/files");
        assert_eq!(&caps["start"], "-5000");
        assert_eq!(&caps["timing"], "LATE");
        assert!(!re.is_match("out/files/0-5000-EARLY-0-of-1.txt"));
    }
}
