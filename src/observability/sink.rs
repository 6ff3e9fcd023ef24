//! Rotation-aware log sink.
//!
//! The sink owns the single active log writer. `tracing-subscriber` asks it
//! for a writer once per event ([`MakeWriter`]); that writer pins the entry
//! that was active at that instant, so a whole line always lands in one
//! file. [`LogSink::rotate`] installs a fresh handle with an atomic swap and
//! then releases the previous one. The old file is closed when the last
//! writer still holding it finishes, never before.
//!
//! ```text
//! make_writer() ── load ──► ArcSwap<Entry> ◄── swap ── rotate()
//!      │                        │
//!      └─ SinkWriter(Arc<Entry>)└─ old Entry: flush, drop (closed after last writer)
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use tracing_subscriber::fmt::MakeWriter;

/// Where log lines currently go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkTarget {
    Stderr,
    File,
}

enum Output {
    Stderr,
    File(File),
}

/// One installed writer. Writes through an entry are serialized by its mutex.
struct Entry {
    output: Mutex<Output>,
}

impl Entry {
    fn stderr() -> Arc<Self> {
        Arc::new(Self {
            output: Mutex::new(Output::Stderr),
        })
    }

    fn file(file: File) -> Arc<Self> {
        Arc::new(Self {
            output: Mutex::new(Output::File(file)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Output> {
        // A writer that panicked mid-line leaves nothing worth discarding the sink over.
        self.output.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn target(&self) -> SinkTarget {
        match *self.lock() {
            Output::Stderr => SinkTarget::Stderr,
            Output::File(_) => SinkTarget::File,
        }
    }
}

struct Inner {
    path: Option<PathBuf>,
    active: ArcSwap<Entry>,
}

/// Owner of the active log writer. Cheap to clone; clones share the same sink.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

impl LogSink {
    /// Create a sink for the given log file. It writes to standard error
    /// until [`LogSink::open`] is called.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                active: ArcSwap::new(Entry::stderr()),
            }),
        }
    }

    /// Configured log file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Where the active entry writes.
    pub fn target(&self) -> SinkTarget {
        self.inner.active.load().target()
    }

    /// Open the configured file in append mode and make it the active sink.
    ///
    /// Falls back to standard error when the file cannot be opened.
    pub fn open(&self) -> SinkTarget {
        let entry = match self.inner.path.as_deref() {
            None => Entry::stderr(),
            Some(path) => match open_append(path) {
                Ok(file) => Entry::file(file),
                Err(e) => {
                    self.install(Entry::stderr());
                    tracing::warn!(path = %path.display(), error = %e, "Failed to open log file, logging to stderr");
                    return SinkTarget::Stderr;
                }
            },
        };
        self.install(entry)
    }

    /// Reopen the configured file, for external log rotation.
    ///
    /// Lines accepted before the swap stay in the previous file; lines
    /// accepted after it go to the new one.
    pub fn rotate(&self) -> SinkTarget {
        let target = self.open();
        crate::observability::metrics::record_log_rotation();
        tracing::info!(target_kind = ?target, "Reopened log file");
        target
    }

    /// Return to standard error and release the file handle.
    ///
    /// Safe to call repeatedly.
    pub fn close(&self) {
        if self.target() == SinkTarget::Stderr {
            return;
        }
        self.install(Entry::stderr());
    }

    fn install(&self, entry: Arc<Entry>) -> SinkTarget {
        let target = entry.target();
        let previous = self.inner.active.swap(entry);
        // The previous entry closes once every writer still holding it drops.
        let _ = previous.lock().flush_output();
        drop(previous);
        target
    }

    /// A writer bound to the currently active entry.
    pub fn writer(&self) -> SinkWriter {
        SinkWriter {
            entry: self.inner.active.load_full(),
        }
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("path", &self.inner.path)
            .field("target", &self.target())
            .finish()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer()
    }
}

/// Writer handed out per log event.
pub struct SinkWriter {
    entry: Arc<Entry>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.entry.lock() {
            Output::Stderr => io::stderr().write(buf),
            Output::File(file) => file.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // Hold the entry lock for the whole line so concurrent lines never interleave.
        match &mut *self.entry.lock() {
            Output::Stderr => io::stderr().write_all(buf),
            Output::File(file) => file.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.entry.lock().flush_output()
    }
}

impl Output {
    fn flush_output(&mut self) -> io::Result<()> {
        match self {
            Output::Stderr => io::stderr().flush(),
            Output::File(file) => file.flush(),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
