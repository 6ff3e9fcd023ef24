//! Bulk key export.
//!
//! Streams every stored key, in cursor order, into numbered segment files
//! of at most `max_keys` records each:
//!
//! ```text
//! cursor ─► fetch_key ─► encode ─► hkp-dump-0000.pgp (max_keys)
//!                                  hkp-dump-0001.pgp (max_keys)
//!                                  hkp-dump-0002.pgp (remainder)
//! ```
//!
//! Concatenating the segments in name order reproduces the export. Any
//! error aborts the run; the segment being written stays on disk as is,
//! and a re-run starts over from segment zero.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::{KeyEncoder, KeyStore, StoreError};

/// Default number of keys per segment.
pub const DEFAULT_SEGMENT_KEYS: usize = 15_000;

/// Segment file name prefix.
pub const SEGMENT_PREFIX: &str = "hkp-dump";

/// File name of segment `seq`.
pub fn segment_name(seq: usize) -> String {
    format!("{SEGMENT_PREFIX}-{seq:04}.pgp")
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("segment size must be at least one key")]
    InvalidSegmentSize,

    #[error("failed to create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create segment {path:?}: {source}")]
    CreateSegment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read key cursor: {0}")]
    Cursor(#[source] StoreError),

    #[error("failed to fetch key {id}: {source}")]
    Fetch {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to write key {id} to {path:?}: {source}")]
    Write {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to close segment {path:?}: {source}")]
    CloseSegment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One finished segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub path: PathBuf,
    pub keys: usize,
}

/// Result of a completed export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub keys: usize,
    pub segments: Vec<SegmentSummary>,
}

/// The segment currently being written.
struct ExportSegment {
    seq: usize,
    keys: usize,
    path: PathBuf,
    out: BufWriter<File>,
}

impl ExportSegment {
    fn create(dir: &Path, seq: usize) -> Result<Self, ExportError> {
        let path = dir.join(segment_name(seq));
        let file = File::create(&path).map_err(|source| ExportError::CreateSegment {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Segment opened");
        Ok(Self {
            seq,
            keys: 0,
            path,
            out: BufWriter::new(file),
        })
    }

    fn close(mut self) -> Result<SegmentSummary, ExportError> {
        let close_error = |source| ExportError::CloseSegment {
            path: self.path.clone(),
            source,
        };
        self.out.flush().map_err(close_error)?;
        self.out.get_ref().sync_all().map_err(close_error)?;
        tracing::info!(path = %self.path.display(), segment = self.seq, keys = self.keys, "Segment written");
        Ok(SegmentSummary {
            path: self.path,
            keys: self.keys,
        })
    }
}

/// Writes all stored keys into bounded segment files.
pub struct ExportBatcher<'a, E> {
    store: &'a dyn KeyStore,
    encoder: E,
    dir: PathBuf,
    max_keys: usize,
}

impl<'a, E: KeyEncoder> ExportBatcher<'a, E> {
    pub fn new(
        store: &'a dyn KeyStore,
        encoder: E,
        dir: impl Into<PathBuf>,
        max_keys: usize,
    ) -> Result<Self, ExportError> {
        if max_keys == 0 {
            return Err(ExportError::InvalidSegmentSize);
        }
        Ok(Self {
            store,
            encoder,
            dir: dir.into(),
            max_keys,
        })
    }

    /// Export every key. Segment zero is always created, even for an empty store.
    pub fn run(&self) -> Result<ExportSummary, ExportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::OutputDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut summary = ExportSummary::default();
        let mut next_seq = 1;
        let mut segment = Some(ExportSegment::create(&self.dir, 0)?);

        for id in self.store.key_ids().map_err(ExportError::Cursor)? {
            let id = id.map_err(ExportError::Cursor)?;
            let key = self
                .store
                .fetch_key(&id)
                .map_err(|source| ExportError::Fetch {
                    id: id.clone(),
                    source,
                })?;

            let current = match segment.as_mut() {
                Some(current) => current,
                None => {
                    let opened = ExportSegment::create(&self.dir, next_seq)?;
                    next_seq += 1;
                    segment.insert(opened)
                }
            };

            self.encoder
                .encode(&key, &mut current.out)
                .map_err(|source| ExportError::Write {
                    id: id.clone(),
                    path: current.path.clone(),
                    source,
                })?;
            current.keys += 1;
            summary.keys += 1;

            if current.keys >= self.max_keys {
                if let Some(full) = segment.take() {
                    summary.segments.push(full.close()?);
                }
            }
        }

        if let Some(last) = segment.take() {
            summary.segments.push(last.close()?);
        }

        tracing::info!(
            keys = summary.keys,
            segments = summary.segments.len(),
            dir = %self.dir.display(),
            "Export complete"
        );
        Ok(summary)
    }
}
