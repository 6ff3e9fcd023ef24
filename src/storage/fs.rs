//! Directory-backed key store.
//!
//! Each key is one `<id>.pgp` file holding its binary packet stream.
//! Opening creates the directory when absent, so setup is idempotent.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::storage::{KeyCursor, KeyRecord, KeyStore, StoreError};

const EXTENSION: &str = "pgp";

#[derive(Debug, Clone)]
pub struct FsKeyStore {
    root: PathBuf,
}

impl FsKeyStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::Open {
            path: root.clone(),
            source,
        })?;
        tracing::debug!(path = %root.display(), "Key store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a record, replacing any previous one with the same identifier.
    pub fn insert(&self, key: &KeyRecord) -> Result<(), StoreError> {
        let path = self.key_path(&key.id)?;
        fs::write(&path, &key.packets).map_err(|source| StoreError::Write {
            id: key.id.clone(),
            source,
        })
    }

    fn key_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.{EXTENSION}")))
    }
}

impl KeyStore for FsKeyStore {
    fn key_ids(&self) -> Result<KeyCursor<'_>, StoreError> {
        let scan_error = |source| StoreError::Scan {
            path: self.root.clone(),
            source,
        };

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(scan_error)? {
            let path = entry.map_err(scan_error)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(Box::new(ids.into_iter().map(Ok)))
    }

    fn fetch_key(&self, id: &str) -> Result<KeyRecord, StoreError> {
        let path = self.key_path(id)?;
        match fs::read(&path) {
            Ok(packets) => Ok(KeyRecord {
                id: id.to_string(),
                packets,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(source) => Err(StoreError::Read {
                id: id.to_string(),
                source,
            }),
        }
    }
}
