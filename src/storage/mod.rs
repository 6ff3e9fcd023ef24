//! Key storage seam.
//!
//! The storage engine is a collaborator: the server and the export tool
//! only need an ordered cursor over key identifiers, a fetch by
//! identifier, and the binary record encoder. [`dial_storage`] picks a
//! driver by name.

pub mod fs;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::DbConfig;

pub use fs::FsKeyStore;

/// A stored public key in its binary record form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub id: String,
    pub packets: Vec<u8>,
}

/// Cursor over identifiers in ascending order.
pub type KeyCursor<'a> = Box<dyn Iterator<Item = Result<String, StoreError>> + Send + 'a>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage driver {0:?} not supported")]
    UnsupportedDriver(String),

    #[error("failed to open key store at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list keys in {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid key identifier {0:?}")]
    InvalidId(String),

    #[error("key {0} not found")]
    NotFound(String),

    #[error("failed to read key {id}: {source}")]
    Read {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write key {id}: {source}")]
    Write {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read access to stored keys.
pub trait KeyStore: Send + Sync {
    /// All identifiers, ascending.
    fn key_ids(&self) -> Result<KeyCursor<'_>, StoreError>;

    /// Full key material for one identifier.
    fn fetch_key(&self, id: &str) -> Result<KeyRecord, StoreError>;
}

/// Serializes key records with the binary export codec.
pub trait KeyEncoder {
    fn encode(&self, key: &KeyRecord, out: &mut dyn Write) -> std::io::Result<()>;
}

/// Writes each record's packet stream unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketEncoder;

impl KeyEncoder for PacketEncoder {
    fn encode(&self, key: &KeyRecord, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(&key.packets)
    }
}

/// Connect to the configured storage driver.
pub fn dial_storage(config: &DbConfig) -> Result<Arc<dyn KeyStore>, StoreError> {
    match config.driver.as_str() {
        "fs" => Ok(Arc::new(FsKeyStore::open(&config.dsn)?)),
        other => Err(StoreError::UnsupportedDriver(other.to_string())),
    }
}
