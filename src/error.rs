//! Top-level server errors.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::TaskFailure;
use crate::net::{ListenerError, TlsError};
use crate::recon::PeerError;
use crate::routing::RouteError;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to storage: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("failed to build routes: {0}")]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("{listener} listener on {addr} failed: {source}")]
    Serve {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Task(#[from] TaskFailure),

    #[error("server already started")]
    AlreadyStarted,
}

/// Render `err` followed by each cause its message does not already include.
pub fn causal_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}
