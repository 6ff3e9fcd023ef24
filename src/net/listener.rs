//! TCP listener binding and keep-alive policy.
//!
//! # Responsibilities
//! - Bind the configured address synchronously, so failures surface at startup
//! - Enable TCP keep-alive on every accepted connection, so half-open peers
//!   (a laptop closed mid-download) are eventually reclaimed
//!
//! The keep-alive step is an `axum_server` acceptor; it runs first and the
//! TLS handshake, when configured, runs on top of it.

use std::future::{ready, Ready};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum_server::accept::Accept;
use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use thiserror::Error;
use tokio::net::TcpStream;

/// Idle time before the first keep-alive probe.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(3 * 60);

const BACKLOG: i32 = 1024;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address {addr:?}")]
    InvalidAddress { addr: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// A bound, not yet serving, listening socket.
#[derive(Debug)]
pub struct BoundListener {
    pub listener: std::net::TcpListener,
    pub local_addr: SocketAddr,
}

/// Bind a non-blocking listening socket on `addr`.
pub fn bind(addr: &str) -> Result<BoundListener, ListenerError> {
    let addr: SocketAddr = addr.parse().map_err(|_| ListenerError::InvalidAddress {
        addr: addr.to_string(),
    })?;
    let bind_error = |source| ListenerError::Bind { addr, source };

    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(bind_error)?;
    socket.set_reuse_address(true).map_err(bind_error)?;
    socket.set_nonblocking(true).map_err(bind_error)?;
    socket.bind(&addr.into()).map_err(bind_error)?;
    socket.listen(BACKLOG).map_err(bind_error)?;

    let listener: std::net::TcpListener = socket.into();
    let local_addr = listener.local_addr().map_err(bind_error)?;
    tracing::info!(address = %local_addr, "Listener bound");
    Ok(BoundListener {
        listener,
        local_addr,
    })
}

/// Acceptor that turns on TCP keep-alive before handing the stream on.
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveAcceptor {
    period: Duration,
}

impl KeepAliveAcceptor {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        let keepalive = TcpKeepalive::new().with_time(self.period);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)
    }
}

impl Default for KeepAliveAcceptor {
    fn default() -> Self {
        Self::new(KEEPALIVE_PERIOD)
    }
}

impl<S> Accept<TcpStream, S> for KeepAliveAcceptor {
    type Stream = TcpStream;
    type Service = S;
    type Future = Ready<io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: TcpStream, service: S) -> Self::Future {
        if let Err(e) = self.apply(&stream) {
            // The connection still works without probes.
            tracing::debug!(error = %e, "Failed to enable TCP keep-alive");
        }
        ready(Ok((stream, service)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_ephemeral_port() {
        let bound = bind("127.0.0.1:0").unwrap();
        assert_ne!(bound.local_addr.port(), 0);
        assert_eq!(bound.listener.local_addr().unwrap(), bound.local_addr);
    }

    #[test]
    fn bind_conflict_reports_address() {
        let first = bind("127.0.0.1:0").unwrap();
        let addr = first.local_addr;

        let err = bind(&addr.to_string()).unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
        assert!(err.to_string().contains(&addr.to_string()));
    }

    #[test]
    fn rejects_unparseable_address() {
        assert!(matches!(
            bind("localhost"),
            Err(ListenerError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn accepted_stream_gets_keepalive() {
        let listener = tokio::net::TcpListener::from_std(bind("127.0.0.1:0").unwrap().listener).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let (stream, _) = listener.accept().await.unwrap();
        let (stream, ()) = KeepAliveAcceptor::default().accept(stream, ()).await.unwrap();
        assert!(SockRef::from(&stream).keepalive().unwrap());
        drop(client.await.unwrap());
    }
}
