//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! bind() (synchronous, fatal on failure)
//!     → axum_server accept loop
//!     → KeepAliveAcceptor (3 minute TCP keep-alive)
//!     → RustlsAcceptor (HKPS only)
//!     → HTTP layer
//! ```

pub mod listener;
pub mod tls;

pub use listener::{bind, BoundListener, KeepAliveAcceptor, ListenerError, KEEPALIVE_PERIOD};
pub use tls::{load_tls_config, TlsError};
