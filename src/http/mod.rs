//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP (keep-alive) / TLS connection
//!     → SetRequestId / PropagateRequestId (x-request-id)
//!     → TraceLayer
//!     → access_log (one line per request, latency histogram)
//!     → route table (hkp lookup, webroot)
//! ```

pub mod middleware;
pub mod server;

pub use server::{BoundAddrs, Collaborators, Server};
