//! HKP key server runtime.
//!
//! The runtime layer around the key storage and reconciliation engines:
//! listener supervision, TLS and keep-alive, log rotation, static webroot
//! routing, status statistics, and bulk export.

pub mod config;
pub mod error;
pub mod export;
pub mod hkp;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod recon;
pub mod routing;
pub mod stats;
pub mod storage;

pub use config::Settings;
pub use error::ServerError;
pub use http::{BoundAddrs, Collaborators, Server};
