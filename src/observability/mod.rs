//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → sink.rs (active log writer, swapped on rotation)
//!     → metrics.rs (histograms, counters)
//!
//! Consumers:
//!     → Log file or stderr (reopened on SIGHUP/SIGUSR1/SIGUSR2)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The log sink is an owned object passed to the subscriber, not ambient state
//! - Rotation never drops a line: the old file closes after its last writer
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod sink;

pub use logging::init_logging;
pub use sink::{LogSink, SinkTarget};
