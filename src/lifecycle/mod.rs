//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start:   open log → bind listeners → spawn tasks into TaskGroup
//! Signals: SIGHUP/SIGUSR1/SIGUSR2 → rotate log
//!          SIGINT/SIGTERM         → stop
//! Stop:    cancel group → drain tasks → close log
//! ```
//!
//! # Design Decisions
//! - One cancellation token per group; any task failure cancels its siblings
//! - Panics inside a task are reported as failures, not process aborts

pub mod group;
pub mod signals;

pub use group::{TaskFailure, TaskGroup, TaskState};
pub use signals::{Signal, Signals};
