//! Status statistics.
//!
//! # Data Flow
//! ```text
//! Settings ─► Identity ─┐
//!                       ├─► aggregate() ─► StatsSnapshot (sorted) ─► JSON
//! ReconPeer::stats() ───┤
//! ReconPeer::partners()─┘
//! ```
//!
//! # Design Decisions
//! - Peer collections are hash maps; ordering is imposed explicitly before serializing
//! - Hourly and daily buckets ascend by time, peers ascend by name

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{aggregate, Identity, StatsAggregator};
pub use snapshot::{sorted_buckets, sorted_peers, LoadBucket, StatsPeer, StatsSnapshot};
