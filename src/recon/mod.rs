//! Reconciliation peer seam.
//!
//! The set-reconciliation protocol lives outside this crate. The server
//! consumes it through [`ReconPeer`]: a supervised background task plus a
//! read-only view of load statistics and partners for the status payload.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{PartnerConfig, ReconConfig};

/// Keys inserted and updated during one time bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStat {
    #[serde(rename = "Inserted")]
    pub inserted: u64,
    #[serde(rename = "Updated")]
    pub updated: u64,
}

/// Point-in-time statistics reported by the peer.
///
/// Bucket maps have no defined iteration order.
#[derive(Debug, Clone, Default)]
pub struct ReconStats {
    pub total: u64,
    pub hourly: HashMap<DateTime<Utc>, LoadStat>,
    pub daily: HashMap<DateTime<Utc>, LoadStat>,
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("failed to initialize reconciliation peer: {0}")]
    Init(String),
    #[error("reconciliation peer failed: {0}")]
    Protocol(String),
}

/// A reconciliation peer driven by the server supervisor.
pub trait ReconPeer: Send + Sync + 'static {
    /// Current load statistics.
    fn stats(&self) -> ReconStats;

    /// Configured partners by name.
    fn partners(&self) -> HashMap<String, PartnerConfig>;

    /// Prepare the peer before any server task starts. An error aborts startup.
    fn init(&self) -> Result<(), PeerError> {
        Ok(())
    }

    /// Run until `shutdown` is cancelled.
    fn run(self: Arc<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), PeerError>>;
}

/// Peer that reports its configured partners but does not reconcile.
#[derive(Debug, Default)]
pub struct IdlePeer {
    partners: HashMap<String, PartnerConfig>,
}

impl IdlePeer {
    pub fn new(config: &ReconConfig) -> Self {
        Self {
            partners: config
                .partners
                .iter()
                .map(|(name, partner)| (name.clone(), partner.clone()))
                .collect(),
        }
    }
}

impl ReconPeer for IdlePeer {
    fn stats(&self) -> ReconStats {
        ReconStats::default()
    }

    fn partners(&self) -> HashMap<String, PartnerConfig> {
        self.partners.clone()
    }

    fn run(self: Arc<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), PeerError>> {
        Box::pin(async move {
            tracing::info!(partners = self.partners.len(), "Reconciliation idle");
            shutdown.cancelled().await;
            Ok(())
        })
    }
}
