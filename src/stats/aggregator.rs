//! Status aggregation.
//!
//! Combines the server's identity with the peer's statistics. The
//! peer is only read; [`aggregate`] is pure and deterministic for fixed
//! inputs, so only [`StatsAggregator::snapshot`] touches the clock and the
//! OS hostname.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::{PartnerConfig, Settings};
use crate::recon::{ReconPeer, ReconStats};
use crate::stats::snapshot::{sorted_buckets, sorted_peers, StatsSnapshot};

/// Identity fields reported in the status payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Configured public hostname; the OS hostname is used when absent.
    pub hostname: Option<String>,
    pub contact: String,
    pub version: String,
    pub software: String,
    pub http_addr: String,
    pub recon_addr: String,
}

impl Identity {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            hostname: settings.hostname.clone().filter(|h| !h.is_empty()),
            contact: settings.contact.clone(),
            version: settings.version.clone(),
            software: settings.software.clone(),
            http_addr: settings.hkp.bind.clone(),
            recon_addr: settings.recon.recon_addr.clone(),
        }
    }
}

/// Build a snapshot from fixed inputs.
pub fn aggregate(
    identity: &Identity,
    nodename: Option<&str>,
    stats: &ReconStats,
    partners: &HashMap<String, PartnerConfig>,
    now: DateTime<Utc>,
) -> StatsSnapshot {
    let nodename = nodename.unwrap_or_default().to_string();
    let hostname = identity.hostname.clone().unwrap_or_else(|| nodename.clone());

    StatsSnapshot {
        now: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        version: identity.version.clone(),
        hostname,
        nodename,
        contact: identity.contact.clone(),
        http_addr: identity.http_addr.clone(),
        recon_addr: identity.recon_addr.clone(),
        software: identity.software.clone(),
        peers: sorted_peers(partners),
        total: stats.total,
        hourly: sorted_buckets(&stats.hourly),
        daily: sorted_buckets(&stats.daily),
    }
}

/// Produces status snapshots on demand.
#[derive(Clone)]
pub struct StatsAggregator {
    identity: Identity,
    peer: Arc<dyn ReconPeer>,
}

impl StatsAggregator {
    pub fn new(identity: Identity, peer: Arc<dyn ReconPeer>) -> Self {
        Self { identity, peer }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Capture the current status.
    pub fn snapshot(&self) -> StatsSnapshot {
        let nodename = match hostname::get() {
            Ok(name) => Some(name.to_string_lossy().into_owned()),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot determine local hostname");
                None
            }
        };
        aggregate(
            &self.identity,
            nodename.as_deref(),
            &self.peer.stats(),
            &self.peer.partners(),
            Utc::now(),
        )
    }
}

impl std::fmt::Debug for StatsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsAggregator")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
