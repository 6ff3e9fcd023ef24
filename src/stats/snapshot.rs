//! Status payload and its ordering rules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::PartnerConfig;
use crate::recon::LoadStat;

/// Immutable status document produced per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Capture time, RFC 3339 in UTC.
    pub now: String,
    pub version: String,
    pub hostname: String,
    pub nodename: String,
    #[serde(rename = "server_contact")]
    pub contact: String,
    #[serde(rename = "httpAddr")]
    pub http_addr: String,
    #[serde(rename = "reconAddr")]
    pub recon_addr: String,
    pub software: String,
    pub peers: Vec<StatsPeer>,

    #[serde(rename = "Total")]
    pub total: u64,
    #[serde(rename = "Hourly")]
    pub hourly: Vec<LoadBucket>,
    #[serde(rename = "Daily")]
    pub daily: Vec<LoadBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBucket {
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub stat: LoadStat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsPeer {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "httpAddr")]
    pub http_addr: String,
    #[serde(rename = "reconAddr")]
    pub recon_addr: String,
}

/// Flatten a bucket map into a list ordered by ascending time.
pub fn sorted_buckets(buckets: &HashMap<DateTime<Utc>, LoadStat>) -> Vec<LoadBucket> {
    let mut out: Vec<LoadBucket> = buckets
        .iter()
        .map(|(time, stat)| LoadBucket {
            time: *time,
            stat: *stat,
        })
        .collect();
    out.sort_by_key(|bucket| bucket.time);
    out
}

/// Flatten a partner map into a list ordered by name (byte-wise).
pub fn sorted_peers(partners: &HashMap<String, PartnerConfig>) -> Vec<StatsPeer> {
    let mut out: Vec<StatsPeer> = partners
        .iter()
        .map(|(name, partner)| StatsPeer {
            name: name.clone(),
            http_addr: partner.http_addr.clone(),
            recon_addr: partner.recon_addr.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn stat(n: u64) -> LoadStat {
        LoadStat {
            inserted: n,
            updated: 0,
        }
    }

    #[test]
    fn hourly_buckets_sort_by_time() {
        let buckets = HashMap::from([(at(5, 14), stat(14)), (at(5, 9), stat(9)), (at(5, 20), stat(20))]);
        let times: Vec<_> = sorted_buckets(&buckets).into_iter().map(|b| b.time).collect();
        assert_eq!(times, vec![at(5, 9), at(5, 14), at(5, 20)]);
    }

    #[test]
    fn daily_buckets_sort_by_time() {
        let buckets = HashMap::from([(at(7, 0), stat(7)), (at(3, 0), stat(3)), (at(5, 0), stat(5))]);
        let inserted: Vec<_> = sorted_buckets(&buckets)
            .into_iter()
            .map(|b| b.stat.inserted)
            .collect();
        assert_eq!(inserted, vec![3, 5, 7]);
    }

    #[test]
    fn peers_sort_by_name_case_sensitively() {
        let partners: HashMap<_, _> = ["bob", "alice", "carol", "Zed"]
            .into_iter()
            .map(|name| (name.to_string(), PartnerConfig::default()))
            .collect();
        let names: Vec<_> = sorted_peers(&partners).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Zed", "alice", "bob", "carol"]);
    }

    #[test]
    fn bucket_serializes_flat() {
        let bucket = LoadBucket {
            time: at(5, 9),
            stat: LoadStat {
                inserted: 2,
                updated: 1,
            },
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Time": "2024-03-05T09:00:00Z", "Inserted": 2, "Updated": 1})
        );
    }
}
