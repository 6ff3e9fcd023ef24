//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the keyserver.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the keyserver.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Public hostname reported in the status payload. Falls back to the OS hostname.
    pub hostname: Option<String>,

    /// Operator contact string.
    pub contact: String,

    /// Software identifier.
    pub software: String,

    /// Software version.
    pub version: String,

    /// Directory of static content served next to the key-lookup API.
    pub webroot: Option<String>,

    /// Log file path. Standard error when unset.
    pub log_file: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Plaintext HKP listener.
    pub hkp: HkpConfig,

    /// Optional HKPS (TLS) listener.
    pub hkps: Option<HkpsConfig>,

    /// Peer reconciliation settings.
    pub recon: ReconConfig,

    /// Prometheus endpoint settings.
    pub metrics: MetricsConfig,

    /// Key storage settings.
    pub openpgp: OpenPgpConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hostname: None,
            contact: String::new(),
            software: "keyserver".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            webroot: None,
            log_file: None,
            log_level: "info".to_string(),
            hkp: HkpConfig::default(),
            hkps: None,
            recon: ReconConfig::default(),
            metrics: MetricsConfig::default(),
            openpgp: OpenPgpConfig::default(),
        }
    }
}

/// Plaintext listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HkpConfig {
    /// Bind address (e.g., "0.0.0.0:11371").
    pub bind: String,
}

impl Default for HkpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:11371".to_string(),
        }
    }
}

/// TLS listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HkpsConfig {
    /// Bind address (e.g., "0.0.0.0:11372").
    pub bind: String,

    /// Path to certificate file (PEM).
    pub cert: String,

    /// Path to private key file (PEM).
    pub key: String,
}

impl Default for HkpsConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:11372".to_string(),
            cert: String::new(),
            key: String::new(),
        }
    }
}

/// Reconciliation peer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Reconciliation protocol bind address.
    pub recon_addr: String,

    /// Known partners by name.
    pub partners: BTreeMap<String, PartnerConfig>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            recon_addr: "0.0.0.0:11370".to_string(),
            partners: BTreeMap::new(),
        }
    }
}

/// A reconciliation partner.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PartnerConfig {
    pub http_addr: String,
    pub recon_addr: String,
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve the Prometheus endpoint.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub bind: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:9626".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenPgpConfig {
    pub db: DbConfig,
}

/// Storage driver selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    /// Driver name ("fs").
    pub driver: String,

    /// Driver-specific data source name. A directory for the "fs" driver.
    pub dsn: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: "fs".to_string(),
            dsn: "keys".to_string(),
        }
    }
}
