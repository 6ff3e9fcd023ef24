//! Configuration validation.
//!
//! Serde handles syntax; this module checks the values that serde cannot:
//! bind addresses must parse, and a configured HKPS listener needs both
//! certificate and key paths. All problems are reported together.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::Settings;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid bind address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },
}

/// Validate a parsed configuration.
pub fn validate_config(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "hkp.bind", &settings.hkp.bind);

    if let Some(hkps) = &settings.hkps {
        check_addr(&mut errors, "hkps.bind", &hkps.bind);
        if hkps.cert.is_empty() {
            errors.push(ValidationError::Empty { field: "hkps.cert" });
        }
        if hkps.key.is_empty() {
            errors.push(ValidationError::Empty { field: "hkps.key" });
        }
    }

    if settings.metrics.enabled {
        check_addr(&mut errors, "metrics.bind", &settings.metrics.bind);
    }

    if settings.openpgp.db.driver.is_empty() {
        errors.push(ValidationError::Empty { field: "openpgp.db.driver" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
