//! TLS configuration and certificate loading.

use std::io;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

/// Failure to build the HKPS TLS configuration. Always names both files.
#[derive(Debug, Error)]
#[error("failed to load TLS certificate {cert:?} and key {key:?}: {source}")]
pub struct TlsError {
    pub cert: PathBuf,
    pub key: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Load a PEM certificate chain and private key.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let tls_error = |source| TlsError {
        cert: cert_path.to_path_buf(),
        key: key_path.to_path_buf(),
        source,
    };

    let cert_pem = tokio::fs::read(cert_path).await.map_err(tls_error)?;
    let key_pem = tokio::fs::read(key_path).await.map_err(tls_error)?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .map(|cert| cert.map(|der| der.to_vec()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(tls_error)?;
    if certs.is_empty() {
        return Err(tls_error(invalid_data("no certificates found")));
    }

    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .map_err(tls_error)?
        .ok_or_else(|| tls_error(invalid_data("no private key found")))?;

    let config = RustlsConfig::from_der(certs, key.secret_der().to_vec())
        .await
        .map_err(tls_error)?;
    tracing::info!(cert = %cert_path.display(), key = %key_path.display(), "TLS configuration loaded");
    Ok(config)
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
