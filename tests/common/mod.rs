//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use keyserver::config::{HkpsConfig, Settings};
use keyserver::hkp::{KeyLookup, LookupHandler};
use keyserver::observability::LogSink;
use keyserver::recon::{IdlePeer, ReconPeer};
use keyserver::storage::{dial_storage, FsKeyStore, KeyRecord};
use keyserver::{Collaborators, Server, ServerError};

/// Settings bound to ephemeral loopback ports, with storage and webroot under `dir`.
pub fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.hkp.bind = "127.0.0.1:0".into();
    settings.metrics.enabled = false;
    settings.openpgp.db.dsn = dir.join("keys").to_string_lossy().into_owned();
    settings.webroot = Some(dir.join("webroot").to_string_lossy().into_owned());
    settings.contact = "0x1234ABCD".into();
    settings
}

/// A webroot with one index, two files and one directory with its own index.
pub fn write_webroot(dir: &Path) {
    let root = dir.join("webroot");
    fs::create_dir_all(root.join("assets")).unwrap();
    fs::write(root.join("index.html"), "<h1>keyserver</h1>").unwrap();
    fs::write(root.join("robots.txt"), "User-agent: *\n").unwrap();
    fs::write(root.join("key list.txt"), "0xDEADBEEF\n").unwrap();
    fs::write(root.join("assets").join("index.html"), "assets index").unwrap();
    fs::write(root.join("assets").join("app.js"), "console.log(1);").unwrap();
}

/// Write a self-signed `localhost` certificate and key under `dir` and enable
/// HKPS on an ephemeral port. Returns the certificate PEM.
pub fn enable_hkps(settings: &mut Settings, dir: &Path) -> String {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_pem = certified.cert.pem();
    let cert = dir.join("hkps.crt");
    let key = dir.join("hkps.key");
    fs::write(&cert, &cert_pem).unwrap();
    fs::write(&key, certified.key_pair.serialize_pem()).unwrap();

    settings.hkps = Some(HkpsConfig {
        bind: "127.0.0.1:0".into(),
        cert: cert.to_string_lossy().into_owned(),
        key: key.to_string_lossy().into_owned(),
    });
    cert_pem
}

/// Store one key in the server's key directory.
pub fn insert_key(settings: &Settings, id: &str, packets: &[u8]) {
    FsKeyStore::open(&settings.openpgp.db.dsn)
        .unwrap()
        .insert(&KeyRecord {
            id: id.to_string(),
            packets: packets.to_vec(),
        })
        .unwrap();
}

/// Build a server with the default lookup handler and an idle peer.
pub fn build_server(settings: Settings) -> Result<Server, ServerError> {
    let peer: Arc<dyn ReconPeer> = Arc::new(IdlePeer::new(&settings.recon));
    build_server_with(settings, peer, None)
}

/// Build a server with a custom peer and, optionally, a custom lookup.
pub fn build_server_with(
    settings: Settings,
    peer: Arc<dyn ReconPeer>,
    lookup: Option<Arc<dyn KeyLookup>>,
) -> Result<Server, ServerError> {
    let store = dial_storage(&settings.openpgp.db)?;
    let lookup = lookup
        .unwrap_or_else(|| Arc::new(LookupHandler::new(Arc::clone(&store))) as Arc<dyn KeyLookup>);
    let sink = LogSink::new(settings.log_file.as_ref().map(Into::into));
    Server::new(settings, sink, Collaborators { store, lookup, peer })
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Client that trusts `cert_pem` and resolves `localhost` to `addr`.
pub fn tls_client(cert_pem: &str, addr: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .use_rustls_tls()
        .add_root_certificate(reqwest::Certificate::from_pem(cert_pem.as_bytes()).unwrap())
        .resolve("localhost", addr)
        .build()
        .unwrap()
}
