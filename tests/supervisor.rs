//! End-to-end tests for the key server supervisor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use keyserver::config::{HkpsConfig, PartnerConfig};
use keyserver::hkp::KeyLookup;
use keyserver::lifecycle::TaskState;
use keyserver::net::ListenerError;
use keyserver::recon::{PeerError, ReconPeer, ReconStats};
use keyserver::routing::{RouteError, RouteTable};
use keyserver::stats::StatsAggregator;
use keyserver::ServerError;

mod common;

const DEADLINE: Duration = Duration::from_secs(10);

#[tokio::test]
async fn serves_lookup_stats_and_webroot() {
    let dir = tempfile::tempdir().unwrap();
    common::write_webroot(dir.path());
    let mut settings = common::test_settings(dir.path());
    for name in ["zeta", "alpha"] {
        settings.recon.partners.insert(
            name.into(),
            PartnerConfig {
                http_addr: format!("{name}.example:11371"),
                recon_addr: format!("{name}.example:11370"),
            },
        );
    }
    common::insert_key(&settings, "deadbeef", b"\x99\x00\x0dkey");

    let server = common::build_server(settings).unwrap();
    let addrs = server.start().await.unwrap();
    let base = format!("http://{}", addrs.hkp);
    let client = common::client();

    let res = client.get(format!("{base}/robots.txt")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "User-agent: *\n");

    let res = client.get(format!("{base}/assets/app.js")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "console.log(1);");

    let res = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "<h1>keyserver</h1>");

    // The bare directory redirects to its slash form, which serves the index.
    for path in ["/assets/", "/assets"] {
        let res = client.get(format!("{base}{path}")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{path}");
        assert_eq!(res.text().await.unwrap(), "assets index");
    }

    let res = client.get(format!("{base}/key%20list.txt")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "0xDEADBEEF\n");

    let res = client
        .get(format!("{base}/pks/lookup?op=get&search=0xDEADBEEF"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/pgp-keys");
    assert_eq!(res.bytes().await.unwrap().as_ref(), b"\x99\x00\x0dkey");

    let stats: serde_json::Value = client
        .get(format!("{base}/pks/lookup?op=stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["server_contact"], "0x1234ABCD");
    assert_eq!(stats["httpAddr"], "127.0.0.1:0");
    assert_eq!(stats["Total"], 0);
    assert!(stats["Hourly"].as_array().unwrap().is_empty());
    let peers: Vec<_> = stats["peers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["Name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(peers, vec!["alpha", "zeta"]);

    let res = client.get(format!("{base}/nothing-here")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_wait_returns_after_stop() {
    let dir = tempfile::tempdir().unwrap();
    let server = common::build_server(common::test_settings(dir.path())).unwrap();
    server.start().await.unwrap();

    tokio::time::timeout(DEADLINE, async {
        tokio::join!(server.stop(), server.stop());
    })
    .await
    .unwrap();
    server.stop().await;
    server.wait().await.unwrap();

    assert_eq!(
        server.task_states(),
        vec![("hkp".to_string(), TaskState::Stopped), ("recon".to_string(), TaskState::Stopped)]
    );
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = common::build_server(common::test_settings(dir.path())).unwrap();
    server.start().await.unwrap();

    assert!(matches!(server.start().await, Err(ServerError::AlreadyStarted)));
    server.stop().await;
}

#[tokio::test]
async fn bind_failure_is_reported_by_start() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken_addr = taken.local_addr().unwrap();

    let mut settings = common::test_settings(dir.path());
    settings.hkp.bind = taken_addr.to_string();
    let server = common::build_server(settings).unwrap();

    match server.start().await {
        Err(ServerError::Listener(ListenerError::Bind { addr, .. })) => assert_eq!(addr, taken_addr),
        other => panic!("expected bind failure, got {other:?}"),
    }
    assert!(server.task_states().is_empty());
    assert!(server.local_addrs().is_none());
    server.stop().await;
}

#[tokio::test]
async fn start_can_be_retried_after_bind_failure() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken_addr = taken.local_addr().unwrap();

    let mut settings = common::test_settings(dir.path());
    settings.hkp.bind = taken_addr.to_string();
    let server = common::build_server(settings).unwrap();
    assert!(matches!(server.start().await, Err(ServerError::Listener(_))));

    drop(taken);
    let addrs = server.start().await.unwrap();
    assert_eq!(addrs.hkp, taken_addr);
    assert!(matches!(server.start().await, Err(ServerError::AlreadyStarted)));
    server.stop().await;
}

#[tokio::test]
async fn serves_lookup_over_hkps() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = common::test_settings(dir.path());
    let cert_pem = common::enable_hkps(&mut settings, dir.path());
    common::insert_key(&settings, "deadbeef", b"\x99\x00\x0dkey");

    let server = common::build_server(settings).unwrap();
    let addrs = server.start().await.unwrap();
    let hkps = addrs.hkps.expect("hkps bound");
    assert_ne!(hkps, addrs.hkp);

    let client = common::tls_client(&cert_pem, hkps);
    let res = client
        .get(format!("https://localhost:{}/pks/lookup?op=get&search=0xdeadbeef", hkps.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().as_ref(), b"\x99\x00\x0dkey");

    // Plain HKP keeps serving alongside.
    let res = common::client()
        .get(format!("http://{}/pks/lookup?op=stats", addrs.hkp))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    tokio::time::timeout(DEADLINE, server.stop()).await.unwrap();
    let states: HashMap<_, _> = server.task_states().into_iter().collect();
    assert_eq!(states["hkps"], TaskState::Stopped);
    assert!(common::tls_client(&cert_pem, hkps)
        .get(format!("https://localhost:{}/pks/lookup?op=stats", hkps.port()))
        .send()
        .await
        .is_err());
}

#[tokio::test]
async fn cancelling_hkps_ends_every_task_as_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = common::test_settings(dir.path());
    common::enable_hkps(&mut settings, dir.path());

    let server = common::build_server(settings).unwrap();
    server.start().await.unwrap();
    tokio::time::timeout(DEADLINE, server.stop()).await.unwrap();
    server.wait().await.unwrap();

    assert_eq!(
        server.task_states(),
        vec![
            ("hkp".to_string(), TaskState::Stopped),
            ("hkps".to_string(), TaskState::Stopped),
            ("recon".to_string(), TaskState::Stopped),
        ]
    );
}

#[tokio::test]
async fn missing_tls_material_names_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = common::test_settings(dir.path());
    settings.hkps = Some(HkpsConfig {
        bind: "127.0.0.1:0".into(),
        cert: dir.path().join("missing.crt").to_string_lossy().into_owned(),
        key: dir.path().join("missing.key").to_string_lossy().into_owned(),
    });
    let server = common::build_server(settings).unwrap();

    match server.start().await {
        Err(err @ ServerError::Tls(_)) => {
            let msg = err.to_string();
            assert!(msg.contains("missing.crt"), "{msg}");
            assert!(msg.contains("missing.key"), "{msg}");
        }
        other => panic!("expected TLS failure, got {other:?}"),
    }
    assert!(server.task_states().is_empty());
}

#[tokio::test]
async fn webroot_colliding_with_lookup_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("webroot").join("pks")).unwrap();

    match common::build_server(common::test_settings(dir.path())) {
        Err(ServerError::Routes(RouteError::Conflict { pattern, existing, .. })) => {
            assert_eq!(pattern, "/pks/{*filepath}");
            assert_eq!(existing, "/pks/lookup");
        }
        Err(other) => panic!("expected route conflict, got {other}"),
        Ok(_) => panic!("expected route conflict"),
    }
}

#[tokio::test]
async fn missing_webroot_still_serves_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let server = common::build_server(common::test_settings(dir.path())).unwrap();
    let addrs = server.start().await.unwrap();

    let res = common::client()
        .get(format!("http://{}/pks/lookup?op=stats", addrs.hkp))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    server.stop().await;
}

#[tokio::test]
async fn rotation_reopens_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("keyserver.log");
    let mut settings = common::test_settings(dir.path());
    settings.log_file = Some(log.to_string_lossy().into_owned());

    let server = common::build_server(settings).unwrap();
    server.start().await.unwrap();
    assert!(log.exists());

    let rotated = dir.path().join("keyserver.log.1");
    std::fs::rename(&log, &rotated).unwrap();
    server.rotate_log();
    assert!(log.exists());
    assert!(rotated.exists());

    server.stop().await;
}

struct FailingPeer;

impl ReconPeer for FailingPeer {
    fn stats(&self) -> ReconStats {
        ReconStats::default()
    }

    fn partners(&self) -> HashMap<String, PartnerConfig> {
        HashMap::new()
    }

    fn run(self: Arc<Self>, _shutdown: CancellationToken) -> BoxFuture<'static, Result<(), PeerError>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err(PeerError::Protocol("partner unreachable".into()))
        })
    }
}

#[tokio::test]
async fn peer_failure_stops_listeners_and_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path());
    let server = common::build_server_with(settings, Arc::new(FailingPeer), None).unwrap();
    server.start().await.unwrap();

    match tokio::time::timeout(DEADLINE, server.wait()).await.unwrap() {
        Err(ServerError::Task(failure)) => {
            assert_eq!(failure.task, "recon");
            assert!(failure.to_string().contains("partner unreachable"));
        }
        other => panic!("expected task failure, got {other:?}"),
    }
    let states: HashMap<_, _> = server.task_states().into_iter().collect();
    assert_eq!(states["hkp"], TaskState::Stopped);
    assert_eq!(states["recon"], TaskState::Failed);

    server.stop().await;
}

struct UninitializablePeer;

impl ReconPeer for UninitializablePeer {
    fn stats(&self) -> ReconStats {
        ReconStats::default()
    }

    fn partners(&self) -> HashMap<String, PartnerConfig> {
        HashMap::new()
    }

    fn init(&self) -> Result<(), PeerError> {
        Err(PeerError::Init("prefix tree unreadable".into()))
    }

    fn run(self: Arc<Self>, _shutdown: CancellationToken) -> BoxFuture<'static, Result<(), PeerError>> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test]
async fn peer_init_failure_aborts_start() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path());
    let server = common::build_server_with(settings, Arc::new(UninitializablePeer), None).unwrap();

    match server.start().await {
        Err(err @ ServerError::Peer(PeerError::Init(_))) => {
            assert!(err.to_string().contains("prefix tree unreadable"), "{err}");
        }
        other => panic!("expected peer init failure, got {other:?}"),
    }
    assert!(server.task_states().is_empty());
    assert!(server.local_addrs().is_none());
    server.stop().await;
}

struct SlowLookup;

impl KeyLookup for SlowLookup {
    fn register(&self, routes: &mut RouteTable, _stats: StatsAggregator) -> Result<(), RouteError> {
        routes.register(
            "hkp",
            "/pks/lookup",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(400)).await;
                "done"
            }),
        )
    }
}

#[tokio::test]
async fn stop_drains_in_flight_requests() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path());
    let peer = Arc::new(keyserver::recon::IdlePeer::new(&settings.recon));
    let server = common::build_server_with(settings, peer, Some(Arc::new(SlowLookup))).unwrap();
    let addrs = server.start().await.unwrap();
    let url = format!("http://{}/pks/lookup", addrs.hkp);

    let client = common::client();
    let in_flight = {
        let client = client.clone();
        let url = url.clone();
        tokio::spawn(async move { client.get(url).send().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(DEADLINE, server.stop()).await.unwrap();

    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "done");

    assert!(common::client().get(&url).send().await.is_err());
}
