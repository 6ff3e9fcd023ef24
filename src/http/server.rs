//! Key server supervisor.
//!
//! # Responsibilities
//! - Build the route table once: key lookup first, then the webroot
//! - Bind the HKP and (optional) HKPS listeners synchronously in `start`
//! - Run listeners, the reconciliation peer and the metrics exporter as
//!   one supervised task group
//! - Rotate and finally close the log sink
//!
//! ```text
//! new()    → routes (hkp, webroot) → Router + access log layers
//! start()  → open log → init peer → bind hkp → load TLS + bind hkps → spawn tasks
//! wait()   → first task failure
//! stop()   → cancel → drain in-flight requests → close log (once)
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use axum::{middleware, Router};
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use axum_server::Handle;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::error::ServerError;
use crate::hkp::KeyLookup;
use crate::http::middleware::access_log;
use crate::lifecycle::{TaskGroup, TaskState};
use crate::net::{self, BoundListener, KeepAliveAcceptor};
use crate::observability::{metrics, LogSink};
use crate::recon::ReconPeer;
use crate::routing::{register_webroot, RouteTable};
use crate::stats::{Identity, StatsAggregator};
use crate::storage::KeyStore;

/// External components the server runs with.
pub struct Collaborators {
    pub store: Arc<dyn KeyStore>,
    pub lookup: Arc<dyn KeyLookup>,
    pub peer: Arc<dyn ReconPeer>,
}

/// Addresses the listeners actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub hkp: SocketAddr,
    pub hkps: Option<SocketAddr>,
    pub metrics: Option<SocketAddr>,
}

/// Sockets bound by `start`, not yet served.
struct Listeners {
    hkp: BoundListener,
    hkps: Option<(BoundListener, RustlsConfig)>,
    metrics: Option<BoundListener>,
}

enum Transport {
    Plain,
    Tls(RustlsConfig),
}

pub struct Server {
    settings: Settings,
    app: Router,
    store: Arc<dyn KeyStore>,
    peer: Arc<dyn ReconPeer>,
    stats: StatsAggregator,
    log: LogSink,
    group: TaskGroup,
    started: AtomicBool,
    log_closed: AtomicBool,
    addrs: OnceLock<BoundAddrs>,
}

impl Server {
    /// Build the server and its route table. Nothing is bound yet.
    pub fn new(settings: Settings, log: LogSink, collaborators: Collaborators) -> Result<Self, ServerError> {
        let Collaborators { store, lookup, peer } = collaborators;
        let stats = StatsAggregator::new(Identity::from_settings(&settings), Arc::clone(&peer));

        let mut routes = RouteTable::new();
        lookup.register(&mut routes, stats.clone())?;
        if let Some(webroot) = settings.webroot.as_deref() {
            register_webroot(&mut routes, Path::new(webroot))?;
        }
        tracing::info!(routes = routes.len(), "Route table built");

        Ok(Self {
            app: build_router(routes),
            settings,
            store,
            peer,
            stats,
            log,
            group: TaskGroup::new(),
            started: AtomicBool::new(false),
            log_closed: AtomicBool::new(false),
            addrs: OnceLock::new(),
        })
    }

    /// Open the log, initialize the peer and bind every listener, then
    /// launch the task group.
    ///
    /// Peer, bind and TLS failures are returned here, before any task runs,
    /// and leave the server startable again.
    pub async fn start(&self) -> Result<BoundAddrs, ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }
        let listeners = match self.prepare().await {
            Ok(listeners) => listeners,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let Listeners { hkp, hkps, metrics: metrics_listener } = listeners;

        let addrs = BoundAddrs {
            hkp: hkp.local_addr,
            hkps: hkps.as_ref().map(|(bound, _)| bound.local_addr),
            metrics: metrics_listener.as_ref().map(|bound| bound.local_addr),
        };

        let app = self.app.clone();
        self.group
            .spawn("hkp", move |token| serve("hkp", Transport::Plain, hkp, app, token));

        if let Some((bound, tls)) = hkps {
            let app = self.app.clone();
            self.group
                .spawn("hkps", move |token| serve("hkps", Transport::Tls(tls), bound, app, token));
        }

        let peer = Arc::clone(&self.peer);
        self.group.spawn("recon", move |token| peer.run(token));

        if let Some(bound) = metrics_listener {
            let app = metrics::metrics_router(metrics::recorder_handle());
            self.group
                .spawn("metrics", move |token| serve("metrics", Transport::Plain, bound, app, token));
        }

        let _ = self.addrs.set(addrs);
        tracing::info!(
            hkp = %addrs.hkp,
            hkps = ?addrs.hkps,
            metrics = ?addrs.metrics,
            "Key server started"
        );
        Ok(addrs)
    }

    /// Every fallible startup step. Nothing is spawned here.
    async fn prepare(&self) -> Result<Listeners, ServerError> {
        self.log.open();
        self.peer.init()?;

        let hkp = net::bind(&self.settings.hkp.bind)?;
        let hkps = match &self.settings.hkps {
            Some(hkps) => {
                let tls = net::load_tls_config(Path::new(&hkps.cert), Path::new(&hkps.key)).await?;
                Some((net::bind(&hkps.bind)?, tls))
            }
            None => None,
        };
        let metrics = if self.settings.metrics.enabled {
            Some(net::bind(&self.settings.metrics.bind)?)
        } else {
            None
        };
        Ok(Listeners { hkp, hkps, metrics })
    }

    /// Block until every task has exited; returns the first task failure.
    pub async fn wait(&self) -> Result<(), ServerError> {
        self.group.wait().await?;
        Ok(())
    }

    /// Stop all tasks, wait for in-flight requests, then close the log.
    /// Later and concurrent calls return once the group has drained.
    pub async fn stop(&self) {
        if let Err(failure) = self.group.stop().await {
            tracing::debug!(error = %failure, "Task group had failed before stop");
        }
        if !self.log_closed.swap(true, Ordering::SeqCst) {
            tracing::info!("Key server stopped");
            self.log.close();
        }
    }

    /// Reopen the log file at its configured path.
    pub fn rotate_log(&self) {
        self.log.rotate();
    }

    /// Bound addresses, once `start` has succeeded.
    pub fn local_addrs(&self) -> Option<BoundAddrs> {
        self.addrs.get().copied()
    }

    pub fn task_states(&self) -> Vec<(String, TaskState)> {
        self.group.states()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }
}

/// Wrap the frozen route table in the request layers.
fn build_router(routes: RouteTable) -> Router {
    routes
        .into_router()
        .layer(middleware::from_fn(access_log))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Serve `app` on one listener until `shutdown` is cancelled.
async fn serve(
    name: &'static str,
    transport: Transport,
    bound: BoundListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let BoundListener { listener, local_addr } = bound;
    let handle = Handle::new();
    let keepalive = KeepAliveAcceptor::default();
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    let server = async {
        match transport {
            Transport::Plain => {
                axum_server::from_tcp(listener)
                    .acceptor(keepalive)
                    .handle(handle.clone())
                    .serve(make_service)
                    .await
            }
            Transport::Tls(config) => {
                axum_server::from_tcp(listener)
                    .acceptor(RustlsAcceptor::new(config).acceptor(keepalive))
                    .handle(handle.clone())
                    .serve(make_service)
                    .await
            }
        }
    };
    tokio::pin!(server);

    tracing::info!(listener = name, address = %local_addr, "Listener serving");
    let result = tokio::select! {
        result = &mut server => result,
        _ = shutdown.cancelled() => {
            handle.graceful_shutdown(None);
            server.await
        }
    };

    match result {
        Ok(()) => {
            tracing::info!(listener = name, address = %local_addr, "Listener stopped");
            Ok(())
        }
        // Closing the socket on shutdown can surface as an accept error.
        Err(e) if shutdown.is_cancelled() => {
            tracing::debug!(listener = name, error = %e, "Ignoring listener error after shutdown");
            Ok(())
        }
        Err(source) => Err(ServerError::Serve {
            listener: name,
            addr: local_addr,
            source,
        }),
    }
}
