//! HKP key server.
//!
//! ```text
//!   HKP  :11371 ──┐                       ┌─► /pks/lookup  (key store, stats)
//!   HKPS :11372 ──┼─► keep-alive ─► router┤
//!   (TLS)         │                       └─► webroot      (static files)
//!                 │
//!   recon peer ───┤  one supervised task group
//!   /metrics ─────┘
//!
//!   SIGHUP/SIGUSR1/SIGUSR2 → reopen log file
//!   SIGINT/SIGTERM         → graceful stop
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use keyserver::config::load_or_default;
use keyserver::error::causal_chain;
use keyserver::hkp::LookupHandler;
use keyserver::lifecycle::{Signal, Signals};
use keyserver::observability::{init_logging, LogSink};
use keyserver::recon::IdlePeer;
use keyserver::storage::dial_storage;
use keyserver::{Collaborators, Server};

#[derive(Parser)]
#[command(name = "keyserver", version)]
#[command(about = "OpenPGP HKP key server", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_or_default(cli.config.as_deref())?;

    let sink = LogSink::new(settings.log_file.as_ref().map(PathBuf::from));
    init_logging(&settings.log_level, sink.clone())?;

    tracing::info!(
        software = %settings.software,
        version = %settings.version,
        config = ?cli.config,
        "Key server starting"
    );

    let store = dial_storage(&settings.openpgp.db)?;
    let peer = Arc::new(IdlePeer::new(&settings.recon));
    let lookup = Arc::new(LookupHandler::new(Arc::clone(&store)));

    let server = Server::new(settings, sink, Collaborators { store, lookup, peer })?;
    // Installed before start so a rotation signal during startup is not fatal.
    let mut signals = Signals::new()?;
    if let Err(e) = server.start().await {
        tracing::error!(error = %causal_chain(&e), "Key server failed to start");
        return Err(e.into());
    }

    let outcome = loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Signal::RotateLog => server.rotate_log(),
                Signal::Shutdown => break Ok(()),
            },
            result = server.wait() => break result,
        }
    };

    server.stop().await;
    if let Err(e) = &outcome {
        tracing::error!(error = %causal_chain(e), "Key server failed");
    }
    Ok(outcome?)
}
