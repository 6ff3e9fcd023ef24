//! Bulk export of every stored key into `hkp-dump-NNNN.pgp` segments.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use keyserver::config::load_or_default;
use keyserver::error::causal_chain;
use keyserver::export::{ExportBatcher, DEFAULT_SEGMENT_KEYS};
use keyserver::observability::{init_logging, LogSink};
use keyserver::storage::{dial_storage, PacketEncoder};

#[derive(Parser)]
#[command(name = "keyserver-dump", version)]
#[command(about = "Export all stored keys into numbered segment files", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for segment files
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Maximum keys per segment file
    #[arg(long, default_value_t = DEFAULT_SEGMENT_KEYS)]
    count: usize,
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_or_default(cli.config.as_deref())?;
    init_logging(&settings.log_level, LogSink::new(None))?;

    let store = dial_storage(&settings.openpgp.db)?;
    let summary = ExportBatcher::new(store.as_ref(), PacketEncoder, &cli.path, cli.count)?.run()?;

    tracing::info!(
        keys = summary.keys,
        segments = summary.segments.len(),
        path = %cli.path.display(),
        "Dump complete"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keyserver-dump: {}", causal_chain(e.as_ref()));
            ExitCode::FAILURE
        }
    }
}
