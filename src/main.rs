//! power-stats - Implementation market-share survey for storage miners
//!
//! A CLI tool that lists every miner registered on a Filecoin-compatible
//! chain, determines each miner's quality-adjusted power and node
//! implementation via a libp2p identify handshake, and reports the share
//! of power run by the venus family versus lotus.
//!
//! Exit codes:
//!   0 - Survey completed
//!   1 - Runtime error (connection, config, listing failure, etc.)

mod cli;
mod config;
mod ledger;
mod models;
mod peer;
mod report;
mod survey;

use anyhow::{ensure, Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use ledger::RpcLedgerClient;
use peer::IdentifyHost;
use std::sync::Arc;
use survey::Surveyor;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("power-stats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the survey
    match run_survey(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Survey failed: {}", e);
            eprintln!("\nError: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .power-stats.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".power-stats.toml");

    if path.exists() {
        eprintln!("⚠️  .power-stats.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .power-stats.toml")?;

    println!("✅ Created .power-stats.toml with default settings.");
    println!("   Edit it to customize the token, concurrency, and timeouts.");
    Ok(())
}

/// Initialize logging based on the requested level.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete survey workflow.
async fn run_survey(args: Args) -> Result<()> {
    // Load configuration and apply CLI overrides
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    ensure!(
        config.survey.concurrency >= 1,
        "Concurrency must be at least 1"
    );

    let endpoint = args.node.as_deref().context("node endpoint missing")?;

    // Everything failing from here to the fan-out aborts the run; once
    // workers are in flight, failures stay per-miner.
    let ledger = RpcLedgerClient::new(
        endpoint,
        config.node.token.as_deref(),
        config.survey.call_timeout(),
    )
    .context("Failed to build the node rpc client")?;
    let host = IdentifyHost::new();

    let surveyor = Surveyor::new(
        Arc::new(ledger),
        Arc::new(host),
        config.survey.survey_config(),
    );

    eprintln!("Surveying miners, this may take a few minutes ...");
    let report = surveyor.run().await?;

    let output = match args.format {
        OutputFormat::Text => report::generate_text_report(&report),
        OutputFormat::Json => report::generate_json_report(&report)?,
    };
    println!("{}", output.trim_end());

    info!("Survey completed in {:.1}s", report.duration_seconds);
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .power-stats.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
