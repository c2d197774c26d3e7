//! fabric-syncd - fabric synchronization daemon
//!
//! Entry point for the fabric-syncd daemon.

use anyhow::Context;
use clap::Parser;
use fabric_api::RestFabricClient;
use fabric_sync_common::SyncError;
use fabric_syncd::{Config, FabricDriver, FileStore, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Fabric synchronization daemon
#[derive(Parser, Debug)]
#[command(name = "fabric-syncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run one synchronization pass and exit
    #[arg(long)]
    once: bool,

    /// Validate the mappings against the fabric and exit
    #[arg(long, conflicts_with = "once")]
    validate_only: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting fabric-syncd ---");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fabric-syncd: {:#}", e);
            let fatal = e
                .downcast_ref::<SyncError>()
                .map(SyncError::is_fatal)
                .unwrap_or(false);
            if fatal {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load_or_default(&args.config)?;
    config.validate()?;

    let client = RestFabricClient::new(&config.fabric.url, config.client_options()?)
        .context("failed to build fabric client")?;
    let store = FileStore::open(&config.store.path).await?;
    info!("Fabric: {} (API {})", config.fabric.url, config.fabric.api_version);
    info!("State store: {}", store.path().display());

    let driver = FabricDriver::initialize(&config, Arc::new(client), Arc::new(store)).await?;
    info!("Mappings validated");

    if args.validate_only {
        return Ok(());
    }

    if args.once {
        let report = driver.sync_loop().run_pass().await;
        for step in &report.steps {
            info!(
                "{}: {:?} ({} ok, {} failed)",
                step.step,
                step.status(),
                step.processed,
                step.failed
            );
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let handle = driver.start_sync(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("fabric-syncd: Received shutdown signal");
    cancel.cancel();
    if let Some(handle) = handle {
        handle.await.context("synchronization loop panicked")?;
    }

    info!("fabric-syncd: Graceful shutdown complete");
    Ok(())
}
