//! # Remote Storage Node
//!
//! Entry point: load configuration, start the runtime, serve until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use node_runtime::cli::Args;
use node_runtime::container::NodeConfig;
use node_runtime::telemetry::init_tracing;
use node_runtime::NodeRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(args.config_path().as_deref())?;
    config.apply_env()?;
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging)?;

    let runtime = NodeRuntime::start(config)
        .await
        .context("node failed to start")?;

    info!("Node is running. Press Ctrl+C to stop.");
    runtime
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
