//! # Node Runtime Library
//!
//! Wires the remote storage subsystems into one process. The binary in
//! `main.rs` is a thin shell over [`NodeRuntime`].
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults → TOML → environment → CLI) and validate
//! 2. Initialize tracing
//! 3. Initialize subsystems (TLS, storage, initial upstream login, gateway)
//! 4. Start maintenance tasks
//! 5. Serve until the shutdown signal
//!
//! ## Shutdown Sequence
//!
//! 1. Stop accepting connections and close open ones (bounded by `close_timeout`)
//! 2. Stop maintenance tasks
//! 3. Drop the upstream session, drain the audit log, close the pool
//! 4. Clear the session registry

pub mod cli;
pub mod container;
pub mod telemetry;
pub mod wiring;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use rs_03_protocol_gateway::GatewayError;

use crate::container::{NodeConfig, SubsystemContainer};
use crate::wiring::MaintenanceScheduler;

/// The running node.
pub struct NodeRuntime {
    /// Subsystem container with all initialized services.
    container: Arc<SubsystemContainer>,
    /// Periodic background tasks.
    maintenance: MaintenanceScheduler,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Initialize subsystems and start maintenance. Does not listen yet.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        info!("===========================================");
        info!("  Remote Storage Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        config.validate().context("invalid configuration")?;

        let container = Arc::new(SubsystemContainer::initialize(config).await?);
        let maintenance = MaintenanceScheduler::spawn(
            &container.config.maintenance,
            container.identity.clone(),
            Arc::clone(&container.registry),
            container.storage.clone(),
        );
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            container,
            maintenance,
            shutdown_tx,
        })
    }

    /// Get a reference to the subsystem container.
    pub fn container(&self) -> Arc<SubsystemContainer> {
        Arc::clone(&self.container)
    }

    pub fn maintenance(&self) -> &MaintenanceScheduler {
        &self.maintenance
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn run<S>(self, signal: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let gateway = Arc::clone(&self.container.gateway);
        let rx = self.shutdown_tx.subscribe();
        self.drive(async move { gateway.serve(rx).await }, signal)
            .await
    }

    /// Serve on an already bound listener until `signal` resolves.
    pub async fn run_on<S>(self, listener: TcpListener, signal: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let gateway = Arc::clone(&self.container.gateway);
        let rx = self.shutdown_tx.subscribe();
        self.drive(async move { gateway.serve_on(listener, rx).await }, signal)
            .await
    }

    async fn drive<F, S>(self, server: F, signal: S) -> Result<()>
    where
        F: Future<Output = Result<(), GatewayError>>,
        S: Future<Output = ()>,
    {
        let result = {
            tokio::pin!(server);
            tokio::select! {
                result = &mut server => result,
                _ = signal => {
                    info!("Shutdown signal received");
                    let _ = self.shutdown_tx.send(true);
                    server.await
                }
            }
        };

        if let Err(e) = &result {
            error!(error = %e, "Protocol gateway failed");
        }
        self.shutdown().await;
        result.context("protocol gateway failed")
    }

    /// Stop background tasks and release every subsystem.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        let _ = self.shutdown_tx.send(true);
        self.maintenance.shutdown().await;
        self.container.close().await;
        info!("Shutdown complete");
    }
}
