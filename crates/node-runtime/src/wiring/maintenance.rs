//! # Maintenance Scheduler
//!
//! Three independent periodic tasks, all stopped by one shutdown signal:
//!
//! | Task | Default | Action |
//! |------|---------|--------|
//! | session refresh | 30m | force a new upstream login |
//! | registry sweep | 5m | report session count and distinct users |
//! | health check | 10m | probe the database |
//!
//! Each task waits one full period before its first run. Failures are logged
//! and never stop the task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use rs_01_storage_engine::StorageEngine;
use rs_02_identity_client::{IdentityProvider, SessionRegistry};

use crate::container::config::MaintenanceConfig;

/// Run counters, one per task.
#[derive(Debug, Default)]
pub struct MaintenanceStats {
    pub session_refreshes: AtomicU64,
    pub refresh_failures: AtomicU64,
    pub registry_sweeps: AtomicU64,
    pub health_checks: AtomicU64,
    pub health_failures: AtomicU64,
}

impl MaintenanceStats {
    pub fn session_refreshes(&self) -> u64 {
        self.session_refreshes.load(Ordering::Relaxed)
    }

    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    pub fn registry_sweeps(&self) -> u64 {
        self.registry_sweeps.load(Ordering::Relaxed)
    }

    pub fn health_checks(&self) -> u64 {
        self.health_checks.load(Ordering::Relaxed)
    }

    pub fn health_failures(&self) -> u64 {
        self.health_failures.load(Ordering::Relaxed)
    }
}

/// Handle to the running maintenance tasks.
pub struct MaintenanceScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<MaintenanceStats>,
}

impl MaintenanceScheduler {
    /// Start all three tasks. Must be called inside a tokio runtime.
    pub fn spawn(
        config: &MaintenanceConfig,
        identity: Arc<dyn IdentityProvider>,
        registry: Arc<SessionRegistry>,
        storage: Arc<dyn StorageEngine>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(MaintenanceStats::default());

        let refresh = {
            let stats = Arc::clone(&stats);
            spawn_periodic(
                "session_refresh",
                config.session_refresh_interval,
                shutdown_rx.clone(),
                move || {
                    let identity = Arc::clone(&identity);
                    let stats = Arc::clone(&stats);
                    async move {
                        info!("Refreshing upstream session");
                        stats.session_refreshes.fetch_add(1, Ordering::Relaxed);
                        if !identity.refresh_session().await {
                            stats.refresh_failures.fetch_add(1, Ordering::Relaxed);
                            warn!("Upstream session refresh failed");
                        }
                    }
                },
            )
        };

        let sweep = {
            let stats = Arc::clone(&stats);
            spawn_periodic(
                "registry_sweep",
                config.registry_sweep_interval,
                shutdown_rx.clone(),
                move || {
                    let registry = Arc::clone(&registry);
                    let stats = Arc::clone(&stats);
                    async move {
                        let users = registry.usernames();
                        stats.registry_sweeps.fetch_add(1, Ordering::Relaxed);
                        info!(
                            sessions = registry.len(),
                            users = users.len(),
                            "Session registry sweep"
                        );
                        debug!(usernames = ?users, "Active users");
                    }
                },
            )
        };

        let health = {
            let stats = Arc::clone(&stats);
            spawn_periodic(
                "health_check",
                config.health_check_interval,
                shutdown_rx,
                move || {
                    let storage = Arc::clone(&storage);
                    let stats = Arc::clone(&stats);
                    async move {
                        stats.health_checks.fetch_add(1, Ordering::Relaxed);
                        if storage.health_check().await {
                            debug!("Database health check passed");
                        } else {
                            stats.health_failures.fetch_add(1, Ordering::Relaxed);
                            error!("Database health check failed");
                        }
                    }
                },
            )
        };

        info!("Maintenance tasks started");
        Self {
            shutdown_tx,
            handles: vec![refresh, sweep, health],
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<MaintenanceStats> {
        &self.stats
    }

    /// Signal every task and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Maintenance task panicked");
            }
        }
        info!("Maintenance tasks stopped");
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut run: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => run().await,
                _ = shutdown.changed() => {
                    debug!(task = name, "Shutdown signal received");
                    break;
                }
            }
        }
    })
}
