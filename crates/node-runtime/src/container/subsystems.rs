//! # Subsystem Container
//!
//! Holds the storage engine, identity client, session registry and protocol
//! gateway for one node.
//!
//! ## Initialization Order
//!
//! ```text
//! 1. TLS context        (optional, downgrades to plaintext)
//! 2. Storage Engine     (pool + schema, fatal on failure)
//! 3. Identity Client    (initial upstream login, fatal on failure)
//! 4. Protocol Gateway   (depends on 2 and 3)
//! ```
//!
//! ## Thread Safety
//!
//! - All subsystems wrapped in `Arc` for shared ownership
//! - The gateway sees them only through their ports (`StorageEngine`, `IdentityProvider`)

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, instrument};

use rs_01_storage_engine::SqlStorageEngine;
use rs_02_identity_client::{IdentityProvider, SessionRegistry, UpstreamIdentityClient};
use rs_03_protocol_gateway::{load_tls, GatewayContext, ProtocolGateway};
use shared_types::SystemTimeSource;

use crate::container::config::NodeConfig;

/// Central container holding all subsystem instances.
pub struct SubsystemContainer {
    /// Storage Engine (rs-01)
    pub storage: Arc<SqlStorageEngine>,

    /// Identity Client (rs-02) and the registry it fills
    pub identity: Arc<UpstreamIdentityClient>,
    pub registry: Arc<SessionRegistry>,

    /// Protocol Gateway (rs-03)
    pub gateway: Arc<ProtocolGateway>,

    /// Configuration the container was built from
    pub config: NodeConfig,
}

impl SubsystemContainer {
    /// Initialize all subsystems in dependency order.
    #[instrument(name = "container_init", skip_all)]
    pub async fn initialize(config: NodeConfig) -> Result<Self> {
        let tls = load_tls(&config.tls_settings());

        info!("Initializing Storage Engine (rs-01)");
        let storage = SqlStorageEngine::connect(config.storage_config())
            .await
            .context("failed to open database")?;
        if let Err(e) = storage.initialize().await {
            storage.close().await;
            return Err(e).context("failed to initialize database schema");
        }
        let storage = Arc::new(storage);

        info!("Initializing Identity Client (rs-02)");
        let registry = Arc::new(SessionRegistry::new());
        let identity = Arc::new(UpstreamIdentityClient::new(
            config.identity_config(),
            Arc::clone(&registry),
        ));
        if !identity.ensure_session().await {
            storage.close().await;
            bail!("initial login to the identity service failed");
        }

        info!("Initializing Protocol Gateway (rs-03)");
        let ctx = GatewayContext::new(
            config.gateway_config(),
            identity.clone(),
            storage.clone(),
            Arc::clone(&registry),
            Arc::new(SystemTimeSource),
        );
        let gateway = Arc::new(ProtocolGateway::new(ctx, tls));

        info!(scheme = gateway.tls().scheme(), "All subsystems initialized");
        Ok(Self {
            storage,
            identity,
            registry,
            gateway,
            config,
        })
    }

    /// Release subsystems in reverse order.
    pub async fn close(&self) {
        self.identity.close();
        self.storage.close().await;
        self.registry.clear();
        info!("All subsystems closed");
    }
}
