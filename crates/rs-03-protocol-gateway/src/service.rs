//! Protocol Gateway service - WebSocket listener plus health and metrics routes.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::tls::TlsMode;
use crate::ws::run_connection;
use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rs_01_storage_engine::StorageEngine;
use rs_02_identity_client::{IdentityProvider, SessionRegistry};
use shared_types::TimeSource;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Everything a connection needs, cloned into each one.
#[derive(Clone)]
pub struct GatewayContext {
    pub config: GatewayConfig,
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn StorageEngine>,
    pub registry: Arc<SessionRegistry>,
    pub clock: Arc<dyn TimeSource>,
    pub metrics: Arc<GatewayMetrics>,
}

impl GatewayContext {
    /// Create a context with fresh metrics.
    pub fn new(
        config: GatewayConfig,
        identity: Arc<dyn IdentityProvider>,
        storage: Arc<dyn StorageEngine>,
        registry: Arc<SessionRegistry>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            identity,
            storage,
            registry,
            clock,
            metrics: Arc::new(GatewayMetrics::new()),
        }
    }
}

/// Shared state for the router
#[derive(Clone)]
struct AppState {
    ctx: GatewayContext,
    shutdown: watch::Receiver<bool>,
}

/// The WebSocket server.
pub struct ProtocolGateway {
    ctx: GatewayContext,
    tls: TlsMode,
}

impl ProtocolGateway {
    pub fn new(ctx: GatewayContext, tls: TlsMode) -> Self {
        Self { ctx, tls }
    }

    pub fn context(&self) -> &GatewayContext {
        &self.ctx
    }

    pub fn tls(&self) -> &TlsMode {
        &self.tls
    }

    /// Build the router. Must be served with connect info.
    pub fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let state = AppState {
            ctx: self.ctx.clone(),
            shutdown,
        };

        Router::new()
            .route("/", get(ws_upgrade))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until `shutdown` turns true.
    pub async fn serve(&self, shutdown: watch::Receiver<bool>) -> Result<(), GatewayError> {
        let addr = self.ctx.config.addr();
        match &self.tls {
            TlsMode::Enabled(config) => self.serve_tls(addr, config.clone(), shutdown).await,
            TlsMode::Plaintext(_) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|source| GatewayError::Bind { addr, source })?;
                self.serve_on(listener, shutdown).await
            }
        }
    }

    /// Serve plaintext on an already bound listener.
    ///
    /// Returns once the server has stopped, or after `close_timeout` past the
    /// shutdown signal if connections are still draining.
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), GatewayError> {
        let local = listener.local_addr()?;
        info!(addr = %local, scheme = "ws", "Protocol gateway listening");

        let app = self
            .router(shutdown.clone())
            .into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown.clone()))
            .into_future();

        let close_timeout = self.ctx.config.close_timeout;
        let deadline = async move {
            wait_for_shutdown(shutdown).await;
            tokio::time::sleep(close_timeout).await;
        };

        tokio::select! {
            result = server => {
                result?;
                info!("Protocol gateway stopped");
                Ok(())
            }
            _ = deadline => {
                warn!(timeout = ?close_timeout, "Connections still open after close timeout, stopping anyway");
                Ok(())
            }
        }
    }

    async fn serve_tls(
        &self,
        addr: SocketAddr,
        config: axum_server::tls_rustls::RustlsConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), GatewayError> {
        let handle = axum_server::Handle::new();
        let close_timeout = self.ctx.config.close_timeout;

        let signal = handle.clone();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown(stop).await;
            signal.graceful_shutdown(Some(close_timeout));
        });

        info!(addr = %addr, scheme = "wss", "Protocol gateway listening");
        let app = self
            .router(shutdown)
            .into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, config)
            .handle(handle)
            .serve(app)
            .await
            .map_err(|e| {
                error!(error = %e, "TLS server error");
                GatewayError::Server(e)
            })?;
        info!("Protocol gateway stopped");
        Ok(())
    }
}

/// Resolve once the shutdown flag is set or its sender is gone.
pub async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let token = params.get("token").cloned();
    let max = state.ctx.config.max_message_size;
    let AppState { ctx, shutdown } = state;

    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| run_connection(socket, token, peer, ctx, shutdown))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "active_connections": state.ctx.metrics.active_connections(),
        "active_sessions": state.ctx.registry.len(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ctx.metrics.to_json())
}
