//! Test node and client helpers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use node_runtime::container::{NodeConfig, SubsystemContainer};
use node_runtime::NodeRuntime;
use rs_02_identity_client::test_utils::FakeUpstream;

pub const ALICE: &str = "token-alice";
pub const BOB: &str = "token-bob";

const WAIT: Duration = Duration::from_secs(5);

/// A node serving on an ephemeral localhost port.
pub struct TestNode {
    pub upstream: FakeUpstream,
    pub container: Arc<SubsystemContainer>,
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<anyhow::Result<()>>>,
    _dir: TempDir,
}

/// Config pointing at `upstream` with a database file inside `dir`.
pub fn node_config(upstream: &FakeUpstream, dir: &TempDir) -> NodeConfig {
    let identity = upstream.identity_config();
    let mut config = NodeConfig::default();
    config.server.host = "127.0.0.1".parse().unwrap();
    config.server.close_timeout = Duration::from_secs(2);
    config.storage.database_url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("remote-storage.db").display()
    );
    config.upstream.auth_url = identity.auth_url;
    config.upstream.uinfo_url = identity.uinfo_url;
    config.upstream.username = identity.username;
    config.upstream.password = identity.password;
    config.upstream.login_timeout = identity.login_timeout;
    config.upstream.lookup_timeout = identity.lookup_timeout;
    config
}

impl TestNode {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with a config adjusted by `tweak`.
    pub async fn start_with<F>(tweak: F) -> Self
    where
        F: FnOnce(&mut NodeConfig),
    {
        let upstream = FakeUpstream::start().await.unwrap();
        upstream.add_user(ALICE, "alice");
        upstream.add_user(BOB, "bob");

        let dir = tempfile::tempdir().unwrap();
        let mut config = node_config(&upstream, &dir);
        tweak(&mut config);

        let runtime = NodeRuntime::start(config).await.unwrap();
        let container = runtime.container();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(runtime.run_on(listener, async move {
            let _ = stop_rx.await;
        }));

        Self {
            upstream,
            container,
            addr,
            stop: Some(stop_tx),
            server: Some(server),
            _dir: dir,
        }
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/?token={}", self.addr, token)
    }

    pub async fn connect(&self, token: &str) -> Client {
        Client::connect(&self.ws_url(token)).await
    }

    pub async fn get_json(&self, path: &str) -> Value {
        reqwest::get(format!("http://{}{}", self.addr, path))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Poll `/health` until `field` equals `expected`.
    pub async fn wait_for_health(&self, field: &str, expected: u64) {
        for _ in 0..50 {
            if self.get_json("/health").await[field] == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} never reached {}", field, expected);
    }

    /// Send the shutdown signal and wait for the runtime to finish.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let server = self.server.take().unwrap();
        timeout(Duration::from_secs(10), server).await.unwrap().unwrap()
    }
}

/// WebSocket client speaking the storage protocol.
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    pub async fn connect(url: &str) -> Self {
        let (ws, _) = connect_async(url).await.unwrap();
        Self { ws }
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    pub async fn send_json(&mut self, frame: Value) {
        self.send_text(&frame.to_string()).await;
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) {
        self.ws.send(Message::Binary(data)).await.unwrap();
    }

    pub async fn send_message(&mut self, message: Message) {
        self.ws.send(message).await.unwrap();
    }

    /// Next data or close frame. `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            let next = timeout(WAIT, self.ws.next()).await.expect("no frame in time");
            match next {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(message)) => return Some(message),
                Some(Err(_)) | None => return None,
            }
        }
    }

    pub async fn recv_json(&mut self) -> Value {
        match self.recv().await {
            Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    pub async fn request(&mut self, frame: Value) -> Value {
        self.send_json(frame).await;
        self.recv_json().await
    }

    /// Wait for the server to end the connection. Returns the close code, if any.
    pub async fn expect_closed(&mut self) -> Option<u16> {
        match self.recv().await {
            Some(Message::Close(frame)) => frame.map(|f| u16::from(f.code)),
            Some(other) => panic!("expected close, got {:?}", other),
            None => None,
        }
    }

    /// Assert nothing arrives within `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(Some(Ok(message))) = timeout(wait, self.ws.next()).await {
            assert!(
                matches!(message, Message::Ping(_) | Message::Pong(_)),
                "unexpected frame {:?}",
                message
            );
        }
    }
}
