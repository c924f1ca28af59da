//! Gateway configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 16666;

/// Default maximum inbound message size (10 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// WebSocket server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 16666)
    pub port: u16,
    /// Largest accepted message; larger ones end the connection
    pub max_message_size: usize,
    /// How often the server pings each connection
    pub ping_interval: Duration,
    /// Close a connection silent for this long
    pub ping_timeout: Duration,
    /// Upper bound on graceful shutdown
    pub close_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: DEFAULT_PORT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(40),
            close_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Get WebSocket server bind address
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
