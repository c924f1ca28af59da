//! Command line flags. These override the config file and environment.

use std::path::PathBuf;

use clap::Parser;

use crate::container::config::NodeConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "remote-storage-node")]
#[command(about = "Authenticated per-user key-value storage over WebSocket")]
pub struct Args {
    /// TOML configuration file (falls back to RS_CONFIG)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serve wss:// (needs --cert and --key)
    #[arg(long)]
    pub ssl: bool,

    /// PEM certificate chain
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Listening port
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Args {
    /// Config file path: flag first, then `RS_CONFIG`.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os("RS_CONFIG").map(PathBuf::from))
    }

    pub fn apply(&self, config: &mut NodeConfig) {
        if self.ssl {
            config.tls.enabled = true;
        }
        if let Some(cert) = &self.cert {
            config.tls.cert_path = Some(cert.clone());
        }
        if let Some(key) = &self.key {
            config.tls.key_path = Some(key.clone());
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}
