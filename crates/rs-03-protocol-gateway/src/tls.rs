//! TLS context for `wss://`.
//!
//! TLS is optional. Any problem with it (disabled, paths missing, files
//! missing, PEM unusable) is logged and the gateway serves plain `ws://`.

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Requested TLS setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

/// Why the gateway is serving plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaintextReason {
    Disabled,
    MissingPath,
    CertificateNotFound(PathBuf),
    KeyNotFound(PathBuf),
    Invalid(String),
}

impl fmt::Display for PlaintextReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaintextReason::Disabled => write!(f, "TLS disabled"),
            PlaintextReason::MissingPath => write!(f, "certificate or key path not configured"),
            PlaintextReason::CertificateNotFound(path) => {
                write!(f, "certificate file not found: {}", path.display())
            }
            PlaintextReason::KeyNotFound(path) => {
                write!(f, "key file not found: {}", path.display())
            }
            PlaintextReason::Invalid(reason) => write!(f, "unusable certificate or key: {}", reason),
        }
    }
}

/// Outcome of TLS setup.
#[derive(Clone)]
pub enum TlsMode {
    Enabled(RustlsConfig),
    Plaintext(PlaintextReason),
}

impl TlsMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, TlsMode::Enabled(_))
    }

    /// URL scheme clients should use.
    pub fn scheme(&self) -> &'static str {
        if self.is_enabled() {
            "wss"
        } else {
            "ws"
        }
    }
}

impl fmt::Debug for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsMode::Enabled(_) => f.write_str("TlsMode::Enabled"),
            TlsMode::Plaintext(reason) => write!(f, "TlsMode::Plaintext({:?})", reason),
        }
    }
}

/// Build the TLS context, downgrading to plaintext on any problem.
pub fn load_tls(settings: &TlsSettings) -> TlsMode {
    match server_config(settings) {
        Ok(config) => {
            info!(
                cert = ?settings.cert_path,
                key = ?settings.key_path,
                "TLS certificate loaded"
            );
            TlsMode::Enabled(RustlsConfig::from_config(Arc::new(config)))
        }
        Err(PlaintextReason::Disabled) => {
            info!("TLS disabled, serving plaintext");
            TlsMode::Plaintext(PlaintextReason::Disabled)
        }
        Err(reason) => {
            warn!(reason = %reason, "TLS unavailable, falling back to plaintext");
            TlsMode::Plaintext(reason)
        }
    }
}

fn server_config(settings: &TlsSettings) -> Result<rustls::ServerConfig, PlaintextReason> {
    if !settings.enabled {
        return Err(PlaintextReason::Disabled);
    }
    let (Some(cert_path), Some(key_path)) = (&settings.cert_path, &settings.key_path) else {
        return Err(PlaintextReason::MissingPath);
    };
    if !cert_path.is_file() {
        return Err(PlaintextReason::CertificateNotFound(cert_path.clone()));
    }
    if !key_path.is_file() {
        return Err(PlaintextReason::KeyNotFound(key_path.clone()));
    }

    let certs = read_certificates(cert_path)?;
    let key = read_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| PlaintextReason::Invalid(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| PlaintextReason::Invalid(e.to_string()))?;
    // WebSocket upgrades need HTTP/1.1.
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, PlaintextReason> {
    let file = File::open(path).map_err(|e| PlaintextReason::Invalid(e.to_string()))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PlaintextReason::Invalid(e.to_string()))?;
    if certs.is_empty() {
        return Err(PlaintextReason::Invalid(format!(
            "no certificates in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, PlaintextReason> {
    let file = File::open(path).map_err(|e| PlaintextReason::Invalid(e.to_string()))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| PlaintextReason::Invalid(e.to_string()))?
        .ok_or_else(|| PlaintextReason::Invalid(format!("no private key in {}", path.display())))
}
