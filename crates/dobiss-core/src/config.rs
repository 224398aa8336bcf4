// ── Runtime connection configuration ──
//
// Describes how to reach one gateway. Carries the signing secret and
// timing knobs but never touches disk; dobiss-config (or any embedder)
// builds a `ControllerConfig` and hands it to `Controller::new`.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Default time between discovery refetches.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(60);
/// Smallest discovery interval the cache accepts.
pub const MIN_DISCOVERY_INTERVAL: Duration = Duration::from_secs(10);
/// Default pause between status-socket reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_APPLICATION: &str = "dobiss-rs";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs). Default for local gateways.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for one gateway.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Host name or `host:port` of the gateway.
    pub host: String,
    /// Use `https` / `wss` instead of `http` / `ws`.
    pub secure: bool,
    /// Shared secret used to sign bearer tokens.
    pub secret: SecretString,
    /// Application name placed in the token claims.
    pub application: String,
    pub discovery_interval: Duration,
    pub reconnect_delay: Duration,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    pub tls: TlsVerification,
}

impl ControllerConfig {
    pub fn new(host: impl Into<String>, secret: SecretString) -> Self {
        Self {
            host: host.into(),
            secure: false,
            secret,
            application: DEFAULT_APPLICATION.into(),
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            timeout: Duration::from_secs(30),
            tls: TlsVerification::default(),
        }
    }

    /// REST root: `http(s)://{host}/api/local/`.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        let scheme = if self.secure { "https" } else { "http" };
        self.parse_url(&format!("{scheme}://{}/api/local/", self.host))
    }

    /// Status socket: `ws(s)://{host}/sockets/api`.
    pub fn socket_url(&self) -> Result<Url, CoreError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        self.parse_url(&format!("{scheme}://{}/sockets/api", self.host))
    }

    /// Check everything that can be checked without I/O.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::Configuration {
                message: "gateway host is empty".into(),
            });
        }
        if self.application.is_empty() {
            return Err(CoreError::Configuration {
                message: "application name is empty".into(),
            });
        }
        validate_discovery_interval(self.discovery_interval)?;
        self.base_url()?;
        self.socket_url()?;
        Ok(())
    }

    fn parse_url(&self, raw: &str) -> Result<Url, CoreError> {
        Url::parse(raw).map_err(|e| CoreError::Configuration {
            message: format!("invalid gateway host {:?}: {e}", self.host),
        })
    }
}

/// Reject intervals below [`MIN_DISCOVERY_INTERVAL`].
pub fn validate_discovery_interval(interval: Duration) -> Result<(), CoreError> {
    if interval < MIN_DISCOVERY_INTERVAL {
        return Err(CoreError::Configuration {
            message: format!(
                "discovery interval {}s is below the {}s minimum",
                interval.as_secs(),
                MIN_DISCOVERY_INTERVAL.as_secs()
            ),
        });
    }
    Ok(())
}
