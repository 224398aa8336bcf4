//! Shared configuration for Dobiss tools.
//!
//! TOML profiles, secret resolution (env + keyring + plaintext) and
//! translation to `dobiss_core::ControllerConfig`. The CLI layers its flag
//! overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dobiss_core::{ControllerConfig, TlsVerification};

/// Keyring service name; entries are keyed `{profile}/secret`.
pub const KEYRING_SERVICE: &str = "dobiss";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no secret configured for profile '{profile}'")]
    NoSecret { profile: String },

    #[error("profile '{0}' not found")]
    UnknownProfile(String),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Profile named `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile(name))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// `table`, `json` or `plain`.
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named gateway profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway host, optionally with `:port`.
    pub host: String,

    /// Use https/wss.
    #[serde(default)]
    pub secure: bool,

    /// Signing secret (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Environment variable holding the signing secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,

    /// Application name placed in the token claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,

    /// Seconds between discovery refetches (minimum 10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_interval: Option<u64>,

    /// Seconds between status-socket reconnect attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Skip TLS verification. Local gateways use self-signed certificates,
    /// so an unset value means "skip" unless `ca_cert` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Profile {
    pub fn tls(&self) -> TlsVerification {
        match (self.insecure, &self.ca_cert) {
            (Some(true), _) => TlsVerification::DangerAcceptInvalid,
            (_, Some(path)) => TlsVerification::CustomCa(path.clone()),
            (Some(false), None) => TlsVerification::SystemDefaults,
            (None, None) => TlsVerification::DangerAcceptInvalid,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "dobiss", "dobiss").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("dobiss");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the config from the canonical path merged with `DOBISS_` env vars.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// Nested keys come from double-underscore env vars, e.g.
/// `DOBISS_PROFILES__HOME__HOST`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DOBISS_").split("__"))
        .extract()?;
    Ok(config)
}

pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config unreadable, using defaults");
        Config::default()
    })
}

/// Write pretty TOML to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/secret"))
}

/// Resolve the signing secret: `secret_env` → keyring → plaintext.
pub fn resolve_secret(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
        tracing::debug!(env = %env_name, "secret env var not set");
    }

    match keyring_entry(profile_name).and_then(|entry| entry.get_password()) {
        Ok(secret) => return Ok(SecretString::from(secret)),
        Err(e) => tracing::debug!(profile = profile_name, error = %e, "no keyring secret"),
    }

    if let Some(ref secret) = profile.secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoSecret {
        profile: profile_name.into(),
    })
}

/// Store a profile's signing secret in the system keyring.
pub fn store_secret(profile_name: &str, secret: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(secret.expose_secret())?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile with an already-resolved
/// secret.
pub fn build_controller_config(
    profile: &Profile,
    secret: SecretString,
) -> Result<ControllerConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config = ControllerConfig::new(profile.host.trim(), secret);
    config.secure = profile.secure;
    config.tls = profile.tls();
    if let Some(ref application) = profile.application {
        config.application.clone_from(application);
    }
    if let Some(secs) = profile.discovery_interval {
        config.discovery_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.reconnect_delay {
        config.reconnect_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.timeout {
        config.timeout = Duration::from_secs(secs);
    }

    config.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

/// Build a `ControllerConfig` from a profile, resolving its secret.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ControllerConfig, ConfigError> {
    let secret = resolve_secret(profile, profile_name)?;
    build_controller_config(profile, secret)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    fn profile(host: &str) -> Profile {
        Profile {
            host: host.into(),
            secret: Some("plain".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults, Defaults::default());
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                discovery_interval: Some(120),
                insecure: Some(false),
                ..profile("192.168.1.20")
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["home"], cfg.profiles["home"]);
    }

    #[test]
    fn parses_handwritten_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
output = "json"

[profiles.home]
host = "gateway.local:8080"
secure = true
secret_env = "HOME_GATEWAY_SECRET"
reconnect_delay = 5
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 30);
        let (name, home) = cfg.profile(None).unwrap();
        assert_eq!(name, "home");
        assert!(home.secure);
        assert_eq!(home.reconnect_delay, Some(5));
        assert!(matches!(
            cfg.profile(Some("office")),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn tls_selection() {
        let mut p = profile("h");
        assert_eq!(p.tls(), TlsVerification::DangerAcceptInvalid);
        p.insecure = Some(false);
        assert_eq!(p.tls(), TlsVerification::SystemDefaults);
        p.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        assert_eq!(p.tls(), TlsVerification::CustomCa(PathBuf::from("/etc/ca.pem")));
        p.insecure = Some(true);
        assert_eq!(p.tls(), TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn plaintext_secret_is_last_resort() {
        let p = Profile {
            secret_env: Some("DOBISS_CONFIG_TEST_UNSET_VAR".into()),
            ..profile("h")
        };
        let secret = resolve_secret(&p, "dobiss-config-test-plaintext").unwrap();
        assert_eq!(secret.expose_secret(), "plain");

        let bare = Profile {
            secret: None,
            ..p
        };
        assert!(matches!(
            resolve_secret(&bare, "dobiss-config-test-missing"),
            Err(ConfigError::NoSecret { .. })
        ));
    }

    #[test]
    fn controller_config_translation() {
        let p = Profile {
            secure: true,
            application: Some("bridge".into()),
            discovery_interval: Some(30),
            timeout: Some(5),
            ..profile(" 10.0.0.2 ")
        };
        let cfg = build_controller_config(&p, SecretString::from("s".to_string())).unwrap();
        assert_eq!(cfg.host, "10.0.0.2");
        assert_eq!(cfg.application, "bridge");
        assert_eq!(cfg.discovery_interval, Duration::from_secs(30));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.base_url().unwrap().as_str(), "https://10.0.0.2/api/local/");
    }

    #[test]
    fn interval_floor_is_enforced() {
        let p = Profile {
            discovery_interval: Some(3),
            ..profile("h")
        };
        assert!(matches!(
            build_controller_config(&p, SecretString::from("s".to_string())),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            build_controller_config(&profile(""), SecretString::from("s".to_string())),
            Err(ConfigError::Validation { .. })
        ));
    }
}
