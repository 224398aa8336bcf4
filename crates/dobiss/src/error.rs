//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use dobiss_config::ConfigError;
use dobiss_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the gateway: {reason}")]
    #[diagnostic(
        code(dobiss::connection_failed),
        help(
            "Check that the gateway is powered and reachable.\n\
             Try: dobiss auth-check --host <host> -v"
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(dobiss::auth_failed),
        help(
            "The gateway rejected the signed token. Verify the secret for profile '{profile}'.\n\
             Run: dobiss config init --name {profile} --secret <secret> --keyring"
        )
    )]
    AuthFailed { profile: String },

    #[error("No secret configured for profile '{profile}'")]
    #[diagnostic(
        code(dobiss::no_secret),
        help("Pass --secret, set DOBISS_SECRET, or run: dobiss config init --keyring")
    )]
    NoSecret { profile: String },

    // ── Entities ─────────────────────────────────────────────────────
    #[error("'{identifier}' not found")]
    #[diagnostic(code(dobiss::not_found), help("Run: dobiss discover"))]
    NotFound { identifier: String },

    #[error("'{operation}' is not supported by {kind} entities")]
    #[diagnostic(code(dobiss::unsupported))]
    Unsupported { operation: String, kind: String },

    #[error("Gateway error: {message}")]
    #[diagnostic(code(dobiss::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(dobiss::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(dobiss::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: dobiss config init --name {name} --host <host>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(dobiss::no_config),
        help(
            "Pass --host and --secret, or create a profile with: dobiss config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(dobiss::config))]
    Config(ConfigError),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoSecret { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { .. } => Self::AuthFailed {
                profile: "current".into(),
            },
            CoreError::Transport(e) if e.is_transient() => Self::ConnectionFailed {
                reason: e.to_string(),
            },
            CoreError::Transport(e) => Self::Api {
                message: e.to_string(),
            },
            CoreError::NotFound { identifier } => Self::NotFound { identifier },
            CoreError::Unsupported { operation, kind } => Self::Unsupported { operation, kind },
            CoreError::Configuration { message } => Self::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            other @ (CoreError::Protocol { .. } | CoreError::Projection(_)) => Self::Api {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoSecret { profile } => Self::NoSecret { profile },
            ConfigError::UnknownProfile(name) => Self::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}
