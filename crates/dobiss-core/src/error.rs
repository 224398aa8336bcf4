// ── Core error types ──
//
// User-facing errors from dobiss-core. The `From<dobiss_api::Error>` impl
// folds transport failures into domain variants; everything the gateway
// sends that we cannot interpret ends up as `Protocol` or `Projection`.

use thiserror::Error;

use crate::model::ObjectId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error(transparent)]
    Transport(dobiss_api::Error),

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Entity not found: {identifier}")]
    NotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} on {kind} entity")]
    Unsupported { operation: String, kind: String },
}

/// Failure to project one status cell onto one entity.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("{object_id}: expected integer status, got {value}")]
    NotAnInteger {
        object_id: ObjectId,
        value: serde_json::Value,
    },

    #[error("{object_id}: expected temperature record, got {value}")]
    NotARecord {
        object_id: ObjectId,
        value: serde_json::Value,
    },
}

impl CoreError {
    pub fn not_found(identifier: impl std::fmt::Display) -> Self {
        Self::NotFound {
            identifier: identifier.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<dobiss_api::Error> for CoreError {
    fn from(err: dobiss_api::Error) -> Self {
        match err {
            dobiss_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            dobiss_api::Error::Token(message) => CoreError::AuthenticationFailed {
                message: format!("cannot sign token: {message}"),
            },
            dobiss_api::Error::Deserialization { message, .. } => CoreError::Protocol { message },
            dobiss_api::Error::Protocol(message) => CoreError::Protocol { message },
            dobiss_api::Error::InvalidUrl(e) => CoreError::Configuration {
                message: format!("invalid gateway URL: {e}"),
            },
            dobiss_api::Error::Tls(message) => CoreError::Configuration { message },
            other => CoreError::Transport(other),
        }
    }
}
