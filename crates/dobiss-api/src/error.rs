use thiserror::Error;

/// Top-level error type for the `dobiss-api` crate.
///
/// Covers every failure mode of the gateway surfaces: token minting,
/// HTTP transport, REST responses, and the status socket.
/// `dobiss-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The gateway rejected the bearer token (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Signing a new token failed.
    #[error("Token signing failed: {0}")]
    Token(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status from a REST endpoint.
    #[error("Gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── Status socket ───────────────────────────────────────────────
    /// Socket connection or read failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Socket closed by the gateway or the stream ended.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Frame the status channel never carries (binary, raw frame).
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the gateway refused our credentials.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Transport(e) => matches!(
                e.status(),
                Some(reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN)
            ),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_detected() {
        let err = Error::Authentication {
            message: "bad token".into(),
        };
        assert!(err.is_auth_failure());
        assert!(!err.is_transient());
    }

    #[test]
    fn socket_and_server_errors_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            Error::Http {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !Error::Http {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
    }
}
