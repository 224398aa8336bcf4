// Bearer-token issuance for the gateway's local API.
//
// The gateway accepts any HS256 JWT signed with the installation secret.
// Tokens are minted locally, cached, and re-minted once the renewal
// instant passes (four hours before the nominal 24h expiry).

use std::sync::{Mutex, PoisonError};

use base64::prelude::*;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime advertised in the token header.
pub const TOKEN_LIFETIME: &str = "24h";

/// How long a minted token is reused before a new one is signed.
pub const RENEW_AFTER: TimeDelta = TimeDelta::hours(20);

fn create_hmac(key: &[u8]) -> Result<HmacSha256, Error> {
    HmacSha256::new_from_slice(key).map_err(|e| Error::Token(format!("invalid secret: {e}")))
}

struct CachedToken {
    token: SecretString,
    renew_at: DateTime<Utc>,
}

/// Mints and caches bearer tokens for one gateway.
///
/// Shared between the caller context and the realtime task; the cache sits
/// behind a short-lived mutex. Two callers racing past `renew_at` may both
/// sign a token, which is harmless.
pub struct TokenProvider {
    secret: SecretString,
    application: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(secret: SecretString, application: impl Into<String>) -> Self {
        Self {
            secret,
            application: application.into(),
            cached: Mutex::new(None),
        }
    }

    /// Application name carried in the `name` claim.
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Current token, minting a new one if none is cached or it is due.
    pub fn token(&self) -> Result<SecretString, Error> {
        self.token_at(Utc::now())
    }

    /// `Authorization` header value for the current token.
    pub fn bearer(&self) -> Result<String, Error> {
        let token = self.token()?;
        Ok(format!("Bearer {}", token.expose_secret()))
    }

    /// Instant after which the cached token is replaced, if one is cached.
    pub fn renew_at(&self) -> Option<DateTime<Utc>> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.renew_at)
    }

    pub(crate) fn token_at(&self, now: DateTime<Utc>) -> Result<SecretString, Error> {
        {
            let guard = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = guard.as_ref() {
                if now < cached.renew_at {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = SecretString::from(self.sign()?);
        let renew_at = now + RENEW_AFTER;
        debug!(application = %self.application, %renew_at, "minted gateway token");

        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedToken {
            token: token.clone(),
            renew_at,
        });
        Ok(token)
    }

    fn sign(&self) -> Result<String, Error> {
        let header = BASE64_URL_SAFE_NO_PAD.encode(
            json!({"alg": "HS256", "typ": "JWT", "expiresIn": TOKEN_LIFETIME}).to_string(),
        );
        let payload = BASE64_URL_SAFE_NO_PAD.encode(json!({"name": self.application}).to_string());

        let signing_input = format!("{header}.{payload}");
        let mut mac = create_hmac(self.secret.expose_secret().as_bytes())?;
        mac.update(signing_input.as_bytes());
        let signature = BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("application", &self.application)
            .field("renew_at", &self.renew_at())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn provider() -> TokenProvider {
        TokenProvider::new(SecretString::from("s3cret".to_string()), "dobiss-test")
    }

    fn decode_part(part: &str) -> serde_json::Value {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(part).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn token_has_expected_header_and_claims() {
        let token = provider().token().unwrap();
        let parts: Vec<&str> = token.expose_secret().split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_part(parts[0]);
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["expiresIn"], "24h");
        assert_eq!(decode_part(parts[1]), json!({"name": "dobiss-test"}));
    }

    #[test]
    fn signature_verifies_with_secret() {
        let token = provider().token().unwrap();
        let (input, sig) = token.expose_secret().rsplit_once('.').unwrap();

        let mut mac = create_hmac(b"s3cret").unwrap();
        mac.update(input.as_bytes());
        let expected = BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        assert_eq!(sig, expected);
    }

    #[test]
    fn token_is_reused_until_renewal_instant() {
        let provider = provider();
        let t0 = Utc::now();
        provider.token_at(t0).unwrap();
        let renew_at = provider.renew_at().unwrap();
        assert_eq!(renew_at, t0 + RENEW_AFTER);

        provider.token_at(t0 + TimeDelta::hours(19)).unwrap();
        assert_eq!(provider.renew_at(), Some(renew_at));

        provider.token_at(renew_at).unwrap();
        assert_eq!(provider.renew_at(), Some(renew_at + RENEW_AFTER));
    }

    #[test]
    fn bearer_prefixes_token() {
        let bearer = provider().bearer().unwrap();
        assert!(bearer.starts_with("Bearer ey"));
    }
}
