// Gateway REST client
//
// Wraps a lazily-built `reqwest::Client` with bearer-token injection and
// response status checks. The session is created on first use, reused by
// every request, and can be closed explicitly (it is rebuilt on next use).

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::auth::TokenProvider;
use crate::error::Error;
use crate::models::{ActionRequest, DiscoveryResponse, StatusFilter, StatusResponse};
use crate::transport::TransportConfig;

const BODY_PREVIEW: usize = 200;

/// Raw HTTP client for the gateway's local API.
///
/// Cheaply cloneable; clones share the token cache and the HTTP session.
#[derive(Clone)]
pub struct DobissClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: Url,
    socket_url: Url,
    transport: TransportConfig,
    tokens: Arc<TokenProvider>,
    session: Mutex<Option<reqwest::Client>>,
}

impl DobissClient {
    /// Build a client. No I/O happens until the first request.
    ///
    /// `base_url` is the REST root (`http://host/api/local/`), `socket_url`
    /// the status socket (`ws://host/sockets/api`).
    pub fn new(
        base_url: Url,
        socket_url: Url,
        tokens: Arc<TokenProvider>,
        transport: TransportConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                base_url,
                socket_url,
                transport,
                tokens,
                session: Mutex::new(None),
            }),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn socket_url(&self) -> &Url {
        &self.inner.socket_url
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.inner.tokens
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.inner.transport
    }

    // ── Session management ───────────────────────────────────────────

    /// The shared HTTP session, created on first call.
    pub fn session(&self) -> Result<reqwest::Client, Error> {
        let mut guard = self.inner.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = self.inner.transport.build_client()?;
        debug!(base = %self.inner.base_url, "opened HTTP session");
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Drop the shared HTTP session. Safe to call repeatedly.
    pub fn close_session(&self) {
        let closed = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if closed.is_some() {
            debug!("closed HTTP session");
        }
    }

    /// Whether a session is currently open.
    pub fn has_session(&self) -> bool {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET discover`: groups, subjects and temperature calendars.
    pub async fn discover(&self) -> Result<DiscoveryResponse, Error> {
        let url = self.endpoint("discover")?;
        debug!("GET {url}");
        let builder = self.session()?.get(url);
        let resp = self.authorize(builder)?.send().await?;
        Self::parse_json(resp).await
    }

    /// `GET status` with a JSON body; returns the `status` member.
    ///
    /// An empty filter asks for every module; a filled one yields the scalar
    /// (or temperature record) for one channel.
    pub async fn status(&self, filter: &StatusFilter) -> Result<Value, Error> {
        let url = self.endpoint("status")?;
        debug!(address = ?filter.address, channel = ?filter.channel, "GET {url}");
        let builder = self.session()?.get(url).json(filter);
        let resp = self.authorize(builder)?.send().await?;
        let parsed: StatusResponse = Self::parse_json(resp).await?;
        trace!(status = %parsed.status, "status payload");
        Ok(parsed.status)
    }

    /// `POST action`.
    pub async fn action(&self, request: &ActionRequest) -> Result<(), Error> {
        let url = self.endpoint("action")?;
        debug!(
            address = request.address,
            channel = request.channel,
            action = request.action,
            "POST {url}"
        );
        self.post_unit(url, request).await
    }

    /// Probe the gateway with an unfiltered status request.
    ///
    /// Returns `false` for any failure; the cause is logged at debug level.
    pub async fn auth_check(&self) -> bool {
        match self.status(&StatusFilter::all()).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "auth check failed");
                false
            }
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, Error> {
        let bearer = self.inner.tokens.bearer()?;
        Ok(builder.header(reqwest::header::AUTHORIZATION, bearer))
    }

    async fn post_unit(&self, url: Url, body: &(impl Serialize + Sync)) -> Result<(), Error> {
        let builder = self.session()?.post(url).json(body);
        let resp = self.authorize(builder)?.send().await?;
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await?;
        trace!(body = %preview(&body), "action response");
        Ok(())
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: format!("gateway rejected token (HTTP {})", status.as_u16()),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body: preview(&body).to_owned(),
            });
        }

        Ok(resp)
    }

    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}

impl std::fmt::Debug for DobissClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DobissClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("socket_url", &self.inner.socket_url.as_str())
            .finish_non_exhaustive()
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
