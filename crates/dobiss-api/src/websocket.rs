//! Status socket connection.
//!
//! The gateway pushes status snapshots over `ws(s)://{host}/sockets/api` as
//! JSON text frames shaped like the `status` REST payload. This module owns
//! one connection; the reconnect policy lives in `dobiss-core`.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── SocketMessage ────────────────────────────────────────────────────

/// One decoded text frame.
#[derive(Debug, Clone)]
pub enum SocketMessage {
    /// A status document.
    Status(Value),
    /// A text frame that is not valid JSON. The connection is still usable.
    Malformed { error: String, raw: String },
}

// ── StatusSocket ─────────────────────────────────────────────────────

/// A single live status-socket connection.
#[derive(Debug)]
pub struct StatusSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl StatusSocket {
    /// Open the socket, sending `bearer` as the `Authorization` header on
    /// the upgrade request. `wss` URLs are verified per `transport.tls`.
    pub async fn connect(url: &Url, bearer: &str, transport: &TransportConfig) -> Result<Self, Error> {
        tracing::info!(url = %url, "connecting to status socket");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let request = ClientRequestBuilder::new(uri).with_header("Authorization", bearer);

        let connector = if url.scheme() == "wss" {
            transport.socket_connector()?
        } else {
            None
        };

        let (stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("status socket connected");
        Ok(Self { stream })
    }

    /// Wait for the next status document.
    ///
    /// Control frames are skipped. Any condition that ends the connection
    /// (close frame, stream end, binary frame, read error) is an `Err`.
    pub async fn next_message(&mut self) -> Result<SocketMessage, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    tracing::debug!(len = text.len(), "status frame");
                    return Ok(match serde_json::from_str::<Value>(text.as_str()) {
                        Ok(doc) => SocketMessage::Status(doc),
                        Err(e) => SocketMessage::Malformed {
                            error: e.to_string(),
                            raw: text.as_str().to_owned(),
                        },
                    });
                }
                Some(Ok(tungstenite::Message::Ping(_))) => {
                    // tungstenite queues the pong reply itself
                    tracing::trace!("status socket ping");
                }
                Some(Ok(tungstenite::Message::Pong(_))) => {
                    tracing::trace!("status socket pong");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    return Err(match frame {
                        Some(cf) => Error::WebSocketClosed {
                            code: u16::from(cf.code),
                            reason: cf.reason.to_string(),
                        },
                        None => Error::WebSocketClosed {
                            code: ABNORMAL_CLOSURE,
                            reason: "close frame without payload".into(),
                        },
                    });
                }
                Some(Ok(tungstenite::Message::Binary(bytes))) => {
                    return Err(Error::Protocol(format!(
                        "unexpected binary frame ({} bytes)",
                        bytes.len()
                    )));
                }
                Some(Ok(tungstenite::Message::Frame(_))) => {
                    return Err(Error::Protocol("unexpected raw frame".into()));
                }
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => {
                    return Err(Error::WebSocketClosed {
                        code: ABNORMAL_CLOSURE,
                        reason: "stream ended".into(),
                    });
                }
            }
        }
    }

    /// Send a close frame and flush. Errors are logged, not returned.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "status socket close");
        }
        let _ = self.stream.flush().await;
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    use super::*;

    #[tokio::test]
    async fn reads_status_then_reports_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut auth = None;
            let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, capture)
                .await
                .unwrap();
            ws.send(Message::text(r#"{"5":[1,0]}"#)).await.unwrap();
            ws.send(Message::text("not json")).await.unwrap();
            ws.close(None).await.unwrap();
            auth
        });

        let url = Url::parse(&format!("ws://{addr}/sockets/api")).unwrap();
        let mut socket = StatusSocket::connect(&url, "Bearer abc", &TransportConfig::default()).await.unwrap();

        match socket.next_message().await.unwrap() {
            SocketMessage::Status(doc) => assert_eq!(doc["5"][0], 1),
            other @ SocketMessage::Malformed { .. } => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            socket.next_message().await.unwrap(),
            SocketMessage::Malformed { .. }
        ));
        let err = socket.next_message().await.unwrap_err();
        assert!(matches!(err, Error::WebSocketClosed { .. }), "got {err:?}");

        assert_eq!(server.await.unwrap().as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{addr}/sockets/api")).unwrap();
        let err = StatusSocket::connect(&url, "Bearer x", &TransportConfig::default()).await.unwrap_err();
        assert!(matches!(err, Error::WebSocketConnect(_)));
    }
}
