//! WebSocket-upgrading proxy.
//!
//! The backend socket is opened before the client upgrade is accepted, so an
//! unreachable backend is reported as `502` instead of an immediately closed
//! socket. Once both sides are open, frames are relayed in both directions
//! until either side closes.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{FromRequestParts, WebSocketUpgrade};
use axum::http::{header, HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TungsteniteCloseFrame;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use api_proxy_core::Protocol;

use super::{join_url, Backend};
use crate::error::ApiError;

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Headers copied from the client handshake to the backend handshake.
const FORWARDED_HEADERS: [header::HeaderName; 3] =
    [header::ORIGIN, header::COOKIE, header::AUTHORIZATION];

/// Forwards WebSocket sessions to a backend.
#[derive(Debug, Clone)]
pub struct WsBackend {
    url: Url,
    connect_timeout: Duration,
}

impl WsBackend {
    /// Create a backend for `url`.
    ///
    /// `http` and `https` URLs are dialed as `ws` and `wss`.
    #[must_use]
    pub fn new(url: Url, connect_timeout: Duration) -> Self {
        Self {
            url,
            connect_timeout,
        }
    }

    /// Open the backend socket for a request path and query.
    async fn connect(
        &self,
        path: &str,
        query: Option<&str>,
        client_headers: &HeaderMap,
    ) -> Result<BackendSocket, ApiError> {
        let target = websocket_url(&join_url(&self.url, path, query));

        let mut handshake = target
            .as_str()
            .into_client_request()
            .map_err(|e| ApiError::BadRequest(format!("invalid backend request: {e}")))?;
        for name in &FORWARDED_HEADERS {
            if let Some(value) = client_headers.get(name) {
                handshake.headers_mut().insert(name.clone(), value.clone());
            }
        }

        match tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(handshake),
        )
        .await
        {
            Ok(Ok((socket, _))) => Ok(socket),
            Ok(Err(e)) => {
                tracing::error!(backend = %target, error = %e, "Failed to connect to backend");
                Err(ApiError::BadGateway(format!(
                    "backend unreachable: {}",
                    self.url
                )))
            }
            Err(_) => {
                tracing::error!(backend = %target, "Timeout connecting to backend");
                Err(ApiError::BadGateway(format!(
                    "backend timed out: {}",
                    self.url
                )))
            }
        }
    }
}

#[async_trait]
impl Backend for WsBackend {
    fn url(&self) -> &Url {
        &self.url
    }

    fn protocol(&self) -> Protocol {
        Protocol::WebSocket
    }

    async fn forward(&self, request: Request<Body>) -> Result<Response, ApiError> {
        let (mut parts, _body) = request.into_parts();

        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => return Ok(rejection.into_response()),
        };

        let backend = self
            .connect(parts.uri.path(), parts.uri.query(), &parts.headers)
            .await?;

        let label = format!("{}{}", self.url, parts.uri.path().trim_start_matches('/'));
        tracing::info!(backend = %label, "WebSocket connection initiated");

        Ok(upgrade.on_upgrade(move |client| relay(client, backend, label)))
    }
}

/// Map `http`/`https` to `ws`/`wss`, leaving other schemes untouched.
fn websocket_url(url: &Url) -> Url {
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    };

    let mut mapped = url.clone();
    match mapped.set_scheme(scheme) {
        Ok(()) => mapped,
        Err(()) => url.clone(),
    }
}

/// Relay frames between the client and the backend until one side closes.
async fn relay(client: WebSocket, backend: BackendSocket, label: String) {
    let (client_write, client_read) = client.split();
    let (backend_write, backend_read) = backend.split();

    let client_to_backend = forward_client_to_backend(client_read, backend_write, &label);
    let backend_to_client = forward_backend_to_client(backend_read, client_write, &label);

    tokio::select! {
        result = client_to_backend => {
            if let Err(e) = result {
                tracing::debug!(backend = %label, error = %e, "Client to backend forward ended");
            }
        }
        result = backend_to_client => {
            if let Err(e) = result {
                tracing::debug!(backend = %label, error = %e, "Backend to client forward ended");
            }
        }
    }

    tracing::info!(backend = %label, "WebSocket proxy ended");
}

async fn forward_client_to_backend(
    mut client_read: SplitStream<WebSocket>,
    mut backend_write: SplitSink<BackendSocket, TungsteniteMessage>,
    label: &str,
) -> Result<(), String> {
    while let Some(msg) = client_read.next().await {
        let msg = msg.map_err(|e| format!("error reading from client: {e}"))?;
        let closing = matches!(msg, Message::Close(_));

        backend_write
            .send(to_backend(msg))
            .await
            .map_err(|e| format!("failed to send to backend: {e}"))?;

        if closing {
            tracing::debug!(backend = %label, "Client closed connection");
            break;
        }
    }
    Ok(())
}

async fn forward_backend_to_client(
    mut backend_read: SplitStream<BackendSocket>,
    mut client_write: SplitSink<WebSocket, Message>,
    label: &str,
) -> Result<(), String> {
    while let Some(msg) = backend_read.next().await {
        let msg = msg.map_err(|e| format!("error reading from backend: {e}"))?;
        let closing = matches!(msg, TungsteniteMessage::Close(_));

        let Some(msg) = to_client(msg) else {
            continue;
        };
        client_write
            .send(msg)
            .await
            .map_err(|e| format!("failed to send to client: {e}"))?;

        if closing {
            tracing::debug!(backend = %label, "Backend closed connection");
            break;
        }
    }
    Ok(())
}

fn to_backend(msg: Message) -> TungsteniteMessage {
    match msg {
        Message::Text(text) => TungsteniteMessage::Text(text.as_str().to_owned().into()),
        Message::Binary(data) => TungsteniteMessage::Binary(data),
        Message::Ping(data) => TungsteniteMessage::Ping(data),
        Message::Pong(data) => TungsteniteMessage::Pong(data),
        Message::Close(frame) => TungsteniteMessage::Close(frame.map(|f| TungsteniteCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

fn to_client(msg: TungsteniteMessage) -> Option<Message> {
    let msg = match msg {
        TungsteniteMessage::Text(text) => Message::Text(text.as_str().to_owned().into()),
        TungsteniteMessage::Binary(data) => Message::Binary(data),
        TungsteniteMessage::Ping(data) => Message::Ping(data),
        TungsteniteMessage::Pong(data) => Message::Pong(data),
        TungsteniteMessage::Close(frame) => Message::Close(frame.map(|f| CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
        TungsteniteMessage::Frame(_) => return None,
    };
    Some(msg)
}
