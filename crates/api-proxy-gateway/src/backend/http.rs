//! Plain HTTP reverse proxy.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request};
use axum::response::Response;
use reqwest::Url;

use api_proxy_core::Protocol;
use http_body_util::LengthLimitError;

use super::{append_forwarded_for, join_url, strip_hop_headers, Backend};
use crate::error::ApiError;

/// Forwards requests to a backend over HTTP and streams the response back.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    url: Url,
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpBackend {
    /// Create a backend for `url` using a shared client.
    #[must_use]
    pub fn new(url: Url, client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            url,
            client,
            max_body_bytes,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn url(&self) -> &Url {
        &self.url
    }

    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn forward(&self, request: Request<Body>) -> Result<Response, ApiError> {
        let (parts, body) = request.into_parts();
        let target = join_url(&self.url, parts.uri.path(), parts.uri.query());
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| body_error(e, self.max_body_bytes))?;

        let mut headers = parts.headers;
        strip_hop_headers(&mut headers);
        headers.remove(header::HOST);
        if let Some(client) = client {
            append_forwarded_for(&mut headers, client);
        }

        let mut outbound = self
            .client
            .request(parts.method.clone(), target.clone())
            .headers(headers);
        if !body.is_empty() {
            outbound = outbound.body(body);
        }

        let upstream = outbound.send().await.map_err(|e| {
            tracing::warn!(backend = %self.url, method = %parts.method, error = %e, "Backend request failed");
            ApiError::BadGateway(format!("backend unreachable: {}", self.url))
        })?;

        tracing::debug!(
            backend = %self.url,
            method = %parts.method,
            path = %target.path(),
            status = upstream.status().as_u16(),
            "Forwarded request"
        );

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_headers(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

fn body_error(err: axum::Error, limit: usize) -> ApiError {
    match err.into_inner().downcast::<LengthLimitError>() {
        Ok(_) => ApiError::PayloadTooLarge(format!("request body exceeds {limit} bytes")),
        Err(e) => ApiError::BadRequest(format!("failed to read request body: {e}")),
    }
}
