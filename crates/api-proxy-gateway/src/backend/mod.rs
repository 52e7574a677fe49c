//! Backend forwarding strategies.
//!
//! A [`Backend`] forwards an already authorized, path-rewritten request to one
//! fixed URL. The strategy is chosen once, when a single target is built or a
//! pool member is added, by [`BackendFactory::build`].

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use axum::response::Response;
use reqwest::Url;

use api_proxy_core::Protocol;

use crate::config::GatewayConfig;
use crate::error::{ApiError, ProxyError, Result};

mod http;
mod ws;

pub use self::http::HttpBackend;
pub use self::ws::WsBackend;

/// Forwards requests to one backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The backend base URL.
    fn url(&self) -> &Url;

    /// The protocol this backend speaks.
    fn protocol(&self) -> Protocol;

    /// Forward a request whose URI already holds the backend-relative path.
    ///
    /// # Errors
    ///
    /// Returns `BadGateway` if the backend cannot be reached and
    /// `BadRequest` if the request cannot be forwarded as is.
    async fn forward(&self, request: Request<Body>) -> std::result::Result<Response, ApiError>;
}

/// Builds backends sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct BackendFactory {
    client: reqwest::Client,
    ws_connect_timeout: Duration,
    max_body_bytes: usize,
}

impl BackendFactory {
    /// Create a factory from the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.backend_connect_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            ws_connect_timeout: config.ws_connect_timeout(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Build the backend for `protocol` at `url`.
    #[must_use]
    pub fn build(&self, protocol: Protocol, url: Url) -> Arc<dyn Backend> {
        match protocol {
            Protocol::Http => Arc::new(HttpBackend::new(
                url,
                self.client.clone(),
                self.max_body_bytes,
            )),
            Protocol::WebSocket => Arc::new(WsBackend::new(url, self.ws_connect_timeout)),
        }
    }
}

/// Parse a backend URL, requiring it to be absolute with a host.
///
/// # Errors
///
/// Returns `InvalidUrl` if the URL does not parse or has no host.
pub fn parse_backend_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| ProxyError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !url.has_host() {
        return Err(ProxyError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Join the backend base URL with a request path and query.
///
/// Paths are joined with exactly one slash between them. When both the base
/// and the request carry a query, they are concatenated with `&`.
#[must_use]
pub fn join_url(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();

    let base_path = base.path();
    let joined = match (base_path.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base_path}{}", &path[1..]),
        (false, false) => format!("{base_path}/{path}"),
        _ => format!("{base_path}{path}"),
    };
    url.set_path(&joined);

    let query = query.filter(|q| !q.is_empty());
    let merged = match (base.query().filter(|q| !q.is_empty()), query) {
        (Some(b), Some(q)) => Some(format!("{b}&{q}")),
        (Some(b), None) => Some(b.to_string()),
        (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    };
    url.set_query(merged.as_deref());

    url
}

/// Headers that apply to a single connection and must not be forwarded.
const HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub(crate) fn strip_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_HEADERS.iter()) {
        headers.remove(name);
    }
}

/// Client address chain appended by each proxy hop.
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Append `client` to `X-Forwarded-For`, joining any prior values into one.
pub(crate) fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .collect();

    let chain = if prior.is_empty() {
        client.to_string()
    } else {
        format!("{}, {client}", prior.join(", "))
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn joins_with_single_slash() {
        let joined = join_url(&url("http://b:8080/base/"), "/x/y", None);
        assert_eq!(joined.as_str(), "http://b:8080/base/x/y");

        let joined = join_url(&url("http://b:8080/base"), "x", None);
        assert_eq!(joined.as_str(), "http://b:8080/base/x");

        let joined = join_url(&url("http://b:8080"), "/x", None);
        assert_eq!(joined.as_str(), "http://b:8080/x");
    }

    #[test]
    fn merges_queries() {
        let joined = join_url(&url("http://b/?k=1"), "/x", Some("q=2"));
        assert_eq!(joined.as_str(), "http://b/x?k=1&q=2");

        let joined = join_url(&url("http://b/"), "/x", Some("q=2"));
        assert_eq!(joined.as_str(), "http://b/x?q=2");

        let joined = join_url(&url("http://b/"), "/x", Some(""));
        assert_eq!(joined.as_str(), "http://b/x");
    }

    #[test]
    fn backend_url_must_be_absolute() {
        assert!(parse_backend_url("http://catalog:8080").is_ok());
        assert!(matches!(
            parse_backend_url("catalog:8080/x"),
            Err(ProxyError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_backend_url("/relative"),
            Err(ProxyError::InvalidUrl { .. })
        ));
        assert!(parse_backend_url("::not a url").is_err());
    }

    #[test]
    fn strips_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-trace"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        strip_hop_headers(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-trace").is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(headers[header::ACCEPT], "*/*");
    }

    #[test]
    fn forwarded_for_joins_prior_hops() {
        let client: IpAddr = "203.0.113.7".parse().unwrap();

        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, client);
        assert_eq!(headers["x-forwarded-for"], "203.0.113.7");

        let mut headers = HeaderMap::new();
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        append_forwarded_for(&mut headers, client);
        assert_eq!(
            headers.get_all("x-forwarded-for").iter().count(),
            1
        );
        assert_eq!(headers["x-forwarded-for"], "10.0.0.1, 10.0.0.2, 203.0.113.7");
    }

    #[test]
    fn factory_selects_strategy() {
        let factory = BackendFactory::new(&GatewayConfig::default()).unwrap();

        let http = factory.build(Protocol::Http, url("http://b:1"));
        assert_eq!(http.protocol(), Protocol::Http);
        assert_eq!(http.url().as_str(), "http://b:1/");

        let ws = factory.build(Protocol::WebSocket, url("http://b:2"));
        assert_eq!(ws.protocol(), Protocol::WebSocket);
    }
}
