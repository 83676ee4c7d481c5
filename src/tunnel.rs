//! Tunneling collaborator.
//!
//! Requests claimed by a [`Tunnel`] bypass the credential gate and every
//! application route. The gateway only decides *whether* a request belongs
//! to the tunnel; what happens next is up to the implementation.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use tracing::{debug, error};
use url::Url;

use crate::Result;

/// Largest request body forwarded to a tunnel backend.
pub const MAX_FORWARD_BODY: usize = 16 * 1024 * 1024;

/// A subsystem that owns a reserved class of requests end-to-end.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Whether this tunnel claims the request.
    fn should_handle(&self, request: &Request) -> bool;

    /// Produces the full response for a claimed request.
    async fn handle(&self, request: Request) -> Response;
}

/// Claims every request under a path prefix.
///
/// With an upstream configured, claimed requests are forwarded verbatim
/// (method, path, query, headers, body) and the backend's response is relayed.
/// Without one, claimed requests get `503 Service Unavailable`.
pub struct PrefixTunnel {
    prefix: String,
    upstream: Option<Url>,
    client: Client,
}

impl PrefixTunnel {
    /// Creates a tunnel that reserves `prefix` and has no backend.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            upstream: None,
            client: Client::new(),
        }
    }

    /// Forwards claimed requests to `upstream`.
    pub fn with_upstream(mut self, upstream: &str) -> Result<Self> {
        self.upstream = Some(Url::parse(upstream)?);
        Ok(self)
    }

    /// Uses a custom reqwest client for forwarding.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The reserved path prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn forward(&self, upstream: &Url, request: Request) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = upstream.join(path_and_query)?;
        debug!("Forwarding {} {} to {}", parts.method, parts.uri, target);

        let body = to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(|e| crate::GatewayError::Other(format!("Failed to read request body: {}", e)))?;

        let upstream_response = self
            .client
            .request(parts.method, target)
            .headers(end_to_end(&parts.headers))
            .body(body)
            .send()
            .await?;

        let status = upstream_response.status();
        let headers = end_to_end(upstream_response.headers());
        let body = upstream_response.bytes().await?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[async_trait]
impl Tunnel for PrefixTunnel {
    fn should_handle(&self, request: &Request) -> bool {
        request.uri().path().starts_with(&self.prefix)
    }

    async fn handle(&self, request: Request) -> Response {
        let Some(upstream) = &self.upstream else {
            return (StatusCode::SERVICE_UNAVAILABLE, "Tunnel backend not configured").into_response();
        };

        match self.forward(upstream, request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Tunnel forwarding failed: {}", e);
                (StatusCode::BAD_GATEWAY, "Tunnel backend unavailable").into_response()
            }
        }
    }
}

/// Copies headers, dropping hop-by-hop ones and `Host`.
fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    const HOP_BY_HOP: [HeaderName; 8] = [
        header::CONNECTION,
        header::HOST,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ];

    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(name) && name.as_str() != "keep-alive")
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
