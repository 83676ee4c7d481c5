//! HTTP Basic credential gate for application routes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::warn;

use crate::config::AuthConfig;

/// Stateless credential check applied to every application request.
///
/// Built once from [`AuthConfig`] and never mutated.
#[derive(Debug, Clone)]
pub struct AccessGate {
    enabled: bool,
    realm: Option<String>,
    users: HashMap<String, String>,
}

/// A request that failed the credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejected {
    realm: Option<String>,
}

impl AccessGate {
    /// Creates a gate from configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            enabled: config.challenge,
            realm: config.realm.clone(),
            users: config
                .users
                .iter()
                .map(|(user, secret)| (user.clone(), secret.clone()))
                .collect(),
        }
    }

    /// A gate that lets everything through.
    pub fn disabled() -> Self {
        Self::new(&AuthConfig::default())
    }

    /// Whether credentials are required.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registered usernames, sorted.
    pub fn usernames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.users.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Checks the `Authorization` header of a request.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthRejected> {
        if !self.enabled {
            return Ok(());
        }

        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic)
            .is_some_and(|(user, secret)| self.verify(&user, &secret));

        if authorized {
            Ok(())
        } else {
            Err(AuthRejected {
                realm: self.realm.clone(),
            })
        }
    }

    fn verify(&self, user: &str, secret: &str) -> bool {
        self.users
            .get(user)
            .is_some_and(|expected| constant_time_eq(expected.as_bytes(), secret.as_bytes()))
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::disabled()
    }
}

impl IntoResponse for AuthRejected {
    fn into_response(self) -> Response {
        let challenge = match &self.realm {
            Some(realm) => format!("Basic realm=\"{}\"", realm.replace('"', "")),
            None => "Basic".to_string(),
        };
        let value = HeaderValue::from_str(&challenge)
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));

        (StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, value)]).into_response()
    }
}

/// Middleware that runs [`AccessGate::check`] before any route handler.
pub async fn require_credentials(
    State(gate): State<Arc<AccessGate>>,
    request: Request,
    next: Next,
) -> Response {
    match gate.check(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(rejected) => {
            warn!("Rejected unauthenticated request to {}", request.uri().path());
            rejected.into_response()
        }
    }
}

/// Splits a `Basic <base64(user:secret)>` header value.
fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, secret) = decoded.split_once(':')?;
    Some((user.to_string(), secret.to_string()))
}

/// Compares without stopping at the first differing byte.
fn constant_time_eq(expected: &[u8], given: &[u8]) -> bool {
    let mut diff = expected.len() ^ given.len();
    for (i, byte) in expected.iter().enumerate() {
        diff |= usize::from(byte ^ given.get(i).copied().unwrap_or(0));
    }
    diff == 0
}
