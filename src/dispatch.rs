//! Top-level request dispatch.
//!
//! Every inbound request is first offered to the [`Tunnel`]. Claimed requests
//! never reach the application router, so neither the credential gate nor any
//! route sees them.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::tunnel::Tunnel;

/// Splits traffic between the tunnel and the application router.
#[derive(Clone)]
pub struct Dispatcher {
    tunnel: Arc<dyn Tunnel>,
    app: Router,
}

impl Dispatcher {
    pub fn new(tunnel: Arc<dyn Tunnel>, app: Router) -> Self {
        Self { tunnel, app }
    }

    /// Routes one request.
    pub async fn dispatch(&self, request: Request) -> Response {
        if self.tunnel.should_handle(&request) {
            debug!("Tunnel claimed {} {}", request.method(), request.uri());
            return self.tunnel.handle(request).await;
        }

        match self.app.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// The outermost router served by the gateway.
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(self)
            .layer(TraceLayer::new_for_http())
    }
}

async fn dispatch(State(dispatcher): State<Dispatcher>, request: Request) -> Response {
    dispatcher.dispatch(request).await
}
