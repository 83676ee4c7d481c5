//! Application routes: static pages, search, and error pages.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, warn};

use crate::gate::{require_credentials, AccessGate};
use crate::pipeline::{SearchOutcome, SearchPipeline};
use crate::query::SEARCH_PREFIX;
use crate::GatewayError;

const HTML_UTF8: &str = "text/html; charset=utf-8";

/// Body sent when a search fails upstream.
pub const SEARCH_ERROR_BODY: &str = "Error fetching search results.";

const DEFAULT_NOT_FOUND: &str =
    "<html><head><title>Not Found</title></head><body><h1>404 Not Found</h1></body></html>";

/// Exact-path static pages and the file serving each.
pub const STATIC_ROUTES: &[(&str, &str)] = &[
    ("/", "index.html"),
    ("/tos", "tos.html"),
    ("/privacy", "privacy.html"),
];

/// Bodies of the not-found and server-error pages.
///
/// Loaded once at startup. `500.html` is optional and defaults to the
/// not-found page.
#[derive(Debug, Clone)]
pub struct ErrorPages {
    not_found: Bytes,
    server_error: Bytes,
}

impl ErrorPages {
    /// Uses the given bodies.
    pub fn new(not_found: impl Into<Bytes>, server_error: impl Into<Bytes>) -> Self {
        Self {
            not_found: not_found.into(),
            server_error: server_error.into(),
        }
    }

    /// Reads `404.html` and `500.html` from `dir`, falling back to a built-in
    /// page when `404.html` is missing.
    pub fn load(dir: &Path) -> Self {
        let not_found = match std::fs::read(dir.join("404.html")) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                warn!("No 404.html in {} ({}), using built-in page", dir.display(), e);
                Bytes::from_static(DEFAULT_NOT_FOUND.as_bytes())
            }
        };
        let server_error = std::fs::read(dir.join("500.html"))
            .map(Bytes::from)
            .unwrap_or_else(|_| not_found.clone());

        Self {
            not_found,
            server_error,
        }
    }

    /// 404 response.
    pub fn not_found(&self) -> Response {
        html(StatusCode::NOT_FOUND, self.not_found.clone())
    }

    /// 500 response.
    pub fn server_error(&self) -> Response {
        html(StatusCode::INTERNAL_SERVER_ERROR, self.server_error.clone())
    }
}

impl Default for ErrorPages {
    fn default() -> Self {
        Self::new(DEFAULT_NOT_FOUND, DEFAULT_NOT_FOUND)
    }
}

/// Shared state of application handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SearchPipeline>,
    pub static_dir: PathBuf,
    pub pages: Arc<ErrorPages>,
}

/// Failure inside a handler that the client only sees as a generic 500.
#[derive(Debug)]
pub struct AppError(GatewayError);

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self(GatewayError::Io(err))
    }
}

/// Marks a response whose body should be replaced by the server-error page.
#[derive(Debug, Clone, Copy)]
struct Unhandled;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Unhandled application error: {}", self.0);
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(Unhandled);
        response
    }
}

/// Builds the application router: credential gate, static pages, search,
/// and the not-found fallback, wrapped in panic and error-page handling.
pub fn app_router(state: AppState, gate: Arc<AccessGate>) -> Router {
    let pages = Arc::clone(&state.pages);

    let mut router = Router::new();
    for &(path, file) in STATIC_ROUTES {
        router = router.route(
            path,
            get(move |State(state): State<AppState>| serve_static(state, file)),
        );
    }

    router
        .route("/search/*query", get(search))
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(pages, error_pages))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true),
        )
        // Outermost, so CORS preflights are challenged too.
        .layer(middleware::from_fn_with_state(gate, require_credentials))
}

async fn serve_static(state: AppState, file: &'static str) -> Result<Response, AppError> {
    let body = tokio::fs::read(state.static_dir.join(file)).await?;
    Ok(html(StatusCode::OK, Bytes::from(body)))
}

async fn search(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path();
    let suffix = path.strip_prefix(SEARCH_PREFIX).unwrap_or_default();

    match state.pipeline.handle_search(suffix).await {
        Ok(SearchOutcome::Page(page)) => {
            let content_type = HeaderValue::from_str(&page.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static(HTML_UTF8));
            (StatusCode::OK, [(CONTENT_TYPE, content_type)], page.body).into_response()
        }
        Ok(SearchOutcome::NoResults) => state.pages.not_found(),
        Err(e) => {
            error!("Error fetching search results for {:?}: {}", suffix, e);
            html(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(SEARCH_ERROR_BODY.as_bytes()),
            )
        }
    }
}

async fn not_found(State(state): State<AppState>) -> Response {
    state.pages.not_found()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(Unhandled);
    response
}

/// Swaps the body of unhandled failures for the server-error page.
async fn error_pages(State(pages): State<Arc<ErrorPages>>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.extensions().get::<Unhandled>().is_some() {
        pages.server_error()
    } else {
        response
    }
}

fn html(status: StatusCode, body: Bytes) -> Response {
    (status, [(CONTENT_TYPE, HeaderValue::from_static(HTML_UTF8))], body).into_response()
}
