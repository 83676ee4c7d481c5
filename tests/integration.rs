//! End-to-end tests of the assembled gateway router.
//!
//! The network-backed tests at the bottom are marked with `#[ignore]` because
//! they hit the live search provider and may be slow or flaky.
//!
//! Run them with: `cargo test --test integration -- --ignored`

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tempfile::TempDir;
use tower::ServiceExt;

use a3s_gateway::config::{AuthConfig, GatewayConfig};
use a3s_gateway::dispatch::Dispatcher;
use a3s_gateway::engines::DuckDuckGo;
use a3s_gateway::gate::AccessGate;
use a3s_gateway::routes::{app_router, AppState, ErrorPages, SEARCH_ERROR_BODY};
use a3s_gateway::{
    Engine, EvictionPolicy, GatewayError, HttpFetcher, PageFetcher, Result, ResultCache,
    SearchPipeline, SearchQuery, Tunnel,
};

const CATS_PAGE: &str = r#"
<html><body>
  <div class="result">
    <a class="result__a" href="https://en.wikipedia.org/wiki/Cat">Cats - Wikipedia</a>
    <a class="result__snippet">The cat is a small carnivorous mammal.</a>
  </div>
  <div class="result">
    <a class="result__a" href="https://www.catster.com/">Catster</a>
    <div class="result__snippet">Cat news &amp; advice.</div>
  </div>
</body></html>
"#;

/// Returns a canned page for any URL and counts calls.
struct CannedFetcher {
    page: Option<&'static str>,
    calls: AtomicUsize,
}

impl CannedFetcher {
    fn serving(page: &'static str) -> Arc<Self> {
        Arc::new(Self {
            page: Some(page),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            page: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.page {
            Some(page) => Ok(page.to_string()),
            None => Err(GatewayError::UpstreamStatus {
                status: 503,
                url: url.to_string(),
            }),
        }
    }
}

/// Claims `/fq/` and answers with a fixed marker.
#[derive(Default)]
struct MarkerTunnel {
    handled: AtomicUsize,
}

#[async_trait]
impl Tunnel for MarkerTunnel {
    fn should_handle(&self, request: &Request) -> bool {
        request.uri().path().starts_with("/fq/")
    }

    async fn handle(&self, _request: Request) -> Response {
        self.handled.fetch_add(1, Ordering::SeqCst);
        (StatusCode::OK, "tunnel").into_response()
    }
}

struct Harness {
    router: Router,
    fetcher: Arc<CannedFetcher>,
    tunnel: Arc<MarkerTunnel>,
    cache: Arc<ResultCache>,
    _static_dir: TempDir,
}

fn static_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
    std::fs::write(dir.path().join("tos.html"), "<h1>terms</h1>").unwrap();
    std::fs::write(dir.path().join("privacy.html"), "<h1>privacy</h1>").unwrap();
    std::fs::write(dir.path().join("404.html"), "<h1>not found</h1>").unwrap();
    dir
}

fn harness(fetcher: Arc<CannedFetcher>, auth: AuthConfig) -> Harness {
    harness_with_cache(fetcher, auth, Arc::new(ResultCache::new(EvictionPolicy::Unbounded)))
}

fn harness_with_cache(
    fetcher: Arc<CannedFetcher>,
    auth: AuthConfig,
    cache: Arc<ResultCache>,
) -> Harness {
    let dir = static_dir();
    let pipeline = SearchPipeline::new(
        Arc::new(DuckDuckGo::new()),
        Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        Arc::clone(&cache),
    );
    let state = AppState {
        pipeline: Arc::new(pipeline),
        static_dir: dir.path().to_path_buf(),
        pages: Arc::new(ErrorPages::load(dir.path())),
    };
    let app = app_router(state, Arc::new(AccessGate::new(&auth)));
    let tunnel = Arc::new(MarkerTunnel::default());
    let router = Dispatcher::new(Arc::clone(&tunnel) as Arc<dyn Tunnel>, app).into_router();

    Harness {
        router,
        fetcher,
        tunnel,
        cache,
        _static_dir: dir,
    }
}

fn gated(users: &[(&str, &str)]) -> AuthConfig {
    AuthConfig {
        challenge: true,
        realm: None,
        users: users
            .iter()
            .map(|(u, s)| (u.to_string(), s.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

struct Reply {
    status: StatusCode,
    content_type: Option<String>,
    www_authenticate: Option<String>,
    body: String,
}

async fn send(router: &Router, uri: &str, credentials: Option<(&str, &str)>) -> Reply {
    let mut builder = axum::http::Request::builder().uri(uri);
    if let Some((user, secret)) = credentials {
        let token = STANDARD.encode(format!("{}:{}", user, secret));
        builder = builder.header(AUTHORIZATION, format!("Basic {}", token));
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let header = |name: axum::http::HeaderName| {
        response
            .headers()
            .get(name)
            .map(|v| v.to_str().unwrap().to_string())
    };
    let status = response.status();
    let content_type = header(CONTENT_TYPE);
    let www_authenticate = header(WWW_AUTHENTICATE);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    Reply {
        status,
        content_type,
        www_authenticate,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

#[tokio::test]
async fn test_search_renders_results() {
    let h = harness(CannedFetcher::serving(CATS_PAGE), AuthConfig::default());
    let reply = send(&h.router, "/search/cats", None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type.as_deref(), Some("text/html"));
    assert!(reply.body.contains("Search Results for \"cats\""));
    assert!(reply
        .body
        .contains("<li><a href=\"https://en.wikipedia.org/wiki/Cat\">Cats - Wikipedia</a>"));
    assert!(reply.body.contains("<p>The cat is a small carnivorous mammal.</p>"));
    let first = reply.body.find("Cats - Wikipedia").unwrap();
    let second = reply.body.find("Catster").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_second_search_served_from_cache() {
    let h = harness(CannedFetcher::serving(CATS_PAGE), AuthConfig::default());
    let first = send(&h.router, "/search/cats", None).await;
    let second = send(&h.router, "/search/cats", None).await;

    assert_eq!(first.body, second.body);
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.cache.len(), 1);
}

#[tokio::test]
async fn test_empty_results_match_unmatched_route() {
    let h = harness(
        CannedFetcher::serving("<html><body>Nothing here</body></html>"),
        AuthConfig::default(),
    );
    let search = send(&h.router, "/search/xqzzjv", None).await;
    let unmatched = send(&h.router, "/no/such/route", None).await;

    assert_eq!(search.status, StatusCode::NOT_FOUND);
    assert_eq!(search.status, unmatched.status);
    assert_eq!(search.content_type, unmatched.content_type);
    assert_eq!(search.body, unmatched.body);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_upstream_failure_is_generic_500() {
    let h = harness(CannedFetcher::failing(), AuthConfig::default());
    let reply = send(&h.router, "/search/cats", None).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, SEARCH_ERROR_BODY);
    assert!(!reply.body.contains("503"));
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_not_found_and_server_error_are_distinct() {
    let h = harness(CannedFetcher::failing(), AuthConfig::default());
    let missing = send(&h.router, "/missing", None).await;
    let failed = send(&h.router, "/search/cats", None).await;

    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(missing.body, failed.body);
}

#[tokio::test]
async fn test_static_pages() {
    let h = harness(CannedFetcher::failing(), AuthConfig::default());
    for (uri, expected) in [
        ("/", "<h1>index</h1>"),
        ("/tos", "<h1>terms</h1>"),
        ("/privacy", "<h1>privacy</h1>"),
    ] {
        let reply = send(&h.router, uri, None).await;
        assert_eq!(reply.status, StatusCode::OK, "{}", uri);
        assert_eq!(reply.body, expected);
    }
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_gate_with_empty_table_rejects_everything() {
    let cache = Arc::new(ResultCache::new(EvictionPolicy::Unbounded));
    cache.put(SearchQuery::new("cats").key(), "cached body", "text/html");
    let h = harness_with_cache(CannedFetcher::serving(CATS_PAGE), gated(&[]), cache);

    for uri in ["/", "/tos", "/privacy", "/search/cats", "/anything"] {
        let reply = send(&h.router, uri, Some(("admin", "admin"))).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(reply.www_authenticate.as_deref(), Some("Basic"));
        assert!(!reply.body.contains("cached body"));
    }
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_gate_challenges_preflight_requests() {
    let h = harness(CannedFetcher::serving(CATS_PAGE), gated(&[]));

    for uri in ["/", "/search/cats", "/nope"] {
        let request = axum::http::Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .header("origin", "https://other.example")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic");
        assert!(response
            .headers()
            .get("access-control-allow-credentials")
            .is_none());
    }

    for uri in ["/", "/nope"] {
        let request = axum::http::Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_preflight_allowed_with_credentials() {
    let h = harness(CannedFetcher::serving(CATS_PAGE), gated(&[("alice", "s3cret")]));
    let token = STANDARD.encode("alice:s3cret");
    let request = axum::http::Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header("origin", "https://client.example")
        .header("access-control-request-method", "GET")
        .header(AUTHORIZATION, format!("Basic {}", token))
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://client.example"
    );
}

#[tokio::test]
async fn test_gate_accepts_listed_user() {
    let h = harness(CannedFetcher::serving(CATS_PAGE), gated(&[("alice", "s3cret")]));

    let denied = send(&h.router, "/search/cats", Some(("alice", "wrong"))).await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.fetcher.calls(), 0);

    let allowed = send(&h.router, "/search/cats", Some(("alice", "s3cret"))).await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_tunnel_bypasses_gate_and_routes() {
    let h = harness(CannedFetcher::serving(CATS_PAGE), gated(&[]));

    let reply = send(&h.router, "/fq/v1/", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "tunnel");
    assert_eq!(h.tunnel.handled.load(Ordering::SeqCst), 1);

    let gated = send(&h.router, "/fq", None).await;
    assert_eq!(gated.status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.tunnel.handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tunnel_never_sees_application_paths() {
    let h = harness(CannedFetcher::serving(CATS_PAGE), AuthConfig::default());
    for uri in ["/", "/search/fq", "/tos", "/unknown"] {
        send(&h.router, uri, None).await;
    }
    assert_eq!(h.tunnel.handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rendered_output_is_escaped() {
    const HOSTILE: &str = r#"
        <a class="result__a" href="javascript:alert(1)">&lt;script&gt;x&lt;/script&gt;</a>
        <p>&lt;b&gt;bold&lt;/b&gt;</p>
    "#;
    let h = harness(CannedFetcher::serving(HOSTILE), AuthConfig::default());
    let reply = send(&h.router, "/search/%3Cscript%3E", None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(!reply.body.contains("<script>"));
    assert!(!reply.body.contains("javascript:"));
    assert!(reply.body.contains("href=\"#\""));
}

#[tokio::test]
async fn test_gateway_from_config_router() {
    let dir = static_dir();
    let config = GatewayConfig {
        static_dir: dir.path().to_path_buf(),
        ..GatewayConfig::default()
    };
    let router = a3s_gateway::Gateway::from_config(config).unwrap().router();

    let index = send(&router, "/", None).await;
    assert_eq!(index.status, StatusCode::OK);
    assert_eq!(index.body, "<h1>index</h1>");

    let tunnel = send(&router, "/fq/", None).await;
    assert_eq!(tunnel.status, StatusCode::SERVICE_UNAVAILABLE);
}

mod live {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(
            "Mozilla/5.0 (compatible; a3s-gateway/0.1)",
            Duration::from_secs(15),
        )
        .unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn test_duckduckgo_live_extract() {
        let engine = DuckDuckGo::new();
        let url = engine.search_url(&SearchQuery::new("rust programming"));
        let html = fetcher().fetch(&url).await.unwrap();
        let results = engine.extract(&html).unwrap();

        println!("DuckDuckGo returned {} results", results.len());
        for (i, result) in results.iter().take(3).enumerate() {
            println!("  {}. {} - {}", i + 1, result.title, result.link);
        }
        assert!(!results.is_empty(), "DuckDuckGo should return results");
    }

    #[tokio::test]
    #[ignore]
    async fn test_duckduckgo_live_pipeline() {
        let cache = Arc::new(ResultCache::new(EvictionPolicy::Unbounded));
        let pipeline = SearchPipeline::new(
            Arc::new(DuckDuckGo::new()),
            Arc::new(fetcher()),
            Arc::clone(&cache),
        );
        let outcome = pipeline.handle_search("rust%20language").await.unwrap();
        println!("Live pipeline outcome: {:?}", outcome);
        assert_eq!(cache.len(), 1);
    }
}
