//! # a3s-gateway
//!
//! A small HTTP gateway that serves a handful of static pages, proxies search
//! queries to an upstream engine, and reserves a path prefix for a tunneling
//! backend.
//!
//! - `GET /search/<query>` fetches the engine's results page, extracts
//!   title/link/snippet records, renders them as HTML, and caches the body
//!   for 30 days.
//! - Requests under the tunnel prefix (default `/fq/`) bypass everything else.
//! - All other requests may be gated behind HTTP Basic credentials.
//!
//! ## Example
//!
//! ```rust,no_run
//! use a3s_gateway::{config::GatewayConfig, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::load(None)?;
//!     Gateway::from_config(config)?.serve().await?;
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
mod fetcher;
mod fetcher_http;
mod query;
mod result;

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod engines;
pub mod gate;
pub mod inflight;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod server;
pub mod tunnel;

pub use cache::{CacheEntry, EvictionPolicy, ResultCache, CACHE_TTL};
pub use engine::{Engine, EngineConfig};
pub use error::{ConfigError, GatewayError, Result};
pub use fetcher::PageFetcher;
pub use fetcher_http::HttpFetcher;
pub use pipeline::{SearchOutcome, SearchPage, SearchPipeline};
pub use query::{SearchQuery, SEARCH_PREFIX};
pub use render::{HtmlRenderer, Renderer};
pub use result::SearchResult;
pub use server::Gateway;
pub use tunnel::{PrefixTunnel, Tunnel};
