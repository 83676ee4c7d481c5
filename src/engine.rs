//! Search provider trait and configuration.
//!
//! An [`Engine`] knows two things about one upstream provider: how to build
//! the results-page URL for a query, and how to pull result records out of
//! the markup it returns. Fetching is left to a
//! [`PageFetcher`](crate::PageFetcher), so engines stay synchronous and
//! testable against canned HTML.

use scraper::Selector;

use crate::{GatewayError, Result, SearchQuery, SearchResult};

/// Configuration for a search engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Display name of the engine.
    pub name: String,
    /// Short identifier (e.g., "duckduckgo").
    pub shortcut: String,
    /// Results-page URL the percent-encoded query is appended to.
    pub endpoint: String,
}

/// Trait for implementing search providers.
///
/// Extraction is inherently tied to the provider's current markup. When the
/// provider changes its HTML, `extract` returns an empty list rather than an
/// error.
pub trait Engine: Send + Sync {
    /// Returns the engine configuration.
    fn config(&self) -> &EngineConfig;

    /// Extracts result records from a results page, in document order.
    fn extract(&self, html: &str) -> Result<Vec<SearchResult>>;

    /// Builds the upstream URL for `query`.
    fn search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}{}",
            self.config().endpoint,
            urlencoding::encode(&query.query)
        )
    }

    /// Returns the engine name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Returns the engine shortcut.
    fn shortcut(&self) -> &str {
        &self.config().shortcut
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| GatewayError::Parse(format!("Failed to parse selector {:?}: {:?}", css, e)))
}
