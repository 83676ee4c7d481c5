//! Search pipeline: cache lookup, fetch, extract, render, store.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::cache::CacheEntry;
use crate::inflight::InflightLocks;
use crate::render::{HtmlRenderer, Renderer};
use crate::{Engine, PageFetcher, ResultCache, Result, SearchQuery};

/// A page ready to be sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Response body.
    pub body: Bytes,
    /// Declared content type of `body`.
    pub content_type: String,
    /// Whether the page was served from the cache.
    pub cached: bool,
}

impl SearchPage {
    fn from_cache(entry: CacheEntry) -> Self {
        Self {
            body: entry.body,
            content_type: entry.content_type,
            cached: true,
        }
    }
}

/// Successful outcome of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A rendered page, fresh or cached.
    Page(SearchPage),
    /// The provider returned no recognizable results.
    NoResults,
}

/// Orchestrates a single search request.
///
/// Only complete, non-empty renderings are cached. A failed fetch leaves the
/// cache untouched.
pub struct SearchPipeline {
    engine: Arc<dyn Engine>,
    fetcher: Arc<dyn PageFetcher>,
    renderer: Arc<dyn Renderer>,
    cache: Arc<ResultCache>,
    inflight: Option<InflightLocks>,
}

impl SearchPipeline {
    /// Creates a pipeline with the HTML renderer and no miss de-duplication.
    pub fn new(
        engine: Arc<dyn Engine>,
        fetcher: Arc<dyn PageFetcher>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            engine,
            fetcher,
            renderer: Arc::new(HtmlRenderer),
            cache,
            inflight: None,
        }
    }

    /// Replaces the renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Serializes concurrent misses for the same query so that one upstream
    /// fetch serves every waiter.
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.inflight = enabled.then(InflightLocks::new);
        self
    }

    /// Returns the cache backing this pipeline.
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Returns the engine in use.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Handles a search given the raw path suffix after `/search/`.
    pub async fn handle_search(&self, raw_suffix: &str) -> Result<SearchOutcome> {
        self.search(&SearchQuery::from_path_suffix(raw_suffix)).await
    }

    /// Handles a search for an already normalized query.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        // Whitespace-only queries are not sent upstream; they fall through to 404.
        if query.is_blank() {
            debug!("Blank query, nothing to search");
            return Ok(SearchOutcome::NoResults);
        }

        if let Some(entry) = self.cache.get(query.key()) {
            debug!("Cache hit for {:?}", query.key());
            return Ok(SearchOutcome::Page(SearchPage::from_cache(entry)));
        }

        let _guard = match &self.inflight {
            Some(locks) => {
                let guard = locks.acquire(query.key()).await;
                // Another task may have filled the cache while we waited.
                if let Some(entry) = self.cache.get(query.key()) {
                    debug!("Cache filled while waiting for {:?}", query.key());
                    return Ok(SearchOutcome::Page(SearchPage::from_cache(entry)));
                }
                Some(guard)
            }
            None => None,
        };

        self.fetch_and_store(query).await
    }

    async fn fetch_and_store(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        let url = self.engine.search_url(query);
        debug!("Cache miss for {:?}, fetching {}", query.key(), url);

        let html = self.fetcher.fetch(&url).await?;
        let results = self.engine.extract(&html)?;

        if results.is_empty() {
            debug!("{} returned no results for {:?}", self.engine.name(), query.key());
            return Ok(SearchOutcome::NoResults);
        }

        let body = Bytes::from(self.renderer.render(&query.query, &results));
        let content_type = self.renderer.content_type().to_string();
        self.cache.put(query.key(), body.clone(), content_type.clone());
        info!(
            "Cached {} results for {:?} from {}",
            results.len(),
            query.key(),
            self.engine.name()
        );

        Ok(SearchOutcome::Page(SearchPage {
            body,
            content_type,
            cached: false,
        }))
    }
}
