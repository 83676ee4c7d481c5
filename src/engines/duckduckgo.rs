//! DuckDuckGo HTML results page.

use scraper::{ElementRef, Html};

use crate::engine::selector;
use crate::{Engine, EngineConfig, Result, SearchResult};

/// DuckDuckGo search engine.
///
/// Scrapes the no-JavaScript results page: every `.result__a` anchor is one
/// result, and the element right after it holds the snippet.
pub struct DuckDuckGo {
    config: EngineConfig,
}

impl DuckDuckGo {
    /// Creates a new DuckDuckGo engine.
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "DuckDuckGo".to_string(),
                shortcut: "duckduckgo".to_string(),
                endpoint: "https://duckduckgo.com/html/?q=".to_string(),
            },
        }
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for DuckDuckGo {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn extract(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        let title_selector = selector(".result__a")?;

        let results = document
            .select(&title_selector)
            .map(|anchor| {
                let title = text_of(anchor);
                let link = anchor.value().attr("href").unwrap_or_default();
                let snippet = anchor
                    .next_siblings()
                    .find_map(ElementRef::wrap)
                    .map(text_of)
                    .unwrap_or_default();

                SearchResult::new(title, link, snippet)
            })
            .collect();

        Ok(results)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
