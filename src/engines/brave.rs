//! Brave search engine implementation.

use scraper::Html;

use crate::engine::selector;
use crate::{Engine, EngineConfig, Result, SearchResult};

/// Brave search engine.
pub struct Brave {
    config: EngineConfig,
}

impl Brave {
    /// Creates a new Brave engine.
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                name: "Brave".to_string(),
                shortcut: "brave".to_string(),
                endpoint: "https://search.brave.com/search?q=".to_string(),
            },
        }
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for Brave {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Brave {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn extract(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let result_selector = selector(r#"div.snippet[data-type="web"]"#)?;
        let title_selector = selector(".search-snippet-title")?;
        let desc_selector = selector(".generic-snippet .content, .snippet-description")?;
        let url_selector = selector(r#"a[href^="http"]"#)?;

        let mut results = Vec::new();

        for element in document.select(&result_selector) {
            let title = element
                .select(&title_selector)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            let link = element
                .select(&url_selector)
                .next()
                .and_then(|e| e.value().attr("href"))
                .unwrap_or_default()
                .to_string();

            let snippet = element
                .select(&desc_selector)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            if !link.is_empty() && !title.is_empty() {
                results.push(SearchResult::new(title, link, snippet));
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchQuery;

    #[test]
    fn test_brave_new() {
        let engine = Brave::new();
        assert_eq!(engine.config.name, "Brave");
        assert_eq!(engine.config.shortcut, "brave");
    }

    #[test]
    fn test_brave_default() {
        let engine = Brave::default();
        assert_eq!(engine.name(), "Brave");
    }

    #[test]
    fn test_brave_search_url() {
        let engine = Brave::new();
        assert_eq!(
            engine.search_url(&SearchQuery::new("rust lang")),
            "https://search.brave.com/search?q=rust%20lang"
        );
    }

    #[test]
    fn test_brave_extract_empty() {
        let engine = Brave::new();
        let results = engine.extract("<html><body></body></html>").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_brave_extract_with_data() {
        let engine = Brave::new();
        let html = r#"
        <html><body>
        <div class="snippet" data-type="web">
            <a href="https://www.rust-lang.org/" class="search-snippet-title">Rust Programming Language</a>
            <div class="generic-snippet"><div class="content">A systems programming language focused on safety.</div></div>
        </div>
        <div class="snippet" data-type="web">
            <a href="https://doc.rust-lang.org/book/" class="search-snippet-title">The Rust Book</a>
            <div class="snippet-description">Official Rust programming guide.</div>
        </div>
        </body></html>
        "#;
        let results = engine.extract(html).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].link, "https://www.rust-lang.org/");
        assert_eq!(results[0].snippet, "A systems programming language focused on safety.");
        assert_eq!(results[1].title, "The Rust Book");
        assert_eq!(results[1].link, "https://doc.rust-lang.org/book/");
        assert_eq!(results[1].snippet, "Official Rust programming guide.");
    }

    #[test]
    fn test_brave_extract_skips_non_web() {
        let engine = Brave::new();
        let html = r#"
        <html><body>
        <div class="snippet" data-type="video">
            <a href="https://example.com/video" class="search-snippet-title">A Video</a>
        </div>
        <div class="snippet" data-type="web">
            <a href="https://example.com/page" class="search-snippet-title">A Page</a>
        </div>
        </body></html>
        "#;
        let results = engine.extract(html).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "A Page");
    }
}
