//! Search result records.

/// A single result extracted from a provider's results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Result title (anchor text).
    pub title: String,
    /// Result URL as found in the anchor's `href`.
    pub link: String,
    /// Text of the block following the title anchor.
    pub snippet: String,
}

impl SearchResult {
    /// Creates a new search result.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
        }
    }

    /// Returns true when the link points at an http(s) or relative target.
    ///
    /// Protocol-relative links (`//host/path`) are accepted since DuckDuckGo
    /// emits its redirect links that way.
    pub fn has_safe_link(&self) -> bool {
        let link = self.link.trim_start();
        let lower = link.to_ascii_lowercase();
        lower.starts_with("https://") || lower.starts_with("http://") || link.starts_with('/')
    }
}
