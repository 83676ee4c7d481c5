//! Search query derived from the request path.

use std::borrow::Cow;

/// Path prefix of the search route.
pub const SEARCH_PREFIX: &str = "/search/";

/// A normalized search query.
///
/// The query text doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// The search terms.
    pub query: String,
}

impl SearchQuery {
    /// Creates a new search query with the given terms.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    /// Builds a query from the raw, still percent-encoded path suffix that
    /// follows [`SEARCH_PREFIX`].
    ///
    /// The suffix is decoded once. Sequences that do not decode to UTF-8 are
    /// kept verbatim.
    pub fn from_path_suffix(raw: &str) -> Self {
        let decoded = match urlencoding::decode(raw) {
            Ok(decoded) => decoded,
            Err(_) => Cow::Borrowed(raw),
        };
        Self::new(decoded.into_owned())
    }

    /// Builds a query from a full request path such as `/search/cats`.
    ///
    /// Returns `None` when the path is outside the search route.
    pub fn from_path(path: &str) -> Option<Self> {
        path.strip_prefix(SEARCH_PREFIX).map(Self::from_path_suffix)
    }

    /// Cache key for this query.
    pub fn key(&self) -> &str {
        &self.query
    }

    /// Returns true when there is nothing to search for.
    pub fn is_blank(&self) -> bool {
        self.query.trim().is_empty()
    }
}
