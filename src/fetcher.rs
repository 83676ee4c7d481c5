//! Page fetcher abstraction for retrieving upstream results pages.

use async_trait::async_trait;

use crate::Result;

/// Trait for fetching the body of a URL.
///
/// Called exactly once per cache miss; implementations must not retry.
/// Non-success upstream statuses and timeouts are errors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the body of the given URL as text.
    async fn fetch(&self, url: &str) -> Result<String>;
}
