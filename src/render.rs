//! Rendering of result records into a response body.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::SearchResult;

/// MIME type produced by [`HtmlRenderer`].
pub const TEXT_HTML: &str = "text/html";

/// Formats result records into a single response body.
///
/// Implementations must be pure: the same query and results always give the
/// same body.
pub trait Renderer: Send + Sync {
    /// Declared content type of rendered bodies.
    fn content_type(&self) -> &str;

    /// Renders `results` for `query`.
    fn render(&self, query: &str, results: &[SearchResult]) -> String;
}

/// Renders results as a plain HTML list.
///
/// Query, titles, snippets and links are escaped. Links with a scheme other
/// than http(s) are replaced by `#`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn content_type(&self) -> &str {
        TEXT_HTML
    }

    fn render(&self, query: &str, results: &[SearchResult]) -> String {
        let items: String = results.iter().map(render_item).collect();

        format!(
            "<html>\n  <head><title>Search Results</title></head>\n  <body>\n    \
             <h1>Search Results for \"{}\"</h1>\n    <ul>\n{}    </ul>\n  </body>\n</html>\n",
            encode_text(query),
            items
        )
    }
}

fn render_item(result: &SearchResult) -> String {
    let href = if result.has_safe_link() {
        encode_double_quoted_attribute(&result.link)
    } else {
        "#".into()
    };

    format!(
        "      <li><a href=\"{}\">{}</a><p>{}</p></li>\n",
        href,
        encode_text(&result.title),
        encode_text(&result.snippet)
    )
}
