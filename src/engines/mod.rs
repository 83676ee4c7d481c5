//! Search engine implementations.

use std::sync::Arc;

use crate::Engine;

mod brave;
mod duckduckgo;

pub use brave::Brave;
pub use duckduckgo::DuckDuckGo;

/// Shortcuts accepted by [`by_shortcut`], with a short description.
pub const AVAILABLE: &[(&str, &str)] = &[
    ("duckduckgo", "DuckDuckGo HTML results (default)"),
    ("brave", "Brave Search"),
];

/// Looks up an engine by its shortcut (or a common alias).
pub fn by_shortcut(shortcut: &str) -> Option<Arc<dyn Engine>> {
    match shortcut.to_ascii_lowercase().as_str() {
        "duckduckgo" | "ddg" => Some(Arc::new(DuckDuckGo::new())),
        "brave" => Some(Arc::new(Brave::new())),
        _ => None,
    }
}
