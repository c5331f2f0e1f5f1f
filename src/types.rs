//! Shared data types and the crate-wide error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fetched article: canonical title, intro summary, and outbound links.
///
/// Links keep their on-page order with duplicates removed. An article is
/// immutable once fetched; the cache hands out shared handles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Canonical title after redirect resolution.
    pub title: String,
    /// Plain-text intro extract. Empty when the page has none.
    pub summary: String,
    /// Outbound article links, deduplicated, page order preserved.
    pub links: Vec<String>,
}

impl Article {
    /// Creates an article, deduplicating links while preserving page order.
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        links: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut seen = std::collections::HashSet::new();
        let links = links
            .into_iter()
            .filter(|link| seen.insert(link.clone()))
            .collect();
        Self {
            title: title.into(),
            summary: summary.into(),
            links,
        }
    }
}

/// Errors produced while searching for a link path.
///
/// Whether an error is fatal depends on where it occurs: failures on the
/// start or goal article abort the search, failures on any other node
/// degrade to "this node has no links".
#[derive(Debug, Error)]
pub enum PathError {
    /// The title does not resolve to an article.
    #[error("article not found: {0}")]
    NotFound(String),

    /// Network failure or timeout while talking to the article API.
    #[error("transient failure fetching '{title}': {message}")]
    Transient {
        /// Title whose fetch failed.
        title: String,
        /// Underlying failure description.
        message: String,
    },

    /// The embedding provider failed to produce vectors.
    #[error("embedding failure: {0}")]
    Embedding(String),

    /// Persistent cache store failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Filesystem failure.
    #[error("io failure: {0}")]
    Io(String),

    /// Invalid search configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for PathError {
    fn from(err: std::io::Error) -> Self {
        PathError::Io(err.to_string())
    }
}
