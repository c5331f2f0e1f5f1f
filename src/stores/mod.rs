//! Persistent backends for the response cache.
//!
//! A [`CacheStore`] keeps title → (article, embedding) entries across runs
//! so repeated searches skip network and model work entirely. Backends can
//! also answer the accelerated top-K similarity query the ranker uses for
//! very large link sets.
//!
//! One implementation ships here: [`sqlite::SqliteCacheStore`], SQLite with
//! cosine distance via the `sqlite-vec` extension. Entries are never
//! invalidated; articles are treated as static.

pub mod sqlite;

use async_trait::async_trait;

use crate::types::{Article, PathError};

pub use sqlite::SqliteCacheStore;

/// Storage backend for cached articles and embeddings.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Loads the article stored under `key`, if any.
    ///
    /// `key` is the requested title, which may differ from the canonical
    /// title inside the article when the request hit a redirect.
    async fn load_article(&self, key: &str) -> Result<Option<Article>, PathError>;

    /// Persists an article under `key`.
    async fn store_article(&self, key: &str, article: &Article) -> Result<(), PathError>;

    /// Loads the embedding stored for `text`, if any.
    async fn load_embedding(&self, text: &str) -> Result<Option<Vec<f32>>, PathError>;

    /// Persists the embedding computed for `text`.
    async fn store_embedding(&self, text: &str, vector: &[f32]) -> Result<(), PathError>;

    /// Returns up to `top_k` of the given candidate texts, most similar to
    /// `query` first, considering only candidates with stored embeddings.
    async fn nearest(
        &self,
        query: &[f32],
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<String>, PathError>;
}
