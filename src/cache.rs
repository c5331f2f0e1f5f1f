//! Memoization of fetched articles and computed embeddings.
//!
//! [`ResponseCache`] guarantees at most one underlying fetch or embedding
//! computation per distinct key for its lifetime. The per-map mutex is held
//! across the underlying call, so the guarantee survives a concurrent
//! driver even though the search itself runs single-threaded.
//!
//! An optional [`CacheStore`] backend makes entries outlive the process.
//! Store failures degrade to cache misses; they never abort a search.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::embeddings::EmbeddingProvider;
use crate::stores::CacheStore;
use crate::types::{Article, PathError};

/// Process-lifetime cache for articles and embeddings.
#[derive(Default)]
pub struct ResponseCache {
    articles: Mutex<HashMap<String, Arc<Article>>>,
    embeddings: Mutex<HashMap<String, Arc<Vec<f32>>>>,
    store: Option<Arc<dyn CacheStore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Creates an in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that writes through to a persistent store.
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    /// Keys served without invoking the underlying fetch or embed.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Keys that required an underlying fetch or embed.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the cached article for `title`, fetching it via `fetch` on
    /// first use. `fetch` runs at most once per title.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        title: &str,
        fetch: F,
    ) -> Result<Arc<Article>, PathError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Article, PathError>>,
    {
        let mut guard = self.articles.lock().await;
        if let Some(article) = guard.get(title) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(article));
        }

        if let Some(store) = &self.store {
            match store.load_article(title).await {
                Ok(Some(article)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    let article = Arc::new(article);
                    guard.insert(title.to_string(), Arc::clone(&article));
                    return Ok(article);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(title, error = %err, "cache store read failed"),
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let article = Arc::new(fetch().await?);
        guard.insert(title.to_string(), Arc::clone(&article));
        if let Some(store) = &self.store {
            if let Err(err) = store.store_article(title, &article).await {
                tracing::warn!(title, error = %err, "cache store write failed");
            }
        }
        Ok(article)
    }

    /// Returns the cached embedding for `text`, computing it through
    /// `provider` on first use.
    pub async fn get_or_embed(
        &self,
        text: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Arc<Vec<f32>>, PathError> {
        let key = [text.to_string()];
        let mut vectors = self.get_or_embed_batch(&key, provider).await?;
        Ok(vectors.remove(0))
    }

    /// Batch form of [`get_or_embed`](Self::get_or_embed): embeds only the
    /// texts not already cached, in one provider call, and returns vectors
    /// in input order.
    pub async fn get_or_embed_batch(
        &self,
        texts: &[String],
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<Arc<Vec<f32>>>, PathError> {
        let mut guard = self.embeddings.lock().await;

        let mut missing: Vec<String> = Vec::new();
        for text in texts {
            if guard.contains_key(text) || missing.contains(text) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if let Some(store) = &self.store {
                match store.load_embedding(text).await {
                    Ok(Some(vector)) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        guard.insert(text.clone(), Arc::new(vector));
                        continue;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(text = %text, error = %err, "cache store read failed")
                    }
                }
            }
            missing.push(text.clone());
        }

        if !missing.is_empty() {
            self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);
            let vectors = provider.embed_batch(&missing).await?;
            if vectors.len() != missing.len() {
                return Err(PathError::Embedding(format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    missing.len()
                )));
            }
            for (text, vector) in missing.into_iter().zip(vectors) {
                if let Some(store) = &self.store {
                    if let Err(err) = store.store_embedding(&text, &vector).await {
                        tracing::warn!(text = %text, error = %err, "cache store write failed");
                    }
                }
                guard.insert(text, Arc::new(vector));
            }
        }

        texts
            .iter()
            .map(|text| {
                guard
                    .get(text)
                    .cloned()
                    .ok_or_else(|| PathError::Embedding(format!("no vector cached for '{text}'")))
            })
            .collect()
    }
}
