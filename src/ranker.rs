//! Relevance ordering of candidate links.
//!
//! [`LinkRanker`] embeds the goal title and every candidate link title
//! (through the response cache, so each distinct title is embedded once per
//! run), scores candidates by cosine similarity to the goal, and orders
//! them most-relevant first with ties broken by original page order.
//!
//! How aggressively the frontier narrows as the search deepens is a tunable
//! [`DepthPolicy`], not a fixed law.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::embeddings::{EmbeddingProvider, cosine_similarity};
use crate::stores::CacheStore;
use crate::types::PathError;

/// Depth-dependent tuning of the ranking heuristic.
pub trait DepthPolicy: Send + Sync {
    /// Adjusts a raw similarity score for the current depth. The default
    /// leaves scores untouched.
    fn adjust(&self, similarity: f32, _depth: usize) -> f32 {
        similarity
    }

    /// Number of ranked links admitted to the frontier when expanding a node
    /// at `depth`, given `candidates` ranked links and the configured
    /// fan-out limit.
    fn admit(&self, fan_out: usize, candidates: usize, depth: usize, max_depth: usize) -> usize;
}

/// Default policy: broad near the start, narrow near the depth limit.
///
/// The admitted count tapers linearly with remaining depth, never below
/// `floor`, and is always clamped by the configured fan-out limit.
#[derive(Clone, Debug)]
pub struct TaperedFanOut {
    /// Minimum number of links admitted while any depth remains.
    pub floor: usize,
}

impl Default for TaperedFanOut {
    fn default() -> Self {
        Self { floor: 5 }
    }
}

impl DepthPolicy for TaperedFanOut {
    fn admit(&self, fan_out: usize, candidates: usize, depth: usize, max_depth: usize) -> usize {
        let remaining = max_depth.saturating_sub(depth);
        let tapered = candidates * remaining / max_depth.max(1);
        tapered.max(self.floor).min(fan_out).min(candidates)
    }
}

/// Admits a fixed number of links at every depth.
#[derive(Clone, Debug, Default)]
pub struct UniformFanOut;

impl DepthPolicy for UniformFanOut {
    fn admit(&self, fan_out: usize, candidates: usize, _depth: usize, _max_depth: usize) -> usize {
        fan_out.min(candidates)
    }
}

/// Orders candidate links by estimated relevance to the goal.
pub struct LinkRanker {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<ResponseCache>,
    policy: Arc<dyn DepthPolicy>,
    ann: Option<Arc<dyn CacheStore>>,
    ann_threshold: usize,
}

impl LinkRanker {
    /// Creates a ranker with the default [`TaperedFanOut`] policy.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<ResponseCache>) -> Self {
        Self {
            provider,
            cache,
            policy: Arc::new(TaperedFanOut::default()),
            ann: None,
            ann_threshold: 256,
        }
    }

    /// Swaps in a different depth policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn DepthPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Enables accelerated top-K selection through a store's vector index
    /// for candidate sets of at least `threshold` links. Results may be
    /// approximate; ordering fidelity is traded for speed.
    #[must_use]
    pub fn with_ann(mut self, store: Arc<dyn CacheStore>, threshold: usize) -> Self {
        self.ann = Some(store);
        self.ann_threshold = threshold;
        self
    }

    /// Orders `links` most-relevant-to-`goal` first.
    ///
    /// The result is a permutation of the input: nothing added, nothing
    /// dropped. Deterministic for fixed embeddings and depth; equal scores
    /// keep their original relative order.
    pub async fn rank(
        &self,
        links: &[String],
        goal: &str,
        depth: usize,
    ) -> Result<Vec<String>, PathError> {
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let scores = self.score(links, goal, depth).await?;

        let mut order: Vec<usize> = (0..links.len()).collect();
        order.sort_by(|a, b| {
            scores[*b]
                .partial_cmp(&scores[*a])
                .unwrap_or(Ordering::Equal)
        });
        Ok(order.into_iter().map(|i| links[i].clone()).collect())
    }

    /// Ranks `links` and keeps only what the depth policy admits.
    ///
    /// Large candidate sets go through the store's vector index when one is
    /// configured; otherwise this is `rank` truncated.
    pub async fn top_k(
        &self,
        links: &[String],
        goal: &str,
        depth: usize,
        max_depth: usize,
        fan_out: usize,
    ) -> Result<Vec<String>, PathError> {
        let admit = self.policy.admit(fan_out, links.len(), depth, max_depth);
        if admit == 0 || links.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(store) = &self.ann {
            if links.len() >= self.ann_threshold {
                // get_or_embed_batch writes through to the store, so every
                // candidate has a stored vector before the index is queried.
                self.cache
                    .get_or_embed_batch(links, self.provider.as_ref())
                    .await?;
                let goal_vector = self.cache.get_or_embed(goal, self.provider.as_ref()).await?;
                match store.nearest(&goal_vector, links, admit).await {
                    Ok(nearest) => return Ok(nearest),
                    Err(err) => {
                        tracing::warn!(error = %err, "vector index query failed, ranking exhaustively");
                    }
                }
            }
        }

        let mut ranked = self.rank(links, goal, depth).await?;
        ranked.truncate(admit);
        Ok(ranked)
    }

    async fn score(
        &self,
        links: &[String],
        goal: &str,
        depth: usize,
    ) -> Result<Vec<f32>, PathError> {
        let goal_vector = self.cache.get_or_embed(goal, self.provider.as_ref()).await?;
        let link_vectors = self
            .cache
            .get_or_embed_batch(links, self.provider.as_ref())
            .await?;
        Ok(link_vectors
            .iter()
            .map(|vector| {
                let similarity = cosine_similarity(&goal_vector, vector);
                self.policy.adjust(similarity, depth)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Maps known titles to fixed vectors; unknown titles share one vector.
    struct StubProvider {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl StubProvider {
        fn new(entries: &[(&str, [f32; 3])]) -> Self {
            Self {
                vectors: entries
                    .iter()
                    .map(|(title, vector)| (title.to_string(), vector.to_vec()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PathError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    self.vectors
                        .get(text)
                        .cloned()
                        .unwrap_or_else(|| vec![0.0, 0.0, 1.0])
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn ranker(entries: &[(&str, [f32; 3])]) -> LinkRanker {
        LinkRanker::new(
            Arc::new(StubProvider::new(entries)),
            Arc::new(ResponseCache::new()),
        )
    }

    #[tokio::test]
    async fn rank_is_a_permutation_most_relevant_first() {
        let ranker = ranker(&[
            ("Goal", [1.0, 0.0, 0.0]),
            ("Close", [0.9, 0.1, 0.0]),
            ("Middling", [0.5, 0.5, 0.0]),
            ("Far", [0.0, 1.0, 0.0]),
        ]);

        let links = vec![
            "Far".to_string(),
            "Close".to_string(),
            "Middling".to_string(),
        ];
        let ranked = ranker.rank(&links, "Goal", 0).await.unwrap();

        assert_eq!(ranked, vec!["Close", "Middling", "Far"]);
        let mut sorted_input = links.clone();
        let mut sorted_output = ranked.clone();
        sorted_input.sort();
        sorted_output.sort();
        assert_eq!(sorted_input, sorted_output);
    }

    #[tokio::test]
    async fn rank_is_deterministic() {
        let ranker = ranker(&[
            ("Goal", [1.0, 0.0, 0.0]),
            ("A", [0.7, 0.3, 0.0]),
            ("B", [0.3, 0.7, 0.0]),
        ]);
        let links = vec!["B".to_string(), "A".to_string()];

        let first = ranker.rank(&links, "Goal", 1).await.unwrap();
        let second = ranker.rank(&links, "Goal", 1).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ties_keep_original_link_order() {
        // All unknown titles share one stub vector, so every score ties.
        let ranker = ranker(&[("Goal", [1.0, 0.0, 0.0])]);
        let links = vec!["Zeta".to_string(), "Alpha".to_string(), "Mu".to_string()];

        let ranked = ranker.rank(&links, "Goal", 0).await.unwrap();
        assert_eq!(ranked, links);
    }

    #[tokio::test]
    async fn top_k_respects_fan_out() {
        let ranker = ranker(&[
            ("Goal", [1.0, 0.0, 0.0]),
            ("First", [0.9, 0.0, 0.0]),
            ("Second", [0.8, 0.0, 0.0]),
            ("Third", [0.1, 0.9, 0.0]),
        ])
        .with_policy(Arc::new(UniformFanOut));

        let links = vec![
            "Third".to_string(),
            "Second".to_string(),
            "First".to_string(),
        ];
        let kept = ranker.top_k(&links, "Goal", 0, 3, 2).await.unwrap();
        assert_eq!(kept, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn top_k_through_vector_index_matches_exhaustive_order() {
        let store: Arc<dyn CacheStore> = Arc::new(
            crate::stores::SqliteCacheStore::open_in_memory()
                .await
                .unwrap(),
        );
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(StubProvider::new(&[
            ("Goal", [1.0, 0.0, 0.0]),
            ("First", [0.9, 0.1, 0.0]),
            ("Second", [0.5, 0.5, 0.0]),
            ("Third", [0.0, 1.0, 0.0]),
        ]));
        let cache = Arc::new(ResponseCache::with_store(Arc::clone(&store)));
        let ranker = LinkRanker::new(provider, cache)
            .with_policy(Arc::new(UniformFanOut))
            .with_ann(store, 1);

        let links = vec![
            "Third".to_string(),
            "Second".to_string(),
            "First".to_string(),
        ];
        let kept = ranker.top_k(&links, "Goal", 0, 3, 2).await.unwrap();
        assert_eq!(kept, vec!["First", "Second"]);
    }

    #[test]
    fn tapered_policy_narrows_with_depth() {
        let policy = TaperedFanOut { floor: 2 };

        // 100 candidates, depth budget 4, fan-out limit 10.
        assert_eq!(policy.admit(10, 100, 0, 4), 10);
        assert_eq!(policy.admit(10, 100, 3, 4), 10);
        assert_eq!(policy.admit(100, 100, 3, 4), 25);
        assert_eq!(policy.admit(100, 100, 4, 4), 2);
        assert_eq!(policy.admit(100, 1, 0, 4), 1);
    }
}
