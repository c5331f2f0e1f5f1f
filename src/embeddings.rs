//! Embedding providers and vector similarity.
//!
//! The [`EmbeddingProvider`] trait is the seam between the search heuristic
//! and whatever model produces the vectors. Two implementations ship here:
//!
//! * [`RigEmbeddingProvider`] wraps any [`rig::embeddings::EmbeddingModel`],
//!   so hosted or local models plug in without touching the search code.
//! * [`MockEmbeddingProvider`] produces deterministic hash-derived vectors
//!   for hermetic tests and offline runs.
//!
//! Hardware placement (GPU vs CPU) is a provider concern; the trait only
//! promises text in, fixed-length vectors out.

use async_trait::async_trait;
use rig::embeddings::EmbeddingModel;

use crate::types::PathError;

/// Converts batches of text into fixed-length vectors.
///
/// Implementations must be deterministic for a fixed model: the same input
/// always yields the same vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds every input, returning one vector per input in order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PathError>;

    /// Length of the vectors this provider produces.
    fn dimensions(&self) -> usize;
}

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Zero-magnitude vectors score 0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Adapter exposing any rig embedding model as an [`EmbeddingProvider`].
#[derive(Clone)]
pub struct RigEmbeddingProvider<M> {
    model: M,
}

impl<M> RigEmbeddingProvider<M>
where
    M: EmbeddingModel,
{
    /// Wraps an already-constructed rig model.
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M> EmbeddingProvider for RigEmbeddingProvider<M>
where
    M: EmbeddingModel + Send + Sync,
{
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PathError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let embedded = self
            .model
            .embed_texts(inputs.to_vec())
            .await
            .map_err(|err| PathError::Embedding(err.to_string()))?;
        Ok(embedded
            .into_iter()
            .map(|embedding| embedding.vec.into_iter().map(|value| value as f32).collect())
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.model.ndims()
    }
}

/// Deterministic provider for tests and offline runs.
///
/// Vectors are derived from a hash of the input text and L2-normalized, so
/// identical inputs always match exactly and distinct inputs are unrelated.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    /// Creates a provider emitting 16-dimensional vectors.
    pub fn new() -> Self {
        Self { dimensions: 16 }
    }

    /// Overrides the vector length.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vector = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = splitmix64(state);
            let unit = (state >> 11) as f32 / (1u64 << 53) as f32;
            vector.push(unit * 2.0 - 1.0);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PathError> {
        Ok(inputs.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
