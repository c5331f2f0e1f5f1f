//! Semantic-guided search for short hyperlink paths between Wikipedia
//! articles.
//!
//! Instead of expanding every link breadth-first, the search embeds link
//! titles with a pretrained encoder and explores the ones most similar to
//! the goal, within a hard depth bound and a fan-out limit per node.
//!
//! ```text
//! start/goal titles ──► search::PathSearch ──► SearchOutcome + telemetry
//!                            │
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!  gateway::WikipediaGateway │          ranker::LinkRanker
//!   (MediaWiki Action API)   │        (cosine + DepthPolicy)
//!          │                 │                  │
//!          └──► cache::ResponseCache ◄──────────┘
//!                        │
//!           stores::SqliteCacheStore (optional, sqlite-vec)
//!                        │
//!          embeddings::EmbeddingProvider (rig models or mock)
//! ```
//!
//! The search is a best-effort heuristic: it promises a path of at most
//! `max_depth` hops when it finds one, not the shortest path that exists.

pub mod cache;
pub mod embeddings;
pub mod gateway;
pub mod ranker;
pub mod search;
pub mod stores;
pub mod types;

pub use cache::ResponseCache;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, RigEmbeddingProvider};
pub use gateway::{ArticleGateway, WikipediaGateway};
pub use ranker::{DepthPolicy, LinkRanker, TaperedFanOut, UniformFanOut};
pub use search::{PathSearch, SearchConfig, SearchOutcome, SearchResponse, SearchTelemetry};
pub use stores::{CacheStore, SqliteCacheStore};
pub use types::{Article, PathError};
