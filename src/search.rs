//! Depth-bounded, similarity-guided frontier expansion.
//!
//! [`PathSearch`] walks the article link graph breadth-first: frontier
//! entries are processed in arrival order, so depth levels are exhausted in
//! sequence and any returned path honours the depth bound. Ranking decides
//! only which links of an expanded node enter the frontier, and the fan-out
//! limit keeps the branching factor workable. The search is best-effort; it
//! does not promise the shortest path.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::ResponseCache;
use crate::gateway::ArticleGateway;
use crate::ranker::LinkRanker;
use crate::types::{Article, PathError};

/// Tunable limits for one search.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Maximum number of hops from the start article.
    pub max_depth: usize,
    /// Fan-out limit: most links of an expanded node admitted to the
    /// frontier (the depth policy may admit fewer).
    pub fan_out: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            fan_out: 8,
        }
    }
}

impl SearchConfig {
    /// Rejects configurations the search loop cannot honour.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.max_depth == 0 {
            return Err(PathError::Config("max_depth must be at least 1".into()));
        }
        if self.fan_out == 0 {
            return Err(PathError::Config("fan_out must be at least 1".into()));
        }
        Ok(())
    }
}

/// Terminal result of a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A path was found. `steps == path.len() - 1`.
    Found {
        /// Titles from start to goal inclusive.
        path: Vec<String>,
        /// Number of hops.
        steps: usize,
    },
    /// The frontier emptied before reaching the goal within `max_depth`.
    ExhaustedNoPath,
}

/// Counters describing how much work one search performed.
#[derive(Clone, Debug, Default)]
pub struct SearchTelemetry {
    /// Nodes whose links were fetched and ranked.
    pub expanded_nodes: usize,
    /// Links admitted to the frontier across all expansions.
    pub admitted_links: usize,
    /// Cache keys served without network or model work.
    pub cache_hits: u64,
    /// Cache keys that required a fetch or embedding.
    pub cache_misses: u64,
    /// Wall-clock duration of the search.
    pub duration_ms: u64,
}

/// Outcome plus telemetry for one search run.
#[derive(Clone, Debug)]
pub struct SearchResponse {
    pub outcome: SearchOutcome,
    pub telemetry: SearchTelemetry,
}

#[derive(Debug)]
struct FrontierEntry {
    title: String,
    path: Vec<String>,
    depth: usize,
}

/// The search driver, wiring gateway, cache, and ranker together.
pub struct PathSearch {
    gateway: Arc<dyn ArticleGateway>,
    ranker: LinkRanker,
    cache: Arc<ResponseCache>,
    config: SearchConfig,
}

impl PathSearch {
    pub fn new(
        gateway: Arc<dyn ArticleGateway>,
        ranker: LinkRanker,
        cache: Arc<ResponseCache>,
        config: SearchConfig,
    ) -> Self {
        Self {
            gateway,
            ranker,
            cache,
            config,
        }
    }

    /// Searches for a link path from `start` to `goal`.
    ///
    /// Both endpoints are resolved up front, so an unknown or unreachable
    /// start or goal fails the whole search. Fetch failures on any other
    /// node are logged and treated as "no links from here".
    pub async fn run(&self, start: &str, goal: &str) -> Result<SearchResponse, PathError> {
        self.config.validate()?;
        let started = Instant::now();
        let hits_before = self.cache.hits();
        let misses_before = self.cache.misses();

        let start_article = self.fetch(start).await?;
        let goal_article = self.fetch(goal).await?;
        let start_title = start_article.title.clone();
        let goal_title = goal_article.title.clone();

        let mut telemetry = SearchTelemetry::default();
        if start_title == goal_title {
            return Ok(self.finish(
                SearchOutcome::Found {
                    path: vec![start_title],
                    steps: 0,
                },
                telemetry,
                started,
                hits_before,
                misses_before,
            ));
        }

        let mut frontier = VecDeque::new();
        frontier.push_back(FrontierEntry {
            title: start_title.clone(),
            path: vec![start_title],
            depth: 0,
        });
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(entry) = frontier.pop_front() {
            if entry.title == goal_title {
                let steps = entry.path.len() - 1;
                return Ok(self.finish(
                    SearchOutcome::Found {
                        path: entry.path,
                        steps,
                    },
                    telemetry,
                    started,
                    hits_before,
                    misses_before,
                ));
            }
            if visited.contains(&entry.title) {
                continue;
            }
            if entry.depth == self.config.max_depth {
                continue;
            }

            visited.insert(entry.title.clone());
            telemetry.expanded_nodes += 1;
            tracing::debug!(path = ?entry.path, depth = entry.depth, "expanding");

            let article = match self.fetch(&entry.title).await {
                Ok(article) => article,
                Err(err) => {
                    tracing::warn!(title = %entry.title, error = %err, "node fetch failed, treating as leaf");
                    continue;
                }
            };

            let candidates: Vec<String> = article
                .links
                .iter()
                .filter(|link| !visited.contains(*link) && !entry.path.contains(*link))
                .cloned()
                .collect();
            let admitted = self
                .ranker
                .top_k(
                    &candidates,
                    &goal_title,
                    entry.depth,
                    self.config.max_depth,
                    self.config.fan_out,
                )
                .await?;

            telemetry.admitted_links += admitted.len();
            for link in admitted {
                let mut path = entry.path.clone();
                path.push(link.clone());
                frontier.push_back(FrontierEntry {
                    title: link,
                    path,
                    depth: entry.depth + 1,
                });
            }
        }

        Ok(self.finish(
            SearchOutcome::ExhaustedNoPath,
            telemetry,
            started,
            hits_before,
            misses_before,
        ))
    }

    async fn fetch(&self, title: &str) -> Result<Arc<Article>, PathError> {
        let gateway = Arc::clone(&self.gateway);
        self.cache
            .get_or_fetch(title, || async move { gateway.fetch(title).await })
            .await
    }

    fn finish(
        &self,
        outcome: SearchOutcome,
        mut telemetry: SearchTelemetry,
        started: Instant,
        hits_before: u64,
        misses_before: u64,
    ) -> SearchResponse {
        telemetry.cache_hits = self.cache.hits() - hits_before;
        telemetry.cache_misses = self.cache.misses() - misses_before;
        telemetry.duration_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            SearchOutcome::Found { path, steps } => {
                tracing::info!(?path, steps, "path found");
            }
            SearchOutcome::ExhaustedNoPath => {
                tracing::info!(
                    expanded = telemetry.expanded_nodes,
                    "frontier exhausted, no path within depth budget"
                );
            }
        }

        SearchResponse { outcome, telemetry }
    }
}
