//! Finds a link path between two live Wikipedia articles.
//!
//! ```sh
//! cargo run --example find_path -- "Nobel Prize" "Array (data structure)"
//! ```
//!
//! Runs with the deterministic mock embedding provider so no model or API
//! key is needed. For meaningful semantic guidance, swap in a real model
//! through `RigEmbeddingProvider`, e.g. rig's OpenAI
//! `text-embedding-3-small`.

use std::env;
use std::sync::Arc;

use wikipath::{
    LinkRanker, MockEmbeddingProvider, PathSearch, ResponseCache, SearchConfig, SearchOutcome,
    WikipediaGateway, embeddings::EmbeddingProvider,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wikipath=debug".into()),
        )
        .init();

    let mut args = env::args().skip(1);
    let (Some(start), Some(goal)) = (args.next(), args.next()) else {
        eprintln!("usage: find_path <start title> <goal title>");
        std::process::exit(2);
    };

    let gateway = Arc::new(WikipediaGateway::new()?);
    let cache = Arc::new(ResponseCache::new());
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new());
    let ranker = LinkRanker::new(provider, Arc::clone(&cache));
    let search = PathSearch::new(gateway, ranker, cache, SearchConfig::default());

    let response = search.run(&start, &goal).await?;
    match response.outcome {
        SearchOutcome::Found { path, steps } => {
            println!("path ({steps} steps): {}", path.join(" -> "));
        }
        SearchOutcome::ExhaustedNoPath => {
            println!("no path found within the depth budget");
        }
    }
    println!(
        "expanded {} nodes, {} cache hits / {} misses, {} ms",
        response.telemetry.expanded_nodes,
        response.telemetry.cache_hits,
        response.telemetry.cache_misses,
        response.telemetry.duration_ms
    );
    Ok(())
}
