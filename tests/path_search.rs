//! End-to-end search behaviour over an in-memory link graph.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wikipath::{
    Article, ArticleGateway, EmbeddingProvider, LinkRanker, PathError, PathSearch, ResponseCache,
    SearchConfig, SearchOutcome, UniformFanOut,
};

/// Serves a fixed link graph. Unknown titles are missing articles; titles in
/// `failing` always fail with a transient error.
struct GraphGateway {
    graph: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl GraphGateway {
    fn new(edges: &[(&str, &[&str])]) -> Self {
        Self {
            graph: edges
                .iter()
                .map(|(title, links)| {
                    (
                        title.to_string(),
                        links.iter().map(|l| l.to_string()).collect(),
                    )
                })
                .collect(),
            failing: HashSet::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn failing(mut self, titles: &[&str]) -> Self {
        self.failing = titles.iter().map(|t| t.to_string()).collect();
        self
    }

    fn calls_for(&self, title: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(title)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ArticleGateway for GraphGateway {
    async fn fetch(&self, title: &str) -> Result<Article, PathError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default() += 1;
        if self.failing.contains(title) {
            return Err(PathError::Transient {
                title: title.to_string(),
                message: "connection reset".to_string(),
            });
        }
        match self.graph.get(title) {
            Some(links) => Ok(Article::new(title, "", links.clone())),
            None => Err(PathError::NotFound(title.to_string())),
        }
    }
}

/// Fixed vectors per title; unknown titles share one off-axis vector.
struct FixtureProvider {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixtureProvider {
    fn new(entries: &[(&str, [f32; 3])]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(title, v)| (title.to_string(), v.to_vec()))
                .collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixtureProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PathError> {
        Ok(inputs
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0, 1.0, 0.0])
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        3
    }
}

fn build_search(
    gateway: Arc<GraphGateway>,
    vectors: &[(&str, [f32; 3])],
    config: SearchConfig,
) -> PathSearch {
    let cache = Arc::new(ResponseCache::new());
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(FixtureProvider::new(vectors));
    let ranker = LinkRanker::new(provider, Arc::clone(&cache));
    PathSearch::new(gateway, ranker, cache, config)
}

const GOAL_VEC: [f32; 3] = [1.0, 0.0, 0.0];
const NEAR_VEC: [f32; 3] = [0.9, 0.1, 0.0];

#[tokio::test]
async fn start_equal_to_goal_is_a_zero_step_path() {
    let gateway = Arc::new(GraphGateway::new(&[(
        "Python (programming language)",
        &["Guido van Rossum"] as &[&str],
    )]));
    let search = build_search(Arc::clone(&gateway), &[], SearchConfig::default());

    let response = search
        .run(
            "Python (programming language)",
            "Python (programming language)",
        )
        .await
        .unwrap();

    assert_eq!(
        response.outcome,
        SearchOutcome::Found {
            path: vec!["Python (programming language)".to_string()],
            steps: 0,
        }
    );
    assert_eq!(gateway.calls_for("Python (programming language)"), 1);
}

#[tokio::test]
async fn found_path_satisfies_shape_invariants() {
    let gateway = Arc::new(GraphGateway::new(&[
        (
            "Nobel Prize",
            &["Alfred Nobel", "Computer science", "Sweden"] as &[&str],
        ),
        ("Alfred Nobel", &["Dynamite", "Stockholm"]),
        (
            "Computer science",
            &["Array (data structure)", "Algorithm"],
        ),
        ("Sweden", &["Stockholm"]),
        ("Array (data structure)", &[]),
    ]));
    let search = build_search(
        Arc::clone(&gateway),
        &[
            ("Array (data structure)", GOAL_VEC),
            ("Computer science", NEAR_VEC),
        ],
        SearchConfig {
            max_depth: 2,
            fan_out: 3,
        },
    );

    let response = search
        .run("Nobel Prize", "Array (data structure)")
        .await
        .unwrap();

    let SearchOutcome::Found { path, steps } = response.outcome else {
        panic!("expected a path");
    };
    assert_eq!(path.first().map(String::as_str), Some("Nobel Prize"));
    assert_eq!(path.last().map(String::as_str), Some("Array (data structure)"));
    assert_eq!(steps, path.len() - 1);
    assert!(path.len() <= 3, "path exceeds max_depth + 1: {path:?}");

    let unique: HashSet<&String> = path.iter().collect();
    assert_eq!(unique.len(), path.len(), "path repeats a title: {path:?}");
}

#[tokio::test]
async fn unreachable_goal_exhausts_without_error() {
    let gateway = Arc::new(GraphGateway::new(&[
        ("Start", &["Dead end"] as &[&str]),
        ("Dead end", &[]),
        ("Island", &[]),
    ]));
    let search = build_search(
        Arc::clone(&gateway),
        &[("Island", GOAL_VEC)],
        SearchConfig {
            max_depth: 2,
            fan_out: 4,
        },
    );

    let response = search.run("Start", "Island").await.unwrap();
    assert_eq!(response.outcome, SearchOutcome::ExhaustedNoPath);
}

#[tokio::test]
async fn missing_start_fails_the_search() {
    let gateway = Arc::new(GraphGateway::new(&[("Goal", &[] as &[&str])]));
    let search = build_search(Arc::clone(&gateway), &[], SearchConfig::default());

    let err = search.run("Not A Page", "Goal").await.unwrap_err();
    assert!(matches!(err, PathError::NotFound(title) if title == "Not A Page"));
}

#[tokio::test]
async fn missing_goal_fails_the_search() {
    let gateway = Arc::new(GraphGateway::new(&[("Start", &[] as &[&str])]));
    let search = build_search(Arc::clone(&gateway), &[], SearchConfig::default());

    let err = search.run("Start", "Not A Page").await.unwrap_err();
    assert!(matches!(err, PathError::NotFound(title) if title == "Not A Page"));
}

#[tokio::test]
async fn intermediate_fetch_failures_degrade_to_dead_ends() {
    let gateway = Arc::new(
        GraphGateway::new(&[
            ("Start", &["Flaky hub", "Reliable hub"] as &[&str]),
            ("Flaky hub", &["Goal"]),
            ("Reliable hub", &["Goal"]),
            ("Goal", &[]),
        ])
        .failing(&["Flaky hub"]),
    );
    let search = build_search(
        Arc::clone(&gateway),
        &[("Goal", GOAL_VEC), ("Reliable hub", NEAR_VEC)],
        SearchConfig {
            max_depth: 2,
            fan_out: 4,
        },
    );

    let response = search.run("Start", "Goal").await.unwrap();
    assert_eq!(
        response.outcome,
        SearchOutcome::Found {
            path: vec![
                "Start".to_string(),
                "Reliable hub".to_string(),
                "Goal".to_string(),
            ],
            steps: 2,
        }
    );
}

#[tokio::test]
async fn raising_max_depth_never_loses_a_result() {
    let edges: &[(&str, &[&str])] = &[
        ("Start", &["Hop one"]),
        ("Hop one", &["Hop two"]),
        ("Hop two", &["Goal"]),
        ("Goal", &[]),
    ];
    let vectors = [("Goal", GOAL_VEC)];

    let shallow = build_search(
        Arc::new(GraphGateway::new(edges)),
        &vectors,
        SearchConfig {
            max_depth: 2,
            fan_out: 4,
        },
    );
    assert_eq!(
        shallow.run("Start", "Goal").await.unwrap().outcome,
        SearchOutcome::ExhaustedNoPath
    );

    let deep = build_search(
        Arc::new(GraphGateway::new(edges)),
        &vectors,
        SearchConfig {
            max_depth: 3,
            fan_out: 4,
        },
    );
    let SearchOutcome::Found { path, steps } = deep.run("Start", "Goal").await.unwrap().outcome
    else {
        panic!("deeper search must still find the path");
    };
    assert_eq!(steps, 3);
    assert_eq!(path.len(), 4);
}

#[tokio::test]
async fn each_title_is_fetched_at_most_once() {
    // Diamond: D is reachable through both B and C but expands only once.
    let gateway = Arc::new(GraphGateway::new(&[
        ("A", &["B", "C"] as &[&str]),
        ("B", &["D"]),
        ("C", &["D"]),
        ("D", &["Goal"]),
        ("Goal", &[]),
    ]));
    let search = build_search(
        Arc::clone(&gateway),
        &[("Goal", GOAL_VEC), ("D", NEAR_VEC)],
        SearchConfig {
            max_depth: 3,
            fan_out: 4,
        },
    );

    let response = search.run("A", "Goal").await.unwrap();
    assert!(matches!(response.outcome, SearchOutcome::Found { .. }));

    for title in ["A", "B", "C", "D", "Goal"] {
        assert!(
            gateway.calls_for(title) <= 1,
            "{title} fetched {} times",
            gateway.calls_for(title)
        );
    }
}

#[tokio::test]
async fn fan_out_limit_bounds_admitted_links() {
    let hub_links: Vec<String> = (0..10).map(|i| format!("Spoke {i}")).collect();
    let mut edges: Vec<(&str, &[&str])> = Vec::new();
    let hub_refs: Vec<&str> = hub_links.iter().map(String::as_str).collect();
    edges.push(("Hub", hub_refs.as_slice()));
    let spoke_goal: &[&str] = &["Goal"];
    for spoke in &hub_refs {
        edges.push((*spoke, spoke_goal));
    }
    edges.push(("Goal", &[]));

    let cache = Arc::new(ResponseCache::new());
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::new(FixtureProvider::new(&[("Goal", GOAL_VEC)]));
    let ranker =
        LinkRanker::new(provider, Arc::clone(&cache)).with_policy(Arc::new(UniformFanOut));
    let gateway = Arc::new(GraphGateway::new(&edges));
    let search = PathSearch::new(
        Arc::clone(&gateway) as Arc<dyn ArticleGateway>,
        ranker,
        cache,
        SearchConfig {
            max_depth: 2,
            fan_out: 2,
        },
    );

    let response = search.run("Hub", "Goal").await.unwrap();
    assert!(matches!(response.outcome, SearchOutcome::Found { .. }));
    // One hub expansion admitting 2, then at most 2 spoke expansions.
    assert!(response.telemetry.expanded_nodes <= 3);
    let fetched_spokes = hub_refs
        .iter()
        .filter(|spoke| gateway.calls_for(spoke) > 0)
        .count();
    assert!(fetched_spokes <= 2, "{fetched_spokes} spokes fetched");
}

#[tokio::test]
async fn zero_depth_budget_is_rejected() {
    let gateway = Arc::new(GraphGateway::new(&[("Start", &[] as &[&str])]));
    let search = build_search(
        Arc::clone(&gateway),
        &[],
        SearchConfig {
            max_depth: 0,
            fan_out: 4,
        },
    );

    let err = search.run("Start", "Start").await.unwrap_err();
    assert!(matches!(err, PathError::Config(_)));
    assert_eq!(gateway.calls_for("Start"), 0);
}
