//! The sole network boundary: fetching articles from the MediaWiki API.
//!
//! [`WikipediaGateway`] asks the Action API for a page's outbound links and
//! its plain-text intro in a single query (`prop=links|extracts`), follows
//! redirects, walks `continue` pages until the link list is complete or the
//! configured cap is reached, and retries a transient failure once before
//! surfacing it. Everything above this module sees only
//! [`ArticleGateway::fetch`].

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::types::{Article, PathError};

/// Production endpoint for the English Wikipedia.
pub const DEFAULT_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";

/// Request timeout applied by [`WikipediaGateway::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stop following link continuations once this many links are collected.
pub const DEFAULT_MAX_LINKS: usize = 2000;

/// Fetches a page's outbound links and summary text.
#[async_trait]
pub trait ArticleGateway: Send + Sync {
    /// Resolves `title` to an [`Article`], failing with
    /// [`PathError::NotFound`] for unknown pages and
    /// [`PathError::Transient`] for network trouble.
    async fn fetch(&self, title: &str) -> Result<Article, PathError>;
}

/// MediaWiki Action API client.
#[derive(Clone, Debug)]
pub struct WikipediaGateway {
    client: Client,
    endpoint: Url,
    max_links: usize,
}

impl WikipediaGateway {
    /// Builds a gateway against [`DEFAULT_ENDPOINT`] with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Result<Self, PathError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("wikipath/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| PathError::Config(err.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Builds a gateway around a caller-configured HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint parses"),
            max_links: DEFAULT_MAX_LINKS,
        }
    }

    /// Points the gateway at a different API endpoint (tests, mirrors).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Caps how many links are collected across continuation pages.
    #[must_use]
    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links;
        self
    }

    async fn fetch_once(&self, title: &str) -> Result<Article, PathError> {
        let mut draft = ArticleDraft::default();
        let mut continuation: Option<Continuation> = None;

        loop {
            let mut request = self.client.get(self.endpoint.clone()).query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "links|extracts"),
                ("plnamespace", "0"),
                ("pllimit", "max"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ]);
            if let Some(params) = &continuation {
                for (key, value) in params {
                    request = request.query(&[(key.as_str(), param_value(value).as_str())]);
                }
            }

            let response = request
                .send()
                .await
                .map_err(|err| transient(title, err))?
                .error_for_status()
                .map_err(|err| transient(title, err))?;
            let payload: ApiResponse = response
                .json()
                .await
                .map_err(|err| transient(title, err))?;

            continuation = draft.absorb(payload, title)?;
            if continuation.is_none() || draft.links.len() >= self.max_links {
                break;
            }
        }

        Ok(draft.into_article())
    }
}

#[async_trait]
impl ArticleGateway for WikipediaGateway {
    async fn fetch(&self, title: &str) -> Result<Article, PathError> {
        match self.fetch_once(title).await {
            Err(PathError::Transient { message, .. }) => {
                tracing::debug!(title, %message, "transient fetch failure, retrying once");
                self.fetch_once(title).await
            }
            other => other,
        }
    }
}

fn transient(title: &str, err: impl std::fmt::Display) -> PathError {
    PathError::Transient {
        title: title.to_string(),
        message: err.to_string(),
    }
}

type Continuation = BTreeMap<String, serde_json::Value>;

fn param_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "continue")]
    continuation: Option<Continuation>,
    query: Option<ApiQuery>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    missing: bool,
    extract: Option<String>,
    #[serde(default)]
    links: Vec<ApiLink>,
}

#[derive(Debug, Deserialize)]
struct ApiLink {
    #[serde(default)]
    ns: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    info: String,
}

/// Accumulates one article across continuation responses.
#[derive(Debug, Default)]
struct ArticleDraft {
    title: Option<String>,
    summary: Option<String>,
    links: Vec<String>,
    seen: HashSet<String>,
}

impl ArticleDraft {
    /// Folds one API response into the draft, returning the continuation
    /// parameters when more link pages remain.
    fn absorb(
        &mut self,
        payload: ApiResponse,
        requested: &str,
    ) -> Result<Option<Continuation>, PathError> {
        if let Some(error) = payload.error {
            return Err(PathError::Transient {
                title: requested.to_string(),
                message: format!("API error {}: {}", error.code, error.info),
            });
        }

        let query = payload.query.ok_or_else(|| PathError::Transient {
            title: requested.to_string(),
            message: "response carried no query body".to_string(),
        })?;
        let page = query
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| PathError::NotFound(requested.to_string()))?;
        if page.missing {
            return Err(PathError::NotFound(requested.to_string()));
        }

        self.title.get_or_insert(page.title);
        if let Some(extract) = page.extract {
            self.summary.get_or_insert(extract);
        }
        for link in page.links {
            if link.ns == 0 && self.seen.insert(link.title.clone()) {
                self.links.push(link.title);
            }
        }

        Ok(payload.continuation)
    }

    fn into_article(self) -> Article {
        Article {
            title: self.title.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            links: self.links,
        }
    }
}
