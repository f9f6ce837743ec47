//! Web search: the [`SearchProvider`] seam and its Tavily implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use rivalscope_shared::{Result, RivalscopeError, SearchDepth, TavilyConfig, WebFinding};

use crate::http::{build_client, check_status, endpoint};

const PROVIDER: &str = "tavily";

/// Given a query, return `(url, content)` hits in provider rank order.
///
/// A call may fail on its own; callers decide whether that aborts anything.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        max_results: u32,
    ) -> Result<Vec<WebFinding>>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily `/search` client.
#[derive(Debug, Clone)]
pub struct TavilySearch {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl TavilySearch {
    /// Build a search client from the `[tavily]` config section and a resolved key.
    pub fn new(config: &TavilyConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    #[instrument(skip_all, fields(query = %query, depth = %depth, max_results = max_results))]
    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        max_results: u32,
    ) -> Result<Vec<WebFinding>> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: depth,
            max_results,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "search"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RivalscopeError::Network(format!("{PROVIDER}: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(RivalscopeError::provider(
                    PROVIDER,
                    "API key rejected (HTTP 401)",
                ));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(RivalscopeError::provider(
                    PROVIDER,
                    "rate limit exceeded (HTTP 429)",
                ));
            }
            _ => {}
        }
        let response = check_status(PROVIDER, response).await?;

        let body: SearchResponse = response.json().await.map_err(|e| {
            RivalscopeError::provider(PROVIDER, format!("unreadable response body: {e}"))
        })?;

        debug!(hits = body.results.len(), "search complete");

        Ok(body
            .results
            .into_iter()
            .map(|hit| WebFinding::new(hit.url, hit.content))
            .collect())
    }
}
