//! Generic web search client (`POST /v1/search`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SearchError, WebSearch, WebSearchHit};
use stock_common::ScrapeConfig;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<WebSearchHit>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpWebSearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpWebSearchClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(
            config.web_search_url.clone(),
            config.web_search_api_key.clone(),
            Duration::from_millis(config.finance_search_timeout_ms),
        )
    }
}

#[async_trait]
impl WebSearch for HttpWebSearchClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSearchHit>, SearchError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest { query, limit });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(SearchError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                message: stock_common::util::truncate_with_ellipsis(&body, 200),
            });
        }

        let body: SearchResponse = response.json().await.map_err(SearchError::from_reqwest)?;
        if !body.success {
            return Err(SearchError::Http {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "search unsuccessful".into()),
            });
        }

        let mut hits = body.data;
        hits.truncate(limit);
        Ok(hits)
    }
}
