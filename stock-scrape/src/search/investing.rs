//! Quote search client for the finance site's public search API.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{FinanceSearch, QuoteDescriptor, SearchError};
use stock_common::ScrapeConfig;

/// Browser-like user agent; the search API rejects bare clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<QuoteDescriptor>,
}

/// Client for `GET <endpoint>?q=<ticker>`.
pub struct InvestingSearchClient {
    client: reqwest::Client,
    endpoint: String,
}

impl InvestingSearchClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(
            config.finance_search_url.clone(),
            Duration::from_millis(config.finance_search_timeout_ms),
        )
    }
}

#[async_trait]
impl FinanceSearch for InvestingSearchClient {
    async fn lookup(&self, query: &str) -> Result<Vec<QuoteDescriptor>, SearchError> {
        debug!(endpoint = %self.endpoint, query = query, "Searching quotes");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SearchError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                message: stock_common::util::truncate_with_ellipsis(&body, 200),
            });
        }

        let body: SearchResponse = response.json().await.map_err(SearchError::from_reqwest)?;
        debug!(query = query, quotes = body.quotes.len(), "Quote search complete");
        Ok(body.quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> InvestingSearchClient {
        InvestingSearchClient::new(
            format!("{}/api/search/v2/search", server.uri()),
            Duration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn test_lookup_returns_quotes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search/v2/search"))
            .and(query_param("q", "BYND"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "quotes": [{
                    "url": "/equities/beyond-meat-inc",
                    "exchange": "NASDAQ",
                    "description": "Beyond Meat Inc",
                    "symbol": "BYND",
                    "flag": "USA"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let quotes = client_for(&server).await.lookup("BYND").await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].url, "/equities/beyond-meat-inc");
        assert_eq!(quotes[0].exchange, "NASDAQ");
    }

    #[tokio::test]
    async fn test_lookup_missing_quotes_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let quotes = client_for(&server).await.lookup("ZZZZ").await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).await.lookup("ZZZZ").await.unwrap_err();
        assert_eq!(err, SearchError::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.lookup("AAPL").await.unwrap_err();
        assert_eq!(
            err,
            SearchError::Http {
                status: 500,
                message: "upstream down".into()
            }
        );
    }

    #[tokio::test]
    async fn test_lookup_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"quotes": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).await.lookup("AAPL").await.unwrap_err();
        assert_eq!(err, SearchError::Timeout);
    }
}
