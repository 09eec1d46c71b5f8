//! Ticker resolution.
//!
//! Maps a ticker symbol to the canonical quote page on the finance site,
//! either through the site's own quote search or through a generic web
//! search filtered to the site's domain.

pub mod investing;
pub mod web;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::TickerError;
use crate::types::{ResolvedStock, TickerSymbol};
use stock_common::util::{host_matches_domain, host_of};
use stock_common::{ScrapeConfig, SearchStrategy};

pub use investing::InvestingSearchClient;
pub use web::HttpWebSearchClient;

// ============================================================================
// Search Error
// ============================================================================

/// Errors raised by search backends.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Backend reported the query as unknown (HTTP 404)
    NotFound,
    /// Request did not complete in time
    Timeout,
    /// Non-success HTTP status
    Http { status: u16, message: String },
    /// Connection or transport failure
    Network(String),
    /// Response body could not be decoded
    Decode(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Timeout => write!(f, "request timeout"),
            Self::Http { status, message } => write!(f, "HTTP {}: {}", status, message),
            Self::Network(msg) => write!(f, "network error: {}", msg),
            Self::Decode(msg) => write!(f, "failed to parse response: {}", msg),
        }
    }
}

impl std::error::Error for SearchError {}

impl SearchError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

/// One quote entry returned by the finance site search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuoteDescriptor {
    /// Site-relative path of the quote page
    pub url: String,
    pub exchange: String,
    pub description: String,
    pub symbol: String,
}

/// One hit returned by the generic web search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebSearchHit {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Quote search of the finance site.
#[async_trait]
pub trait FinanceSearch: Send + Sync {
    /// Look up quotes matching `query`, best match first.
    async fn lookup(&self, query: &str) -> Result<Vec<QuoteDescriptor>, SearchError>;
}

/// Generic web search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSearchHit>, SearchError>;
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves tickers with the strategy chosen for the batch.
pub struct SearchResolver {
    finance: Arc<dyn FinanceSearch>,
    web: Arc<dyn WebSearch>,
    site_base: String,
    target_domain: String,
    web_search_limit: usize,
}

impl SearchResolver {
    pub fn new(
        finance: Arc<dyn FinanceSearch>,
        web: Arc<dyn WebSearch>,
        site_base: impl Into<String>,
        target_domain: impl Into<String>,
    ) -> Self {
        Self {
            finance,
            web,
            site_base: site_base.into().trim_end_matches('/').to_string(),
            target_domain: target_domain.into(),
            web_search_limit: 5,
        }
    }

    pub fn with_web_search_limit(mut self, limit: usize) -> Self {
        self.web_search_limit = limit.max(1);
        self
    }

    /// Build a resolver with the given backends and the site settings of `config`.
    pub fn from_config(
        config: &ScrapeConfig,
        finance: Arc<dyn FinanceSearch>,
        web: Arc<dyn WebSearch>,
    ) -> Self {
        Self::new(
            finance,
            web,
            config.finance_site_base.clone(),
            config.target_domain.clone(),
        )
        .with_web_search_limit(config.web_search_limit)
    }

    /// Resolve `ticker` to its quote page.
    pub async fn resolve(
        &self,
        ticker: &TickerSymbol,
        strategy: SearchStrategy,
    ) -> Result<ResolvedStock, TickerError> {
        debug!(ticker = %ticker, strategy = %strategy, "Resolving ticker");
        match strategy {
            SearchStrategy::DirectFinanceApi => self.resolve_direct(ticker).await,
            SearchStrategy::GenericWebSearch => self.resolve_via_web(ticker).await,
        }
    }

    async fn resolve_direct(&self, ticker: &TickerSymbol) -> Result<ResolvedStock, TickerError> {
        let raw = ticker.raw();
        let quotes = self.finance.lookup(raw).await.map_err(|e| match e {
            SearchError::NotFound => TickerError::NotFound(format!("Ticker not found: {}", raw)),
            SearchError::Timeout => {
                TickerError::Timeout(format!("Timeout searching for ticker: {}", raw))
            }
            other => TickerError::Upstream(format!("Failed to search finance site: {}", other)),
        })?;

        let quote = quotes
            .into_iter()
            .next()
            .ok_or_else(|| TickerError::NotFound(format!("No results found for ticker: {}", raw)))?;

        Ok(ResolvedStock {
            url: self.absolute_url(&quote.url),
            ticker: raw.to_string(),
            exchange: quote.exchange,
            description: quote.description,
            symbol: quote.symbol,
        })
    }

    async fn resolve_via_web(&self, ticker: &TickerSymbol) -> Result<ResolvedStock, TickerError> {
        let raw = ticker.raw();
        let query = format!("{} stock {}", raw, self.target_domain);

        let hits = self
            .web
            .search(&query, self.web_search_limit)
            .await
            .map_err(|e| match e {
                SearchError::Timeout => {
                    TickerError::Timeout(format!("Timeout searching for ticker: {}", raw))
                }
                other => TickerError::Upstream(format!("Web search failed: {}", other)),
            })?;

        let hit = hits
            .into_iter()
            .take(self.web_search_limit)
            .find(|hit| {
                host_of(&hit.url)
                    .map(|host| host_matches_domain(&host, &self.target_domain))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                TickerError::NotFound(format!(
                    "No {} results found for ticker: {}",
                    self.target_domain, raw
                ))
            })?;

        Ok(ResolvedStock {
            url: hit.url,
            ticker: raw.to_string(),
            exchange: "N/A".to_string(),
            description: hit.description.unwrap_or_default(),
            symbol: ticker.as_str().to_string(),
        })
    }

    fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.site_base, path)
        } else {
            format!("{}/{}", self.site_base, path)
        }
    }
}
