//! HTTP API routes.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{request::Parts, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::error::ScrapeError;
use crate::orchestrator::{BatchOrchestrator, BatchRequest};
use crate::types::{
    BatchContext, BatchSummary, ExtractionSchema, ScrapeRequestOptions, StockScrapeResult,
    TeamContext, TeamFlags, TickerSymbol,
};
use stock_common::logging::RequestContext;
use stock_common::SearchStrategy;

/// Header names carrying the authenticated team context.
pub const TEAM_ID_HEADER: &str = "X-Team-Id";
pub const API_KEY_ID_HEADER: &str = "X-Api-Key-Id";
pub const FORCE_ZDR_HEADER: &str = "X-Force-ZDR";
pub const UNBLOCKED_DOMAINS_HEADER: &str = "X-Unblocked-Domains";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: BatchOrchestrator,
    /// Strategy used when the request does not name one
    pub default_strategy: SearchStrategy,
    pub default_timeout_ms: u64,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/scrape-stock", post(scrape_stock))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "stock-scrape",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// ============ Request ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScrapeStockRequest {
    pub tickers: Vec<String>,
    #[serde(default)]
    pub search_mode: Option<SearchStrategy>,
    #[serde(default)]
    pub options: RequestOptions,
    /// Per-job wait bound in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub origin: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestOptions {
    #[serde(default = "default_true")]
    pub markdown: bool,
    #[serde(default)]
    pub extract: bool,
    #[serde(default)]
    pub save_markdown: bool,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            markdown: true,
            extract: false,
            save_markdown: false,
            schema: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ScrapeStockRequest {
    /// Validate the request and convert it into tickers plus typed options.
    pub fn into_parts(
        self,
        default_strategy: SearchStrategy,
        default_timeout_ms: u64,
    ) -> Result<(Vec<TickerSymbol>, ScrapeRequestOptions, Option<String>), ScrapeError> {
        if self.tickers.is_empty() {
            return Err(ScrapeError::InvalidInput(
                "tickers must contain at least one symbol".into(),
            ));
        }
        let tickers = self
            .tickers
            .iter()
            .map(|t| TickerSymbol::parse(t))
            .collect::<Result<Vec<_>, _>>()?;

        let timeout_ms = self.timeout.unwrap_or(default_timeout_ms);
        if timeout_ms == 0 {
            return Err(ScrapeError::InvalidInput(
                "timeout must be greater than 0".into(),
            ));
        }

        let extraction_schema = self.options.schema.map(ExtractionSchema::new).transpose()?;

        let options = ScrapeRequestOptions {
            want_markdown: self.options.markdown,
            want_extract: self.options.extract,
            persist_markdown: self.options.save_markdown,
            extraction_schema,
            timeout_ms,
            strategy: self.search_mode.unwrap_or(default_strategy),
        };

        Ok((tickers, options, self.origin))
    }
}

// ============ Response ============

#[derive(Debug, Serialize)]
pub struct ScrapeStockResponse {
    pub success: bool,
    pub summary: BatchSummary,
    pub results: Vec<StockScrapeResult>,
}

// ============ Team context ============

#[async_trait]
impl<S> FromRequestParts<S> for TeamContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(team_from_headers(&parts.headers))
    }
}

/// Read the team context set by the upstream auth layer.
pub fn team_from_headers(headers: &HeaderMap) -> TeamContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let team_id = header(TEAM_ID_HEADER).unwrap_or("anonymous").to_string();
    let api_key_id = header(API_KEY_ID_HEADER).and_then(|v| v.parse().ok());
    let force_zdr = header(FORCE_ZDR_HEADER)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    let unblocked_domains = header(UNBLOCKED_DOMAINS_HEADER)
        .map(|v| {
            v.split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        })
        .unwrap_or_default();

    TeamContext {
        team_id,
        api_key_id,
        flags: TeamFlags {
            force_zdr,
            unblocked_domains,
        },
    }
}

// ============ Scrape ============

async fn scrape_stock(
    State(state): State<AppState>,
    team: TeamContext,
    headers: HeaderMap,
    payload: Result<Json<ScrapeStockRequest>, JsonRejection>,
) -> Result<Json<ScrapeStockResponse>, ScrapeError> {
    let Json(request) = payload?;
    let (tickers, options, origin) =
        request.into_parts(state.default_strategy, state.default_timeout_ms)?;

    let request_ctx = RequestContext::from_headers(&headers, "stock-scrape");
    tracing::debug!(
        trace_id = %request_ctx.trace_id,
        span_id = %request_ctx.span_id,
        parent_span_id = ?request_ctx.parent_span_id,
        service = %request_ctx.service,
        tickers = tickers.len(),
        "Scrape request accepted"
    );
    let mut context = BatchContext::new(team, origin.unwrap_or_else(|| "api".into()));
    context.trace_id = request_ctx.trace_id;

    let outcome = state
        .orchestrator
        .run(BatchRequest {
            tickers,
            options,
            context,
        })
        .await?;

    Ok(Json(ScrapeStockResponse {
        success: true,
        summary: outcome.summary,
        results: outcome.results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ScrapeStockRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let (tickers, options, origin) = request(serde_json::json!({"tickers": [" aapl "]}))
            .into_parts(SearchStrategy::DirectFinanceApi, 30_000)
            .unwrap();

        assert_eq!(tickers[0].as_str(), "AAPL");
        assert!(options.want_markdown);
        assert!(!options.want_extract);
        assert!(!options.persist_markdown);
        assert!(options.extraction_schema.is_none());
        assert_eq!(options.timeout_ms, 30_000);
        assert_eq!(options.strategy, SearchStrategy::DirectFinanceApi);
        assert!(origin.is_none());
    }

    #[test]
    fn test_request_overrides() {
        let (_, options, origin) = request(serde_json::json!({
            "tickers": ["BYND"],
            "searchMode": "firecrawl-search",
            "options": {"markdown": false, "extract": true, "saveMarkdown": true,
                        "schema": {"type": "object"}},
            "timeout": 5000,
            "origin": "sdk"
        }))
        .into_parts(SearchStrategy::DirectFinanceApi, 30_000)
        .unwrap();

        assert!(!options.want_markdown);
        assert!(options.want_extract);
        assert!(options.persist_markdown);
        assert!(options.extraction_schema.is_some());
        assert_eq!(options.timeout_ms, 5000);
        assert_eq!(options.strategy, SearchStrategy::GenericWebSearch);
        assert_eq!(origin.as_deref(), Some("sdk"));
    }

    #[test]
    fn test_request_rejects_unknown_fields() {
        let parsed: Result<ScrapeStockRequest, _> =
            serde_json::from_value(serde_json::json!({"tickers": ["A"], "limit": 3}));
        assert!(parsed.is_err());

        let parsed: Result<ScrapeStockRequest, _> =
            serde_json::from_value(serde_json::json!({"tickers": ["A"], "searchMode": "bing"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_request_validation() {
        let err = request(serde_json::json!({"tickers": []}))
            .into_parts(SearchStrategy::DirectFinanceApi, 30_000)
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidInput(_)));

        let err = request(serde_json::json!({"tickers": ["AAPL", "  "]}))
            .into_parts(SearchStrategy::DirectFinanceApi, 30_000)
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidInput(_)));

        let err = request(serde_json::json!({"tickers": ["AAPL"], "options": {"schema": "price"}}))
            .into_parts(SearchStrategy::DirectFinanceApi, 30_000)
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidInput(_)));

        let err = request(serde_json::json!({"tickers": ["AAPL"], "timeout": 0}))
            .into_parts(SearchStrategy::DirectFinanceApi, 30_000)
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidInput(_)));
    }

    #[test]
    fn test_team_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(TEAM_ID_HEADER, "team-9".parse().unwrap());
        headers.insert(API_KEY_ID_HEADER, "17".parse().unwrap());
        headers.insert(FORCE_ZDR_HEADER, "true".parse().unwrap());
        headers.insert(UNBLOCKED_DOMAINS_HEADER, "X.com, linkedin.com".parse().unwrap());

        let team = team_from_headers(&headers);
        assert_eq!(team.team_id, "team-9");
        assert_eq!(team.api_key_id, Some(17));
        assert!(team.flags.force_zdr);
        assert_eq!(team.flags.unblocked_domains, vec!["x.com", "linkedin.com"]);

        let team = team_from_headers(&HeaderMap::new());
        assert_eq!(team.team_id, "anonymous");
        assert!(!team.flags.force_zdr);
    }
}
