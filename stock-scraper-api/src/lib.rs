//! Stock Scraper API - standalone `/scrape-stocks` endpoint.
//!
//! Runs the same ticker pipeline as `stock-scrape`, but scrapes through a
//! synchronous sibling service and carries no billing or job log.

pub mod engine;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use stock_common::logging::RequestContext;
use stock_common::{ScrapeConfig, SearchStrategy};
use stock_scrape::routes::{team_from_headers, ScrapeStockResponse};
use stock_scrape::service::build_pipeline;
use stock_scrape::types::ExtractionSchema;
use stock_scrape::{
    BatchContext, BatchOrchestrator, BatchRequest, CleanupPolicy, ScrapeError,
    ScrapeRequestOptions, TickerSymbol,
};

pub use engine::SiblingScrapeEngine;

#[derive(Clone)]
pub struct LegacyState {
    pub orchestrator: BatchOrchestrator,
    pub timeout_ms: u64,
}

impl LegacyState {
    pub fn from_config(config: &ScrapeConfig) -> Self {
        let engine = Arc::new(SiblingScrapeEngine::new(config.sibling_scrape_url.clone()));
        Self::with_engine(config, engine)
    }

    /// Build the state around an existing engine.
    ///
    /// Job records are dropped after every wait, so nothing outlives a request.
    pub fn with_engine(config: &ScrapeConfig, engine: Arc<SiblingScrapeEngine>) -> Self {
        Self {
            orchestrator: build_pipeline(config, engine, CleanupPolicy::Always),
            timeout_ms: config.default_timeout_ms,
        }
    }
}

pub fn build_router(state: LegacyState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/scrape-stocks", post(scrape_stocks))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stock-scraper-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LegacyRequest {
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub options: LegacyOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOptions {
    #[serde(default = "default_true")]
    pub markdown: bool,
    #[serde(default)]
    pub extract: bool,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub save_markdown: bool,
}

impl Default for LegacyOptions {
    fn default() -> Self {
        Self {
            markdown: true,
            extract: false,
            schema: None,
            save_markdown: true,
        }
    }
}

fn default_true() -> bool {
    true
}

async fn scrape_stocks(
    State(state): State<LegacyState>,
    headers: axum::http::HeaderMap,
    payload: Result<Json<LegacyRequest>, JsonRejection>,
) -> Result<Json<ScrapeStockResponse>, ScrapeError> {
    let Json(request) = payload?;
    if request.tickers.is_empty() {
        return Err(ScrapeError::InvalidInput(
            "tickers array is required and must contain at least one ticker symbol".into(),
        ));
    }

    let tickers = request
        .tickers
        .iter()
        .map(|t| TickerSymbol::parse(t))
        .collect::<Result<Vec<_>, _>>()?;

    let options = ScrapeRequestOptions {
        want_markdown: request.options.markdown,
        want_extract: request.options.extract,
        persist_markdown: request.options.save_markdown,
        extraction_schema: request
            .options
            .schema
            .map(ExtractionSchema::new)
            .transpose()?,
        timeout_ms: state.timeout_ms,
        strategy: SearchStrategy::DirectFinanceApi,
    };

    let request_ctx = RequestContext::from_headers(&headers, "stock-scraper-api");
    let mut context = BatchContext::new(team_from_headers(&headers), "legacy-api");
    context.trace_id = request_ctx.trace_id;

    tracing::info!(
        tickers = tickers.len(),
        trace_id = %context.trace_id,
        "Processing legacy scrape request"
    );

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
