//! Batch orchestration.
//!
//! Every ticker runs its own pipeline concurrently:
//! resolve → guard → submit → wait → assemble. A failure at any stage ends
//! only that ticker's pipeline and is reported in its result. Results keep
//! input order.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::assembler::ResultAssembler;
use crate::billing::{BatchRecord, BillingReporter};
use crate::blocklist::BlockListGuard;
use crate::error::{ScrapeError, TickerError};
use crate::search::SearchResolver;
use crate::submitter::ScrapeJobSubmitter;
use crate::types::{
    BatchContext, BatchSummary, ScrapeRequestOptions, StockData, StockScrapeResult, TickerSymbol,
};
use crate::waiter::JobWaiter;

/// Stage of a single ticker pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerStage {
    Resolving,
    Guarding,
    Submitting,
    Waiting,
    Assembling,
    Done,
    Failed,
}

impl TickerStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Guarding => "guarding",
            Self::Submitting => "submitting",
            Self::Waiting => "waiting",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for TickerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch ready to run.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub tickers: Vec<TickerSymbol>,
    pub options: ScrapeRequestOptions,
    pub context: BatchContext,
}

/// Aggregated outcome of a batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub summary: BatchSummary,
    pub results: Vec<StockScrapeResult>,
}

/// Drives ticker pipelines and aggregates their results.
#[derive(Clone)]
pub struct BatchOrchestrator {
    resolver: Arc<SearchResolver>,
    guard: Arc<BlockListGuard>,
    submitter: Arc<ScrapeJobSubmitter>,
    waiter: Arc<JobWaiter>,
    assembler: Arc<ResultAssembler>,
    billing: Option<Arc<BillingReporter>>,
}

impl BatchOrchestrator {
    pub fn new(
        resolver: Arc<SearchResolver>,
        guard: Arc<BlockListGuard>,
        submitter: Arc<ScrapeJobSubmitter>,
        waiter: Arc<JobWaiter>,
        assembler: Arc<ResultAssembler>,
    ) -> Self {
        Self {
            resolver,
            guard,
            submitter,
            waiter,
            assembler,
            billing: None,
        }
    }

    /// Report billing and the job log after each batch.
    pub fn with_billing(mut self, billing: Arc<BillingReporter>) -> Self {
        self.billing = Some(billing);
        self
    }

    /// Run every ticker of `request` and aggregate the results.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchOutcome, ScrapeError> {
        if request.tickers.is_empty() {
            return Err(ScrapeError::InvalidInput(
                "tickers must contain at least one symbol".into(),
            ));
        }

        let started = Instant::now();
        let BatchRequest {
            tickers,
            options,
            context,
        } = request;

        let span = info_span!(
            "scrape_stock",
            trace_id = %context.trace_id,
            batch_id = %context.batch_id,
            team_id = %context.team.team_id,
        );

        async move {
            info!(
                tickers = tickers.len(),
                strategy = %options.strategy,
                timeout_ms = options.timeout_ms,
                "Starting stock scrape batch"
            );

            let options = Arc::new(options);
            let context = Arc::new(context);

            let handles: Vec<_> = tickers
                .iter()
                .cloned()
                .map(|ticker| {
                    let this = self.clone();
                    let options = Arc::clone(&options);
                    let context = Arc::clone(&context);
                    let span = info_span!("ticker_pipeline", ticker = %ticker);
                    tokio::spawn(
                        async move { this.run_ticker(ticker, &options, &context).await }
                            .instrument(span),
                    )
                })
                .collect();

            let results: Vec<StockScrapeResult> = futures::future::join_all(handles)
                .await
                .into_iter()
                .zip(tickers.iter())
                .map(|(joined, ticker)| {
                    joined.unwrap_or_else(|e| {
                        warn!(ticker = %ticker, error = %e, "Ticker pipeline aborted");
                        StockScrapeResult::Failed {
                            ticker: ticker.as_str().to_string(),
                            error: format!("Ticker pipeline aborted: {}", e),
                        }
                    })
                })
                .collect();

            if results.len() != tickers.len() {
                return Err(ScrapeError::Internal(format!(
                    "expected {} results, got {}",
                    tickers.len(),
                    results.len()
                )));
            }

            let summary = BatchSummary::from_results(&results);
            let elapsed = started.elapsed();

            if let Some(ref billing) = self.billing {
                billing
                    .report(BatchRecord {
                        ctx: &context,
                        tickers: &tickers,
                        results: &results,
                        summary,
                        elapsed,
                    })
                    .await;
            }

            info!(
                total = summary.total,
                successful = summary.successful,
                failed = summary.failed,
                duration_ms = elapsed.as_millis() as u64,
                "Stock scrape batch complete"
            );

            Ok(BatchOutcome {
                batch_id: context.batch_id.clone(),
                summary,
                results,
            })
        }
        .instrument(span)
        .await
    }

    /// Run one ticker to a terminal result. Never fails.
    async fn run_ticker(
        &self,
        ticker: TickerSymbol,
        options: &ScrapeRequestOptions,
        ctx: &BatchContext,
    ) -> StockScrapeResult {
        let started = Instant::now();
        let mut stage = TickerStage::Resolving;

        match self.drive(&ticker, options, ctx, &mut stage).await {
            Ok(data) => {
                advance(&mut stage, TickerStage::Done);
                info!(
                    url = %data.url,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Ticker scraped"
                );
                StockScrapeResult::Succeeded {
                    ticker: ticker.as_str().to_string(),
                    data,
                }
            }
            Err(e) => {
                warn!(
                    stage = %stage,
                    kind = e.kind(),
                    error = %e,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Ticker failed"
                );
                advance(&mut stage, TickerStage::Failed);
                StockScrapeResult::Failed {
                    ticker: ticker.as_str().to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn drive(
        &self,
        ticker: &TickerSymbol,
        options: &ScrapeRequestOptions,
        ctx: &BatchContext,
        stage: &mut TickerStage,
    ) -> Result<StockData, TickerError> {
        let resolved = self.resolver.resolve(ticker, options.strategy).await?;

        advance(stage, TickerStage::Guarding);
        self.guard.check(&resolved.url, &ctx.team.flags)?;

        advance(stage, TickerStage::Submitting);
        let handle = self.submitter.submit(&resolved.url, options, ctx).await?;

        advance(stage, TickerStage::Waiting);
        let waited = self
            .waiter
            .wait(&handle, options.timeout_ms, ctx.team.zero_data_retention())
            .await;
        drop(handle);
        let document = waited?;

        advance(stage, TickerStage::Assembling);
        Ok(self
            .assembler
            .assemble(ticker, &resolved, document, options)
            .await)
    }
}

fn advance(stage: &mut TickerStage, next: TickerStage) {
    debug_assert!(!stage.is_terminal(), "ticker pipeline already finished");
    debug!(from = %stage, to = %next, "Ticker stage");
    *stage = next;
}
