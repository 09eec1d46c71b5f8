//! Wiring of the production collaborators from configuration, plus the
//! shutdown signal shared by both servers.

use anyhow::Result;
use std::sync::Arc;

use crate::assembler::{FsMarkdownStore, ResultAssembler};
use crate::billing::{
    BillingLedger, BillingReporter, HttpBillingLedger, JsonlJobLogger, LoggingBillingLedger,
};
use crate::blocklist::BlockListGuard;
use crate::engine::{HttpJobEngine, ScrapeJobEngine};
use crate::orchestrator::BatchOrchestrator;
use crate::priority::JobPriorityTracker;
use crate::routes::AppState;
use crate::search::{HttpWebSearchClient, InvestingSearchClient, SearchResolver};
use crate::submitter::ScrapeJobSubmitter;
use crate::waiter::{CleanupPolicy, JobWaiter};
use stock_common::ScrapeConfig;

/// Build the ticker pipeline around `engine`, without billing.
pub fn build_pipeline(
    config: &ScrapeConfig,
    engine: Arc<dyn ScrapeJobEngine>,
    cleanup: CleanupPolicy,
) -> BatchOrchestrator {
    let resolver = SearchResolver::from_config(
        config,
        Arc::new(InvestingSearchClient::from_config(config)),
        Arc::new(HttpWebSearchClient::from_config(config)),
    );
    let priority = Arc::new(JobPriorityTracker::new(
        config.base_priority,
        config.priority_bucket_limit,
    ));

    BatchOrchestrator::new(
        Arc::new(resolver),
        Arc::new(BlockListGuard::new(config.blocked_domains.iter().cloned())),
        Arc::new(ScrapeJobSubmitter::new(engine.clone(), priority)),
        Arc::new(JobWaiter::new(engine).with_cleanup(cleanup)),
        Arc::new(ResultAssembler::new(Arc::new(FsMarkdownStore::new(
            &config.output_dir,
        )))),
    )
}

/// Build the billing reporter configured in `config`.
pub fn build_billing(config: &ScrapeConfig) -> BillingReporter {
    let ledger: Arc<dyn BillingLedger> = match config.billing_url {
        Some(ref url) => Arc::new(HttpBillingLedger::new(url.clone())),
        None => Arc::new(LoggingBillingLedger),
    };
    BillingReporter::new(
        ledger,
        Arc::new(JsonlJobLogger::new(config.job_log_path())),
    )
}

/// Build the state of the scrape service.
pub fn build_state(config: &ScrapeConfig) -> Result<AppState> {
    let default_strategy = config
        .search_strategy()
        .map_err(|e| anyhow::anyhow!(e))?;

    let engine: Arc<dyn ScrapeJobEngine> = Arc::new(HttpJobEngine::from_config(config));

    let orchestrator = build_pipeline(config, engine, CleanupPolicy::OnSuccessOnly)
        .with_billing(Arc::new(build_billing(config)));

    Ok(AppState {
        orchestrator,
        default_strategy,
        default_timeout_ms: config.default_timeout_ms,
    })
}

/// Resolve on Ctrl-C. Never resolves if the signal handler cannot be installed.
pub async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await;
}

async fn wait_for_shutdown<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
