//! Batch-level billing and job logging.
//!
//! Both run once per batch, only when at least one ticker succeeded, and
//! their failures never change the response.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::types::{BatchContext, BatchSummary, StockScrapeResult, TickerSymbol};
use stock_common::{Error, Result, ResultExt};

/// Mode recorded in the job log.
pub const JOB_LOG_MODE: &str = "stock-scrape";

// ============================================================================
// Ledger
// ============================================================================

/// External billing ledger.
#[async_trait]
pub trait BillingLedger: Send + Sync {
    async fn charge(&self, team_id: &str, units: usize, api_key_id: Option<i64>) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChargeRequest<'a> {
    team_id: &'a str,
    credits: usize,
    api_key_id: Option<i64>,
}

/// Ledger reached over HTTP (`POST <url>`).
pub struct HttpBillingLedger {
    client: reqwest::Client,
    url: String,
}

impl HttpBillingLedger {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl BillingLedger for HttpBillingLedger {
    async fn charge(&self, team_id: &str, units: usize, api_key_id: Option<i64>) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&ChargeRequest {
                team_id,
                credits: units,
                api_key_id,
            })
            .send()
            .await
            .map_err(|e| Error::External(format!("billing ledger unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "billing ledger returned HTTP {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Ledger that only logs charges. Used when no ledger URL is configured.
pub struct LoggingBillingLedger;

#[async_trait]
impl BillingLedger for LoggingBillingLedger {
    async fn charge(&self, team_id: &str, units: usize, api_key_id: Option<i64>) -> Result<()> {
        info!(
            team_id = team_id,
            units = units,
            api_key_id = ?api_key_id,
            "Billing charge recorded locally"
        );
        Ok(())
    }
}

// ============================================================================
// Job Log
// ============================================================================

/// Document summary stored in the job log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedDocument {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<serde_json::Value>,
}

/// One line of the job log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub job_id: String,
    pub trace_id: String,
    pub team_id: String,
    pub success: bool,
    pub message: String,
    pub num_docs: usize,
    /// Empty under zero data retention
    pub docs: Vec<LoggedDocument>,
    /// Seconds
    pub time_taken: f64,
    pub mode: String,
    pub url: String,
    pub origin: String,
    pub credits_billed: usize,
    pub zero_data_retention: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait JobLogger: Send + Sync {
    async fn record(&self, entry: &JobLogEntry) -> Result<()>;
}

/// Job log appended to a JSONL file.
pub struct JsonlJobLogger {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlJobLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl JobLogger for JsonlJobLogger {
    async fn record(&self, entry: &JobLogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context(format!("opening job log {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Everything the reporter needs to know about a finished batch.
pub struct BatchRecord<'a> {
    pub ctx: &'a BatchContext,
    pub tickers: &'a [TickerSymbol],
    pub results: &'a [StockScrapeResult],
    pub summary: BatchSummary,
    pub elapsed: Duration,
}

impl BatchRecord<'_> {
    /// Build the job log line for this batch.
    pub fn to_log_entry(&self) -> JobLogEntry {
        let zdr = self.ctx.team.zero_data_retention();
        let docs = if zdr {
            Vec::new()
        } else {
            self.results
                .iter()
                .filter_map(StockScrapeResult::data)
                .map(|data| LoggedDocument {
                    url: data.url.clone(),
                    markdown: data.markdown.clone(),
                    extract: data.extract.clone(),
                })
                .collect()
        };

        let tickers = self
            .tickers
            .iter()
            .map(TickerSymbol::as_str)
            .collect::<Vec<_>>()
            .join(",");

        JobLogEntry {
            job_id: self.ctx.batch_id.clone(),
            trace_id: self.ctx.trace_id.clone(),
            team_id: self.ctx.team.team_id.clone(),
            success: true,
            message: format!(
                "Stock scrape: {}/{} successful",
                self.summary.successful, self.summary.total
            ),
            num_docs: self.summary.successful,
            docs,
            time_taken: self.elapsed.as_secs_f64(),
            mode: JOB_LOG_MODE.to_string(),
            url: format!("{}:{}", JOB_LOG_MODE, tickers),
            origin: self.ctx.origin.clone(),
            credits_billed: self.summary.successful,
            zero_data_retention: zdr,
            created_at: Utc::now(),
        }
    }
}

/// Charges the team and writes the job log after a batch.
pub struct BillingReporter {
    ledger: Arc<dyn BillingLedger>,
    job_logger: Arc<dyn JobLogger>,
}

impl BillingReporter {
    pub fn new(ledger: Arc<dyn BillingLedger>, job_logger: Arc<dyn JobLogger>) -> Self {
        Self { ledger, job_logger }
    }

    /// Report a finished batch. Does nothing when no ticker succeeded.
    pub async fn report(&self, record: BatchRecord<'_>) {
        let units = record.summary.successful;
        if units == 0 {
            return;
        }

        let team = &record.ctx.team;
        if team.is_billing_bypassed() {
            info!(team_id = %team.team_id, "Billing bypassed for team");
        } else if let Err(e) = self.ledger.charge(&team.team_id, units, team.api_key_id).await {
            error!(
                team_id = %team.team_id,
                units = units,
                error = %e,
                "Failed to bill team for stock scrape"
            );
        }

        let entry = record.to_log_entry();
        if let Err(e) = self.job_logger.record(&entry).await {
            warn!(batch_id = %entry.job_id, error = %e, "Failed to write job log");
        }
    }
}
