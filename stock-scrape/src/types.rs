//! Domain types shared by the ticker pipeline stages.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::{ScrapeError, TickerError};
use crate::priority::PrioritySlot;
use stock_common::SearchStrategy;

// ============================================================================
// Ticker
// ============================================================================

/// A ticker symbol as requested by the caller.
///
/// Keeps the trimmed input (used for upstream lookups) alongside the
/// upper-cased form reported back in results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TickerSymbol {
    raw: String,
    normalized: String,
}

impl TickerSymbol {
    /// Parse a requested ticker, rejecting blank entries.
    pub fn parse(input: &str) -> Result<Self, ScrapeError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(ScrapeError::InvalidInput(
                "ticker symbols must not be blank".into(),
            ));
        }
        Ok(Self {
            raw: raw.to_string(),
            normalized: raw.to_uppercase(),
        })
    }

    /// Trimmed ticker exactly as the caller sent it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Upper-cased ticker.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Canonical quote page for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStock {
    pub url: String,
    pub ticker: String,
    pub exchange: String,
    pub description: String,
    pub symbol: String,
}

// ============================================================================
// Request options
// ============================================================================

/// Structured extraction schema handed to the extraction step.
///
/// Always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtractionSchema(serde_json::Value);

impl ExtractionSchema {
    /// Wrap a caller-supplied schema.
    pub fn new(value: serde_json::Value) -> Result<Self, ScrapeError> {
        if value.is_object() {
            Ok(Self(value))
        } else {
            Err(ScrapeError::InvalidInput(
                "options.schema must be a JSON object".into(),
            ))
        }
    }

    /// Schema covering the headline figures of a quote page.
    pub fn default_stock() -> Self {
        Self(serde_json::json!({
            "type": "object",
            "properties": {
                "companyName": { "type": "string" },
                "ticker": { "type": "string" },
                "currentPrice": { "type": "number" },
                "currency": { "type": "string" },
                "change": { "type": "number" },
                "changePercent": { "type": "number" },
                "volume": { "type": "number" },
                "marketCap": { "type": "string" },
                "high": { "type": "number" },
                "low": { "type": "number" },
                "open": { "type": "number" },
                "previousClose": { "type": "number" },
                "fiftyTwoWeekHigh": { "type": "number" },
                "fiftyTwoWeekLow": { "type": "number" },
                "peRatio": { "type": "number" },
                "eps": { "type": "number" },
                "beta": { "type": "number" }
            }
        }))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Per-batch options, applied uniformly to every ticker.
#[derive(Debug, Clone)]
pub struct ScrapeRequestOptions {
    pub want_markdown: bool,
    pub want_extract: bool,
    pub persist_markdown: bool,
    pub extraction_schema: Option<ExtractionSchema>,
    pub timeout_ms: u64,
    pub strategy: SearchStrategy,
}

impl Default for ScrapeRequestOptions {
    fn default() -> Self {
        Self {
            want_markdown: true,
            want_extract: false,
            persist_markdown: false,
            extraction_schema: None,
            timeout_ms: 30_000,
            strategy: SearchStrategy::default(),
        }
    }
}

// ============================================================================
// Team / batch context
// ============================================================================

/// Per-team policy flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFlags {
    /// Force zero data retention for every job of the team
    #[serde(default, rename = "forceZDR")]
    pub force_zdr: bool,
    /// Hosts exempted from the blocklist
    #[serde(default)]
    pub unblocked_domains: Vec<String>,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamContext {
    pub team_id: String,
    pub api_key_id: Option<i64>,
    pub flags: TeamFlags,
}

impl TeamContext {
    /// Team id that is never charged.
    pub const BYPASS_TEAM: &'static str = "bypass";

    pub fn new(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            api_key_id: None,
            flags: TeamFlags::default(),
        }
    }

    pub fn zero_data_retention(&self) -> bool {
        self.flags.force_zdr
    }

    pub fn is_billing_bypassed(&self) -> bool {
        self.team_id == Self::BYPASS_TEAM
    }
}

/// Read-only context shared by every ticker of a batch.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_id: String,
    pub trace_id: String,
    pub team: TeamContext,
    pub origin: String,
}

impl BatchContext {
    pub fn new(team: TeamContext, origin: impl Into<String>) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            trace_id: stock_common::logging::generate_trace_id(),
            team,
            origin: origin.into(),
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// Output formats a scrape job can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Extract,
}

impl OutputFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Extract => "extract",
        }
    }
}

/// Non-empty set of requested output formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OutputFormats(Vec<OutputFormat>);

impl OutputFormats {
    /// Build the format list from the request options.
    pub fn from_options(options: &ScrapeRequestOptions) -> Result<Self, TickerError> {
        let mut formats = Vec::with_capacity(2);
        if options.want_markdown {
            formats.push(OutputFormat::Markdown);
        }
        if options.want_extract {
            formats.push(OutputFormat::Extract);
        }

        if formats.is_empty() {
            return Err(TickerError::InvalidOptions(
                "At least one format (markdown or extract) must be enabled".into(),
            ));
        }
        Ok(Self(formats))
    }

    pub fn contains(&self, format: OutputFormat) -> bool {
        self.0.contains(&format)
    }

    pub fn as_slice(&self) -> &[OutputFormat] {
        &self.0
    }

    /// Comma separated list for logging.
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(OutputFormat::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Extraction settings attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractOptions {
    pub schema: ExtractionSchema,
}

/// Normalized job description handed to the scrape engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJobSpec {
    pub job_id: String,
    pub url: String,
    pub mode: &'static str,
    pub formats: OutputFormats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractOptions>,
    pub timeout_ms: u64,
    pub team_id: String,
    pub api_key_id: Option<i64>,
    pub origin: String,
    pub priority: u32,
    pub is_scrape: bool,
    /// Billing happens once per batch, never per job
    pub bypass_billing: bool,
    pub zero_data_retention: bool,
    pub team_flags: TeamFlags,
    pub start_time: DateTime<Utc>,
}

/// Exclusive handle on a submitted job.
///
/// Not `Clone`: one ticker pipeline owns it for its lifetime. The team's
/// priority slot stays registered until the handle is dropped.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    slot: Option<PrioritySlot>,
}

impl JobHandle {
    #[cfg(test)]
    pub(crate) fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            slot: None,
        }
    }

    pub fn with_slot(job_id: impl Into<String>, slot: PrioritySlot) -> Self {
        Self {
            job_id: job_id.into(),
            slot: Some(slot),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn priority(&self) -> Option<u32> {
        self.slot.as_ref().map(PrioritySlot::priority)
    }
}

/// Output document produced by a finished job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub extract: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

// ============================================================================
// Results
// ============================================================================

/// Data reported for a successfully scraped ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockData {
    pub url: String,
    pub exchange: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<serde_json::Value>,
}

/// Terminal outcome of one ticker pipeline.
///
/// Serialized as `{ticker, success: true, data}` or
/// `{ticker, success: false, error}`.
#[derive(Debug, Clone, PartialEq)]
pub enum StockScrapeResult {
    Succeeded { ticker: String, data: StockData },
    Failed { ticker: String, error: String },
}

impl StockScrapeResult {
    pub fn ticker(&self) -> &str {
        match self {
            Self::Succeeded { ticker, .. } | Self::Failed { ticker, .. } => ticker,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn data(&self) -> Option<&StockData> {
        match self {
            Self::Succeeded { data, .. } => Some(data),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

impl Serialize for StockScrapeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StockScrapeResult", 3)?;
        state.serialize_field("ticker", self.ticker())?;
        state.serialize_field("success", &self.is_success())?;
        match self {
            Self::Succeeded { data, .. } => state.serialize_field("data", data)?,
            Self::Failed { error, .. } => state.serialize_field("error", error)?,
        }
        state.end()
    }
}

/// Aggregate counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[StockScrapeResult]) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
        }
    }
}
