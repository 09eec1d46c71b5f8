//! Configuration management for the stock scrape services.
//!
//! Both services share a configuration file at `~/.stockscrape/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Service Ports
//! - `STOCK_SCRAPE_PORT` → services.scrape.port
//! - `STOCK_SCRAPER_API_PORT` or `PORT` → services.legacy.port
//! - `STOCK_BIND_ADDRESS` → network.bind
//!
//! ## Scraping
//! - `INVESTING_COM_SEARCH_MODE` → scrape.search_mode
//! - `STOCK_SCRAPER_OUTPUT_DIR` → scrape.output_dir
//! - `SCRAPE_ENGINE_URL` / `SCRAPE_ENGINE_API_KEY` → scrape.engine_url / scrape.engine_api_key
//! - `FIRECRAWL_API_URL` → scrape.sibling_scrape_url
//! - `WEB_SEARCH_URL` / `WEB_SEARCH_API_KEY` → scrape.web_search_url / scrape.web_search_api_key
//! - `BILLING_LEDGER_URL` → scrape.billing_url
//!
//! ## Logging
//! - `STOCK_LOG_LEVEL` → observability.log_level
//! - `STOCK_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".stockscrape"),
        |dirs| dirs.home_dir().join(".stockscrape"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Global network configuration.
///
/// Default bind address is `127.0.0.1` (local only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address for all services.
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

// ============================================================================
// Services Port Configuration
// ============================================================================

/// Service port configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    /// Batch scrape service (job engine adapter)
    #[serde(default)]
    pub scrape: ServicePortConfig,

    /// Legacy standalone scraper API
    #[serde(default)]
    pub legacy: ServicePortConfig,
}

/// Individual service port configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicePortConfig {
    /// Port number for the service
    #[serde(default)]
    pub port: Option<u16>,
}

// ============================================================================
// Search Strategy
// ============================================================================

/// How a ticker symbol is resolved to its canonical quote page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// Direct lookup against the finance site's own search API.
    #[serde(rename = "investingcom-api", alias = "direct")]
    DirectFinanceApi,
    /// Free-text web search filtered to the finance site's domain.
    #[serde(rename = "firecrawl-search", alias = "web-search")]
    GenericWebSearch,
}

impl SearchStrategy {
    /// Wire name of the strategy.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DirectFinanceApi => "investingcom-api",
            Self::GenericWebSearch => "firecrawl-search",
        }
    }

    /// All recognised wire names.
    pub const NAMES: &'static [&'static str] =
        &["investingcom-api", "firecrawl-search", "direct", "web-search"];
}

impl Default for SearchStrategy {
    fn default() -> Self {
        Self::DirectFinanceApi
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "investingcom-api" | "direct" => Ok(Self::DirectFinanceApi),
            "firecrawl-search" | "web-search" => Ok(Self::GenericWebSearch),
            other => Err(format!(
                "unknown search mode '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

// ============================================================================
// Scrape Configuration
// ============================================================================

/// Settings for ticker resolution, job submission and result persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Process-wide default search strategy (raw; checked by `validate`)
    #[serde(default = "default_search_mode")]
    pub search_mode: String,

    /// Finance site search API
    #[serde(default = "default_finance_search_url")]
    pub finance_search_url: String,

    /// Base host joined with the relative quote path
    #[serde(default = "default_finance_site_base")]
    pub finance_site_base: String,

    /// Domain that web search results must belong to
    #[serde(default = "default_target_domain")]
    pub target_domain: String,

    /// Upper bound for a single finance lookup
    #[serde(default = "default_finance_search_timeout_ms")]
    pub finance_search_timeout_ms: u64,

    /// Generic web search endpoint
    #[serde(default = "default_web_search_url")]
    pub web_search_url: String,

    #[serde(default)]
    pub web_search_api_key: Option<String>,

    /// Number of web search results to inspect
    #[serde(default = "default_web_search_limit")]
    pub web_search_limit: usize,

    /// Scrape job engine base URL
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    #[serde(default)]
    pub engine_api_key: Option<String>,

    /// Interval between job status polls
    #[serde(default = "default_engine_poll_interval_ms")]
    pub engine_poll_interval_ms: u64,

    /// Synchronous scrape service used by the legacy API
    #[serde(default = "default_sibling_scrape_url")]
    pub sibling_scrape_url: String,

    /// Job wait bound when the request does not carry one
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Directory rendered markdown is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Domains denied in addition to the built-in blocklist
    #[serde(default)]
    pub blocked_domains: Vec<String>,

    /// Billing ledger endpoint; charges are only logged when unset
    #[serde(default)]
    pub billing_url: Option<String>,

    /// JSON-lines job log; defaults to `~/.stockscrape/jobs.jsonl`
    #[serde(default)]
    pub job_log_path: Option<String>,

    /// Base job priority (lower runs sooner)
    #[serde(default = "default_base_priority")]
    pub base_priority: u32,

    /// In-flight jobs a team may hold before its priority degrades
    #[serde(default = "default_priority_bucket_limit")]
    pub priority_bucket_limit: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_mode: default_search_mode(),
            finance_search_url: default_finance_search_url(),
            finance_site_base: default_finance_site_base(),
            target_domain: default_target_domain(),
            finance_search_timeout_ms: default_finance_search_timeout_ms(),
            web_search_url: default_web_search_url(),
            web_search_api_key: None,
            web_search_limit: default_web_search_limit(),
            engine_url: default_engine_url(),
            engine_api_key: None,
            engine_poll_interval_ms: default_engine_poll_interval_ms(),
            sibling_scrape_url: default_sibling_scrape_url(),
            default_timeout_ms: default_timeout_ms(),
            output_dir: default_output_dir(),
            blocked_domains: Vec::new(),
            billing_url: None,
            job_log_path: None,
            base_priority: default_base_priority(),
            priority_bucket_limit: default_priority_bucket_limit(),
        }
    }
}

impl ScrapeConfig {
    /// Parse the configured default search strategy.
    pub fn search_strategy(&self) -> std::result::Result<SearchStrategy, String> {
        self.search_mode.parse()
    }

    /// Resolved job log path.
    pub fn job_log_path(&self) -> PathBuf {
        self.job_log_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("jobs.jsonl"))
    }
}

fn default_search_mode() -> String {
    SearchStrategy::DirectFinanceApi.as_str().into()
}

fn default_finance_search_url() -> String {
    "https://api.investing.com/api/search/v2/search".into()
}

fn default_finance_site_base() -> String {
    "https://www.investing.com".into()
}

fn default_target_domain() -> String {
    "investing.com".into()
}

fn default_finance_search_timeout_ms() -> u64 {
    10_000
}

fn default_web_search_url() -> String {
    "http://localhost:3002/v1/search".into()
}

fn default_web_search_limit() -> usize {
    5
}

fn default_engine_url() -> String {
    "http://localhost:3002".into()
}

fn default_engine_poll_interval_ms() -> u64 {
    500
}

fn default_sibling_scrape_url() -> String {
    "http://firecrawl-api:3002".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_output_dir() -> String {
    "./stock-output".into()
}

fn default_base_priority() -> u32 {
    10
}

fn default_priority_bucket_limit() -> usize {
    25
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to set to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure for the stock scrape services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Global network configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Service port configuration
    #[serde(default)]
    pub services: ServicesConfig,

    /// Ticker scraping configuration
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparsable port values are ignored; everything else is taken verbatim
    /// and checked later by `validate`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("STOCK_SCRAPE_PORT").and_then(|p| p.parse().ok()) {
            self.services.scrape.port = Some(port);
        }
        if let Some(port) = lookup("STOCK_SCRAPER_API_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|p| p.parse().ok())
        {
            self.services.legacy.port = Some(port);
        }
        if let Some(bind) = lookup("STOCK_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Some(level) = lookup("STOCK_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("STOCK_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(mode) = lookup("INVESTING_COM_SEARCH_MODE") {
            self.scrape.search_mode = mode;
        }
        if let Some(dir) = lookup("STOCK_SCRAPER_OUTPUT_DIR") {
            self.scrape.output_dir = dir;
        }
        if let Some(url) = lookup("SCRAPE_ENGINE_URL") {
            self.scrape.engine_url = url;
        }
        if let Some(key) = lookup("SCRAPE_ENGINE_API_KEY") {
            self.scrape.engine_api_key = Some(key);
        }
        if let Some(url) = lookup("FIRECRAWL_API_URL") {
            self.scrape.sibling_scrape_url = url;
        }
        if let Some(url) = lookup("WEB_SEARCH_URL") {
            self.scrape.web_search_url = url;
        }
        if let Some(key) = lookup("WEB_SEARCH_API_KEY") {
            self.scrape.web_search_api_key = Some(key);
        }
        if let Some(url) = lookup("BILLING_LEDGER_URL") {
            self.scrape.billing_url = Some(url);
        }
    }

    /// Get the effective bind address.
    pub fn bind_address(&self) -> &str {
        &self.network.bind
    }

    /// Port of the batch scrape service.
    pub fn scrape_port(&self) -> u16 {
        self.services.scrape.port.unwrap_or(4440)
    }

    /// Port of the legacy scraper API.
    pub fn legacy_port(&self) -> u16 {
        self.services.legacy.port.unwrap_or(3003)
    }
}
