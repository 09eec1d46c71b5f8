//! Stock Scrape - batch ticker scraping.
//!
//! Resolves ticker symbols to canonical quote pages, submits one scrape job
//! per ticker to an external engine and aggregates the per-ticker results.
//!
//! ## Modules
//!
//! - `search`: ticker → quote page resolution
//! - `blocklist`: URL policy check before any job is submitted
//! - `submitter` / `waiter`: job lifecycle against a [`engine::ScrapeJobEngine`]
//! - `assembler`: result data and markdown persistence
//! - `orchestrator`: concurrent per-ticker pipelines and batch summary
//! - `billing`: batch-level billing and job log
//! - `routes`: HTTP API

pub mod assembler;
pub mod billing;
pub mod blocklist;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod priority;
pub mod routes;
pub mod search;
pub mod service;
pub mod submitter;
pub mod types;
pub mod waiter;

pub use error::{ScrapeError, TickerError};
pub use orchestrator::{BatchOrchestrator, BatchOutcome, BatchRequest, TickerStage};
pub use routes::{build_router, AppState};
pub use types::{
    BatchContext, BatchSummary, Document, ScrapeRequestOptions, StockData, StockScrapeResult,
    TeamContext, TickerSymbol,
};
pub use waiter::CleanupPolicy;
