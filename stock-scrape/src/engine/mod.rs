//! Scrape job engine abstraction.
//!
//! The engine owns job execution. This service only submits jobs, waits on
//! them and removes them once consumed.

pub mod http;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::types::{Document, ScrapeJobSpec};

pub use http::HttpJobEngine;

/// Errors reported by a scrape engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Engine refused the job
    Rejected(String),
    /// Job ran and failed
    Failed(String),
    /// Job did not finish within the wait bound
    Timeout,
    /// Engine has no job with this id
    UnknownJob(String),
    /// Connection or protocol failure
    Transport(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "Job rejected: {}", msg),
            Self::Failed(msg) => write!(f, "{}", msg),
            Self::Timeout => write!(f, "Job wait timed out"),
            Self::UnknownJob(id) => write!(f, "Unknown job: {}", id),
            Self::Transport(msg) => write!(f, "Engine unreachable: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Asynchronous scrape job engine.
#[async_trait]
pub trait ScrapeJobEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Enqueue a job. Returns the id the engine registered it under.
    async fn submit(&self, spec: ScrapeJobSpec) -> Result<String, EngineError>;

    /// Block until the job completes, fails or `timeout` elapses.
    async fn await_completion(
        &self,
        job_id: &str,
        timeout: Duration,
        zero_data_retention: bool,
    ) -> Result<Document, EngineError>;

    /// Drop the job record from the engine.
    async fn remove(&self, job_id: &str) -> Result<(), EngineError>;
}
