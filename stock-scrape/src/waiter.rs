//! Waits on submitted jobs and cleans them up.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::engine::{EngineError, ScrapeJobEngine};
use crate::error::TickerError;
use crate::types::{Document, JobHandle};

/// When a finished job is removed from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Remove only after a successful wait. Failed or timed-out jobs are
    /// left to the engine's own retention.
    #[default]
    OnSuccessOnly,
    /// Remove after every wait, whatever its outcome.
    Always,
}

pub struct JobWaiter {
    engine: Arc<dyn ScrapeJobEngine>,
    cleanup: CleanupPolicy,
}

impl JobWaiter {
    pub fn new(engine: Arc<dyn ScrapeJobEngine>) -> Self {
        Self {
            engine,
            cleanup: CleanupPolicy::default(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Wait at most `timeout_ms` for the job behind `handle`.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        timeout_ms: u64,
        zero_data_retention: bool,
    ) -> Result<Document, TickerError> {
        let job_id = handle.job_id();
        let timeout = Duration::from_millis(timeout_ms);

        let outcome = match tokio::time::timeout(
            timeout,
            self.engine
                .await_completion(job_id, timeout, zero_data_retention),
        )
        .await
        {
            Ok(result) => result.map_err(|e| map_engine_error(e, job_id, timeout_ms)),
            Err(_) => Err(timed_out(job_id, timeout_ms)),
        };

        let should_remove = match self.cleanup {
            CleanupPolicy::OnSuccessOnly => outcome.is_ok(),
            CleanupPolicy::Always => true,
        };
        if should_remove {
            self.remove(job_id).await;
        }

        outcome
    }

    async fn remove(&self, job_id: &str) {
        match self.engine.remove(job_id).await {
            Ok(()) => debug!(job_id = job_id, "Removed job from engine"),
            Err(e) => warn!(job_id = job_id, error = %e, "Failed to remove job from engine"),
        }
    }
}

fn timed_out(job_id: &str, timeout_ms: u64) -> TickerError {
    TickerError::Timeout(format!(
        "Scrape job {} timed out after {} ms",
        job_id, timeout_ms
    ))
}

fn map_engine_error(e: EngineError, job_id: &str, timeout_ms: u64) -> TickerError {
    match e {
        EngineError::Timeout => timed_out(job_id, timeout_ms),
        EngineError::Failed(msg) => TickerError::JobFailed(msg),
        other => TickerError::Upstream(other.to_string()),
    }
}
