//! Builds scrape job specs and hands them to the engine.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{EngineError, ScrapeJobEngine};
use crate::error::TickerError;
use crate::priority::JobPriorityTracker;
use crate::types::{
    BatchContext, ExtractOptions, ExtractionSchema, JobHandle, OutputFormat, OutputFormats,
    ScrapeJobSpec, ScrapeRequestOptions,
};

/// Engine mode for single-page jobs.
const SINGLE_URL_MODE: &str = "single_urls";

pub struct ScrapeJobSubmitter {
    engine: Arc<dyn ScrapeJobEngine>,
    priority: Arc<JobPriorityTracker>,
}

impl ScrapeJobSubmitter {
    pub fn new(engine: Arc<dyn ScrapeJobEngine>, priority: Arc<JobPriorityTracker>) -> Self {
        Self { engine, priority }
    }

    /// Build the job spec for `url`.
    ///
    /// Fails with [`TickerError::InvalidOptions`] when no output format is
    /// requested.
    pub fn build_spec(
        url: &str,
        options: &ScrapeRequestOptions,
        ctx: &BatchContext,
        job_id: String,
        priority: u32,
    ) -> Result<ScrapeJobSpec, TickerError> {
        let formats = OutputFormats::from_options(options)?;

        let extract = formats.contains(OutputFormat::Extract).then(|| ExtractOptions {
            schema: options
                .extraction_schema
                .clone()
                .unwrap_or_else(ExtractionSchema::default_stock),
        });

        Ok(ScrapeJobSpec {
            job_id,
            url: url.to_string(),
            mode: SINGLE_URL_MODE,
            formats,
            extract,
            timeout_ms: options.timeout_ms,
            team_id: ctx.team.team_id.clone(),
            api_key_id: ctx.team.api_key_id,
            origin: ctx.origin.clone(),
            priority,
            is_scrape: true,
            bypass_billing: true,
            zero_data_retention: ctx.team.zero_data_retention(),
            team_flags: ctx.team.flags.clone(),
            start_time: Utc::now(),
        })
    }

    /// Submit a job for `url` and return its handle.
    ///
    /// The format check runs before any priority bookkeeping or engine call.
    /// The team's priority slot stays held until the handle is dropped.
    pub async fn submit(
        &self,
        url: &str,
        options: &ScrapeRequestOptions,
        ctx: &BatchContext,
    ) -> Result<JobHandle, TickerError> {
        OutputFormats::from_options(options)?;

        let slot = self.priority.acquire(&ctx.team.team_id);
        let priority = slot.priority();
        let job_id = uuid::Uuid::new_v4().to_string();

        let spec = Self::build_spec(url, options, ctx, job_id, priority)?;

        debug!(
            job_id = %spec.job_id,
            url = url,
            formats = %spec.formats.joined(),
            priority = priority,
            engine = self.engine.name(),
            "Submitting scrape job"
        );

        match self.engine.submit(spec).await {
            Ok(job_id) => {
                info!(job_id = %job_id, priority = priority, "Scrape job submitted");
                Ok(JobHandle::with_slot(job_id, slot))
            }
            Err(e) => {
                drop(slot);
                Err(match e {
                    EngineError::Timeout => {
                        TickerError::Timeout("Timed out submitting scrape job".into())
                    }
                    other => TickerError::Upstream(format!("Failed to submit scrape job: {}", other)),
                })
            }
        }
    }
}
