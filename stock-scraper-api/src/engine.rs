//! Scrape engine backed by a synchronous `POST /v1/scrape` service.
//!
//! `submit` only records the job. The scrape itself runs inside
//! `await_completion`, bounded by the wait timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use stock_scrape::engine::{EngineError, ScrapeJobEngine};
use stock_scrape::types::{Document, ExtractOptions, OutputFormats, ScrapeJobSpec};

#[derive(Debug, Serialize)]
struct ScrapePayload<'a> {
    url: &'a str,
    formats: &'a OutputFormats,
    #[serde(skip_serializing_if = "Option::is_none")]
    extract: Option<&'a ExtractOptions>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Document>,
    #[serde(default)]
    error: Option<String>,
}

pub struct SiblingScrapeEngine {
    client: reqwest::Client,
    base_url: String,
    pending: Mutex<HashMap<String, ScrapeJobSpec>>,
}

impl SiblingScrapeEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Jobs recorded and not yet removed.
    pub fn pending_jobs(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn pending_spec(&self, job_id: &str) -> Option<ScrapeJobSpec> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(job_id)
            .cloned()
    }
}

#[async_trait]
impl ScrapeJobEngine for SiblingScrapeEngine {
    fn name(&self) -> &'static str {
        "sibling-scrape"
    }

    async fn submit(&self, spec: ScrapeJobSpec) -> Result<String, EngineError> {
        let id = spec.job_id.clone();
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone(), spec);
        Ok(id)
    }

    async fn await_completion(
        &self,
        job_id: &str,
        timeout: Duration,
        _zero_data_retention: bool,
    ) -> Result<Document, EngineError> {
        let spec = self
            .pending_spec(job_id)
            .ok_or_else(|| EngineError::UnknownJob(job_id.to_string()))?;

        debug!(
            job_id = job_id,
            url = %spec.url,
            formats = %spec.formats.joined(),
            "Calling scrape service"
        );

        let response = self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .timeout(timeout)
            .json(&ScrapePayload {
                url: &spec.url,
                formats: &spec.formats,
                extract: spec.extract.as_ref(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout
                } else {
                    EngineError::Transport(e.to_string())
                }
            })?;

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Transport(format!("Failed to parse scrape response: {}", e)))?;

        if !body.success {
            return Err(EngineError::Failed(
                body.error.unwrap_or_else(|| "Unknown error".into()),
            ));
        }

        Ok(body.data.unwrap_or_default())
    }

    async fn remove(&self, job_id: &str) -> Result<(), EngineError> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(job_id);
        Ok(())
    }
}
