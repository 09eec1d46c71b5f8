//! HTTP client for a queue-backed scrape engine.
//!
//! Protocol:
//! - `POST {base}/v1/jobs` with the job spec, answers `{success, id}`
//! - `GET {base}/v1/jobs/{id}` answers `{status, data?, error?}`
//! - `DELETE {base}/v1/jobs/{id}`

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EngineError, ScrapeJobEngine};
use crate::types::{Document, ScrapeJobSpec};
use stock_common::ScrapeConfig;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: JobState,
    data: Option<Document>,
    error: Option<String>,
}

pub struct HttpJobEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
}

impl HttpJobEngine {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, poll_interval: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            poll_interval,
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(
            config.engine_url.clone(),
            config.engine_api_key.clone(),
            Duration::from_millis(config.engine_poll_interval_ms),
        )
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/v1/jobs/{}", self.base_url, job_id)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn poll_once(&self, job_id: &str, zdr: bool) -> Result<StatusResponse, EngineError> {
        let response = self
            .authorized(self.client.get(self.job_url(job_id)))
            .query(&[("zeroDataRetention", zdr)])
            .send()
            .await
            .map_err(EngineError::from_reqwest)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::UnknownJob(job_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Transport(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Transport(format!("Failed to parse job status: {}", e)))
    }

    async fn poll_until_done(&self, job_id: &str, zdr: bool) -> Result<Document, EngineError> {
        loop {
            let state = self.poll_once(job_id, zdr).await?;
            match state.status {
                JobState::Completed => {
                    return state.data.ok_or_else(|| {
                        EngineError::Failed("Job completed without a document".into())
                    });
                }
                JobState::Failed => {
                    return Err(EngineError::Failed(
                        state.error.unwrap_or_else(|| "Unknown error".into()),
                    ));
                }
                JobState::Waiting | JobState::Active => {
                    debug!(job_id = job_id, status = ?state.status, "Job pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl ScrapeJobEngine for HttpJobEngine {
    fn name(&self) -> &'static str {
        "http-queue"
    }

    async fn submit(&self, spec: ScrapeJobSpec) -> Result<String, EngineError> {
        let response = self
            .authorized(self.client.post(format!("{}/v1/jobs", self.base_url)))
            .json(&spec)
            .send()
            .await
            .map_err(EngineError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Transport(format!("Failed to parse submit response: {}", e)))?;

        if !body.success {
            return Err(EngineError::Rejected(
                body.error.unwrap_or_else(|| "Unknown error".into()),
            ));
        }

        let id = body.id.unwrap_or_else(|| spec.job_id.clone());
        if id != spec.job_id {
            warn!(requested = %spec.job_id, assigned = %id, "Engine assigned a different job id");
        }
        Ok(id)
    }

    async fn await_completion(
        &self,
        job_id: &str,
        timeout: Duration,
        zero_data_retention: bool,
    ) -> Result<Document, EngineError> {
        tokio::time::timeout(timeout, self.poll_until_done(job_id, zero_data_retention))
            .await
            .map_err(|_| EngineError::Timeout)?
    }

    async fn remove(&self, job_id: &str) -> Result<(), EngineError> {
        let response = self
            .authorized(self.client.delete(self.job_url(job_id)))
            .send()
            .await
            .map_err(EngineError::from_reqwest)?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(EngineError::Transport(format!("HTTP {} removing job", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractionSchema, OutputFormats, ScrapeRequestOptions, TeamFlags};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec(job_id: &str) -> ScrapeJobSpec {
        let options = ScrapeRequestOptions::default();
        ScrapeJobSpec {
            job_id: job_id.into(),
            url: "https://www.investing.com/equities/apple-computer-inc".into(),
            mode: "single_urls",
            formats: OutputFormats::from_options(&options).unwrap(),
            extract: Some(crate::types::ExtractOptions {
                schema: ExtractionSchema::default_stock(),
            }),
            timeout_ms: 30_000,
            team_id: "team-1".into(),
            api_key_id: None,
            origin: "api".into(),
            priority: 10,
            is_scrape: true,
            bypass_billing: true,
            zero_data_retention: false,
            team_flags: TeamFlags::default(),
            start_time: chrono::Utc::now(),
        }
    }

    fn engine(server: &MockServer) -> HttpJobEngine {
        HttpJobEngine::new(server.uri(), None, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_submit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .and(body_partial_json(serde_json::json!({
                "jobId": "job-1",
                "formats": ["markdown"],
                "bypassBilling": true,
                "isScrape": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "id": "job-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = engine(&server).submit(spec("job-1")).await.unwrap();
        assert_eq!(id, "job-1");
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": false, "error": "queue full"})),
            )
            .mount(&server)
            .await;

        let err = engine(&server).submit(spec("job-1")).await.unwrap_err();
        assert_eq!(err, EngineError::Rejected("queue full".into()));
    }

    #[tokio::test]
    async fn test_await_completion_polls_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "active"})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "data": {"markdown": "# Apple Inc", "extract": {"currentPrice": 190.5}}
            })))
            .mount(&server)
            .await;

        let doc = engine(&server)
            .await_completion("job-2", Duration::from_secs(2), false)
            .await
            .unwrap();
        assert_eq!(doc.markdown.as_deref(), Some("# Apple Inc"));
        assert_eq!(doc.extract.unwrap()["currentPrice"], 190.5);
    }

    #[tokio::test]
    async fn test_await_completion_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failed",
                "error": "page returned 403"
            })))
            .mount(&server)
            .await;

        let err = engine(&server)
            .await_completion("job-3", Duration::from_secs(2), false)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Failed("page returned 403".into()));
    }

    #[tokio::test]
    async fn test_await_completion_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "waiting"})),
            )
            .mount(&server)
            .await;

        let err = engine(&server)
            .await_completion("job-4", Duration::from_millis(100), false)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Timeout);
    }

    #[tokio::test]
    async fn test_remove() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/jobs/job-5"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        assert!(engine(&server).remove("job-5").await.is_ok());
    }
}
