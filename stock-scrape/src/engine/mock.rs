//! Scripted engine for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{EngineError, ScrapeJobEngine};
use crate::types::{Document, ScrapeJobSpec};

#[derive(Default)]
pub struct MockEngine {
    pub submitted: Mutex<Vec<ScrapeJobSpec>>,
    pub submit_calls: AtomicUsize,
    pub wait_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    pub submit_error: Option<EngineError>,
    pub outcome: Option<Result<Document, EngineError>>,
    pub remove_error: Option<EngineError>,
    /// Never complete; lets the caller's timeout fire
    pub hang: bool,
}

impl MockEngine {
    pub fn completing(doc: Document) -> Self {
        Self {
            outcome: Some(Ok(doc)),
            ..Default::default()
        }
    }

    pub fn failing(error: EngineError) -> Self {
        Self {
            outcome: Some(Err(error)),
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.submit_calls.load(Ordering::SeqCst),
            self.wait_calls.load(Ordering::SeqCst),
            self.remove_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ScrapeJobEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn submit(&self, spec: ScrapeJobSpec) -> Result<String, EngineError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref err) = self.submit_error {
            return Err(err.clone());
        }
        let id = spec.job_id.clone();
        self.submitted.lock().unwrap().push(spec);
        Ok(id)
    }

    async fn await_completion(
        &self,
        _job_id: &str,
        _timeout: Duration,
        _zero_data_retention: bool,
    ) -> Result<Document, EngineError> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcome
            .clone()
            .unwrap_or_else(|| Ok(Document::default()))
    }

    async fn remove(&self, _job_id: &str) -> Result<(), EngineError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        match self.remove_error {
            Some(ref err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
