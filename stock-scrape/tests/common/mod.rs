//! Shared mock collaborators for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use stock_common::{Error, Result};
use stock_scrape::assembler::{MarkdownStore, ResultAssembler};
use stock_scrape::billing::{BillingLedger, BillingReporter, JobLogEntry, JobLogger};
use stock_scrape::blocklist::BlockListGuard;
use stock_scrape::engine::{EngineError, ScrapeJobEngine};
use stock_scrape::priority::JobPriorityTracker;
use stock_scrape::search::{
    FinanceSearch, QuoteDescriptor, SearchError, SearchResolver, WebSearch, WebSearchHit,
};
use stock_scrape::submitter::ScrapeJobSubmitter;
use stock_scrape::types::{Document, ScrapeJobSpec};
use stock_scrape::waiter::JobWaiter;
use stock_scrape::BatchOrchestrator;

pub const SITE: &str = "https://www.investing.com";

// ============================================================================
// Search
// ============================================================================

/// Finance search answering from a fixed table keyed by upper-cased ticker.
#[derive(Default)]
pub struct MockFinance {
    pub quotes: HashMap<String, std::result::Result<Vec<QuoteDescriptor>, SearchError>>,
    pub calls: AtomicUsize,
}

impl MockFinance {
    pub fn with_quote(mut self, ticker: &str, path: &str) -> Self {
        self.quotes.insert(
            ticker.to_uppercase(),
            Ok(vec![QuoteDescriptor {
                url: path.to_string(),
                exchange: "NASDAQ".into(),
                description: format!("{} Inc", ticker),
                symbol: ticker.to_uppercase(),
            }]),
        );
        self
    }

    pub fn with_error(mut self, ticker: &str, error: SearchError) -> Self {
        self.quotes.insert(ticker.to_uppercase(), Err(error));
        self
    }
}

#[async_trait]
impl FinanceSearch for MockFinance {
    async fn lookup(&self, query: &str) -> std::result::Result<Vec<QuoteDescriptor>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.quotes
            .get(&query.to_uppercase())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Default)]
pub struct MockWeb {
    pub hits: Vec<WebSearchHit>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl WebSearch for MockWeb {
    async fn search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> std::result::Result<Vec<WebSearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.clone())
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Clone)]
pub enum JobScript {
    Complete(Document),
    Fail(String),
    Hang,
}

/// Engine whose job outcomes are scripted by target URL.
pub struct MockEngine {
    scripts: HashMap<String, JobScript>,
    jobs: Mutex<HashMap<String, String>>,
    pub submitted: Mutex<Vec<ScrapeJobSpec>>,
    pub submit_calls: AtomicUsize,
    pub wait_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    /// Delay before a scripted job resolves
    pub latency: Duration,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            jobs: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            wait_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
            latency: Duration::from_millis(5),
        }
    }

    pub fn script(mut self, url: &str, script: JobScript) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> usize {
        self.wait_calls.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

pub fn markdown_doc(markdown: &str) -> Document {
    Document {
        markdown: Some(markdown.to_string()),
        extract: Some(serde_json::json!({"currentPrice": 100.0})),
        metadata: None,
    }
}

#[async_trait]
impl ScrapeJobEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn submit(&self, spec: ScrapeJobSpec) -> std::result::Result<String, EngineError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let id = spec.job_id.clone();
        self.jobs
            .lock()
            .unwrap()
            .insert(id.clone(), spec.url.clone());
        self.submitted.lock().unwrap().push(spec);
        Ok(id)
    }

    async fn await_completion(
        &self,
        job_id: &str,
        _timeout: Duration,
        _zero_data_retention: bool,
    ) -> std::result::Result<Document, EngineError> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        let url = self
            .jobs
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownJob(job_id.to_string()))?;

        tokio::time::sleep(self.latency).await;
        match self.scripts.get(&url).cloned() {
            Some(JobScript::Complete(doc)) => Ok(doc),
            Some(JobScript::Fail(msg)) => Err(EngineError::Failed(msg)),
            Some(JobScript::Hang) => std::future::pending().await,
            None => Ok(markdown_doc(&format!("# {}", url))),
        }
    }

    async fn remove(&self, job_id: &str) -> std::result::Result<(), EngineError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().remove(job_id);
        Ok(())
    }
}

// ============================================================================
// Billing / storage
// ============================================================================

#[derive(Default)]
pub struct MockLedger {
    pub charges: Mutex<Vec<(String, usize)>>,
}

impl MockLedger {
    pub fn calls(&self) -> usize {
        self.charges.lock().unwrap().len()
    }
}

#[async_trait]
impl BillingLedger for MockLedger {
    async fn charge(&self, team_id: &str, units: usize, _api_key_id: Option<i64>) -> Result<()> {
        self.charges
            .lock()
            .unwrap()
            .push((team_id.to_string(), units));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockJobLogger {
    pub entries: Mutex<Vec<JobLogEntry>>,
}

#[async_trait]
impl JobLogger for MockJobLogger {
    async fn record(&self, entry: &JobLogEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockStore {
    pub saved: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[async_trait]
impl MarkdownStore for MockStore {
    async fn save(&self, stem: &str, contents: &str) -> Result<String> {
        if self.fail {
            return Err(Error::Internal("disk full".into()));
        }
        let path = format!("{}.md", stem);
        self.saved
            .lock()
            .unwrap()
            .push((path.clone(), contents.to_string()));
        Ok(path)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub finance: Arc<MockFinance>,
    pub web: Arc<MockWeb>,
    pub engine: Arc<MockEngine>,
    pub ledger: Arc<MockLedger>,
    pub job_logger: Arc<MockJobLogger>,
    pub store: Arc<MockStore>,
    pub priority: Arc<JobPriorityTracker>,
    pub orchestrator: BatchOrchestrator,
}

impl Harness {
    pub fn new(finance: MockFinance, engine: MockEngine) -> Self {
        Self::with_guard(finance, MockWeb::default(), engine, BlockListGuard::default())
    }

    pub fn with_guard(
        finance: MockFinance,
        web: MockWeb,
        engine: MockEngine,
        guard: BlockListGuard,
    ) -> Self {
        let finance = Arc::new(finance);
        let web = Arc::new(web);
        let engine = Arc::new(engine);
        let ledger = Arc::new(MockLedger::default());
        let job_logger = Arc::new(MockJobLogger::default());
        let store = Arc::new(MockStore::default());
        let priority = Arc::new(JobPriorityTracker::default());

        let resolver = SearchResolver::new(finance.clone(), web.clone(), SITE, "investing.com");
        let orchestrator = BatchOrchestrator::new(
            Arc::new(resolver),
            Arc::new(guard),
            Arc::new(ScrapeJobSubmitter::new(engine.clone(), priority.clone())),
            Arc::new(JobWaiter::new(engine.clone())),
            Arc::new(ResultAssembler::new(store.clone())),
        )
        .with_billing(Arc::new(BillingReporter::new(
            ledger.clone(),
            job_logger.clone(),
        )));

        Self {
            finance,
            web,
            engine,
            ledger,
            job_logger,
            store,
            priority,
            orchestrator,
        }
    }

    pub fn finance_calls(&self) -> usize {
        self.finance.calls.load(Ordering::SeqCst)
    }
}
