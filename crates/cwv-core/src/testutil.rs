//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability so clones share state and tests
//! can assert on recorded calls.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::collect::{CollectEvent, CollectReporter};
use crate::error::AppError;
use crate::models::{Category, MeasurementRecord, PendingUrls, SaveOutcome, Strategy, UrlRecord};
use crate::traits::{MeasurementFetcher, MeasurementStore, PendingUrlSelector, Sleeper};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A mobile URL with id `url_id`.
pub fn make_test_url(url_id: i64) -> UrlRecord {
    make_test_url_with(url_id, &format!("https://example.com/page/{url_id}"), Strategy::Mobile)
}

pub fn make_test_url_with(url_id: i64, url: &str, device: Strategy) -> UrlRecord {
    UrlRecord {
        url_id,
        url: url.to_string(),
        device: device.as_str().to_string(),
        page_type: "home".to_string(),
        brand: "test-brand".to_string(),
        category: "general".to_string(),
        country_id: "ES".to_string(),
        created_at: None,
    }
}

/// Minimal PageSpeed Insights response carrying lab and field data.
pub fn performance_response(score: f64) -> Value {
    json!({
        "loadingExperience": {
            "metrics": {
                "LARGEST_CONTENTFUL_PAINT_MS": {"percentile": 2400},
                "INTERACTION_TO_NEXT_PAINT": {"percentile": 150},
                "CUMULATIVE_LAYOUT_SHIFT_SCORE": {"percentile": 8},
                "FIRST_CONTENTFUL_PAINT_MS": {"percentile": 1600},
                "EXPERIMENTAL_TIME_TO_FIRST_BYTE": {"percentile": 700}
            }
        },
        "lighthouseResult": {
            "categories": {"performance": {"score": score}},
            "audits": {
                "first-contentful-paint": {"numericValue": 1500.0},
                "largest-contentful-paint": {"numericValue": 2500.0},
                "total-blocking-time": {"numericValue": 200.0},
                "cumulative-layout-shift": {"numericValue": 0.1},
                "speed-index": {"numericValue": 3100.0},
                "server-response-time": {"numericValue": 350.0},
                "interactive": {"numericValue": 4200.0}
            }
        }
    })
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

type Response = Result<Value, AppError>;
type Fallback = Arc<dyn Fn() -> Response + Send + Sync>;

/// Mock fetcher with scripted responses.
///
/// Per-URL scripts take precedence over the shared queue. When both are
/// empty the fallback answers.
#[derive(Clone)]
pub struct MockFetcher {
    queue: Arc<Mutex<Vec<Response>>>,
    per_url: Arc<Mutex<HashMap<i64, Vec<Response>>>>,
    fallback: Fallback,
    calls: Arc<Mutex<Vec<i64>>>,
}

impl MockFetcher {
    fn build(queue: Vec<Response>, fallback: Fallback) -> Self {
        Self {
            queue: Arc::new(Mutex::new(queue)),
            per_url: Arc::new(Mutex::new(HashMap::new())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every call with `response`.
    pub fn new(response: Value) -> Self {
        Self::build(Vec::new(), Arc::new(move || Ok(response.clone())))
    }

    /// Fails the first call, then falls back to a default response.
    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Response>) -> Self {
        Self::build(responses, Arc::new(|| Ok(performance_response(0.5))))
    }

    /// Fails every call with a fresh error from `make_error`.
    pub fn always<E>(make_error: E) -> Self
    where
        E: Fn() -> AppError + Send + Sync + 'static,
    {
        Self::build(Vec::new(), Arc::new(move || Err(make_error())))
    }

    /// Script the responses for one URL.
    pub fn on_url(self, url_id: i64, responses: Vec<Response>) -> Self {
        self.per_url.lock().unwrap().insert(url_id, responses);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, url_id: i64) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == url_id)
            .count()
    }
}

impl MeasurementFetcher for MockFetcher {
    async fn fetch(&self, target: &UrlRecord, _category: Category) -> Result<Value, AppError> {
        self.calls.lock().unwrap().push(target.url_id);

        if let Some(script) = self.per_url.lock().unwrap().get_mut(&target.url_id)
            && !script.is_empty()
        {
            return script.remove(0);
        }

        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            (self.fallback)()
        } else {
            queue.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockSelector
// ---------------------------------------------------------------------------

/// Selector that treats every configured URL as pending.
#[derive(Clone)]
pub struct MockSelector {
    urls: Vec<UrlRecord>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSelector {
    pub fn new(urls: Vec<UrlRecord>) -> Self {
        Self {
            urls,
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            urls: Vec::new(),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl PendingUrlSelector for MockSelector {
    async fn select_pending(&self, _execution_date: NaiveDate) -> Result<PendingUrls, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(PendingUrls {
            total_urls: self.urls.len() as u64,
            pending: self.urls.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Store that records saved measurements and can fail on chosen URLs.
#[derive(Clone, Default)]
pub struct MockStore {
    saved: Arc<Mutex<Vec<MeasurementRecord>>>,
    existing: Arc<Mutex<HashSet<(i64, NaiveDate)>>>,
    failures: Arc<Mutex<HashMap<i64, AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A store that already holds a row for `(url_id, execution_date)`.
    pub fn with_existing(url_id: i64, execution_date: NaiveDate) -> Self {
        let store = Self::default();
        store
            .existing
            .lock()
            .unwrap()
            .insert((url_id, execution_date));
        store
    }

    /// Fail the next save for `url_id` with `error`.
    pub fn fail_for(self, url_id: i64, error: AppError) -> Self {
        self.failures.lock().unwrap().insert(url_id, error);
        self
    }

    pub fn saved(&self) -> Vec<MeasurementRecord> {
        self.saved.lock().unwrap().clone()
    }
}

impl MeasurementStore for MockStore {
    async fn save(&self, record: &MeasurementRecord) -> Result<SaveOutcome, AppError> {
        if let Some(e) = self.failures.lock().unwrap().remove(&record.url_id) {
            return Err(e);
        }
        let key = (record.url_id, record.execution_date);
        if !self.existing.lock().unwrap().insert(key) {
            return Ok(SaveOutcome::AlreadyExists);
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(SaveOutcome::Inserted)
    }
}

// ---------------------------------------------------------------------------
// InMemoryRepository
// ---------------------------------------------------------------------------

/// URL table and measurement table in memory, acting as both selector
/// and store so re-runs see earlier writes.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    urls: Arc<Mutex<Vec<UrlRecord>>>,
    records: Arc<Mutex<BTreeMap<(i64, NaiveDate), MeasurementRecord>>>,
}

impl InMemoryRepository {
    pub fn with_urls(urls: Vec<UrlRecord>) -> Self {
        Self {
            urls: Arc::new(Mutex::new(urls)),
            records: Arc::default(),
        }
    }

    pub fn get(&self, url_id: i64, execution_date: NaiveDate) -> Option<MeasurementRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(url_id, execution_date))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl PendingUrlSelector for InMemoryRepository {
    async fn select_pending(&self, execution_date: NaiveDate) -> Result<PendingUrls, AppError> {
        let urls = self.urls.lock().unwrap();
        let records = self.records.lock().unwrap();
        let mut pending: Vec<UrlRecord> = urls
            .iter()
            .filter(|u| !records.contains_key(&(u.url_id, execution_date)))
            .cloned()
            .collect();
        pending.sort_by_key(|u| u.url_id);
        Ok(PendingUrls {
            total_urls: urls.len() as u64,
            pending,
        })
    }
}

impl MeasurementStore for InMemoryRepository {
    async fn save(&self, record: &MeasurementRecord) -> Result<SaveOutcome, AppError> {
        let mut records = self.records.lock().unwrap();
        let key = (record.url_id, record.execution_date);
        if records.contains_key(&key) {
            return Ok(SaveOutcome::AlreadyExists);
        }
        records.insert(key, record.clone());
        Ok(SaveOutcome::Inserted)
    }
}

// ---------------------------------------------------------------------------
// RecordingSleeper
// ---------------------------------------------------------------------------

/// Sleeper that returns immediately and remembers each requested delay.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names, optionally cancelling a run once
/// the first measurement is stored.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
    stored: Arc<Mutex<Vec<(i64, bool)>>>,
    cancel_on_store: Option<CancellationToken>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after_first_store(token: CancellationToken) -> Self {
        Self {
            cancel_on_store: Some(token),
            ..Self::default()
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// `(url_id, field_data)` for every stored measurement.
    pub fn stored(&self) -> Vec<(i64, bool)> {
        self.stored.lock().unwrap().clone()
    }
}

impl CollectReporter for MockReporter {
    fn report(&self, event: CollectEvent<'_>) {
        let label = match event {
            CollectEvent::RunStarted { .. } => "RunStarted",
            CollectEvent::UrlStarted { .. } => "UrlStarted",
            CollectEvent::UrlStored {
                url_id, field_data, ..
            } => {
                self.stored.lock().unwrap().push((url_id, field_data));
                if let Some(token) = &self.cancel_on_store {
                    token.cancel();
                }
                "UrlStored"
            }
            CollectEvent::UrlSkipped { .. } => "UrlSkipped",
            CollectEvent::UrlFailed { .. } => "UrlFailed",
            CollectEvent::Cancelled { .. } => "Cancelled",
            CollectEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
