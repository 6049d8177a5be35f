use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{Category, MeasurementRecord, PendingUrls, SaveOutcome, UrlRecord};

/// Computes the URLs that still lack a measurement for a date.
pub trait PendingUrlSelector: Send + Sync + Clone {
    /// Returns the pending URLs ordered by url_id, plus the total URL count.
    ///
    /// Implementations must compute the set difference in the backing
    /// store rather than checking URLs one by one.
    fn select_pending(
        &self,
        execution_date: NaiveDate,
    ) -> impl Future<Output = Result<PendingUrls, AppError>> + Send;
}

/// Calls the measurement API for a single URL and returns the raw JSON.
pub trait MeasurementFetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        target: &UrlRecord,
        category: Category,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Turns a raw API response into a measurement record. Must be pure.
pub trait MeasurementMapper: Send + Sync + Clone {
    fn map(
        &self,
        url_id: i64,
        execution_date: NaiveDate,
        response: &serde_json::Value,
    ) -> Result<MeasurementRecord, AppError>;
}

/// Persists measurements, at most one per (url_id, execution_date).
pub trait MeasurementStore: Send + Sync + Clone {
    /// Insert the record, or report [`SaveOutcome::AlreadyExists`] without
    /// touching the existing row.
    fn save(
        &self,
        record: &MeasurementRecord,
    ) -> impl Future<Output = Result<SaveOutcome, AppError>> + Send;
}

/// Clock abstraction for backoff waits.
pub trait Sleeper: Send + Sync + Clone {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
