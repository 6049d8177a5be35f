use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Terminal state of one URL's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum UrlOutcome {
    Stored,
    SkippedDuplicate,
    FetchFailed(String),
    MapFailed(String),
    StoreFailed(String),
}

impl UrlOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlOutcome::Stored => "stored",
            UrlOutcome::SkippedDuplicate => "skipped_duplicate",
            UrlOutcome::FetchFailed(_) => "fetch_failed",
            UrlOutcome::MapFailed(_) => "map_failed",
            UrlOutcome::StoreFailed(_) => "store_failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UrlOutcome::FetchFailed(_) | UrlOutcome::MapFailed(_) | UrlOutcome::StoreFailed(_)
        )
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            UrlOutcome::FetchFailed(e) | UrlOutcome::MapFailed(e) | UrlOutcome::StoreFailed(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

impl fmt::Display for UrlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            Some(error) => write!(f, "{}: {}", self.as_str(), error),
            None => write!(f, "{}", self.as_str()),
        }
    }
}

/// Outcome recorded for a single processed URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlResult {
    pub url_id: i64,
    pub url: String,
    pub outcome: UrlOutcome,
}

/// In-memory report of one collection run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub run_id: Uuid,
    pub execution_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Every URL in the table, measured or not.
    pub total_urls: u64,
    pub stored: u64,
    pub failed: u64,
    /// Already-measured URLs plus duplicates detected at insert time.
    pub skipped: u64,
    /// URLs the selector excluded because a record already existed.
    pub already_measured: u64,
    /// Pending URLs left untouched because the run was cancelled.
    pub not_attempted: u64,
    pub results: Vec<UrlResult>,
}

impl ExecutionSummary {
    pub fn new(execution_date: NaiveDate, total_urls: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            execution_date,
            started_at: Utc::now(),
            finished_at: None,
            total_urls,
            stored: 0,
            failed: 0,
            skipped: 0,
            already_measured: 0,
            not_attempted: 0,
            results: Vec::new(),
        }
    }

    /// Count URLs that already had a measurement for the date.
    pub fn add_already_measured(&mut self, count: u64) {
        self.already_measured += count;
        self.skipped += count;
    }

    pub fn record(&mut self, result: UrlResult) {
        match result.outcome {
            UrlOutcome::Stored => self.stored += 1,
            UrlOutcome::SkippedDuplicate => self.skipped += 1,
            _ => self.failed += 1,
        }
        self.results.push(result);
    }

    pub fn finish(&mut self, not_attempted: u64) {
        self.not_attempted = not_attempted;
        self.finished_at = Some(Utc::now());
    }

    pub fn was_interrupted(&self) -> bool {
        self.not_attempted > 0
    }

    /// Stored / total as a percentage; 0 for an empty URL table.
    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            return 0.0;
        }
        self.stored as f64 * 100.0 / self.total_urls as f64
    }

    pub fn failed_results(&self) -> impl Iterator<Item = &UrlResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn stored_results(&self) -> impl Iterator<Item = &UrlResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == UrlOutcome::Stored)
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Execution summary for {} (run {})", self.execution_date, self.run_id)?;
        writeln!(f, "  Total:        {}", self.total_urls)?;
        writeln!(f, "  Stored:       {}", self.stored)?;
        writeln!(f, "  Failed:       {}", self.failed)?;
        writeln!(
            f,
            "  Skipped:      {} ({} already measured)",
            self.skipped, self.already_measured
        )?;
        if self.was_interrupted() {
            writeln!(f, "  Not attempted: {} (run interrupted)", self.not_attempted)?;
        }
        write!(f, "  Success rate: {:.1}%", self.success_rate())?;

        let mut failures = self.failed_results().peekable();
        if failures.peek().is_some() {
            write!(f, "\n\nFailed URLs:")?;
            for r in failures {
                write!(f, "\n  [{}] {} - {}", r.url_id, r.url, r.outcome)?;
            }
        }
        Ok(())
    }
}
