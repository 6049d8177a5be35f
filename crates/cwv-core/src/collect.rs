//! The collection job: select pending URLs, then fetch → map → store each.
//!
//! Every URL runs through its own pipeline and ends in exactly one
//! [`UrlOutcome`]. Per-URL failures are recorded and never abort the run;
//! only the initial selection can fail the whole job.

use chrono::NaiveDate;
use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AppError, ErrorKind};
use crate::models::{Category, SaveOutcome, UrlRecord};
use crate::summary::{ExecutionSummary, UrlOutcome, UrlResult};
use crate::traits::{MeasurementFetcher, MeasurementMapper, MeasurementStore, PendingUrlSelector};

/// Events emitted by the collector for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CollectEvent<'a> {
    RunStarted {
        run_id: Uuid,
        execution_date: NaiveDate,
        total_urls: u64,
        pending: usize,
    },
    UrlStarted {
        url_id: i64,
        url: &'a str,
        device: &'a str,
    },
    UrlStored {
        url_id: i64,
        performance_score: Option<f64>,
        field_data: bool,
    },
    UrlSkipped {
        url_id: i64,
    },
    UrlFailed {
        url_id: i64,
        url: &'a str,
        stage: &'static str,
        error: &'a str,
    },
    Cancelled {
        not_attempted: u64,
    },
    RunFinished {
        summary: &'a ExecutionSummary,
    },
}

/// Trait for receiving collector events (decoupled logging).
pub trait CollectReporter: Send + Sync {
    fn report(&self, event: CollectEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCollectReporter;

impl CollectReporter for TracingCollectReporter {
    fn report(&self, event: CollectEvent<'_>) {
        match event {
            CollectEvent::RunStarted {
                run_id,
                execution_date,
                total_urls,
                pending,
            } => {
                tracing::info!(%run_id, %execution_date, %total_urls, %pending, "Collection started");
            }
            CollectEvent::UrlStarted { url_id, url, device } => {
                tracing::info!(%url_id, %url, %device, "Processing URL");
            }
            CollectEvent::UrlStored {
                url_id,
                performance_score,
                field_data,
            } => {
                tracing::info!(%url_id, ?performance_score, field_data, "Metrics stored");
            }
            CollectEvent::UrlSkipped { url_id } => {
                tracing::info!(%url_id, "Metrics already exist for this date, skipped");
            }
            CollectEvent::UrlFailed {
                url_id,
                url,
                stage,
                error,
            } => {
                tracing::warn!(%url_id, %url, %stage, %error, "URL failed");
            }
            CollectEvent::Cancelled { not_attempted } => {
                tracing::warn!(%not_attempted, "Collection cancelled, remaining URLs left for the next run");
            }
            CollectEvent::RunFinished { summary } => {
                tracing::info!(
                    total = summary.total_urls,
                    stored = summary.stored,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    success_rate = summary.success_rate(),
                    "Collection completed"
                );
            }
        }
    }
}

/// Configuration for a collection run.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Maximum URL pipelines in flight. 1 means strictly sequential.
    pub concurrency: usize,
    pub category: Category,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            category: Category::Performance,
        }
    }
}

impl CollectConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Orchestrates the collection job.
///
/// Generic over all external dependencies via traits, so the whole run can
/// be exercised without real HTTP or a database.
pub struct CollectService<P, F, M, S>
where
    P: PendingUrlSelector,
    F: MeasurementFetcher,
    M: MeasurementMapper,
    S: MeasurementStore,
{
    selector: P,
    fetcher: F,
    mapper: M,
    store: S,
    config: CollectConfig,
}

impl<P, F, M, S> CollectService<P, F, M, S>
where
    P: PendingUrlSelector,
    F: MeasurementFetcher,
    M: MeasurementMapper,
    S: MeasurementStore,
{
    pub fn new(selector: P, fetcher: F, mapper: M, store: S) -> Self {
        Self::with_config(selector, fetcher, mapper, store, CollectConfig::default())
    }

    pub fn with_config(selector: P, fetcher: F, mapper: M, store: S, config: CollectConfig) -> Self {
        Self {
            selector,
            fetcher,
            mapper,
            store,
            config,
        }
    }

    /// Run the job for `execution_date`.
    ///
    /// Fails only if the pending set cannot be selected. Cancellation is
    /// observed between URLs: no new URL starts once `cancel_token` fires,
    /// and URLs already in flight finish their pipeline.
    pub async fn run<R: CollectReporter>(
        &self,
        execution_date: NaiveDate,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<ExecutionSummary, AppError> {
        let work = self.selector.select_pending(execution_date).await?;

        let mut summary = ExecutionSummary::new(execution_date, work.total_urls);
        summary.add_already_measured(work.already_measured());

        reporter.report(CollectEvent::RunStarted {
            run_id: summary.run_id,
            execution_date,
            total_urls: work.total_urls,
            pending: work.pending.len(),
        });

        let results = stream::iter(work.pending.iter())
            .take_while(|_| futures::future::ready(!cancel_token.is_cancelled()))
            .map(|target| self.process_url(target, execution_date, reporter))
            .buffered(self.config.concurrency.max(1));
        let mut results = std::pin::pin!(results);

        let mut processed = 0usize;
        while let Some(result) = results.next().await {
            processed += 1;
            summary.record(result);
        }

        let not_attempted = (work.pending.len() - processed) as u64;
        if not_attempted > 0 {
            reporter.report(CollectEvent::Cancelled { not_attempted });
        }

        summary.finish(not_attempted);
        reporter.report(CollectEvent::RunFinished { summary: &summary });

        Ok(summary)
    }

    /// Drive one URL to a terminal state.
    async fn process_url<R: CollectReporter>(
        &self,
        target: &UrlRecord,
        execution_date: NaiveDate,
        reporter: &R,
    ) -> UrlResult {
        reporter.report(CollectEvent::UrlStarted {
            url_id: target.url_id,
            url: &target.url,
            device: &target.device,
        });

        let outcome = self.pipeline(target, execution_date, reporter).await;

        match &outcome {
            UrlOutcome::SkippedDuplicate => {
                reporter.report(CollectEvent::UrlSkipped {
                    url_id: target.url_id,
                });
            }
            UrlOutcome::Stored => {}
            failed => {
                reporter.report(CollectEvent::UrlFailed {
                    url_id: target.url_id,
                    url: &target.url,
                    stage: failed.as_str(),
                    error: failed.error().unwrap_or_default(),
                });
            }
        }

        UrlResult {
            url_id: target.url_id,
            url: target.url.clone(),
            outcome,
        }
    }

    async fn pipeline<R: CollectReporter>(
        &self,
        target: &UrlRecord,
        execution_date: NaiveDate,
        reporter: &R,
    ) -> UrlOutcome {
        let response = match self.fetcher.fetch(target, self.config.category).await {
            Ok(response) => response,
            // An unparseable body is a malformed response, not a transport failure
            Err(e) if e.kind() == ErrorKind::Mapping => return UrlOutcome::MapFailed(e.to_string()),
            Err(e) => return UrlOutcome::FetchFailed(e.to_string()),
        };

        let record = match self.mapper.map(target.url_id, execution_date, &response) {
            Ok(record) => record,
            Err(e) => return UrlOutcome::MapFailed(e.to_string()),
        };

        match self.store.save(&record).await {
            Ok(SaveOutcome::Inserted) => {
                reporter.report(CollectEvent::UrlStored {
                    url_id: target.url_id,
                    performance_score: record.performance_score,
                    field_data: record.has_field_data(),
                });
                UrlOutcome::Stored
            }
            Ok(SaveOutcome::AlreadyExists) => UrlOutcome::SkippedDuplicate,
            Err(e) => UrlOutcome::StoreFailed(e.to_string()),
        }
    }
}
