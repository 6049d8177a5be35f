pub mod collect;
pub mod error;
pub mod mapper;
pub mod models;
pub mod retry;
pub mod summary;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use collect::{CollectConfig, CollectService};
pub use error::{AppError, ErrorKind};
pub use mapper::PageSpeedMapper;
pub use models::{Category, MeasurementRecord, NewUrl, PendingUrls, SaveOutcome, Strategy, UrlRecord};
pub use retry::{RetryConfig, RetryingFetcher, TokioSleeper};
pub use summary::{ExecutionSummary, UrlOutcome, UrlResult};
pub use traits::{MeasurementFetcher, MeasurementMapper, MeasurementStore, PendingUrlSelector, Sleeper};
