pub mod config;
pub mod pagespeed;

pub use config::{ApiKey, DEFAULT_ENDPOINT, PageSpeedConfig};
pub use pagespeed::{PageSpeedClient, PageSpeedFetcher};
