use std::fmt;
use std::time::Duration;

use cwv_core::error::AppError;
use cwv_core::retry::RetryConfig;

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Value shipped in sample `.env` files; never a real key.
const PLACEHOLDER_KEY: &str = "your_api_key_here";

/// PageSpeed Insights API key.
///
/// `Debug` is redacted so the key never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Rejects empty keys and the sample placeholder.
    pub fn new(raw: &str) -> Result<Self, AppError> {
        let key = raw.trim();
        if key.is_empty() || key == PLACEHOLDER_KEY {
            return Err(AppError::ConfigError(
                "PAGESPEED_INSIGHTS_API_KEY is not set".to_string(),
            ));
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Settings for talking to the PageSpeed Insights API.
#[derive(Debug, Clone)]
pub struct PageSpeedConfig {
    pub api_key: ApiKey,
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl PageSpeedConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
