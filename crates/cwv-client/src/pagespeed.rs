use cwv_core::error::AppError;
use cwv_core::models::{Category, UrlRecord};
use cwv_core::retry::{RetryingFetcher, TokioSleeper};
use cwv_core::traits::MeasurementFetcher;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::{ApiKey, PageSpeedConfig};

/// Production fetcher: one HTTP attempt per call, retried by the wrapper.
pub type PageSpeedFetcher = RetryingFetcher<PageSpeedClient, TokioSleeper>;

/// Single-attempt PageSpeed Insights client.
///
/// Every transport or status failure is returned as-is so that
/// [`RetryingFetcher`] can decide whether to try again.
#[derive(Clone)]
pub struct PageSpeedClient {
    client: Client,
    endpoint: Url,
    api_key: ApiKey,
    timeout_secs: u64,
}

impl PageSpeedClient {
    pub fn new(config: &PageSpeedConfig) -> Result<Self, AppError> {
        if config.timeout.is_zero() {
            return Err(AppError::ConfigError(
                "PageSpeed request timeout must be greater than zero".to_string(),
            ));
        }

        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            AppError::ConfigError(format!("Invalid PageSpeed endpoint '{}': {e}", config.endpoint))
        })?;

        let client = Client::builder()
            .user_agent(concat!("cwv-collect/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout.as_secs(),
        })
    }

    /// Build the client wrapped in the retry policy from `config`.
    pub fn retrying(config: &PageSpeedConfig) -> Result<PageSpeedFetcher, AppError> {
        Ok(RetryingFetcher::with_tokio(Self::new(config)?, config.retry.clone()))
    }

    fn request_url(&self, target: &str, strategy: &str, category: Category) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("url", target)
            .append_pair("key", self.api_key.expose())
            .append_pair("strategy", strategy)
            .append_pair("category", category.as_str());
        url
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Reject anything that is not an absolute http(s) URL with a host.
fn validate_target(raw: &str) -> Result<(), AppError> {
    let parsed =
        Url::parse(raw).map_err(|e| AppError::InvalidTarget(format!("'{raw}' is not a URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidTarget(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(AppError::InvalidTarget(format!("'{raw}' has no host")));
    }

    Ok(())
}

impl MeasurementFetcher for PageSpeedClient {
    async fn fetch(
        &self,
        target: &UrlRecord,
        category: Category,
    ) -> Result<serde_json::Value, AppError> {
        validate_target(&target.url)?;
        let strategy = target.strategy()?;

        tracing::debug!(
            url_id = target.url_id,
            url = %target.url,
            strategy = %strategy,
            "Requesting PageSpeed analysis"
        );

        let request_url = self.request_url(&target.url, strategy.as_str(), category);

        // without_url() keeps the API key out of error messages
        let response = self.client.get(request_url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {}", e.without_url()))
            } else {
                AppError::NetworkError(e.without_url().to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string()
                });
            return Err(AppError::from_status(status.as_u16(), message));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::NetworkError(format!("Failed to read response body: {}", e.without_url()))
            }
        })?;

        Ok(serde_json::from_slice(&body)?)
    }
}
