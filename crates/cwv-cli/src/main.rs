use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cwv_client::{ApiKey, DEFAULT_ENDPOINT, PageSpeedClient, PageSpeedConfig};
use cwv_core::collect::{CollectConfig, CollectService, TracingCollectReporter};
use cwv_core::mapper::PageSpeedMapper;
use cwv_core::retry::RetryConfig;
use cwv_db::{Database, DatabaseConfig};

/// Measure every registered URL with PageSpeed Insights and store the
/// Core Web Vitals for one execution date.
#[derive(Parser, Debug)]
#[command(name = "cwv-collect", version, about = "Daily Core Web Vitals collector")]
struct Cli {
    /// Execution date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// PageSpeed Insights API key
    #[arg(long, env = "PAGESPEED_INSIGHTS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// PageSpeed Insights endpoint
    #[arg(long, env = "PAGESPEED_API_URL", default_value = DEFAULT_ENDPOINT)]
    api_url: String,

    /// Per-request timeout in seconds
    #[arg(
        long,
        env = "PAGESPEED_TIMEOUT_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: u64,

    /// Attempts per URL, including the first
    #[arg(
        long,
        env = "PAGESPEED_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[arg(long, env = "PAGESPEED_BACKOFF_BASE_MS", default_value_t = 1000)]
    backoff_base_ms: u64,

    /// URLs measured in parallel
    #[arg(
        long,
        env = "CWV_CONCURRENCY",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..=32)
    )]
    concurrency: u32,

    /// Apply the bundled database migrations before collecting
    #[arg(long, default_value_t = false)]
    migrate: bool,

    /// Print the summary as JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Cli {
    fn pagespeed_config(&self) -> Result<PageSpeedConfig> {
        let api_key = ApiKey::new(self.api_key.as_deref().unwrap_or_default())?;
        Ok(PageSpeedConfig::new(api_key)
            .with_endpoint(&self.api_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(RetryConfig::new(
                self.max_attempts,
                Duration::from_millis(self.backoff_base_ms),
            )))
    }

    fn execution_date(&self) -> NaiveDate {
        self.date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries only the summary
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cwv=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let execution_date = cli.execution_date();

    let pagespeed = cli
        .pagespeed_config()
        .context("Invalid PageSpeed configuration")?;
    let fetcher = PageSpeedClient::retrying(&pagespeed).context("Failed to create HTTP client")?;
    tracing::info!(
        %execution_date,
        timeout_secs = pagespeed.timeout.as_secs(),
        max_attempts = fetcher.config().max_attempts,
        backoff_base_ms = fetcher.config().base_delay.as_millis() as u64,
        concurrency = cli.concurrency,
        "Starting Core Web Vitals collection"
    );

    let db_config = DatabaseConfig::from_env()?;
    let db = Database::connect(&db_config)
        .await
        .context("Failed to connect to database")?;
    db.health_check()
        .await
        .context("Database is not reachable")?;
    if cli.migrate {
        db.migrate().await?;
    }

    let service = CollectService::with_config(
        db.url_repo(),
        fetcher,
        PageSpeedMapper,
        db.measurement_repo(),
        CollectConfig::default().with_concurrency(cli.concurrency as usize),
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight URLs");
            signal_token.cancel();
        }
    });

    let summary = service
        .run(execution_date, &cancel, &TracingCollectReporter)
        .await
        .context("Failed to select pending URLs")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }

    Ok(())
}
