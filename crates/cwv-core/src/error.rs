use thiserror::Error;

/// Application-wide error types for the collection job.
#[derive(Error, Debug)]
pub enum AppError {
    /// The PageSpeed API answered with HTTP 429.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The PageSpeed API answered with a non-success status.
    #[error("PageSpeed API error (HTTP {status_code}): {message}")]
    ApiError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Target URL or device strategy cannot be measured.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Every attempt failed with a transient error.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<AppError>,
    },

    /// The API response is not structurally a PageSpeed result.
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Missing or invalid configuration at startup.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification used by the orchestrator and for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Likely to succeed if retried.
    Transient,
    /// Retrying will not help.
    Permanent,
    /// The response could not be turned into a measurement.
    Mapping,
    /// Storage failed for a reason other than a duplicate key.
    Persistence,
    /// The run cannot start at all.
    Startup,
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::ApiError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::RateLimitExceeded | AppError::Timeout(_) | AppError::NetworkError(_) => {
                ErrorKind::Transient
            }
            AppError::ApiError { retryable, .. } => {
                if *retryable {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Permanent
                }
            }
            AppError::InvalidTarget(_) | AppError::RetriesExhausted { .. } => ErrorKind::Permanent,
            AppError::MappingError(_) | AppError::SerializationError(_) => ErrorKind::Mapping,
            AppError::DatabaseError(_) => ErrorKind::Persistence,
            AppError::ConfigError(_) => ErrorKind::Startup,
        }
    }

    /// Build the error for a non-success HTTP status.
    ///
    /// 429 maps to [`AppError::RateLimitExceeded`], 5xx is retryable,
    /// everything else is permanent.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        if status_code == 429 {
            return AppError::RateLimitExceeded;
        }
        AppError::ApiError {
            message: message.into(),
            status_code,
            retryable: status_code >= 500,
        }
    }
}
