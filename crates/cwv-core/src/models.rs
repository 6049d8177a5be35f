use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Device strategy the PageSpeed API emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Mobile,
    Desktop,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Mobile => "mobile",
            Strategy::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mobile" => Ok(Strategy::Mobile),
            "desktop" => Ok(Strategy::Desktop),
            _ => Err(AppError::InvalidTarget(format!(
                "Unsupported device strategy '{s}' (expected mobile or desktop)"
            ))),
        }
    }
}

/// Lighthouse category requested from the API. Only performance is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    Performance,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Performance => "performance",
        }
    }
}

/// A monitored URL, owned by the seed process and read-only to the job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlRecord {
    pub url_id: i64,
    pub url: String,
    /// Raw device column; parsed lazily so one bad row cannot fail selection.
    pub device: String,
    pub page_type: String,
    pub brand: String,
    pub category: String,
    pub country_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl UrlRecord {
    pub fn strategy(&self) -> Result<Strategy, AppError> {
        self.device.parse()
    }
}

/// DTO for inserting a URL row (seeding and fixtures).
#[derive(Debug, Clone)]
pub struct NewUrl {
    pub url: String,
    pub device: Strategy,
    pub page_type: String,
    pub brand: String,
    pub category: String,
    pub country_id: String,
}

impl NewUrl {
    pub fn new(url: impl Into<String>, device: Strategy) -> Self {
        Self {
            url: url.into(),
            device,
            page_type: "home".to_string(),
            brand: "unknown".to_string(),
            category: "general".to_string(),
            country_id: "ES".to_string(),
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn with_page_type(mut self, page_type: impl Into<String>) -> Self {
        self.page_type = page_type.into();
        self
    }
}

/// One row of the measurement ledger, keyed by (url_id, execution_date).
///
/// Every metric is optional: the API omits field data for low-traffic
/// URLs and may drop individual audits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub url_id: i64,
    pub execution_date: NaiveDate,
    /// Lighthouse performance score on a 0-100 scale.
    pub performance_score: Option<f64>,
    pub first_contentful_paint: Option<f64>,
    pub largest_contentful_paint: Option<f64>,
    pub total_blocking_time: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub speed_index: Option<f64>,
    pub time_to_first_byte: Option<f64>,
    pub time_to_interactive: Option<f64>,
    pub crux_largest_contentful_paint: Option<f64>,
    pub crux_interaction_to_next_paint: Option<f64>,
    pub crux_cumulative_layout_shift: Option<f64>,
    pub crux_first_contentful_paint: Option<f64>,
    pub crux_time_to_first_byte: Option<f64>,
}

impl MeasurementRecord {
    pub fn new(url_id: i64, execution_date: NaiveDate) -> Self {
        Self {
            url_id,
            execution_date,
            ..Default::default()
        }
    }

    /// True when at least one real-user (CrUX) metric is present.
    pub fn has_field_data(&self) -> bool {
        [
            self.crux_largest_contentful_paint,
            self.crux_interaction_to_next_paint,
            self.crux_cumulative_layout_shift,
            self.crux_first_contentful_paint,
            self.crux_time_to_first_byte,
        ]
        .iter()
        .any(Option::is_some)
    }
}

/// Work list computed by a [`crate::traits::PendingUrlSelector`].
#[derive(Debug, Clone, Default)]
pub struct PendingUrls {
    /// Size of the whole URL table.
    pub total_urls: u64,
    /// URLs without a measurement for the date, ordered by url_id.
    pub pending: Vec<UrlRecord>,
}

impl PendingUrls {
    /// URLs excluded because they already have a record for the date.
    pub fn already_measured(&self) -> u64 {
        self.total_urls.saturating_sub(self.pending.len() as u64)
    }
}

/// Result of an insert-or-skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    AlreadyExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("mobile".parse::<Strategy>().unwrap(), Strategy::Mobile);
        assert_eq!("Desktop".parse::<Strategy>().unwrap(), Strategy::Desktop);
        assert_eq!(Strategy::Desktop.to_string(), "desktop");
    }

    #[test]
    fn test_strategy_rejects_unknown_device() {
        let err = "tablet".parse::<Strategy>().unwrap_err();
        assert!(matches!(err, AppError::InvalidTarget(_)));
        assert!(err.to_string().contains("tablet"));
    }

    #[test]
    fn test_category_wire_name() {
        assert_eq!(Category::default().as_str(), "performance");
    }

    #[test]
    fn test_pending_already_measured() {
        let pending = PendingUrls {
            total_urls: 5,
            pending: vec![],
        };
        assert_eq!(pending.already_measured(), 5);
    }

    #[test]
    fn test_has_field_data() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let mut record = MeasurementRecord::new(1, date);
        assert!(!record.has_field_data());
        record.crux_time_to_first_byte = Some(800.0);
        assert!(record.has_field_data());
    }
}
