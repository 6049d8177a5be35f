//! PageSpeed Insights response → [`MeasurementRecord`].
//!
//! Lab metrics come from `lighthouseResult.audits.<audit>.numericValue`,
//! field (CrUX) metrics from `loadingExperience.metrics.<KEY>.percentile`.
//! A missing metric maps to `None`; only a missing or malformed
//! `lighthouseResult` container is an error.

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::AppError;
use crate::models::MeasurementRecord;
use crate::traits::MeasurementMapper;

const LIGHTHOUSE_RESULT: &str = "lighthouseResult";
const LOADING_EXPERIENCE: &str = "loadingExperience";

/// Stateless mapper for the PageSpeed Insights v5 response format.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageSpeedMapper;

fn audit(lighthouse: &Value, name: &str) -> Option<f64> {
    lighthouse
        .get("audits")?
        .get(name)?
        .get("numericValue")?
        .as_f64()
}

fn field_metric(root: &Value, key: &str) -> Option<f64> {
    root.get(LOADING_EXPERIENCE)?
        .get("metrics")?
        .get(key)?
        .get("percentile")?
        .as_f64()
}

fn performance_score(lighthouse: &Value) -> Option<f64> {
    lighthouse
        .pointer("/categories/performance/score")?
        .as_f64()
        .map(|score| score * 100.0)
}

impl MeasurementMapper for PageSpeedMapper {
    fn map(
        &self,
        url_id: i64,
        execution_date: NaiveDate,
        response: &Value,
    ) -> Result<MeasurementRecord, AppError> {
        let root = response.as_object().ok_or_else(|| {
            AppError::MappingError("Response is not a JSON object".to_string())
        })?;

        let lighthouse = root
            .get(LIGHTHOUSE_RESULT)
            .ok_or_else(|| AppError::MappingError(format!("Response has no {LIGHTHOUSE_RESULT}")))?;
        if !lighthouse.is_object() {
            return Err(AppError::MappingError(format!(
                "{LIGHTHOUSE_RESULT} is not an object"
            )));
        }

        Ok(MeasurementRecord {
            url_id,
            execution_date,
            performance_score: performance_score(lighthouse),
            first_contentful_paint: audit(lighthouse, "first-contentful-paint"),
            largest_contentful_paint: audit(lighthouse, "largest-contentful-paint"),
            total_blocking_time: audit(lighthouse, "total-blocking-time"),
            cumulative_layout_shift: audit(lighthouse, "cumulative-layout-shift"),
            speed_index: audit(lighthouse, "speed-index"),
            time_to_first_byte: audit(lighthouse, "server-response-time"),
            time_to_interactive: audit(lighthouse, "interactive"),
            crux_largest_contentful_paint: field_metric(response, "LARGEST_CONTENTFUL_PAINT_MS"),
            crux_interaction_to_next_paint: field_metric(response, "INTERACTION_TO_NEXT_PAINT"),
            crux_cumulative_layout_shift: field_metric(response, "CUMULATIVE_LAYOUT_SHIFT_SCORE"),
            crux_first_contentful_paint: field_metric(response, "FIRST_CONTENTFUL_PAINT_MS"),
            crux_time_to_first_byte: field_metric(response, "EXPERIMENTAL_TIME_TO_FIRST_BYTE"),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn full_response() -> Value {
        json!({
            "id": "https://example.com/",
            "loadingExperience": {
                "metrics": {
                    "LARGEST_CONTENTFUL_PAINT_MS": {"percentile": 2100, "category": "FAST"},
                    "INTERACTION_TO_NEXT_PAINT": {"percentile": 180, "category": "FAST"},
                    "CUMULATIVE_LAYOUT_SHIFT_SCORE": {"percentile": 5, "category": "FAST"},
                    "FIRST_CONTENTFUL_PAINT_MS": {"percentile": 1300, "category": "FAST"},
                    "EXPERIMENTAL_TIME_TO_FIRST_BYTE": {"percentile": 650, "category": "FAST"}
                },
                "overall_category": "FAST"
            },
            "lighthouseResult": {
                "categories": {
                    "performance": {"id": "performance", "score": 0.87}
                },
                "audits": {
                    "first-contentful-paint": {"numericValue": 1234.5, "displayValue": "1.2 s"},
                    "largest-contentful-paint": {"numericValue": 2345.6},
                    "total-blocking-time": {"numericValue": 150.0},
                    "cumulative-layout-shift": {"numericValue": 0.05},
                    "speed-index": {"numericValue": 3000.0},
                    "server-response-time": {"numericValue": 400.0},
                    "interactive": {"numericValue": 4500.0}
                }
            }
        })
    }

    #[test]
    fn maps_every_field_from_complete_response() {
        let record = PageSpeedMapper.map(7, date(), &full_response()).unwrap();

        assert_eq!(record.url_id, 7);
        assert_eq!(record.execution_date, date());
        assert_eq!(record.performance_score, Some(87.0));
        assert_eq!(record.first_contentful_paint, Some(1234.5));
        assert_eq!(record.largest_contentful_paint, Some(2345.6));
        assert_eq!(record.total_blocking_time, Some(150.0));
        assert_eq!(record.cumulative_layout_shift, Some(0.05));
        assert_eq!(record.speed_index, Some(3000.0));
        assert_eq!(record.time_to_first_byte, Some(400.0));
        assert_eq!(record.time_to_interactive, Some(4500.0));
        assert_eq!(record.crux_largest_contentful_paint, Some(2100.0));
        assert_eq!(record.crux_interaction_to_next_paint, Some(180.0));
        assert_eq!(record.crux_cumulative_layout_shift, Some(5.0));
        assert_eq!(record.crux_first_contentful_paint, Some(1300.0));
        assert_eq!(record.crux_time_to_first_byte, Some(650.0));
    }

    #[test]
    fn missing_loading_experience_yields_null_crux_fields() {
        let mut response = full_response();
        response.as_object_mut().unwrap().remove("loadingExperience");

        let record = PageSpeedMapper.map(1, date(), &response).unwrap();

        assert!(!record.has_field_data());
        assert_eq!(record.crux_largest_contentful_paint, None);
        assert_eq!(record.crux_interaction_to_next_paint, None);
        assert_eq!(record.crux_cumulative_layout_shift, None);
        assert_eq!(record.crux_first_contentful_paint, None);
        assert_eq!(record.crux_time_to_first_byte, None);
        assert_eq!(record.performance_score, Some(87.0));
    }

    #[test]
    fn missing_individual_audits_map_to_none() {
        let response = json!({
            "lighthouseResult": {
                "categories": {"performance": {"score": 0.5}},
                "audits": {
                    "speed-index": {"numericValue": 2800.0},
                    "interactive": {"score": 1, "displayValue": "n/a"}
                }
            }
        });

        let record = PageSpeedMapper.map(1, date(), &response).unwrap();

        assert_eq!(record.performance_score, Some(50.0));
        assert_eq!(record.speed_index, Some(2800.0));
        assert_eq!(record.time_to_interactive, None);
        assert_eq!(record.first_contentful_paint, None);
    }

    #[test]
    fn null_performance_score_maps_to_none() {
        let response = json!({
            "lighthouseResult": {"categories": {"performance": {"score": null}}}
        });

        let record = PageSpeedMapper.map(1, date(), &response).unwrap();
        assert_eq!(record.performance_score, None);
    }

    #[test]
    fn empty_lighthouse_result_is_accepted() {
        let record = PageSpeedMapper
            .map(1, date(), &json!({"lighthouseResult": {}}))
            .unwrap();
        assert_eq!(record, MeasurementRecord::new(1, date()));
    }

    #[test]
    fn missing_lighthouse_result_is_mapping_error() {
        let err = PageSpeedMapper
            .map(1, date(), &json!({"loadingExperience": {"metrics": {}}}))
            .unwrap_err();
        assert!(matches!(err, AppError::MappingError(_)));
    }

    #[test]
    fn non_object_response_is_mapping_error() {
        let err = PageSpeedMapper.map(1, date(), &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, AppError::MappingError(_)));

        let err = PageSpeedMapper
            .map(1, date(), &json!({"lighthouseResult": "oops"}))
            .unwrap_err();
        assert!(matches!(err, AppError::MappingError(_)));
    }
}
