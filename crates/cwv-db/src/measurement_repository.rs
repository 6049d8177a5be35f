use chrono::NaiveDate;
use cwv_core::error::AppError;
use cwv_core::models::{MeasurementRecord, SaveOutcome};
use cwv_core::traits::MeasurementStore;
use sqlx::{PgPool, Pool, Postgres};

/// Repository for the `url_core_web_vitals` table.
///
/// At most one row exists per `(url_id, execution_date)`; an existing row
/// is never overwritten.
#[derive(Clone)]
pub struct MeasurementRepository {
    pool: Pool<Postgres>,
}

impl MeasurementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the record unless one already exists for its key.
    pub async fn insert(&self, record: &MeasurementRecord) -> Result<SaveOutcome, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO url_core_web_vitals (
                url_id, execution_date, performance_score,
                first_contentful_paint, largest_contentful_paint, total_blocking_time,
                cumulative_layout_shift, speed_index, time_to_first_byte, time_to_interactive,
                crux_largest_contentful_paint, crux_interaction_to_next_paint,
                crux_cumulative_layout_shift, crux_first_contentful_paint, crux_time_to_first_byte
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT ON CONSTRAINT unique_url_execution DO NOTHING
            "#,
        )
        .bind(record.url_id)
        .bind(record.execution_date)
        .bind(record.performance_score)
        .bind(record.first_contentful_paint)
        .bind(record.largest_contentful_paint)
        .bind(record.total_blocking_time)
        .bind(record.cumulative_layout_shift)
        .bind(record.speed_index)
        .bind(record.time_to_first_byte)
        .bind(record.time_to_interactive)
        .bind(record.crux_largest_contentful_paint)
        .bind(record.crux_interaction_to_next_paint)
        .bind(record.crux_cumulative_layout_shift)
        .bind(record.crux_first_contentful_paint)
        .bind(record.crux_time_to_first_byte)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                url_id = record.url_id,
                execution_date = %record.execution_date,
                "Measurement already exists"
            );
            Ok(SaveOutcome::AlreadyExists)
        } else {
            Ok(SaveOutcome::Inserted)
        }
    }

    pub async fn exists(&self, url_id: i64, execution_date: NaiveDate) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM url_core_web_vitals
                WHERE url_id = $1 AND execution_date = $2
            )
            "#,
        )
        .bind(url_id)
        .bind(execution_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(exists)
    }

    pub async fn get(
        &self,
        url_id: i64,
        execution_date: NaiveDate,
    ) -> Result<Option<MeasurementRecord>, AppError> {
        let row = sqlx::query_as::<_, MeasurementRow>(
            r#"
            SELECT url_id, execution_date, performance_score,
                   first_contentful_paint, largest_contentful_paint, total_blocking_time,
                   cumulative_layout_shift, speed_index, time_to_first_byte, time_to_interactive,
                   crux_largest_contentful_paint, crux_interaction_to_next_paint,
                   crux_cumulative_layout_shift, crux_first_contentful_paint, crux_time_to_first_byte
            FROM url_core_web_vitals
            WHERE url_id = $1 AND execution_date = $2
            "#,
        )
        .bind(url_id)
        .bind(execution_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Number of measurements stored for `execution_date`.
    pub async fn count_for_date(&self, execution_date: NaiveDate) -> Result<u64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM url_core_web_vitals WHERE execution_date = $1")
                .bind(execution_date)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(count as u64)
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct MeasurementRow {
    url_id: i64,
    execution_date: NaiveDate,
    performance_score: Option<f64>,
    first_contentful_paint: Option<f64>,
    largest_contentful_paint: Option<f64>,
    total_blocking_time: Option<f64>,
    cumulative_layout_shift: Option<f64>,
    speed_index: Option<f64>,
    time_to_first_byte: Option<f64>,
    time_to_interactive: Option<f64>,
    crux_largest_contentful_paint: Option<f64>,
    crux_interaction_to_next_paint: Option<f64>,
    crux_cumulative_layout_shift: Option<f64>,
    crux_first_contentful_paint: Option<f64>,
    crux_time_to_first_byte: Option<f64>,
}

impl From<MeasurementRow> for MeasurementRecord {
    fn from(row: MeasurementRow) -> Self {
        MeasurementRecord {
            url_id: row.url_id,
            execution_date: row.execution_date,
            performance_score: row.performance_score,
            first_contentful_paint: row.first_contentful_paint,
            largest_contentful_paint: row.largest_contentful_paint,
            total_blocking_time: row.total_blocking_time,
            cumulative_layout_shift: row.cumulative_layout_shift,
            speed_index: row.speed_index,
            time_to_first_byte: row.time_to_first_byte,
            time_to_interactive: row.time_to_interactive,
            crux_largest_contentful_paint: row.crux_largest_contentful_paint,
            crux_interaction_to_next_paint: row.crux_interaction_to_next_paint,
            crux_cumulative_layout_shift: row.crux_cumulative_layout_shift,
            crux_first_contentful_paint: row.crux_first_contentful_paint,
            crux_time_to_first_byte: row.crux_time_to_first_byte,
        }
    }
}

// -- Trait implementation --

impl MeasurementStore for MeasurementRepository {
    async fn save(&self, record: &MeasurementRecord) -> Result<SaveOutcome, AppError> {
        MeasurementRepository::insert(self, record).await
    }
}
