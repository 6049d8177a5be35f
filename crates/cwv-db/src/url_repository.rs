use chrono::{DateTime, NaiveDate, Utc};
use cwv_core::error::AppError;
use cwv_core::models::{NewUrl, PendingUrls, UrlRecord};
use cwv_core::traits::PendingUrlSelector;
use sqlx::{PgPool, Pool, Postgres};

/// Read access to the monitored URL table, plus the fixture insert path.
#[derive(Clone)]
pub struct UrlRepository {
    pool: Pool<Postgres>,
}

impl UrlRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a URL. Returns the generated `url_id`.
    pub async fn add(&self, url: &NewUrl) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO urls (url, device, page_type, brand, category, country_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING url_id
            "#,
        )
        .bind(&url.url)
        .bind(url.device.as_str())
        .bind(&url.page_type)
        .bind(&url.brand)
        .bind(&url.category)
        .bind(&url.country_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    pub async fn get_by_id(&self, url_id: i64) -> Result<Option<UrlRecord>, AppError> {
        let row = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT url_id, url, device, page_type, brand, category, country_id, created_at
            FROM urls
            WHERE url_id = $1
            "#,
        )
        .bind(url_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Every URL, ordered by `url_id`.
    pub async fn list_all(&self) -> Result<Vec<UrlRecord>, AppError> {
        let rows = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT url_id, url, device, page_type, brand, category, country_id, created_at
            FROM urls
            ORDER BY url_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// URLs with no measurement for `execution_date`, computed as a single
    /// anti-join, together with the size of the whole table.
    pub async fn select_pending(&self, execution_date: NaiveDate) -> Result<PendingUrls, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        // Both statements must read one snapshot, or a URL committed between
        // them would be pending without being counted in the total
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM urls")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let rows = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT u.url_id, u.url, u.device, u.page_type, u.brand, u.category,
                   u.country_id, u.created_at
            FROM urls u
            LEFT JOIN url_core_web_vitals cwv
                ON cwv.url_id = u.url_id AND cwv.execution_date = $1
            WHERE cwv.id IS NULL
            ORDER BY u.url_id
            "#,
        )
        .bind(execution_date)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let pending: Vec<UrlRecord> = rows.into_iter().map(Into::into).collect();
        tracing::debug!(
            %execution_date,
            total,
            pending = pending.len(),
            "Selected pending URLs"
        );

        Ok(PendingUrls {
            total_urls: total as u64,
            pending,
        })
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct UrlRow {
    url_id: i64,
    url: String,
    device: String,
    page_type: String,
    brand: String,
    category: String,
    country_id: String,
    created_at: DateTime<Utc>,
}

impl From<UrlRow> for UrlRecord {
    fn from(row: UrlRow) -> Self {
        UrlRecord {
            url_id: row.url_id,
            url: row.url,
            device: row.device,
            page_type: row.page_type,
            brand: row.brand,
            category: row.category,
            country_id: row.country_id,
            created_at: Some(row.created_at),
        }
    }
}

// -- Trait implementation --

impl PendingUrlSelector for UrlRepository {
    async fn select_pending(&self, execution_date: NaiveDate) -> Result<PendingUrls, AppError> {
        UrlRepository::select_pending(self, execution_date).await
    }
}
