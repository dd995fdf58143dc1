use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{DashboardError, Result};
use crate::source::RecordSource;

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(sqlx::Error::from)?;
    Ok(())
}

pub async fn fetch_records(
    pool: &PgPool,
    from: NaiveDate,
    to_exclusive: NaiveDate,
) -> Result<Vec<Value>> {
    let rows = sqlx::query(
        "SELECT captured_at, oktas, confidence, category, description \
         FROM sky_cover.records \
         WHERE captured_at >= $1 AND captured_at < $2 \
         ORDER BY captured_at",
    )
    .bind(from.and_time(NaiveTime::MIN))
    .bind(to_exclusive.and_time(NaiveTime::MIN))
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let captured_at: NaiveDateTime = row.get("captured_at");
        let oktas: f64 = row.get("oktas");
        let confidence: Option<f64> = row.get("confidence");
        let category: String = row.get("category");
        let description: Option<String> = row.get("description");

        records.push(json!({
            "timestamp": captured_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "primaryMetric": oktas,
            "confidence": confidence,
            "category": category,
            "description": description.unwrap_or_default(),
        }));
    }

    Ok(records)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        captured_at: NaiveDateTime,
        oktas: f64,
        confidence: Option<f64>,
        category: String,
        description: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO sky_cover.records
            (id, captured_at, oktas, confidence, category, description, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.captured_at)
        .bind(row.oktas)
        .bind(row.confidence)
        .bind(row.category.trim())
        .bind(row.description.as_deref())
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "imported records");
    Ok(inserted)
}

/// Record history stored in Postgres.
pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn fetch(&self, from: NaiveDate, to_exclusive: NaiveDate) -> Result<Vec<Value>> {
        fetch_records(&self.pool, from, to_exclusive)
            .await
            .map_err(|err| match err {
                DashboardError::Database(
                    inner @ (sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Tls(_)),
                ) => DashboardError::NetworkUnavailable(inner.to_string()),
                other => other,
            })
    }
}
