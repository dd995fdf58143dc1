use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{DashboardError, Result};
use crate::ingest::{self, Ingested};
use crate::range::ResolvedRange;

/// Where raw record batches come from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Raw records captured on `[from, to_exclusive)`. Sources may return
    /// extra records; ingestion filters again.
    async fn fetch(&self, from: NaiveDate, to_exclusive: NaiveDate) -> Result<Vec<Value>>;
}

/// Accepts a bare array, `{"items": [...]}` or `{"data": [...]}`.
/// Any other shape is an empty batch.
pub fn unwrap_envelope(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut object) => ["items", "data"]
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// A JSON export of the record history on disk.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch(&self, _from: NaiveDate, _to_exclusive: NaiveDate) -> Result<Vec<Value>> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            DashboardError::NetworkUnavailable(format!("{}: {err}", self.path.display()))
        })?;
        Ok(unwrap_envelope(serde_json::from_str(&text)?))
    }
}

/// Fetches and ingests for `range`. Source failures are absorbed into an
/// empty batch flagged `NetworkUnavailable`.
pub async fn fetch_ingested(source: &dyn RecordSource, range: &ResolvedRange) -> Ingested {
    let (from, to_exclusive) = range.fetch_bounds();
    match source.fetch(from, to_exclusive).await {
        Ok(raw) => ingest::ingest(&raw, range),
        Err(err) => {
            tracing::warn!(error = %err, %from, %to_exclusive, "record source failed, continuing with no records");
            Ingested::unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::DataStatus;
    use crate::models::Query;
    use crate::range::resolve;
    use serde_json::json;

    struct Offline;

    #[async_trait]
    impl RecordSource for Offline {
        async fn fetch(&self, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<Value>> {
            Err(DashboardError::NetworkUnavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn envelopes_are_unwrapped() {
        assert_eq!(unwrap_envelope(json!([1, 2])).len(), 2);
        assert_eq!(unwrap_envelope(json!({"items": [1]})).len(), 1);
        assert_eq!(unwrap_envelope(json!({"data": [1, 2, 3]})).len(), 3);
        assert!(unwrap_envelope(json!({"items": "nope"})).is_empty());
        assert!(unwrap_envelope(json!(null)).is_empty());
    }

    #[tokio::test]
    async fn unreachable_source_yields_empty_batch() {
        let range = resolve(&Query::SingleDay {
            day: "2025-10-27".to_string(),
        })
        .unwrap();
        let ingested = fetch_ingested(&Offline, &range).await;
        assert!(ingested.records.is_empty());
        assert_eq!(ingested.status, DataStatus::NetworkUnavailable);
    }

    #[tokio::test]
    async fn json_file_source_reads_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"{"items": [{"timestamp": "2025-10-27T13:00:00", "primaryMetric": 3}]}"#,
        )
        .unwrap();
        let range = resolve(&Query::SingleDay {
            day: "2025-10-27".to_string(),
        })
        .unwrap();

        let ingested = fetch_ingested(&JsonFileSource::new(&path), &range).await;
        assert_eq!(ingested.records.len(), 1);
        assert_eq!(ingested.status, DataStatus::Complete);

        let missing = JsonFileSource::new(dir.path().join("absent.json"));
        let ingested = fetch_ingested(&missing, &range).await;
        assert_eq!(ingested.status, DataStatus::NetworkUnavailable);
    }
}
