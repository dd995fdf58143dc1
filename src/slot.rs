use std::sync::atomic::{AtomicU64, Ordering};

use crate::dashboard::{self, DashboardView};
use crate::error::Result;
use crate::models::Query;
use crate::range;
use crate::source::{self, RecordSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

/// One query slot of the dashboard. Only the most recently started request
/// may publish its result; older ones are discarded when they finish.
#[derive(Debug, Default)]
pub struct QuerySlot {
    latest: AtomicU64,
}

impl QuerySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    pub fn accept<T>(&self, token: RequestToken, value: T) -> Option<T> {
        if self.is_current(token) {
            Some(value)
        } else {
            tracing::debug!(token = token.0, "discarding superseded result");
            None
        }
    }
}

/// Runs `query` against `source` in `slot`. Returns `Ok(None)` when a newer
/// request started on the same slot before this one finished.
pub async fn refresh(
    slot: &QuerySlot,
    source: &dyn RecordSource,
    query: &Query,
) -> Result<Option<DashboardView>> {
    let token = slot.begin();
    let range = range::resolve(query)?;
    let ingested = source::fetch_ingested(source, &range).await;
    Ok(slot.accept(token, dashboard::build(&range, ingested)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use tokio::sync::Notify;

    #[test]
    fn newer_token_supersedes_older() {
        let slot = QuerySlot::new();
        let first = slot.begin();
        let second = slot.begin();
        assert!(second > first);
        assert_eq!(slot.accept(first, "stale"), None);
        assert_eq!(slot.accept(second, "fresh"), Some("fresh"));
    }

    struct GatedSource {
        gate: Notify,
        gated_day: NaiveDate,
    }

    #[async_trait]
    impl RecordSource for GatedSource {
        async fn fetch(&self, from: NaiveDate, _to: NaiveDate) -> Result<Vec<Value>> {
            if from == self.gated_day {
                self.gate.notified().await;
            }
            Ok(vec![json!({
                "timestamp": format!("{from}T12:00:00"),
                "primaryMetric": 4
            })])
        }
    }

    #[tokio::test]
    async fn slow_stale_request_is_discarded() {
        let source = GatedSource {
            gate: Notify::new(),
            gated_day: NaiveDate::from_ymd_opt(2025, 10, 26).unwrap(),
        };
        let slot = QuerySlot::new();
        let old_query = Query::SingleDay {
            day: "2025-10-26".to_string(),
        };
        let new_query = Query::SingleDay {
            day: "2025-10-27".to_string(),
        };

        let stale = refresh(&slot, &source, &old_query);
        let fresh = async {
            let view = refresh(&slot, &source, &new_query).await;
            source.gate.notify_one();
            view
        };
        let (stale, fresh) = tokio::join!(stale, fresh);

        assert!(stale.unwrap().is_none());
        let view = fresh.unwrap().unwrap();
        assert_eq!(view.series[12].record_count, 1);
    }

    #[tokio::test]
    async fn invalid_query_fails_without_fetching() {
        let source = GatedSource {
            gate: Notify::new(),
            gated_day: NaiveDate::from_ymd_opt(2025, 10, 26).unwrap(),
        };
        let slot = QuerySlot::new();
        let result = refresh(
            &slot,
            &source,
            &Query::CalendarMonth {
                year: 2025,
                month: 0,
            },
        )
        .await;
        assert!(result.is_err());
    }
}
