use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::categories::UNKNOWN_CATEGORY;
use crate::models::Record;
use crate::range::ResolvedRange;

const TIMESTAMP_FIELDS: &[&str] = &[
    "timestamp",
    "captured_at",
    "fecha_captura",
    "fecha_hora_prediccion",
];
const METRIC_FIELDS: &[&str] = &["primaryMetric", "primary_metric", "octas", "octas_predichas"];
const CONFIDENCE_FIELDS: &[&str] = &["confidence", "confianza", "score", "probabilidad"];
const CATEGORY_FIELDS: &[&str] = &["category", "categoria"];
const DESCRIPTION_FIELDS: &[&str] = &["description", "descripcion"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    Complete,
    /// Nothing usable survived filtering.
    PartialData,
    /// The source could not be reached; the batch is empty.
    NetworkUnavailable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub received: usize,
    pub accepted: usize,
    pub malformed: usize,
    pub out_of_range: usize,
    pub invalid_metric: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub records: Vec<Record>,
    pub stats: IngestStats,
    pub status: DataStatus,
}

impl Ingested {
    pub fn unavailable() -> Self {
        Self {
            records: Vec::new(),
            stats: IngestStats::default(),
            status: DataStatus::NetworkUnavailable,
        }
    }
}

/// Filters a loosely-typed batch down to the records that fall inside
/// `range` and carry a finite metric. Nothing here fails: bad entries are
/// counted in `IngestStats` and skipped.
pub fn ingest(raw: &[Value], range: &ResolvedRange) -> Ingested {
    let mut stats = IngestStats {
        received: raw.len(),
        ..IngestStats::default()
    };
    let mut records = Vec::with_capacity(raw.len());

    for entry in raw {
        let Some(object) = entry.as_object() else {
            stats.malformed += 1;
            continue;
        };
        let Some(timestamp) = first_value(object, TIMESTAMP_FIELDS).and_then(Value::as_str) else {
            stats.malformed += 1;
            continue;
        };
        let Some((date, hour)) = parse_calendar_stamp(timestamp) else {
            stats.malformed += 1;
            continue;
        };
        if !range.admits(date) {
            stats.out_of_range += 1;
            continue;
        }
        let metric = first_value(object, METRIC_FIELDS).and_then(coerce_number);
        let Some(primary_metric) = metric.filter(|value| value.is_finite()) else {
            stats.invalid_metric += 1;
            continue;
        };

        let confidence = first_value(object, CONFIDENCE_FIELDS)
            .and_then(coerce_number)
            .filter(|value| value.is_finite())
            .map(normalize_confidence);
        let category = first_value(object, CATEGORY_FIELDS)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .unwrap_or(UNKNOWN_CATEGORY)
            .to_string();
        let description = first_value(object, DESCRIPTION_FIELDS)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        records.push(Record {
            timestamp: timestamp.to_string(),
            date,
            hour,
            primary_metric,
            confidence,
            category,
            description,
        });
    }

    // Raw timestamp text sorts chronologically for the accepted shapes.
    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    stats.accepted = records.len();

    tracing::debug!(
        received = stats.received,
        accepted = stats.accepted,
        malformed = stats.malformed,
        out_of_range = stats.out_of_range,
        invalid_metric = stats.invalid_metric,
        "ingested record batch"
    );

    let status = if records.is_empty() {
        DataStatus::PartialData
    } else {
        DataStatus::Complete
    };

    Ingested {
        records,
        stats,
        status,
    }
}

/// Values at or below 1 are read as fractions, anything above as a
/// percentage already. A raw `1.0` therefore always means 100%.
pub fn normalize_confidence(value: f64) -> f64 {
    if value <= 1.0 {
        value * 100.0
    } else {
        value
    }
}

fn first_value<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find(|value| !value.is_null())
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Reads date and hour straight from the text (`YYYY-MM-DD[T| ]HH...`) so
/// no timezone conversion can move a record across midnight. A missing or
/// unreadable hour falls back to 0.
pub fn parse_calendar_stamp(stamp: &str) -> Option<(NaiveDate, u32)> {
    let stamp = stamp.trim();
    let day = stamp.get(..10)?;
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;

    let separated = matches!(stamp.as_bytes().get(10), Some(b'T') | Some(b' '));
    let hour = stamp
        .get(11..13)
        .filter(|_| separated)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u32>().ok())
        .filter(|hour| *hour < 24)
        .unwrap_or(0);

    Some((date, hour))
}
