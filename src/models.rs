use chrono::NaiveDate;
use serde::Serialize;

use crate::categories::Frequency;

/// Upper bound of the sky-cover scale, in oktas.
pub const METRIC_CEILING: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    SingleDay,
    CustomRange,
    Week,
    CalendarMonth,
}

impl Mode {
    pub fn slug(self) -> &'static str {
        match self {
            Mode::SingleDay => "day",
            Mode::CustomRange => "range",
            Mode::Week => "week",
            Mode::CalendarMonth => "month",
        }
    }
}

/// Query parameters as they arrive from the caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    SingleDay { day: String },
    CustomRange { from: String, to: String },
    Week { from: String, to: String },
    CalendarMonth { year: i32, month: u32 },
}

impl Query {
    pub fn mode(&self) -> Mode {
        match self {
            Query::SingleDay { .. } => Mode::SingleDay,
            Query::CustomRange { .. } => Mode::CustomRange,
            Query::Week { .. } => Mode::Week,
            Query::CalendarMonth { .. } => Mode::CalendarMonth,
        }
    }
}

/// Calendar interval with an inclusive upper day. Always `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Interval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// How records are partitioned into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// 24 dense hourly buckets.
    Hour,
    /// One sparse bucket per distinct date.
    Date,
    /// One sparse bucket per Monday-started week.
    WeekStart,
    /// One sparse bucket per `YYYY-MM` key.
    MonthKey,
    /// One dense bucket per day of the given month.
    DayOfMonth { year: i32, month: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub timestamp: String,
    pub date: NaiveDate,
    pub hour: u32,
    pub primary_metric: f64,
    /// Confidence already normalized to a 0..100 percentage.
    pub confidence: Option<f64>,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub key: String,
    pub ordinal_index: usize,
    pub label: String,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    pub ordinal_index: usize,
    pub label: String,
    pub average: f64,
    pub percentage: u32,
    pub confidence_percent: u32,
    pub dominant_category: String,
    pub dominant_description: String,
    pub category_frequency: Frequency,
    pub record_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub ordinal_index: usize,
    pub raw_value: f64,
    pub fitted_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpis {
    pub total_records: usize,
    pub average_metric: f64,
    pub confidence_percent: u32,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
