use serde::Serialize;
use serde_json::Value;

use crate::aggregate;
use crate::categories::{self, CategoryShare, Frequency};
use crate::error::Result;
use crate::ingest::{self, DataStatus, IngestStats, Ingested};
use crate::models::{AggregateRow, Granularity, Kpis, Mode, Query, TrendPoint};
use crate::range::{self, ResolvedRange};
use crate::trend;

/// Everything the dashboard shows for one query, derived in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub mode: Mode,
    #[serde(skip)]
    pub range: ResolvedRange,
    /// Chart series: dense hours, dense month days, or sparse dates/weeks.
    pub series: Vec<AggregateRow>,
    pub trend: Vec<TrendPoint>,
    /// Summary table rows, one per aggregate key.
    pub table: Vec<AggregateRow>,
    pub overall: Frequency,
    pub distribution: Vec<CategoryShare>,
    pub kpis: Kpis,
    pub stats: IngestStats,
    pub status: DataStatus,
}

impl DashboardView {
    pub fn table_total(&self) -> usize {
        self.table.iter().map(|row| row.record_count).sum()
    }
}

pub fn series_granularity(range: &ResolvedRange) -> Granularity {
    match (range.mode, range.month) {
        (Mode::SingleDay, _) => Granularity::Hour,
        (Mode::Week, _) => Granularity::WeekStart,
        (Mode::CalendarMonth, Some(bounds)) => Granularity::DayOfMonth {
            year: bounds.year,
            month: bounds.month,
        },
        _ => Granularity::Date,
    }
}

pub fn table_granularity(mode: Mode) -> Granularity {
    match mode {
        Mode::SingleDay | Mode::CustomRange => Granularity::Date,
        Mode::Week => Granularity::WeekStart,
        Mode::CalendarMonth => Granularity::MonthKey,
    }
}

pub fn build(range: &ResolvedRange, ingested: Ingested) -> DashboardView {
    let Ingested {
        records,
        stats,
        status,
    } = ingested;

    let series = aggregate::aggregate(&records, series_granularity(range));
    let trend = trend::fit(&series);

    let mut table = aggregate::aggregate(&records, table_granularity(range.mode));
    if let Some(bounds) = range.month {
        let selected = bounds.key();
        table.retain(|row| row.key == selected);
    }

    let overall = categories::overall(&table);
    let distribution = categories::distribution(&overall);

    tracing::info!(
        mode = range.mode.slug(),
        from = %range.interval.from,
        to = %range.interval.to,
        records = records.len(),
        series = series.len(),
        rows = table.len(),
        "dashboard built"
    );

    DashboardView {
        mode: range.mode,
        range: *range,
        series,
        trend,
        table,
        overall,
        distribution,
        kpis: aggregate::kpis(&records),
        stats,
        status,
    }
}

/// Resolves `query`, filters `raw` against it and builds the view.
pub fn build_from_raw(query: &Query, raw: &[Value]) -> Result<DashboardView> {
    let range = range::resolve(query)?;
    let ingested = ingest::ingest(raw, &range);
    Ok(build(&range, ingested))
}
