use std::fmt::Write;

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};

use crate::dashboard::DashboardView;
use crate::error::{DashboardError, Result};
use crate::models::{AggregateRow, Mode};

const BYTE_ORDER_MARK: &str = "\u{feff}";
pub const SHEET_NAME: &str = "Summary";

pub fn key_header(mode: Mode) -> &'static str {
    match mode {
        Mode::SingleDay | Mode::CustomRange => "Date",
        Mode::Week => "Week (from - to)",
        Mode::CalendarMonth => "Month",
    }
}

pub fn table_headers(mode: Mode) -> [&'static str; 7] {
    [
        key_header(mode),
        "Avg. oktas",
        "% cloud cover",
        "Avg. confidence",
        "Dominant category",
        "Dominant description",
        "Records",
    ]
}

pub fn default_file_name(mode: Mode, extension: &str, today: NaiveDate) -> String {
    format!("summary_{}_{}.{extension}", mode.slug(), today.format("%Y-%m-%d"))
}

/// Comma-separated table, UTF-8 with a leading byte-order mark. Fields with
/// a comma, quote or newline are quoted with inner quotes doubled.
pub fn to_csv(mode: Mode, rows: &[AggregateRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(BYTE_ORDER_MARK.as_bytes().to_vec());

    writer.write_record(table_headers(mode))?;
    for row in rows {
        writer.write_record([
            row.label.clone(),
            format!("{:.2}", row.average),
            format!("{}%", row.percentage),
            format!("{}%", row.confidence_percent),
            row.dominant_category.clone(),
            row.dominant_description.clone(),
            row.record_count.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| DashboardError::Io(err.into_error()))
}

/// Single-sheet workbook with the same columns as the CSV; numeric columns
/// stay numeric.
pub fn to_workbook(mode: Mode, rows: &[AggregateRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in table_headers(mode).iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let line = idx as u32 + 1;
        worksheet.write_string(line, 0, row.label.as_str())?;
        worksheet.write_number(line, 1, (row.average * 100.0).round() / 100.0)?;
        worksheet.write_number(line, 2, f64::from(row.percentage))?;
        worksheet.write_number(line, 3, f64::from(row.confidence_percent))?;
        worksheet.write_string(line, 4, row.dominant_category.as_str())?;
        worksheet.write_string(line, 5, row.dominant_description.as_str())?;
        worksheet.write_number(line, 6, row.record_count as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn build_markdown(view: &DashboardView) -> String {
    let mut output = String::new();
    let range = &view.range.interval;

    let _ = writeln!(output, "# Sky Cover Summary");
    let _ = writeln!(
        output,
        "Mode {} from {} to {}",
        view.mode.slug(),
        range.from,
        range.to
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- {} records, average {:.2} oktas, confidence {}%",
        view.kpis.total_records, view.kpis.average_metric, view.kpis.confidence_percent
    );
    if view.stats.invalid_metric > 0 || view.stats.malformed > 0 {
        let _ = writeln!(
            output,
            "- skipped {} records without a usable metric and {} malformed entries",
            view.stats.invalid_metric, view.stats.malformed
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary Table");
    if view.table.is_empty() {
        let _ = writeln!(output, "No records for this selection.");
    } else {
        for row in &view.table {
            let _ = writeln!(
                output,
                "- {}: {:.2} oktas ({}%), confidence {}%, mostly {} across {} records",
                row.label,
                row.average,
                row.percentage,
                row.confidence_percent,
                row.dominant_category,
                row.record_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Category Mix");
    if view.distribution.is_empty() {
        let _ = writeln!(output, "No categorized records for this selection.");
    } else {
        for share in &view.distribution {
            let _ = writeln!(
                output,
                "- {} ({}): {} records, {:.1}%",
                share.code, share.description, share.count, share.percent
            );
        }
    }

    if let (Some(first), Some(last)) = (view.trend.first(), view.trend.last()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Trend");
        let _ = writeln!(
            output,
            "Fitted cover moves from {:.2} to {:.2} oktas across {} buckets.",
            first.fitted_value,
            last.fitted_value,
            view.trend.len()
        );
    }

    output
}
