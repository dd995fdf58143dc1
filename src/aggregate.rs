use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};

use crate::categories;
use crate::models::{round_to, AggregateRow, Bucket, Granularity, Kpis, Record, METRIC_CEILING};

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday();
    date.checked_sub_days(Days::new(u64::from(offset)))
        .unwrap_or(date)
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{}-{:02}", date.year(), date.month())
}

pub fn date_label(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Groups `records` into buckets. `Hour` and `DayOfMonth` are dense and
/// always emit every slot; the other granularities only emit keys that
/// have records, ascending.
pub fn bucketize(records: &[Record], granularity: Granularity) -> Vec<Bucket> {
    match granularity {
        Granularity::Hour => {
            let mut buckets: Vec<Bucket> = (0..24)
                .map(|hour| Bucket {
                    key: format!("{hour:02}"),
                    ordinal_index: hour,
                    label: format!("{hour:02}:00"),
                    records: Vec::new(),
                })
                .collect();
            for record in records {
                buckets[record.hour.min(23) as usize].records.push(record.clone());
            }
            buckets
        }
        Granularity::DayOfMonth { year, month } => dense_month(records, year, month),
        Granularity::Date | Granularity::WeekStart | Granularity::MonthKey => {
            let mut groups: BTreeMap<String, (String, Vec<Record>)> = BTreeMap::new();
            for record in records {
                let (key, label) = sparse_key(record.date, granularity);
                groups
                    .entry(key)
                    .or_insert_with(|| (label, Vec::new()))
                    .1
                    .push(record.clone());
            }
            groups
                .into_iter()
                .enumerate()
                .map(|(ordinal_index, (key, (label, records)))| Bucket {
                    key,
                    ordinal_index,
                    label,
                    records,
                })
                .collect()
        }
    }
}

fn dense_month(records: &[Record], year: i32, month: u32) -> Vec<Bucket> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        tracing::warn!(year, month, "day-of-month bucketing asked for an impossible month");
        return Vec::new();
    };

    let mut buckets: Vec<Bucket> = first
        .iter_days()
        .take_while(|day| day.month() == month)
        .enumerate()
        .map(|(ordinal_index, day)| Bucket {
            key: day.format("%Y-%m-%d").to_string(),
            ordinal_index,
            label: day.format("%d-%m").to_string(),
            records: Vec::new(),
        })
        .collect();

    for record in records {
        if record.date.year() != year || record.date.month() != month {
            tracing::warn!(date = %record.date, "record outside the bucketed month skipped");
            continue;
        }
        buckets[record.date.day0() as usize].records.push(record.clone());
    }
    buckets
}

fn sparse_key(date: NaiveDate, granularity: Granularity) -> (String, String) {
    match granularity {
        Granularity::WeekStart => {
            let monday = week_start(date);
            let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
            (
                monday.format("%Y-%m-%d").to_string(),
                format!("{} - {}", date_label(monday), date_label(sunday)),
            )
        }
        Granularity::MonthKey => {
            let label = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .map(|first| first.format("%B %Y").to_string())
                .unwrap_or_else(|| month_key(date));
            (month_key(date), label)
        }
        _ => (date.format("%Y-%m-%d").to_string(), date_label(date)),
    }
}

/// Statistics for one bucket. Empty buckets report zeros, never NaN.
pub fn summarize_bucket(bucket: Bucket) -> AggregateRow {
    let count = bucket.records.len();
    let average = if count == 0 {
        0.0
    } else {
        bucket.records.iter().map(|r| r.primary_metric).sum::<f64>() / count as f64
    };
    let summary = categories::summarize(&bucket.records);

    AggregateRow {
        key: bucket.key,
        ordinal_index: bucket.ordinal_index,
        label: bucket.label,
        average,
        percentage: percent_of_ceiling(average),
        confidence_percent: mean_confidence(&bucket.records),
        dominant_category: summary.dominant_category,
        dominant_description: summary.dominant_description,
        category_frequency: summary.frequency,
        record_count: count,
    }
}

pub fn aggregate(records: &[Record], granularity: Granularity) -> Vec<AggregateRow> {
    bucketize(records, granularity)
        .into_iter()
        .map(summarize_bucket)
        .collect()
}

pub fn kpis(records: &[Record]) -> Kpis {
    let total_records = records.len();
    let average_metric = if total_records == 0 {
        0.0
    } else {
        round_to(
            records.iter().map(|r| r.primary_metric).sum::<f64>() / total_records as f64,
            2,
        )
    };
    Kpis {
        total_records,
        average_metric,
        confidence_percent: mean_confidence(records),
    }
}

fn percent_of_ceiling(average: f64) -> u32 {
    (average / METRIC_CEILING * 100.0).round().max(0.0) as u32
}

fn mean_confidence(records: &[Record]) -> u32 {
    let values: Vec<f64> = records.iter().filter_map(|r| r.confidence).collect();
    if values.is_empty() {
        return 0;
    }
    (values.iter().sum::<f64>() / values.len() as f64)
        .round()
        .max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stamp: &str, metric: f64) -> Record {
        let date = NaiveDate::parse_from_str(&stamp[..10], "%Y-%m-%d").unwrap();
        let hour = stamp[11..13].parse().unwrap();
        Record {
            timestamp: stamp.to_string(),
            date,
            hour,
            primary_metric: metric,
            confidence: Some(80.0),
            category: "SCT".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn hourly_series_is_always_dense() {
        let rows = aggregate(&[], Granularity::Hour);
        assert_eq!(rows.len(), 24);
        assert!(rows.iter().all(|row| row.average == 0.0 && row.record_count == 0));
        assert_eq!(rows[7].label, "07:00");
    }

    #[test]
    fn hourly_statistics() {
        let records = vec![
            record("2025-10-27T13:05:00", 3.0),
            record("2025-10-27T14:10:00", 5.0),
            record("2025-10-27T14:40:00", 6.0),
        ];
        let rows = aggregate(&records, Granularity::Hour);
        assert_eq!(rows[13].average, 3.0);
        assert_eq!(rows[13].percentage, 38);
        assert_eq!(rows[14].average, 5.5);
        assert_eq!(rows[14].percentage, 69);
        assert_eq!(rows[14].confidence_percent, 80);
        assert_eq!(rows.iter().map(|r| r.record_count).sum::<usize>(), 3);
    }

    #[test]
    fn month_series_has_one_bucket_per_day() {
        let records = vec![
            record("2024-02-01T10:00:00", 2.0),
            record("2024-02-29T10:00:00", 8.0),
        ];
        let rows = aggregate(&records, Granularity::DayOfMonth { year: 2024, month: 2 });
        assert_eq!(rows.len(), 29);
        assert_eq!(rows[0].average, 2.0);
        assert_eq!(rows[28].average, 8.0);
        assert_eq!(rows[28].percentage, 100);
        assert_eq!(rows[28].label, "29-02");
        assert_eq!(rows.iter().map(|r| r.record_count).sum::<usize>(), 2);
    }

    #[test]
    fn date_buckets_are_sparse_and_sorted() {
        let records = vec![
            record("2025-10-03T10:00:00", 4.0),
            record("2025-10-01T10:00:00", 2.0),
            record("2025-10-03T11:00:00", 6.0),
        ];
        let rows = aggregate(&records, Granularity::Date);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "2025-10-01");
        assert_eq!(rows[0].ordinal_index, 0);
        assert_eq!(rows[1].label, "03/10/2025");
        assert_eq!(rows[1].average, 5.0);
    }

    #[test]
    fn weeks_start_on_monday() {
        let sunday = NaiveDate::from_ymd_opt(2025, 11, 2).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        assert_eq!(week_start(sunday), monday);
        assert_eq!(week_start(monday), monday);

        let rows = aggregate(
            &[
                record("2025-10-27T10:00:00", 1.0),
                record("2025-11-02T10:00:00", 3.0),
                record("2025-11-03T10:00:00", 8.0),
            ],
            Granularity::WeekStart,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "2025-10-27");
        assert_eq!(rows[0].label, "27/10/2025 - 02/11/2025");
        assert_eq!(rows[0].average, 2.0);
    }

    #[test]
    fn month_keys_group_across_months() {
        let rows = aggregate(
            &[
                record("2025-09-30T10:00:00", 1.0),
                record("2025-10-01T10:00:00", 3.0),
            ],
            Granularity::MonthKey,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].key, "2025-10");
        assert_eq!(rows[1].label, "October 2025");
    }

    #[test]
    fn averages_stay_in_scale() {
        let records: Vec<Record> = (0..24)
            .map(|hour| record(&format!("2025-10-27T{hour:02}:00:00"), (hour % 9) as f64))
            .collect();
        for row in aggregate(&records, Granularity::Hour) {
            assert!((0.0..=8.0).contains(&row.average));
            assert!(row.percentage <= 100);
        }
    }

    #[test]
    fn kpis_cover_whole_batch() {
        let kpis = kpis(&[
            record("2025-10-27T13:00:00", 3.0),
            record("2025-10-28T13:00:00", 4.0),
            record("2025-10-29T13:00:00", 4.0),
        ]);
        assert_eq!(kpis.total_records, 3);
        assert_eq!(kpis.average_metric, 3.67);
        assert_eq!(kpis.confidence_percent, 80);
    }
}
