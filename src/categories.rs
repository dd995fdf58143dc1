use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::models::{round_to, AggregateRow, Record};

pub const UNKNOWN_CATEGORY: &str = "N/A";
pub const UNKNOWN_DESCRIPTION: &str = "-";

/// Sky-cover codes shown in the distribution chart, with their canonical text.
pub const KNOWN_CATEGORIES: [(&str, &str); 5] = [
    ("SKC", "Sky clear"),
    ("FEW", "Few clouds"),
    ("SCT", "Scattered clouds"),
    ("BKN", "Broken clouds"),
    ("OVC", "Overcast"),
];

pub fn canonical_description(code: &str) -> Option<&'static str> {
    KNOWN_CATEGORIES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, text)| *text)
}

/// Counts keyed by label, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frequency {
    entries: Vec<(String, usize)>,
}

impl Frequency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: &str, count: usize) {
        match self.entries.iter_mut().find(|(key, _)| key == label) {
            Some(entry) => entry.1 += count,
            None => self.entries.push((label.to_string(), count)),
        }
    }

    pub fn get(&self, label: &str) -> usize {
        self.entries
            .iter()
            .find(|(key, _)| key == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// Entry with the highest count. Ties go to the label seen first.
    pub fn dominant(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (key, count) in self.iter() {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((key, count)),
            }
        }
        best.map(|(key, _)| key)
    }
}

impl<'a> FromIterator<&'a str> for Frequency {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut frequency = Frequency::new();
        for label in iter {
            frequency.add(label, 1);
        }
        frequency
    }
}

impl Serialize for Frequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub frequency: Frequency,
    pub dominant_category: String,
    pub dominant_description: String,
}

/// Category and description dominance for one group of records. The two
/// are resolved independently and may disagree.
pub fn summarize(records: &[Record]) -> CategorySummary {
    let frequency: Frequency = records.iter().map(|r| r.category.as_str()).collect();
    let descriptions: Frequency = records
        .iter()
        .map(|r| r.description.trim())
        .filter(|text| !text.is_empty())
        .collect();

    CategorySummary {
        dominant_category: frequency
            .dominant()
            .unwrap_or(UNKNOWN_CATEGORY)
            .to_string(),
        dominant_description: descriptions
            .dominant()
            .unwrap_or(UNKNOWN_DESCRIPTION)
            .to_string(),
        frequency,
    }
}

/// Merges per-row frequencies in row order.
pub fn overall(rows: &[AggregateRow]) -> Frequency {
    let mut merged = Frequency::new();
    for row in rows {
        for (key, count) in row.category_frequency.iter() {
            merged.add(key, count);
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub code: String,
    pub description: &'static str,
    pub count: usize,
    pub percent: f64,
}

/// Known sky-cover codes from `frequency`, largest first. Equal counts keep
/// first-seen order.
pub fn distribution(frequency: &Frequency) -> Vec<CategoryShare> {
    let known: Vec<(&str, usize, &'static str)> = frequency
        .iter()
        .filter_map(|(code, count)| canonical_description(code).map(|text| (code, count, text)))
        .collect();
    let total: usize = known.iter().map(|(_, count, _)| count).sum();

    let mut shares: Vec<CategoryShare> = known
        .into_iter()
        .map(|(code, count, description)| CategoryShare {
            code: code.to_string(),
            description,
            count,
            percent: if total == 0 {
                0.0
            } else {
                round_to(count as f64 / total as f64 * 100.0, 1)
            },
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(category: &str, description: &str) -> Record {
        Record {
            timestamp: "2025-10-27T10:00:00".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
            hour: 10,
            primary_metric: 4.0,
            confidence: None,
            category: category.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn most_frequent_category_wins() {
        let records = vec![
            record("SCT", "Scattered clouds"),
            record("SCT", "Scattered clouds"),
            record("BKN", "Broken clouds"),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.dominant_category, "SCT");
        assert_eq!(summary.frequency.get("SCT"), 2);
        assert_eq!(summary.frequency.get("BKN"), 1);
        assert_eq!(summary.frequency.total(), 3);
    }

    #[test]
    fn ties_break_by_first_seen() {
        let frequency: Frequency = ["BKN", "SCT", "SCT", "BKN"].into_iter().collect();
        assert_eq!(frequency.dominant(), Some("BKN"));

        let reversed: Frequency = ["SCT", "BKN", "BKN", "SCT"].into_iter().collect();
        assert_eq!(reversed.dominant(), Some("SCT"));
    }

    #[test]
    fn description_dominance_is_independent() {
        let records = vec![
            record("SCT", "patchy"),
            record("SCT", "patchy"),
            record("BKN", "heavy"),
            record("OVC", "heavy"),
            record("OVC", "heavy"),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.dominant_category, "SCT");
        assert_eq!(summary.dominant_description, "heavy");
    }

    #[test]
    fn empty_group_falls_back() {
        let summary = summarize(&[]);
        assert_eq!(summary.dominant_category, UNKNOWN_CATEGORY);
        assert_eq!(summary.dominant_description, UNKNOWN_DESCRIPTION);
        assert!(summary.frequency.is_empty());
    }

    #[test]
    fn distribution_skips_unknown_codes() {
        let frequency: Frequency = ["SCT", "XYZ", "OVC", "OVC", "N/A"].into_iter().collect();
        let shares = distribution(&frequency);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].code, "OVC");
        assert_eq!(shares[0].percent, 66.7);
        assert_eq!(shares[1].code, "SCT");
        assert_eq!(shares[1].description, "Scattered clouds");
    }

    #[test]
    fn frequency_serializes_in_insertion_order() {
        let frequency: Frequency = ["SCT", "BKN", "SCT"].into_iter().collect();
        let json = serde_json::to_string(&frequency).unwrap();
        assert_eq!(json, r#"{"SCT":2,"BKN":1}"#);
    }
}
