use crate::models::{round_to, AggregateRow, TrendPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Ordinary least squares over `(x, y)` pairs. A degenerate x spread
    /// (including no points at all) yields a flat line.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        if points.is_empty() {
            return Self {
                slope: 0.0,
                intercept: 0.0,
            };
        }

        let n = points.len() as f64;
        let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
        let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
        let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
        let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

        let denominator = n * sum_xx - sum_x * sum_x;
        let slope = if denominator == 0.0 {
            0.0
        } else {
            (n * sum_xy - sum_x * sum_y) / denominator
        };
        let intercept = (sum_y - slope * sum_x) / n;

        Self { slope, intercept }
    }

    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fits bucket averages against their ordinal index. Every bucket gets a
/// fitted value, empty ones included.
pub fn fit(rows: &[AggregateRow]) -> Vec<TrendPoint> {
    let points: Vec<(f64, f64)> = rows
        .iter()
        .map(|row| (row.ordinal_index as f64, row.average))
        .collect();
    let line = LinearFit::from_points(&points);

    rows.iter()
        .map(|row| TrendPoint {
            ordinal_index: row.ordinal_index,
            raw_value: row.average,
            fitted_value: round_to(line.at(row.ordinal_index as f64), 2),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::models::Granularity;

    fn rows_with_averages(values: &[f64]) -> Vec<AggregateRow> {
        let mut rows = aggregate(&[], Granularity::Hour);
        rows.truncate(values.len());
        for (row, value) in rows.iter_mut().zip(values) {
            row.average = *value;
        }
        rows
    }

    #[test]
    fn linear_series_fits_exactly() {
        let trend = fit(&rows_with_averages(&[1.0, 2.0, 3.0, 4.0]));
        for point in &trend {
            assert_eq!(point.fitted_value, point.raw_value);
        }
    }

    #[test]
    fn single_point_has_flat_trend() {
        let line = LinearFit::from_points(&[(0.0, 5.0)]);
        assert_eq!(line.slope, 0.0);
        assert_eq!(line.intercept, 5.0);
    }

    #[test]
    fn empty_series_is_flat_zero() {
        assert!(fit(&[]).is_empty());
        let line = LinearFit::from_points(&[]);
        assert_eq!(line.at(10.0), 0.0);
    }

    #[test]
    fn zero_record_buckets_still_get_fitted() {
        let trend = fit(&rows_with_averages(&[0.0, 4.0, 0.0, 4.0]));
        assert_eq!(trend.len(), 4);
        assert_eq!(trend[0].fitted_value, 0.8);
        assert_eq!(trend[3].fitted_value, 3.2);
    }

    #[test]
    fn fitted_values_round_to_two_decimals() {
        let trend = fit(&rows_with_averages(&[1.0, 1.0, 2.0]));
        assert_eq!(trend[0].fitted_value, 0.83);
        assert_eq!(trend[2].fitted_value, 1.83);
    }
}
