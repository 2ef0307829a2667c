//! Statistical analysis for column type and distribution inference.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;

use crate::config::ProbeConfig;
use crate::input::Value;
use crate::schema::{ColumnType, Profile, RunId};

use super::dates::DateMatcher;
use super::distribution::{numeric_statistics, outlier_bounds, text_statistics};

/// How many non-null values parse as each typed candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounts {
    pub non_null: usize,
    pub boolean: usize,
    pub integer: usize,
    pub float: usize,
    pub date: usize,
}

/// Performs statistical analysis on data columns.
///
/// The analyzer is a pure function of its configuration and the column
/// values; it holds no state between calls and is shared across workers.
#[derive(Debug, Clone)]
pub struct StatisticalAnalyzer {
    config: ProbeConfig,
    dates: DateMatcher,
}

impl StatisticalAnalyzer {
    /// Create an analyzer from a validated configuration.
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            dates: DateMatcher::new(&config.date_formats),
            config: config.clone(),
        }
    }

    /// The date matcher built from the configured formats.
    pub fn dates(&self) -> &DateMatcher {
        &self.dates
    }

    /// Profile one column.
    pub fn profile_column(
        &self,
        name: &str,
        position: usize,
        values: &[Value],
        run_id: &RunId,
        profiled_at: DateTime<Utc>,
    ) -> Profile {
        let non_null: Vec<&Value> = values
            .iter()
            .filter(|v| !v.is_null(&self.config.null_tokens))
            .collect();
        let null_count = values.len() - non_null.len();

        // Distinct values in first-seen order
        let distinct: IndexSet<Cow<'_, str>> = non_null.iter().map(|v| v.render()).collect();
        let distinct_count = distinct.len();
        let cardinality_ratio = distinct_count as f64 / non_null.len().max(1) as f64;

        let counts = self.count_candidates(&non_null);
        let inferred_type = self.infer_type(&counts, cardinality_ratio);

        let (numeric, outliers) = if inferred_type.is_numeric() {
            let numbers: Vec<f64> = non_null.iter().filter_map(|v| v.as_f64()).collect();
            let stats = numeric_statistics(&numbers);
            let bounds = stats
                .as_ref()
                .map(|s| outlier_bounds(s, self.config.outlier_multiplier));
            (stats, bounds)
        } else {
            (None, None)
        };

        let text = if inferred_type.is_textual() {
            let rendered: Vec<Cow<'_, str>> = non_null.iter().map(|v| v.render()).collect();
            text_statistics(rendered.iter().map(|s| s.as_ref()))
        } else {
            None
        };

        let sample_values = distinct
            .iter()
            .take(self.config.sample_cap)
            .map(|s| s.to_string())
            .collect();

        Profile {
            column: name.to_string(),
            position,
            run_id: run_id.clone(),
            inferred_type,
            total_count: values.len(),
            null_count,
            distinct_count,
            cardinality_ratio,
            numeric,
            text,
            outlier_bounds: outliers,
            sample_values,
            profiled_at,
        }
    }

    /// Classify each non-null value's parseability.
    pub fn count_candidates(&self, non_null: &[&Value]) -> TypeCounts {
        let mut counts = TypeCounts {
            non_null: non_null.len(),
            ..TypeCounts::default()
        };

        for value in non_null {
            if value.is_boolean() {
                counts.boolean += 1;
            }
            if value.is_integer() {
                counts.integer += 1;
            }
            if value.as_f64().is_some() {
                counts.float += 1;
            }
            if value.as_str().is_some_and(|s| self.dates.is_date(s)) {
                counts.date += 1;
            }
        }

        counts
    }

    /// Pick the most specific type whose parseable fraction meets the threshold.
    pub fn infer_type(&self, counts: &TypeCounts, cardinality_ratio: f64) -> ColumnType {
        if counts.non_null == 0 {
            return ColumnType::Unknown;
        }

        let total = counts.non_null as f64;
        let threshold = self.config.numeric_parse_threshold;
        let candidates = [
            (ColumnType::Boolean, counts.boolean),
            (ColumnType::Integer, counts.integer),
            (ColumnType::Float, counts.float),
            (ColumnType::Date, counts.date),
        ];

        for (column_type, count) in candidates {
            if count as f64 / total >= threshold {
                return column_type;
            }
        }

        if cardinality_ratio < self.config.categorical_ratio_cutoff {
            ColumnType::Categorical
        } else {
            ColumnType::String
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(values: Vec<Value>) -> Profile {
        analyze_with(&ProbeConfig::default(), values)
    }

    fn analyze_with(config: &ProbeConfig, values: Vec<Value>) -> Profile {
        StatisticalAnalyzer::new(config).profile_column(
            "col",
            0,
            &values,
            &RunId::from("run_000001"),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    fn texts(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::text(*v)).collect()
    }

    #[test]
    fn test_infer_integer_type() {
        let profile = analyze(texts(&["1", "2", "3", "100"]));
        assert_eq!(profile.inferred_type, ColumnType::Integer);
        assert!(profile.numeric.is_some());
        assert!(profile.outlier_bounds.is_some());
    }

    #[test]
    fn test_infer_float_type() {
        let profile = analyze(texts(&["1.5", "2.7", "3.14", "0.5"]));
        assert_eq!(profile.inferred_type, ColumnType::Float);
    }

    #[test]
    fn test_infer_boolean_type() {
        let profile = analyze(vec![
            Value::Bool(true),
            Value::text("false"),
            Value::text("Yes"),
            Value::text("no"),
        ]);
        assert_eq!(profile.inferred_type, ColumnType::Boolean);
        assert!(profile.numeric.is_none());
    }

    #[test]
    fn test_infer_date_type() {
        let profile = analyze(texts(&["2024-01-15", "2024-02-20", "03/25/2024"]));
        assert_eq!(profile.inferred_type, ColumnType::Date);
    }

    #[test]
    fn test_categorical_vs_string() {
        let profile = analyze(texts(&["A", "B", "A", "B", "A", "B"]));
        assert_eq!(profile.inferred_type, ColumnType::Categorical);

        let profile = analyze(texts(&["Alice", "Bob", "Carol"]));
        assert_eq!(profile.inferred_type, ColumnType::String);
        assert!(profile.text.is_some());
    }

    #[test]
    fn test_threshold_boundary() {
        let mut values: Vec<Value> = (1..=19).map(Value::from).collect();
        values.push(Value::text("oops"));

        let at = ProbeConfig::default().with_parse_threshold(0.95);
        assert_eq!(analyze_with(&at, values.clone()).inferred_type, ColumnType::Integer);

        let above = ProbeConfig::default().with_parse_threshold(0.96);
        let inferred = analyze_with(&above, values).inferred_type;
        assert!(inferred.is_textual());
    }

    #[test]
    fn test_all_null_column() {
        let profile = analyze(vec![Value::Null, Value::text("NA"), Value::text("")]);
        assert_eq!(profile.inferred_type, ColumnType::Unknown);
        assert_eq!(profile.null_count, 3);
        assert_eq!(profile.distinct_count, 0);
        assert_eq!(profile.cardinality_ratio, 0.0);
        assert!(profile.numeric.is_none());
        assert!(profile.outlier_bounds.is_none());
    }

    #[test]
    fn test_detect_nulls_and_cardinality() {
        let profile = analyze(vec![
            Value::from(1),
            Value::text("NA"),
            Value::from(3),
            Value::Null,
            Value::from(3),
        ]);
        assert_eq!(profile.null_count, 2);
        assert_eq!(profile.distinct_count, 2);
        assert!((profile.cardinality_ratio - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_is_capped_first_seen() {
        let config = ProbeConfig::default().with_sample_cap(3);
        let profile = analyze_with(&config, texts(&["d", "a", "d", "c", "b", "a"]));
        assert_eq!(profile.sample_values, vec!["d", "a", "c"]);
    }

    #[test]
    fn test_profile_is_deterministic() {
        let values = texts(&["3", "1", "4", "1", "5", "9", "2", "6"]);
        assert_eq!(analyze(values.clone()), analyze(values));
    }
}
