//! Per-column statistical snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ColumnType, RunId};

/// Statistics for numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub median: f64,
    /// First quartile (25th percentile).
    pub q1: f64,
    /// Third quartile (75th percentile).
    pub q3: f64,
}

impl NumericStatistics {
    /// Calculate the interquartile range.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Statistics over the character length of text values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStatistics {
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
    pub std_length: f64,
}

/// Bounds outside which a numeric value counts as an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    /// Whether a value falls outside the bounds.
    pub fn contains_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// Immutable statistical snapshot of one column for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Column name.
    pub column: String,
    /// Zero-based position in the table.
    pub position: usize,
    /// Run that produced this snapshot.
    pub run_id: RunId,
    /// Inferred semantic type.
    pub inferred_type: ColumnType,
    /// Total number of values (including nulls).
    pub total_count: usize,
    /// Number of null/missing values.
    pub null_count: usize,
    /// Number of distinct non-null values.
    pub distinct_count: usize,
    /// distinct_count / max(1, non-null count).
    pub cardinality_ratio: f64,
    /// Numeric statistics (for numeric columns).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub numeric: Option<NumericStatistics>,
    /// Length statistics (for categorical and string columns).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<TextStatistics>,
    /// IQR outlier bounds (for numeric columns).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub outlier_bounds: Option<OutlierBounds>,
    /// Distinct values in first-seen order, capped.
    #[serde(default)]
    pub sample_values: Vec<String>,
    /// When the run that produced this profile started.
    pub profiled_at: DateTime<Utc>,
}

impl Profile {
    /// Number of non-null values.
    pub fn non_null_count(&self) -> usize {
        self.total_count - self.null_count
    }

    /// Fraction of values that are null.
    pub fn null_fraction(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.null_count as f64 / self.total_count as f64
        }
    }

    /// Compare the statistical content of two profiles, ignoring run identity
    /// and timestamps.
    pub fn same_statistics(&self, other: &Profile) -> bool {
        self.column == other.column
            && self.position == other.position
            && self.inferred_type == other.inferred_type
            && self.total_count == other.total_count
            && self.null_count == other.null_count
            && self.distinct_count == other.distinct_count
            && self.cardinality_ratio == other.cardinality_ratio
            && self.numeric == other.numeric
            && self.text == other.text
            && self.outlier_bounds == other.outlier_bounds
            && self.sample_values == other.sample_values
    }
}
