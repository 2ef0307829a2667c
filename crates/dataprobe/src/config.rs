//! Configuration for profiling runs.
//!
//! A [`ProbeConfig`] is built explicitly and handed to the coordinator. Every
//! threshold the stats engine and the detectors use lives here; nothing reads
//! process-wide defaults.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

/// Fraction thresholds that map an affected fraction to a severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBands {
    /// Fraction at or above which an issue is `high`.
    pub high: f64,
    /// Fraction at or above which an issue is `medium`.
    pub medium: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            high: 0.2,
            medium: 0.05,
        }
    }
}

/// Configuration for the profiling engine, detectors and run coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Minimum parseable fraction for a typed classification.
    pub numeric_parse_threshold: f64,
    /// Distinct/non-null ratio below which text is categorical.
    pub categorical_ratio_cutoff: f64,
    /// Ordered chrono format strings tried when parsing dates.
    pub date_formats: Vec<String>,
    /// Maximum number of distinct sample values kept per profile.
    pub sample_cap: usize,
    /// Severity thresholds.
    pub severity_bands: SeverityBands,
    /// IQR multiplier for outlier bounds.
    pub outlier_multiplier: f64,
    /// Absolute cardinality ratio change reported as drift.
    pub cardinality_drift_delta: f64,
    /// Text tokens treated as null (case-insensitive).
    pub null_tokens: Vec<String>,
    /// Punctuation allowed in text besides alphanumerics and whitespace.
    pub allowed_punctuation: String,
    /// Columns declared as non-negative.
    pub non_negative_columns: Vec<String>,
    /// Name fragments that mark a column as non-negative.
    pub non_negative_name_hints: Vec<String>,
    /// Worker threads used for the per-column phase.
    pub workers: usize,
    /// Abort the run when it takes longer than this.
    pub run_timeout: Option<Duration>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            numeric_parse_threshold: 0.95,
            categorical_ratio_cutoff: 0.5,
            date_formats: default_date_formats(),
            sample_cap: 10,
            severity_bands: SeverityBands::default(),
            outlier_multiplier: 1.5,
            cardinality_drift_delta: 0.3,
            null_tokens: ["NA", "N/A", "null", "none", "nil"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_punctuation: "-_.".to_string(),
            non_negative_columns: Vec::new(),
            non_negative_name_hints: [
                "age", "price", "quantity", "qty", "count", "amount", "salary", "cost",
                "weight", "height", "duration",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            run_timeout: None,
        }
    }
}

fn default_date_formats() -> Vec<String> {
    [
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%b %d, %Y",
        "%d %b %Y",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ProbeConfig {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ProbeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ProbeConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the typed-classification threshold.
    pub fn with_parse_threshold(mut self, threshold: f64) -> Self {
        self.numeric_parse_threshold = threshold;
        self
    }

    /// Set the sample cap.
    pub fn with_sample_cap(mut self, cap: usize) -> Self {
        self.sample_cap = cap;
        self
    }

    /// Set the outlier multiplier.
    pub fn with_outlier_multiplier(mut self, multiplier: f64) -> Self {
        self.outlier_multiplier = multiplier;
        self
    }

    /// Set the cardinality drift delta.
    pub fn with_cardinality_drift_delta(mut self, delta: f64) -> Self {
        self.cardinality_drift_delta = delta;
        self
    }

    /// Set the severity bands.
    pub fn with_severity_bands(mut self, high: f64, medium: f64) -> Self {
        self.severity_bands = SeverityBands { high, medium };
        self
    }

    /// Declare a column as non-negative.
    pub fn with_non_negative_column(mut self, column: impl Into<String>) -> Self {
        self.non_negative_columns.push(column.into());
        self
    }

    /// Replace the name fragments used to infer non-negative columns.
    pub fn with_non_negative_name_hints(mut self, hints: Vec<String>) -> Self {
        self.non_negative_name_hints = hints;
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the run timeout.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Check every field; reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        check_fraction("numeric_parse_threshold", self.numeric_parse_threshold)?;
        check_fraction("categorical_ratio_cutoff", self.categorical_ratio_cutoff)?;
        check_fraction("severity_bands.high", self.severity_bands.high)?;
        check_fraction("severity_bands.medium", self.severity_bands.medium)?;

        if self.severity_bands.medium > self.severity_bands.high {
            return Err(ProbeError::Config(format!(
                "severity_bands.medium ({}) must not exceed severity_bands.high ({})",
                self.severity_bands.medium, self.severity_bands.high
            )));
        }
        if self.sample_cap == 0 {
            return Err(ProbeError::Config("sample_cap must be at least 1".to_string()));
        }
        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier < 0.0 {
            return Err(ProbeError::Config(format!(
                "outlier_multiplier must be a non-negative number, got {}",
                self.outlier_multiplier
            )));
        }
        if !self.cardinality_drift_delta.is_finite() || self.cardinality_drift_delta < 0.0 {
            return Err(ProbeError::Config(format!(
                "cardinality_drift_delta must be a non-negative number, got {}",
                self.cardinality_drift_delta
            )));
        }
        if self.workers == 0 {
            return Err(ProbeError::Config("workers must be at least 1".to_string()));
        }
        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ProbeError::Config("run_timeout must be positive".to_string()));
        }
        for format in &self.date_formats {
            if format.is_empty()
                || StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
            {
                return Err(ProbeError::Config(format!("invalid date format '{}'", format)));
            }
        }

        Ok(())
    }

    /// Whether a column is expected to hold only non-negative values.
    pub fn expects_non_negative(&self, column: &str) -> bool {
        if self.non_negative_columns.iter().any(|c| c == column) {
            return true;
        }
        let lower = column.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        self.non_negative_name_hints.iter().any(|hint| {
            let hint = hint.to_lowercase();
            !hint.is_empty()
                && tokens
                    .iter()
                    .any(|t| *t == hint || t.strip_suffix('s') == Some(hint.as_str()))
        })
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ProbeError::Config(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProbeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = ProbeConfig::new().with_parse_threshold(1.5);
        assert!(matches!(config.validate(), Err(ProbeError::Config(_))));

        let config = ProbeConfig::new().with_parse_threshold(-0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_sample_cap() {
        let config = ProbeConfig::new().with_sample_cap(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_bands() {
        let config = ProbeConfig::new().with_severity_bands(0.1, 0.3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_multiplier() {
        let config = ProbeConfig::new().with_outlier_multiplier(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_date_format() {
        let mut config = ProbeConfig::new();
        config.date_formats.push("%Q-%".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_negative_signal() {
        let config = ProbeConfig::new().with_non_negative_column("balance");
        assert!(config.expects_non_negative("balance"));
        assert!(config.expects_non_negative("customer_age"));
        assert!(!config.expects_non_negative("temperature"));

        assert!(config.expects_non_negative("unit_price"));
        assert!(config.expects_non_negative("Item Counts"));

        let config = config.with_non_negative_name_hints(Vec::new());
        assert!(!config.expects_non_negative("customer_age"));
        assert!(config.expects_non_negative("balance"));
    }

    #[test]
    fn test_name_hints_match_whole_words() {
        let config = ProbeConfig::new();
        for column in [
            "average_temperature",
            "percentage_change",
            "page_offset",
            "country_code_delta",
            "discounted",
        ] {
            assert!(!config.expects_non_negative(column), "{} matched", column);
        }
        assert!(config.expects_non_negative("AGE"));
        assert!(config.expects_non_negative("order-qty"));
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"sample_cap": 3, "outlier_multiplier": 3.0}"#)
            .unwrap();

        let config = ProbeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.sample_cap, 3);
        assert_eq!(config.outlier_multiplier, 3.0);
        assert_eq!(config.numeric_parse_threshold, 0.95);
    }
}
