//! Issue records produced by the quality detectors.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::SeverityBands;
use crate::schema::{RunId, TableId};

/// Type of data quality issue. One detector per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Null or null-like values present.
    MissingValues,
    /// Exact-duplicate rows (table-level).
    Duplicates,
    /// Numbers hiding in text, or text residue in a numeric column.
    InvalidNumeric,
    /// Negative values in a column that should be non-negative.
    NegativeValues,
    /// Values outside the IQR bounds.
    Outliers,
    /// A date column written in more than one format.
    MixedDateFormats,
    /// The same value spelled with different letter case.
    CaseSensitivity,
    /// Leading, trailing or repeated internal whitespace.
    WhitespaceIssues,
    /// Characters outside alphanumerics, whitespace and allowed punctuation.
    SpecialCharacters,
    /// Text far longer than the rest of the column.
    UnusuallyLongValues,
    /// A detector failed on the column.
    GenericIssue,
}

impl IssueType {
    /// Every issue type, in detector-table order.
    pub const ALL: [IssueType; 11] = [
        IssueType::MissingValues,
        IssueType::Duplicates,
        IssueType::InvalidNumeric,
        IssueType::NegativeValues,
        IssueType::Outliers,
        IssueType::MixedDateFormats,
        IssueType::CaseSensitivity,
        IssueType::WhitespaceIssues,
        IssueType::SpecialCharacters,
        IssueType::UnusuallyLongValues,
        IssueType::GenericIssue,
    ];

    /// Stable snake_case name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::MissingValues => "missing_values",
            IssueType::Duplicates => "duplicates",
            IssueType::InvalidNumeric => "invalid_numeric",
            IssueType::NegativeValues => "negative_values",
            IssueType::Outliers => "outliers",
            IssueType::MixedDateFormats => "mixed_date_formats",
            IssueType::CaseSensitivity => "case_sensitivity",
            IssueType::WhitespaceIssues => "whitespace_issues",
            IssueType::SpecialCharacters => "special_characters",
            IssueType::UnusuallyLongValues => "unusually_long_values",
            IssueType::GenericIssue => "generic_issue",
        }
    }

    /// Get a human-readable label for the issue type.
    pub fn label(&self) -> &'static str {
        match self {
            IssueType::MissingValues => "Missing Values",
            IssueType::Duplicates => "Duplicate Rows",
            IssueType::InvalidNumeric => "Invalid Numeric",
            IssueType::NegativeValues => "Negative Values",
            IssueType::Outliers => "Outliers",
            IssueType::MixedDateFormats => "Mixed Date Formats",
            IssueType::CaseSensitivity => "Case Sensitivity",
            IssueType::WhitespaceIssues => "Whitespace Issues",
            IssueType::SpecialCharacters => "Special Characters",
            IssueType::UnusuallyLongValues => "Unusually Long Values",
            IssueType::GenericIssue => "Generic Issue",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Map an affected fraction onto the configured bands.
    pub fn from_fraction(fraction: f64, bands: &SeverityBands) -> Self {
        if fraction >= bands.high {
            Severity::High
        } else if fraction >= bands.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

/// Evidence supporting an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// A few offending values, in row order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub examples: Vec<String>,
    /// Sample row indices.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sample_rows: Vec<usize>,
    /// Detector parameters (bounds, formats, lengths) handed to the fix mapper.
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub params: IndexMap<String, JsonValue>,
}

impl Evidence {
    /// Create empty evidence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set example values.
    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    /// Set sample rows.
    pub fn with_sample_rows(mut self, rows: Vec<usize>) -> Self {
        self.sample_rows = rows;
        self
    }

    /// Add a detector parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Look up a detector parameter.
    pub fn param(&self, name: &str) -> Option<&JsonValue> {
        self.params.get(name)
    }
}

/// A data quality issue found in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// `{run}:{column|_table}:{type}`.
    pub id: String,
    pub table_id: TableId,
    /// Affected column; `None` for table-level issues.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub affected_count: usize,
    pub affected_fraction: f64,
    /// Human-readable description.
    pub description: String,
    pub evidence: Evidence,
    pub detected_at: DateTime<Utc>,
    pub run_id: RunId,
}

impl Issue {
    /// Deterministic id for an issue.
    pub fn make_id(run_id: &RunId, column: Option<&str>, issue_type: IssueType) -> String {
        format!("{}:{}:{}", run_id, column.unwrap_or("_table"), issue_type)
    }

    /// The key used to merge detector results: one issue per column, type and run.
    pub fn key(&self) -> (Option<String>, IssueType, RunId) {
        (self.column.clone(), self.issue_type, self.run_id.clone())
    }

    /// Whether this issue concerns the whole table.
    pub fn is_table_level(&self) -> bool {
        self.column.is_none()
    }

    /// Set the evidence.
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_bands() {
        let bands = SeverityBands::default();
        assert_eq!(Severity::from_fraction(0.5, &bands), Severity::High);
        assert_eq!(Severity::from_fraction(0.2, &bands), Severity::High);
        assert_eq!(Severity::from_fraction(0.1, &bands), Severity::Medium);
        assert_eq!(Severity::from_fraction(0.05, &bands), Severity::Medium);
        assert_eq!(Severity::from_fraction(0.01, &bands), Severity::Low);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn test_issue_id_format() {
        let run = RunId::from("run_000002");
        assert_eq!(
            Issue::make_id(&run, Some("age"), IssueType::Outliers),
            "run_000002:age:outliers"
        );
        assert_eq!(
            Issue::make_id(&run, None, IssueType::Duplicates),
            "run_000002:_table:duplicates"
        );
    }

    #[test]
    fn test_issue_type_serializes_snake_case() {
        let json = serde_json::to_string(&IssueType::MixedDateFormats).unwrap();
        assert_eq!(json, "\"mixed_date_formats\"");
        for issue_type in IssueType::ALL {
            let json = serde_json::to_string(&issue_type).unwrap();
            assert_eq!(json.trim_matches('"'), issue_type.as_str());
        }
    }

    #[test]
    fn test_evidence_builder() {
        let evidence = Evidence::new()
            .with_examples(["-3", "-1"])
            .with_sample_rows(vec![2, 7])
            .with_param("lower_bound", 0.0);
        assert_eq!(evidence.examples, vec!["-3", "-1"]);
        assert_eq!(evidence.param("lower_bound"), Some(&serde_json::json!(0.0)));
    }
}
