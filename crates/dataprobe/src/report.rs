//! Run results: the committed bundle, run status and a summary.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::lineage::SchemaChange;
use crate::schema::{Profile, RunId, TableId};
use crate::suggestion::FixSuggestion;
use crate::validation::{Issue, Severity};

/// Everything one run produced for one table. Stored as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunBundle {
    pub table_id: TableId,
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub profiles: Vec<Profile>,
    pub issues: Vec<Issue>,
    pub schema_changes: Vec<SchemaChange>,
    pub fixes: Vec<FixSuggestion>,
}

impl RunBundle {
    /// Get the profile of a column.
    pub fn profile(&self, column: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.column == column)
    }

    /// Issues reported for a column.
    pub fn issues_for(&self, column: &str) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|i| i.column.as_deref() == Some(column))
            .collect()
    }
}

/// Why a run was not committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The run exceeded the configured timeout.
    Timeout,
    /// The store rejected the commit.
    CommitFailed,
    /// Profiling itself failed.
    ProfilingFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::CommitFailed => "commit_failed",
            FailureReason::ProfilingFailed => "profiling_failed",
        }
    }
}

/// Final status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Committed,
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl RunStatus {
    pub fn is_committed(&self) -> bool {
        matches!(self, RunStatus::Committed)
    }

    /// The failure reason, if the run failed.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            RunStatus::Committed => None,
            RunStatus::Failed { reason, .. } => Some(*reason),
        }
    }
}

/// Counts of issues by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Summary of a run's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total number of columns.
    pub total_columns: usize,
    /// Number of columns with at least one issue.
    pub columns_with_issues: usize,
    pub total_issues: usize,
    pub issues_by_severity: SeverityCounts,
    /// Issue counts keyed by issue type name, in first-seen order.
    pub issues_by_type: IndexMap<String, usize>,
    pub schema_changes: usize,
    /// Data quality score (0.0-1.0).
    pub data_quality_score: f64,
    /// Human-readable recommendation.
    pub recommendation: String,
}

impl RunSummary {
    /// Summarize a bundle.
    pub fn from_bundle(bundle: &RunBundle) -> Self {
        let total_columns = bundle.profiles.len();

        let columns_with_issues = bundle
            .issues
            .iter()
            .filter_map(|i| i.column.as_deref())
            .collect::<HashSet<_>>()
            .len();

        let mut issues_by_severity = SeverityCounts::default();
        for issue in &bundle.issues {
            match issue.severity {
                Severity::High => issues_by_severity.high += 1,
                Severity::Medium => issues_by_severity.medium += 1,
                Severity::Low => issues_by_severity.low += 1,
            }
        }

        let mut issues_by_type: IndexMap<String, usize> = IndexMap::new();
        for issue in &bundle.issues {
            *issues_by_type
                .entry(issue.issue_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let data_quality_score =
            quality_score(total_columns, columns_with_issues, &issues_by_severity);
        let recommendation = recommendation(&issues_by_severity, data_quality_score);

        Self {
            total_columns,
            columns_with_issues,
            total_issues: bundle.issues.len(),
            issues_by_severity,
            issues_by_type,
            schema_changes: bundle.schema_changes.len(),
            data_quality_score,
            recommendation,
        }
    }
}

/// Share of clean columns, less a capped penalty per issue severity.
fn quality_score(total_columns: usize, columns_with_issues: usize, counts: &SeverityCounts) -> f64 {
    if total_columns == 0 {
        return 1.0;
    }

    let column_score = 1.0 - (columns_with_issues as f64 / total_columns as f64);

    let penalty = (counts.high as f64 * 0.1 + counts.medium as f64 * 0.02 + counts.low as f64 * 0.005)
        .min(0.5);

    (column_score - penalty).clamp(0.0, 1.0)
}

fn recommendation(counts: &SeverityCounts, score: f64) -> String {
    if counts.high > 0 {
        format!(
            "Address {} high-severity issues before using this data.",
            counts.high
        )
    } else if counts.medium > 5 {
        format!(
            "Review {} medium-severity issues to improve data quality (score: {:.0}%).",
            counts.medium,
            score * 100.0
        )
    } else if score >= 0.9 {
        "Data quality is good. Minor issues detected for review.".to_string()
    } else if score >= 0.7 {
        "Data quality is acceptable. Consider addressing the reported issues.".to_string()
    } else {
        "Data quality needs attention. Review all issues.".to_string()
    }
}

/// Outcome of `Probe::profile_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    /// The computed bundle, committed or not.
    pub bundle: RunBundle,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(status: RunStatus, bundle: RunBundle) -> Self {
        let summary = RunSummary::from_bundle(&bundle);
        Self {
            status,
            bundle,
            summary,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.status.is_committed()
    }

    pub fn run_id(&self) -> &RunId {
        &self.bundle.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_score() {
        let clean = SeverityCounts::default();
        assert_eq!(quality_score(0, 0, &clean), 1.0);
        assert_eq!(quality_score(4, 0, &clean), 1.0);

        let counts = SeverityCounts {
            high: 1,
            medium: 0,
            low: 2,
        };
        let score = quality_score(4, 2, &counts);
        assert!((score - (0.5 - 0.11)).abs() < 1e-12);

        let many = SeverityCounts {
            high: 20,
            medium: 0,
            low: 0,
        };
        assert_eq!(quality_score(1, 1, &many), 0.0);
    }

    #[test]
    fn test_recommendation_prioritizes_high() {
        let counts = SeverityCounts {
            high: 2,
            medium: 9,
            low: 0,
        };
        assert!(recommendation(&counts, 0.2).starts_with("Address 2"));
        assert!(recommendation(&SeverityCounts::default(), 0.95).starts_with("Data quality is good"));
    }

    #[test]
    fn test_status_serialization() {
        let status = RunStatus::Failed {
            reason: FailureReason::Timeout,
            message: "took 2s".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");
        assert_eq!(status.failure_reason(), Some(FailureReason::Timeout));
    }
}
