//! Detector set: runs every detector over a column and merges the results.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexMap;
use tracing::warn;

use crate::input::{DataTable, Value};
use crate::schema::{Profile, RunId};

use super::detectors::{
    CaseSensitivityDetector, DetectionContext, Detector, DuplicateRowDetector,
    InvalidNumericDetector, MissingValuesDetector, MixedDateFormatDetector,
    NegativeValuesDetector, OutlierDetector, SpecialCharacterDetector, UnusuallyLongDetector,
    WhitespaceDetector,
};
use super::issue::{Evidence, Issue, IssueType, Severity};

/// Fixed table of detectors.
///
/// Column detectors cover every issue type except `duplicates` (checked once
/// per table) and `generic_issue` (emitted here when a detector fails).
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
    duplicates: DuplicateRowDetector,
}

impl DetectorSet {
    /// Create the standard detector table.
    pub fn new() -> Self {
        Self {
            detectors: vec![
                Box::new(MissingValuesDetector),
                Box::new(InvalidNumericDetector),
                Box::new(NegativeValuesDetector),
                Box::new(OutlierDetector),
                Box::new(MixedDateFormatDetector),
                Box::new(CaseSensitivityDetector),
                Box::new(WhitespaceDetector),
                Box::new(SpecialCharacterDetector),
                Box::new(UnusuallyLongDetector),
            ],
            duplicates: DuplicateRowDetector,
        }
    }

    /// Create a set from custom column detectors.
    pub fn with_detectors(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self {
            detectors,
            duplicates: DuplicateRowDetector,
        }
    }

    /// Column detectors in evaluation order.
    pub fn detectors(&self) -> impl Iterator<Item = &dyn Detector> {
        self.detectors.iter().map(|d| d.as_ref())
    }

    /// Run all column detectors on one column.
    ///
    /// Detector errors and panics never escape: every failure for the column
    /// is folded into a single `generic_issue`.
    pub fn detect_column(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut failures = Vec::new();

        for detector in &self.detectors {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| detector.detect(profile, values, ctx)));
            match outcome {
                Ok(Ok(Some(issue))) => issues.push(issue),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => failures.push((detector.name(), e.to_string())),
                Err(payload) => failures.push((detector.name(), panic_message(payload))),
            }
        }

        if !failures.is_empty() {
            issues.push(failure_issue(Some(&profile.column), &failures, ctx));
        }

        merge_issues(issues)
    }

    /// Run the table-level duplicate check.
    pub fn detect_table(&self, table: &DataTable, ctx: &DetectionContext<'_>) -> Vec<Issue> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.duplicates.detect(table, ctx)));
        let failure = match outcome {
            Ok(Ok(issue)) => return issue.into_iter().collect(),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload),
        };
        vec![failure_issue(None, &[(self.duplicates.name(), failure)], ctx)]
    }
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge issues so each (column, issue type, run) appears once, first wins.
pub fn merge_issues(issues: impl IntoIterator<Item = Issue>) -> Vec<Issue> {
    let mut merged: IndexMap<(Option<String>, IssueType, RunId), Issue> = IndexMap::new();
    for issue in issues {
        merged.entry(issue.key()).or_insert(issue);
    }
    merged.into_values().collect()
}

fn failure_issue(
    column: Option<&str>,
    failures: &[(&'static str, String)],
    ctx: &DetectionContext<'_>,
) -> Issue {
    for (detector, message) in failures {
        warn!(
            column = column.unwrap_or("_table"),
            detector = *detector,
            error = %message,
            "Detector failed"
        );
    }

    let names: Vec<&str> = failures.iter().map(|(name, _)| *name).collect();
    let messages: Vec<&str> = failures.iter().map(|(_, message)| message.as_str()).collect();

    let mut issue = ctx
        .issue(
            column,
            IssueType::GenericIssue,
            0,
            0,
            format!("Detectors failed: {}", names.join(", ")),
        )
        .with_evidence(
            Evidence::new()
                .with_examples(messages)
                .with_param("failed_detectors", names),
        );
    issue.severity = Severity::Medium;
    issue
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;
    use crate::error::{ProbeError, Result};
    use crate::inference::StatisticalAnalyzer;
    use crate::schema::TableId;
    use chrono::{DateTime, Utc};

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn name(&self) -> &'static str {
            "panicking_detector"
        }

        fn issue_type(&self) -> IssueType {
            IssueType::Outliers
        }

        fn detect(
            &self,
            _: &Profile,
            _: &[Value],
            _: &DetectionContext<'_>,
        ) -> Result<Option<Issue>> {
            panic!("boom");
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing_detector"
        }

        fn issue_type(&self) -> IssueType {
            IssueType::Outliers
        }

        fn detect(
            &self,
            p: &Profile,
            _: &[Value],
            _: &DetectionContext<'_>,
        ) -> Result<Option<Issue>> {
            Err(ProbeError::detector(self.name(), &p.column, "bad input"))
        }
    }

    fn run_set(set: &DetectorSet, values: &[Value]) -> Vec<Issue> {
        let config = ProbeConfig::default();
        let analyzer = StatisticalAnalyzer::new(&config);
        let table_id = TableId::from("tbl_test");
        let run_id = RunId::from("run_000001");
        let profile =
            analyzer.profile_column("col", 0, values, &run_id, DateTime::<Utc>::UNIX_EPOCH);
        let ctx = DetectionContext {
            config: &config,
            dates: analyzer.dates(),
            table_id: &table_id,
            run_id: &run_id,
            detected_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        set.detect_column(&profile, values, &ctx)
    }

    #[test]
    fn test_every_issue_type_has_a_detector() {
        let set = DetectorSet::new();
        let mut covered: Vec<IssueType> = set.detectors().map(|d| d.issue_type()).collect();
        covered.push(IssueType::Duplicates);
        covered.push(IssueType::GenericIssue);
        covered.sort();
        assert_eq!(covered, IssueType::ALL.to_vec());
    }

    #[test]
    fn test_failures_collapse_into_one_generic_issue() {
        let set = DetectorSet::with_detectors(vec![
            Box::new(PanickingDetector),
            Box::new(MissingValuesDetector),
            Box::new(FailingDetector),
        ]);
        let values = vec![Value::from(1), Value::Null];
        let issues = run_set(&set, &values);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue_type, IssueType::MissingValues);

        let generic = &issues[1];
        assert_eq!(generic.issue_type, IssueType::GenericIssue);
        assert_eq!(generic.severity, Severity::Medium);
        assert_eq!(
            generic.evidence.param("failed_detectors"),
            Some(&serde_json::json!(["panicking_detector", "failing_detector"]))
        );
    }

    #[test]
    fn test_no_duplicate_issues_per_column() {
        let set = DetectorSet::with_detectors(vec![
            Box::new(MissingValuesDetector),
            Box::new(MissingValuesDetector),
        ]);
        let issues = run_set(&set, &[Value::Null, Value::from(2)]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_clean_column_has_no_issues() {
        let values: Vec<Value> = (1..=10).map(Value::from).collect();
        assert!(run_set(&DetectorSet::new(), &values).is_empty());
    }
}
