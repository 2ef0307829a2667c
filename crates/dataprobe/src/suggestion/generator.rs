//! Rule-based fix generation from issues.
//!
//! Every issue type maps to exactly one SQL template. Detector parameters
//! recorded in the issue's evidence fill the template's placeholders.

use std::cmp::Reverse;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::validation::{Issue, IssueType, NUMERIC_PATTERN};

use super::{FixAction, FixSuggestion};

/// Maps issues to fix suggestions.
#[derive(Debug, Clone, Default)]
pub struct FixMapper {
    table_name: Option<String>,
}

impl FixMapper {
    /// Create a mapper that names tables by id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a table name in place of the table id.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Generate fixes for a list of issues, highest severity first.
    ///
    /// Issues of equal severity keep their input order.
    pub fn generate_fixes(&self, issues: &[Issue]) -> Vec<FixSuggestion> {
        let mut ordered: Vec<&Issue> = issues.iter().collect();
        ordered.sort_by_key(|issue| Reverse(issue.severity));
        ordered.into_iter().map(|issue| self.generate_fix(issue)).collect()
    }

    /// Generate the fix for a single issue.
    pub fn generate_fix(&self, issue: &Issue) -> FixSuggestion {
        let mut params = IndexMap::new();
        let table = self
            .table_name
            .clone()
            .unwrap_or_else(|| issue.table_id.to_string());
        params.insert("table".to_string(), json!(table));
        if let Some(column) = &issue.column {
            params.insert("column".to_string(), json!(column));
        }

        let evidence = |name: &str| issue.evidence.param(name).cloned();

        let (action, sql_template) = match issue.issue_type {
            IssueType::MissingValues => match evidence("fill_value") {
                // No type-safe fill for this column
                Some(Value::Null) => (
                    FixAction::Review,
                    "SELECT * FROM {table} WHERE {column} IS NULL;",
                ),
                fill => {
                    let fill = fill.unwrap_or_else(|| json!("UNKNOWN"));
                    params.insert("fill_value".to_string(), json!(sql_literal(&fill)));
                    (
                        FixAction::Impute,
                        "UPDATE {table} SET {column} = {fill_value} WHERE {column} IS NULL;",
                    )
                }
            },
            IssueType::Duplicates => {
                params.insert(
                    "key_columns".to_string(),
                    evidence("key_columns").unwrap_or_else(|| json!([])),
                );
                (
                    FixAction::Deduplicate,
                    "DELETE FROM {table} WHERE ctid NOT IN \
                     (SELECT MIN(ctid) FROM {table} GROUP BY {key_columns});",
                )
            }
            IssueType::InvalidNumeric => {
                params.insert(
                    "numeric_pattern".to_string(),
                    evidence("numeric_pattern").unwrap_or_else(|| json!(NUMERIC_PATTERN)),
                );
                if evidence("expected") == Some(json!("text")) {
                    (
                        FixAction::Review,
                        "SELECT * FROM {table} WHERE {column} ~ '{numeric_pattern}';",
                    )
                } else {
                    (
                        FixAction::Coerce,
                        "UPDATE {table} SET {column} = NULL WHERE {column} !~ '{numeric_pattern}';",
                    )
                }
            }
            IssueType::NegativeValues => {
                params.insert(
                    "lower_bound".to_string(),
                    evidence("lower_bound").unwrap_or_else(|| json!(0)),
                );
                (
                    FixAction::Absolute,
                    "UPDATE {table} SET {column} = ABS({column}) WHERE {column} < {lower_bound};",
                )
            }
            IssueType::Outliers => {
                for bound in ["lower_bound", "upper_bound"] {
                    params.insert(bound.to_string(), evidence(bound).unwrap_or(Value::Null));
                }
                (
                    FixAction::Remove,
                    "DELETE FROM {table} WHERE {column} < {lower_bound} OR {column} > {upper_bound};",
                )
            }
            IssueType::MixedDateFormats => {
                let target = evidence("dominant_format")
                    .and_then(|v| v.as_str().map(sql_date_format))
                    .unwrap_or_else(|| "YYYY-MM-DD".to_string());
                params.insert("target_format".to_string(), json!(target));
                (
                    FixAction::ConvertDate,
                    "ALTER TABLE {table} ALTER COLUMN {column} TYPE DATE \
                     USING TO_DATE({column}, '{target_format}');",
                )
            }
            IssueType::CaseSensitivity => (
                FixAction::Standardize,
                "UPDATE {table} SET {column} = LOWER({column});",
            ),
            IssueType::WhitespaceIssues => (
                FixAction::Trim,
                "UPDATE {table} SET {column} = REGEXP_REPLACE(TRIM({column}), '\\s+', ' ', 'g');",
            ),
            IssueType::SpecialCharacters => {
                params.insert(
                    "disallowed_pattern".to_string(),
                    evidence("disallowed_pattern").unwrap_or_else(|| json!("[^[:alnum:]\\s]")),
                );
                (
                    FixAction::Strip,
                    "UPDATE {table} SET {column} = REGEXP_REPLACE({column}, '{disallowed_pattern}', '', 'g');",
                )
            }
            IssueType::UnusuallyLongValues => {
                params.insert(
                    "max_length".to_string(),
                    evidence("max_length").unwrap_or_else(|| json!(500)),
                );
                (
                    FixAction::Truncate,
                    "UPDATE {table} SET {column} = SUBSTRING({column}, 1, {max_length}) \
                     WHERE LENGTH({column}) > {max_length};",
                )
            }
            IssueType::GenericIssue => {
                if issue.column.is_some() {
                    (
                        FixAction::Review,
                        "SELECT * FROM {table} WHERE {column} IS NOT NULL LIMIT 10;",
                    )
                } else {
                    (FixAction::Review, "SELECT * FROM {table} LIMIT 10;")
                }
            }
        };

        FixSuggestion {
            issue_id: issue.id.clone(),
            issue_type: issue.issue_type,
            severity: issue.severity,
            action,
            sql_template: sql_template.to_string(),
            params,
        }
    }
}

/// Generate the fix for one issue, naming the table by id.
pub fn generate_fix(issue: &Issue) -> FixSuggestion {
    FixMapper::new().generate_fix(issue)
}

/// Generate fixes for a list of issues, highest severity first.
pub fn generate_fixes(issues: &[Issue]) -> Vec<FixSuggestion> {
    FixMapper::new().generate_fixes(issues)
}

/// Quote a JSON value as a SQL literal.
fn sql_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Translate a chrono format string into a SQL `TO_DATE` pattern.
fn sql_date_format(chrono_format: &str) -> String {
    let mut out = String::new();
    let mut chars = chrono_format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let spec = match chars.next() {
            Some('Y') => "YYYY",
            Some('y') => "YY",
            Some('m') => "MM",
            Some('d') => "DD",
            Some('b') => "Mon",
            Some('B') => "Month",
            Some('H') => "HH24",
            Some('M') => "MI",
            Some('S') => "SS",
            Some('T') => "HH24:MI:SS",
            Some('%') => "%",
            Some(other) => {
                out.push('%');
                out.push(other);
                continue;
            }
            None => "%",
        };
        out.push_str(spec);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RunId, TableId};
    use crate::validation::{Evidence, Severity};
    use chrono::{DateTime, Utc};

    fn make_issue(issue_type: IssueType, column: Option<&str>, severity: Severity) -> Issue {
        let run_id = RunId::from("run_000001");
        Issue {
            id: Issue::make_id(&run_id, column, issue_type),
            table_id: TableId::from("tbl_abc"),
            column: column.map(str::to_string),
            issue_type,
            severity,
            affected_count: 1,
            affected_fraction: 0.1,
            description: String::new(),
            evidence: Evidence::new(),
            detected_at: DateTime::<Utc>::UNIX_EPOCH,
            run_id,
        }
    }

    #[test]
    fn test_every_issue_type_maps_to_a_template() {
        for issue_type in IssueType::ALL {
            let fix = generate_fix(&make_issue(issue_type, Some("c"), Severity::Low));
            assert_eq!(fix.issue_type, issue_type);
            assert!(!fix.sql_template.is_empty());
            assert_eq!(fix.param("table"), Some(&json!("tbl_abc")));
            assert_eq!(fix.param("column"), Some(&json!("c")));
            assert!(fix.render().contains("tbl_abc"));
        }
    }

    #[test]
    fn test_outlier_fix_uses_bounds() {
        let issue = make_issue(IssueType::Outliers, Some("score"), Severity::Low).with_evidence(
            Evidence::new()
                .with_param("lower_bound", -4.5)
                .with_param("upper_bound", 8.5),
        );
        let fix = FixMapper::new().with_table_name("results").generate_fix(&issue);
        assert_eq!(fix.action, FixAction::Remove);
        assert_eq!(
            fix.render(),
            "DELETE FROM results WHERE score < -4.5 OR score > 8.5;"
        );
    }

    #[test]
    fn test_missing_fill_value_is_quoted() {
        let issue = make_issue(IssueType::MissingValues, Some("city"), Severity::High)
            .with_evidence(Evidence::new().with_param("fill_value", "O'Hare"));
        let fix = FixMapper::new().with_table_name("t").generate_fix(&issue);
        assert_eq!(
            fix.render(),
            "UPDATE t SET city = 'O''Hare' WHERE city IS NULL;"
        );
    }

    #[test]
    fn test_missing_without_fill_is_review() {
        let issue = make_issue(IssueType::MissingValues, Some("shipped"), Severity::Low)
            .with_evidence(Evidence::new().with_param("fill_value", Value::Null));
        let fix = FixMapper::new().with_table_name("orders").generate_fix(&issue);
        assert_eq!(fix.action, FixAction::Review);
        assert!(fix.param("fill_value").is_none());
        assert_eq!(
            fix.render(),
            "SELECT * FROM orders WHERE shipped IS NULL;"
        );
    }

    #[test]
    fn test_date_fix_translates_format() {
        let issue = make_issue(IssueType::MixedDateFormats, Some("d"), Severity::Medium)
            .with_evidence(Evidence::new().with_param("dominant_format", "%m/%d/%Y"));
        let fix = generate_fix(&issue);
        assert_eq!(fix.param("target_format"), Some(&json!("MM/DD/YYYY")));
    }

    #[test]
    fn test_table_level_fix_has_no_column() {
        let issue = make_issue(IssueType::Duplicates, None, Severity::Medium)
            .with_evidence(Evidence::new().with_param("key_columns", vec!["id", "name"]));
        let fix = FixMapper::new().with_table_name("t").generate_fix(&issue);
        assert!(fix.param("column").is_none());
        assert!(fix.render().ends_with("GROUP BY id, name);"));
    }

    #[test]
    fn test_fixes_ordered_by_severity() {
        let issues = vec![
            make_issue(IssueType::WhitespaceIssues, Some("a"), Severity::Low),
            make_issue(IssueType::Outliers, Some("b"), Severity::High),
            make_issue(IssueType::CaseSensitivity, Some("c"), Severity::Low),
            make_issue(IssueType::MissingValues, Some("d"), Severity::Medium),
        ];
        let order: Vec<IssueType> = generate_fixes(&issues).iter().map(|f| f.issue_type).collect();
        assert_eq!(
            order,
            vec![
                IssueType::Outliers,
                IssueType::MissingValues,
                IssueType::WhitespaceIssues,
                IssueType::CaseSensitivity,
            ]
        );
    }
}
