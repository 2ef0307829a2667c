//! Fix suggestion types: parameterized SQL for each issue.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{IssueType, Severity};

/// Type of action a fix performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixAction {
    /// Fill nulls with a replacement value.
    Impute,
    /// Remove duplicate rows, keeping the first copy.
    Deduplicate,
    /// Null out values that do not parse as the expected type.
    Coerce,
    /// Replace negative values with their magnitude.
    Absolute,
    /// Remove rows outside a range.
    Remove,
    /// Rewrite dates into a single format.
    ConvertDate,
    /// Normalize letter case.
    Standardize,
    /// Trim and collapse whitespace.
    Trim,
    /// Strip disallowed characters.
    Strip,
    /// Cut values down to a maximum length.
    Truncate,
    /// Inspect the affected rows by hand.
    Review,
}

impl FixAction {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FixAction::Impute => "Impute Missing",
            FixAction::Deduplicate => "Remove Duplicates",
            FixAction::Coerce => "Type Coercion",
            FixAction::Absolute => "Absolute Value",
            FixAction::Remove => "Remove",
            FixAction::ConvertDate => "Standardize Dates",
            FixAction::Standardize => "Standardize Case",
            FixAction::Trim => "Trim Whitespace",
            FixAction::Strip => "Strip Characters",
            FixAction::Truncate => "Truncate",
            FixAction::Review => "Review",
        }
    }
}

/// A proposed fix for an issue. Never executed by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSuggestion {
    /// ID of the issue this fix addresses.
    pub issue_id: String,
    pub issue_type: IssueType,
    /// Severity of the issue, used for ordering.
    pub severity: Severity,
    pub action: FixAction,
    /// SQL with `{name}` placeholders.
    pub sql_template: String,
    /// Placeholder values. Always includes `table`.
    pub params: IndexMap<String, Value>,
}

impl FixSuggestion {
    /// Substitute params into the template for display.
    ///
    /// Placeholders with no matching param are left as written.
    pub fn render(&self) -> String {
        let template = self.sql_template.as_str();
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if self.params.contains_key(&after[..close]) => {
                    out.push_str(&display_param(&self.params[&after[..close]]));
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Look up a param.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// Text form of a param value inside SQL.
fn display_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_param)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
