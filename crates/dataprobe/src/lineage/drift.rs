//! Schema drift between consecutive runs of a table.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::{Profile, RunId, TableId};

/// Kind of schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    ColumnAdded,
    ColumnRemoved,
    TypeChanged,
    CardinalityShift,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::ColumnAdded => "column_added",
            ChangeKind::ColumnRemoved => "column_removed",
            ChangeKind::TypeChanged => "type_changed",
            ChangeKind::CardinalityShift => "cardinality_shift",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One difference between the previous and the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub table_id: TableId,
    pub change_kind: ChangeKind,
    pub column_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_value: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub run_id: RunId,
}

/// Diffs two sets of profiles for the same table.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    cardinality_delta: f64,
}

impl DriftDetector {
    /// Create a detector reporting cardinality ratio changes larger than `delta`.
    pub fn new(cardinality_delta: f64) -> Self {
        Self {
            cardinality_delta,
        }
    }

    /// Compare `current` against `previous`.
    ///
    /// Removed columns come first (in previous order), then added, type and
    /// cardinality changes in current order. A type change hides any
    /// cardinality shift on the same column.
    pub fn diff(
        &self,
        table_id: &TableId,
        run_id: &RunId,
        detected_at: DateTime<Utc>,
        previous: &[Profile],
        current: &[Profile],
    ) -> Vec<SchemaChange> {
        let before: IndexMap<&str, &Profile> =
            previous.iter().map(|p| (p.column.as_str(), p)).collect();
        let after: IndexMap<&str, &Profile> =
            current.iter().map(|p| (p.column.as_str(), p)).collect();

        let change = |kind: ChangeKind,
                      column: &str,
                      previous_value: Option<String>,
                      new_value: Option<String>| SchemaChange {
            table_id: table_id.clone(),
            change_kind: kind,
            column_name: column.to_string(),
            previous_value,
            new_value,
            detected_at,
            run_id: run_id.clone(),
        };

        let mut changes = Vec::new();

        for (name, old) in &before {
            if !after.contains_key(name) {
                changes.push(change(
                    ChangeKind::ColumnRemoved,
                    *name,
                    Some(old.inferred_type.to_string()),
                    None,
                ));
            }
        }

        for (name, new) in &after {
            let Some(old) = before.get(name) else {
                changes.push(change(
                    ChangeKind::ColumnAdded,
                    *name,
                    None,
                    Some(new.inferred_type.to_string()),
                ));
                continue;
            };

            if old.inferred_type != new.inferred_type {
                changes.push(change(
                    ChangeKind::TypeChanged,
                    *name,
                    Some(old.inferred_type.to_string()),
                    Some(new.inferred_type.to_string()),
                ));
            } else if (new.cardinality_ratio - old.cardinality_ratio).abs() > self.cardinality_delta
            {
                changes.push(change(
                    ChangeKind::CardinalityShift,
                    *name,
                    Some(format!("{:.4}", old.cardinality_ratio)),
                    Some(format!("{:.4}", new.cardinality_ratio)),
                ));
            }
        }

        changes
    }
}
