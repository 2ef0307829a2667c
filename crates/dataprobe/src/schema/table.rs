//! Registered tables and their columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::profile::Profile;
use super::types::{ColumnType, TableId};

/// A column of a registered table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name, unique within its table.
    pub name: String,
    /// Zero-based position in the table.
    pub position: usize,
    /// Type inferred by the latest committed run.
    pub inferred_type: ColumnType,
}

/// A registered dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    /// Stable identifier derived from the table name.
    pub id: TableId,
    /// Table name.
    pub name: String,
    /// Where the data came from (path, URL, upload name).
    pub source: String,
    /// When the table was registered.
    pub created_at: DateTime<Utc>,
    /// When the latest run was committed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_profiled_at: Option<DateTime<Utc>>,
    /// Columns as of the latest committed run.
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Create a table record for a newly registered dataset.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: table_id_for(&name),
            name,
            source: source.into(),
            created_at: Utc::now(),
            last_profiled_at: None,
            columns: Vec::new(),
        }
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get all column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Record a committed run: refresh columns and the profiled timestamp.
    pub(crate) fn mark_profiled(&mut self, profiles: &[Profile], at: DateTime<Utc>) {
        self.columns = profiles
            .iter()
            .map(|p| ColumnInfo {
                name: p.column.clone(),
                position: p.position,
                inferred_type: p.inferred_type,
            })
            .collect();
        self.last_profiled_at = Some(at);
    }
}

/// Derive a stable table id from a table name.
pub fn table_id_for(name: &str) -> TableId {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    TableId(format!("tbl_{}", &digest[..12]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_is_stable() {
        let a = TableInfo::new("orders", "orders.csv");
        let b = TableInfo::new("orders", "elsewhere.csv");
        assert_eq!(a.id, b.id);
        assert!(a.id.as_str().starts_with("tbl_"));
        assert_ne!(a.id, table_id_for("customers"));
    }
}
