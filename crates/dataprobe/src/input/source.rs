//! Normalized tabular input.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{ProbeError, Result};

use super::value::Value;

/// Represents normalized tabular data, stored column-major.
#[derive(Debug, Clone)]
pub struct DataTable {
    /// Column headers in input order.
    pub headers: Vec<String>,
    columns: Vec<Vec<Value>>,
    row_count: usize,
}

impl DataTable {
    /// Create a table from headers and row-major values.
    ///
    /// Rejects empty input, blank or colliding column names, and rows whose
    /// width differs from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let headers = validate_headers(headers)?;

        if rows.is_empty() {
            return Err(ProbeError::Input("no data rows found".to_string()));
        }

        let mut columns: Vec<Vec<Value>> = headers
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != headers.len() {
                return Err(ProbeError::Input(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    headers.len()
                )));
            }
            for (col_idx, value) in row.into_iter().enumerate() {
                columns[col_idx].push(value);
            }
        }

        let row_count = columns[0].len();
        Ok(Self {
            headers,
            columns,
            row_count,
        })
    }

    /// Create a table from name → value records.
    ///
    /// Columns appear in first-seen order; keys missing from a record are
    /// null.
    pub fn from_records(records: Vec<IndexMap<String, Value>>) -> Result<Self> {
        let mut headers: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for record in &records {
            for key in record.keys() {
                if seen.insert(key.clone()) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|mut record| {
                headers
                    .iter()
                    .map(|h| record.swap_remove(h).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self::new(headers, rows)
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Get all values for a column by index.
    pub fn column_values(&self, index: usize) -> &[Value] {
        self.columns.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get a column by name.
    pub fn column_by_name(&self, name: &str) -> Option<&[Value]> {
        let index = self.headers.iter().position(|h| h == name)?;
        Some(self.column_values(index))
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.columns.get(col).and_then(|c| c.get(row))
    }

    /// Iterate the values of one row in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = &Value> + '_ {
        self.columns.iter().filter_map(move |c| c.get(row))
    }
}

fn validate_headers(headers: Vec<String>) -> Result<Vec<String>> {
    if headers.is_empty() {
        return Err(ProbeError::Input("no columns found".to_string()));
    }

    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(headers.len());
    for (idx, header) in headers.into_iter().enumerate() {
        let name = header.trim().to_string();
        if name.is_empty() {
            return Err(ProbeError::Input(format!("column {} has a blank name", idx)));
        }
        if !seen.insert(name.clone()) {
            return Err(ProbeError::Input(format!(
                "column name '{}' appears more than once",
                name
            )));
        }
        cleaned.push(name);
    }
    Ok(cleaned)
}
