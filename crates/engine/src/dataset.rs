//! Tabular dataset: ordered column schema plus ordered records.
//!
//! Records are JSON objects keyed by column key. A key missing from a record
//! reads as null. The schema is fixed when the dataset is built and is never
//! re-inferred from later rows.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cell;

/// One row of data: column key -> cell value, in the order received.
pub type Record = serde_json::Map<String, Value>;

static NULL: Value = Value::Null;

/// Column descriptor. Serializes with the backend's `{key, name}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Stable field identifier used in records
    pub key: String,
    /// Display label (header text)
    #[serde(rename = "name", default)]
    pub display_name: String,
}

impl Column {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { key: key.into(), display_name: display_name.into() }
    }

    /// Column whose label is its key (used when the schema is inferred).
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self { display_name: key.clone(), key }
    }
}

/// Reference to a file known to the backend: display name plus locator.
///
/// The name is the server-side persistence key (`save`, xlsx export); the
/// url is what `load` and the agent edit endpoint resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub url: String,
}

impl FileRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into() }
    }

    /// Build a reference from a bare locator, naming it after the last path segment.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&url)
            .to_string();
        Self { name, url }
    }
}

/// Errors from cell-level operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// Row index past the end of the dataset
    RowOutOfRange { row: usize, rows: usize },
    /// Column key not in the schema
    UnknownColumn(String),
    /// Arrays and objects are not cell values
    NotScalar,
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowOutOfRange { row, rows } => {
                write!(f, "row {row} is out of range (dataset has {rows} rows)")
            }
            Self::UnknownColumn(key) => write!(f, "unknown column '{key}'"),
            Self::NotScalar => write!(f, "cell values must be text, numbers, booleans or empty"),
        }
    }
}

impl std::error::Error for DatasetError {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub rows: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, rows: Vec<Record>) -> Self {
        Self { columns: normalize_columns(columns), rows }
    }

    /// Build a dataset from a backend payload.
    ///
    /// An explicit schema wins. Without one, the schema is the key set of
    /// the first row in that row's order; no rows means no columns.
    pub fn from_parts(columns: Option<Vec<Column>>, rows: Vec<Record>) -> Self {
        let columns = match columns {
            Some(columns) => normalize_columns(columns),
            None => infer_columns(&rows),
        };
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Resolve a user-facing column reference: exact key, then display
    /// name, then case-insensitive key.
    pub fn resolve_column(&self, reference: &str) -> Option<&Column> {
        self.column(reference)
            .or_else(|| self.columns.iter().find(|c| c.display_name == reference))
            .or_else(|| self.columns.iter().find(|c| c.key.eq_ignore_ascii_case(reference)))
    }

    /// Cell at (row, key). `None` when the row or column does not exist;
    /// a key missing from an existing record reads as null.
    pub fn get(&self, row: usize, key: &str) -> Option<&Value> {
        let record = self.rows.get(row)?;
        self.column(key)?;
        Some(record.get(key).unwrap_or(&NULL))
    }

    /// Replace exactly one cell, returning its previous value.
    pub fn set_cell(&mut self, row: usize, key: &str, value: Value) -> Result<Value, DatasetError> {
        if !cell::is_scalar(&value) {
            return Err(DatasetError::NotScalar);
        }
        let rows = self.rows.len();
        if self.column(key).is_none() {
            return Err(DatasetError::UnknownColumn(key.to_string()));
        }
        let record = self
            .rows
            .get_mut(row)
            .ok_or(DatasetError::RowOutOfRange { row, rows })?;
        let old = record.insert(key.to_string(), value).unwrap_or(Value::Null);
        Ok(old)
    }

    /// Header labels in display order.
    pub fn header(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.display_name.as_str()).collect()
    }

    /// One row rendered as display strings in schema order.
    pub fn display_row(&self, row: usize) -> Option<Vec<String>> {
        let record = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(|c| record.get(&c.key).map(cell::display).unwrap_or_default())
                .collect(),
        )
    }
}

/// Schema inferred from the first row's keys.
pub fn infer_columns(rows: &[Record]) -> Vec<Column> {
    rows.first()
        .map(|first| first.keys().map(|k| Column::from_key(k.as_str())).collect())
        .unwrap_or_default()
}

// Keys must be unique; the first occurrence wins. Blank labels fall back to the key.
fn normalize_columns(columns: Vec<Column>) -> Vec<Column> {
    let mut seen = HashSet::new();
    columns
        .into_iter()
        .filter(|c| seen.insert(c.key.clone()))
        .map(|mut c| {
            if c.display_name.trim().is_empty() {
                c.display_name = c.key.clone();
            }
            c
        })
        .collect()
}
