//! In-memory CSV table.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// A table of raw string cells with a header row.
///
/// Cells are kept as text; typing happens when the table is projected onto
/// an outcome column (see [`crate::data::schema`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Build a table from a header and rows, checking shape and header uniqueness.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DataError> {
        if columns.is_empty() {
            return Err(DataError::EmptyInput);
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(DataError::DuplicateColumn { name: name.clone() });
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DataError::RaggedRow {
                    // +2: 1-based lines, header on line 1
                    line: idx + 2,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Read a CSV table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(DataError::EmptyInput);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        let table = Self::new(columns, rows)?;
        tracing::debug!(
            columns = table.column_count(),
            rows = table.row_count(),
            "loaded CSV table"
        );
        Ok(table)
    }

    /// Read a CSV table from a file path.
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let file = std::fs::File::open(path).map_err(|source| DataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Read from a path, or from stdin when the path is `-`.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        if path == Path::new("-") {
            return Self::from_reader(std::io::stdin().lock());
        }
        Self::from_path(path)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate over the cells of one column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[index].as_str())
    }

    /// The first `n` rows, for previews.
    pub fn head(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..n.min(self.rows.len())]
    }
}
