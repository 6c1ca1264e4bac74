//! Minimal tabular collaborator for the linker.
//!
//! Holds named numeric columns in row-major order. This is the boundary type
//! the core consumes and returns: ingestion from measurement files and
//! persistence back to CSV are handled by calling code.

use crate::{Error, Result};

/// A table of named `f64` columns.
///
/// Column order is fixed at construction; rows are appended with
/// [`Table::push_row`] and checked against the table width.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Table {
    /// Create an empty table with the given column names.
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row. Fails if the row length does not match the table width.
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::RowShape {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names in declaration order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at (row, named column).
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.column_index(name)?;
        self.rows.get(row).map(|r| r[col])
    }

    /// One full row as a slice.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.rows[row]
    }

    /// Indices of rows whose named field equals `value` exactly.
    pub fn rows_where(&self, name: &str, value: f64) -> Result<Vec<usize>> {
        let col = self
            .column_index(name)
            .ok_or_else(|| Error::MissingField {
                field: name.to_string(),
            })?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r[col] == value)
            .map(|(i, _)| i)
            .collect())
    }

    /// Distinct values of a named column, in ascending order.
    ///
    /// Grouping keys must be iterated deterministically, so callers use this
    /// instead of any hash-ordered collection.
    pub fn distinct_sorted(&self, name: &str) -> Result<Vec<f64>> {
        let col = self
            .column_index(name)
            .ok_or_else(|| Error::MissingField {
                field: name.to_string(),
            })?;
        let mut values: Vec<f64> = self.rows.iter().map(|r| r[col]).collect();
        values.sort_by(f64::total_cmp);
        values.dedup_by(|a, b| a.total_cmp(b).is_eq());
        Ok(values)
    }

    /// Return a fresh table with one extra column appended.
    pub fn with_column(&self, name: &str, values: &[f64]) -> Result<Table> {
        if values.len() != self.rows.len() {
            return Err(Error::RowShape {
                expected: self.rows.len(),
                got: values.len(),
            });
        }
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(r, &v)| {
                let mut row = r.clone();
                row.push(v);
                row
            })
            .collect();
        Ok(Table { columns, rows })
    }
}
