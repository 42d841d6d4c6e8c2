//! Per-gene annotation table (symbol, title, accession, ...)

use serde::Serialize;

use crate::error::{DgeError, Result};

/// Ordered annotation columns aligned with the rows of an expression or
/// count matrix. Column order is kept so it can be written back unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneAnnotation {
    n_rows: usize,
    columns: Vec<(String, Vec<String>)>,
}

impl GeneAnnotation {
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            columns: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Add (or replace) a column
    pub fn add_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.n_rows {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} annotation values", self.n_rows),
                got: format!("{} annotation values", values.len()),
            });
        }
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name.to_string(), values)),
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Value of `name` at `row`, empty when the column is absent
    pub fn value(&self, name: &str, row: usize) -> &str {
        self.column(name)
            .and_then(|v| v.get(row))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// All column values of one row, in column order
    pub fn row(&self, row: usize) -> Vec<&str> {
        self.columns.iter().map(|(_, v)| v[row].as_str()).collect()
    }

    pub fn subset(&self, rows: &[usize]) -> Self {
        Self {
            n_rows: rows.len(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| {
                    (name.clone(), rows.iter().map(|&i| values[i].clone()).collect())
                })
                .collect(),
        }
    }
}
