//! Editable table grid with per-row copy-on-write.
//!
//! Row 0 holds the headers and is edited like any other row. Rows may have
//! different lengths; nothing here pads or truncates them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Cell ({row}, {col}) is outside the table")]
    OutOfBounds { row: usize, col: usize },
}

/// Immutable snapshot of a table. Rows are shared between snapshots until
/// one of them is edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<String>>", into = "Vec<Vec<String>>")]
pub struct TableData {
    rows: Vec<Arc<Vec<String>>>,
}

impl TableData {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: rows.into_iter().map(Arc::new).collect(),
        }
    }

    /// Return a copy with one cell replaced.
    ///
    /// Only the edited row is cloned; every other row is shared with `self`.
    /// `self` is never modified. Coordinates must address an existing cell.
    pub fn set_cell(&self, row: usize, col: usize, value: impl Into<String>) -> Result<Self, GridError> {
        let target = self
            .rows
            .get(row)
            .filter(|r| col < r.len())
            .ok_or(GridError::OutOfBounds { row, col })?;

        let mut edited = target.as_ref().clone();
        edited[col] = value.into();

        let mut rows = self.rows.clone();
        rows[row] = Arc::new(edited);
        Ok(Self { rows })
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    pub fn row(&self, row: usize) -> Option<&[String]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    /// Row 0, or an empty slice for an empty table.
    pub fn headers(&self) -> &[String] {
        self.row(0).unwrap_or(&[])
    }

    /// Every row after the header row.
    pub fn data_rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().skip(1).map(|r| r.as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_rows(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(|r| r.as_ref().clone()).collect()
    }

    /// True when both snapshots hold the very same allocation for `row`.
    pub fn shares_row_with(&self, other: &TableData, row: usize) -> bool {
        match (self.rows.get(row), other.rows.get(row)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Vec<Vec<String>>> for TableData {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self::from_rows(rows)
    }
}

impl From<TableData> for Vec<Vec<String>> {
    fn from(table: TableData) -> Self {
        table
            .rows
            .into_iter()
            .map(|r| Arc::try_unwrap(r).unwrap_or_else(|shared| shared.as_ref().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> TableData {
        TableData::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn set_cell_replaces_only_target() {
        let t = table(&[&["Name", "Qty"], &["apple", "3"], &["pear", "5"]]);
        let edited = t.set_cell(1, 1, "4").unwrap();

        assert_eq!(edited.cell(1, 1), Some("4"));
        for r in 0..t.row_count() {
            for c in 0..t.row(r).unwrap().len() {
                if (r, c) != (1, 1) {
                    assert_eq!(edited.cell(r, c), t.cell(r, c), "cell ({r},{c}) changed");
                }
            }
        }
        assert_eq!(edited.row_count(), 3);
    }

    #[test]
    fn original_snapshot_is_untouched() {
        let t = table(&[&["H"], &["a"]]);
        let t1 = t.set_cell(1, 0, "b").unwrap();
        let t2 = t1.set_cell(1, 0, "c").unwrap();

        assert_eq!(t.cell(1, 0), Some("a"));
        assert_eq!(t1.cell(1, 0), Some("b"));
        assert_eq!(t2.cell(1, 0), Some("c"));
    }

    #[test]
    fn untouched_rows_are_shared() {
        let t = table(&[&["H1", "H2"], &["a", "b"], &["c", "d"]]);
        let edited = t.set_cell(2, 0, "z").unwrap();

        assert!(edited.shares_row_with(&t, 0));
        assert!(edited.shares_row_with(&t, 1));
        assert!(!edited.shares_row_with(&t, 2));
    }

    #[test]
    fn header_row_is_editable() {
        let t = table(&[&["Nmae", "Qty"], &["x", "1"]]);
        let edited = t.set_cell(0, 0, "Name").unwrap();
        assert_eq!(edited.headers(), &["Name".to_string(), "Qty".to_string()]);
        assert_eq!(t.headers()[0], "Nmae");
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let t = table(&[&["H1", "H2"], &["a"]]);
        assert_eq!(
            t.set_cell(5, 0, "x"),
            Err(GridError::OutOfBounds { row: 5, col: 0 })
        );
        // Row 1 is shorter than the header row; no auto-extension.
        assert_eq!(
            t.set_cell(1, 1, "x"),
            Err(GridError::OutOfBounds { row: 1, col: 1 })
        );
        assert!(t.set_cell(0, 1, "x").is_ok());
    }

    #[test]
    fn jagged_table_accessors() {
        let t = table(&[&["A", "B", "C"], &["1"], &[]]);
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.column_count(), 3);
        assert_eq!(t.cell(1, 2), None);
        let data: Vec<usize> = t.data_rows().map(|r| r.len()).collect();
        assert_eq!(data, vec![1, 0]);
    }

    #[test]
    fn empty_table() {
        let t = TableData::default();
        assert!(t.is_empty());
        assert!(t.headers().is_empty());
        assert_eq!(t.column_count(), 0);
        assert_eq!(t.data_rows().count(), 0);
    }

    #[test]
    fn serializes_as_plain_nested_arrays() {
        let t = table(&[&["A", "B"], &["1", ""]]);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"[["A","B"],["1",""]]"#);
        let back: TableData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
