//! In-memory table abstraction shared by all pipeline stages.
//!
//! A [`RecordSet`] is an ordered sequence of rows over a shared column
//! schema. Stages never mutate a RecordSet in place: the Transformer
//! consumes one and produces a replacement, carrying forward the row
//! count captured at extraction time so the Validator can audit it.

use std::collections::HashMap;

/// A single typed cell value.
///
/// `Float` may hold a NaN in memory; the mapping of NaN (and `Null`)
/// to the store's native NULL happens exactly once, at the Loader's
/// wire boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl Cell {
    /// Whether this cell should be treated as missing.
    ///
    /// Covers explicit `Null` and non-finite floats.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(f) => !f.is_finite(),
            _ => false,
        }
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    /// Integer view of the cell, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// String view of the cell, if it is categorical.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Str(s) => write!(f, "{s}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Null => Ok(()),
        }
    }
}

/// Ordered rows over a shared column schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
    /// Row count captured at extraction time; the baseline for the
    /// row-count consistency validation rule.
    source_rows: usize,
}

impl RecordSet {
    /// Create a RecordSet fresh from extraction.
    ///
    /// The current row count becomes the audit baseline.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let baseline = rows.len();
        Self::with_baseline(columns, rows, baseline)
    }

    /// Create a RecordSet that replaces an earlier one, keeping the
    /// original extraction baseline.
    pub fn with_baseline(columns: Vec<String>, rows: Vec<Vec<Cell>>, source_rows: usize) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            columns,
            index,
            rows,
            source_rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row count captured at extraction time.
    pub fn source_rows(&self) -> usize {
        self.source_rows
    }

    /// Column names in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Position of a column in the schema.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Cell at (row, column name).
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Iterate over the rows.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Iterate over one column's cells, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    /// Consume the RecordSet into its parts.
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>, usize) {
        (self.columns, self.rows, self.source_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        RecordSet::new(
            vec!["tenure".into(), "contract".into()],
            vec![
                vec![Cell::Int(5), Cell::Str("Month-to-month".into())],
                vec![Cell::Int(40), Cell::Str("Two year".into())],
            ],
        )
    }

    #[test]
    fn test_lookup() {
        let t = sample();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "tenure"), Some(&Cell::Int(5)));
        assert_eq!(t.get(1, "contract"), Some(&Cell::Str("Two year".into())));
        assert_eq!(t.get(0, "missing"), None);
    }

    #[test]
    fn test_baseline_carried_forward() {
        let t = sample();
        let (columns, rows, baseline) = t.into_parts();
        let replaced = RecordSet::with_baseline(columns, rows, baseline);
        assert_eq!(replaced.source_rows(), 2);
    }

    #[test]
    fn test_column_iteration() {
        let t = sample();
        let tenures: Vec<i64> = t
            .column("tenure")
            .unwrap()
            .filter_map(|c| c.as_i64())
            .collect();
        assert_eq!(tenures, vec![5, 40]);
        assert!(t.column("nope").is_none());
    }

    #[test]
    fn test_missing_cells() {
        assert!(Cell::Null.is_missing());
        assert!(Cell::Float(f64::NAN).is_missing());
        assert!(!Cell::Float(1.5).is_missing());
        assert!(!Cell::Str("".into()).is_missing());
    }
}
