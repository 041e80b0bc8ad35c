use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CellValue – a single cell in a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common spreadsheet cell types.
/// `Null` is the explicit missing marker.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Whether the cell carries no usable value. NaN floats count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the cell; `None` for non-numeric and NaN cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Textual rendering used for text matching and export.
    /// Dates at midnight render as a plain `YYYY-MM-DD`.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            CellValue::Integer(i) => Some(Cow::Owned(i.to_string())),
            CellValue::Float(v) if v.is_nan() => None,
            CellValue::Float(v) => Some(Cow::Owned(v.to_string())),
            CellValue::Bool(b) => Some(Cow::Owned(b.to_string())),
            CellValue::Date(d) if d.time() == NaiveTime::MIN => {
                Some(Cow::Owned(d.format("%Y-%m-%d").to_string()))
            }
            CellValue::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d %H:%M:%S").to_string())),
            CellValue::Null => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Column – one named, ordered sequence of cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Ordered named columns of equal length. Rows are identified by position only.
///
/// Never mutated by filtering: [`Dataset::take`] always builds a new table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset, checking column names are unique and lengths agree.
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.name.clone()));
            }
        }

        let row_count = columns.first().map(Column::len).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != row_count) {
            return Err(DatasetError::LengthMismatch {
                column: bad.name.clone(),
                expected: row_count,
                found: bad.len(),
            });
        }

        Ok(Self { columns, row_count })
    }

    /// Build a dataset from row-oriented cells (the shape most readers produce).
    pub fn from_rows(
        names: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, DatasetError> {
        let width = names.len();
        let mut columns: Vec<Vec<CellValue>> = (0..width)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (row_no, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(DatasetError::RaggedRow {
                    row: row_no,
                    expected: width,
                    found: row.len(),
                });
            }
            for (slot, value) in columns.iter_mut().zip(row) {
                slot.push(value);
            }
        }

        Self::new(
            names
                .into_iter()
                .zip(columns)
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.row_count
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Cells of one row, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&CellValue>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// New dataset holding only the rows selected by `mask`, in original order.
    /// Rows past the end of a shorter mask are dropped.
    pub fn take(&self, mask: &SelectionMask) -> Dataset {
        let keep: Vec<usize> = mask.indices().filter(|&i| i < self.row_count).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), keep.iter().map(|&i| c.values[i].clone()).collect()))
            .collect();
        Dataset {
            columns,
            row_count: keep.len(),
        }
    }

    /// Replace each column through `f`, keeping names and order.
    pub(crate) fn map_columns(&self, mut f: impl FnMut(&Column) -> Vec<CellValue>) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), f(c)))
            .collect();
        Dataset {
            columns,
            row_count: self.row_count,
        }
    }
}

// ---------------------------------------------------------------------------
// SelectionMask – one inclusion flag per row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionMask(Vec<bool>);

impl SelectionMask {
    pub fn all(len: usize) -> Self {
        Self(vec![true; len])
    }

    pub fn none(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<bool> {
        self.0.get(row).copied()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn selected_count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    /// Positions of selected rows, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &selected)| selected)
            .map(|(i, _)| i)
    }

    /// Row-wise conjunction. The shorter mask bounds the result.
    pub fn and(&self, other: &Self) -> Self {
        self.0.iter().zip(&other.0).map(|(a, b)| *a && *b).collect()
    }

    /// Row-wise disjunction. The shorter mask bounds the result.
    pub fn or(&self, other: &Self) -> Self {
        self.0.iter().zip(&other.0).map(|(a, b)| *a || *b).collect()
    }

    pub fn into_vec(self) -> Vec<bool> {
        self.0
    }
}

impl From<Vec<bool>> for SelectionMask {
    fn from(flags: Vec<bool>) -> Self {
        Self(flags)
    }
}

impl FromIterator<bool> for SelectionMask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
