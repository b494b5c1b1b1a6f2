use crate::error::SheetNestError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::row_to_index;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors related to Excel-style range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),
}

/// A rectangular block of cells such as a merged region, inclusive on both ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellRange {
    /// First row (0-based)
    pub first_row: usize,
    /// First column (0-based)
    pub first_col: usize,
    /// Last row (0-based, inclusive)
    pub last_row: usize,
    /// Last column (0-based, inclusive)
    pub last_col: usize,
}

impl CellRange {
    /// Returns true if the cell at (row, col) lies inside the range.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row) && (self.first_col..=self.last_col).contains(&col)
    }

    /// Returns true if (row, col) is the top-left anchor of the range.
    pub fn is_anchor(&self, row: usize, col: usize) -> bool {
        self.first_row == row && self.first_col == col
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            index_to_reference(self.first_row, self.first_col),
            index_to_reference(self.last_row, self.last_col)
        )
    }
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$?([A-Z]+)\$?(\d+)(:\$?([A-Z]+)\$?(\d+))?$").expect("Hardcode regex pattern"))
}

impl TryFrom<&str> for CellRange {
    type Error = SheetNestError;

    /// Parses a range string such as "B1:C2". A single reference ("B1") yields a 1x1 range.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim().to_ascii_uppercase();
        let error = || RangeError::FormatError(value.to_owned());
        let captures = range_pattern().captures(value.as_str()).ok_or_else(error)?;
        let first_col = captures.get(1).and_then(|m| col_to_index(m.as_str())).ok_or_else(error)?;
        let first_row = captures.get(2).and_then(|m| row_to_index(m.as_str())).ok_or_else(error)?;
        let (last_row, last_col) = match (captures.get(4), captures.get(5)) {
            (Some(col), Some(row)) => (
                row_to_index(row.as_str()).ok_or_else(error)?,
                col_to_index(col.as_str()).ok_or_else(error)?,
            ),
            _ => (first_row, first_col),
        };
        Ok(CellRange {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        })
    }
}
