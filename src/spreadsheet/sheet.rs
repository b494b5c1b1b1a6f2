use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::range::CellRange;
use std::collections::HashMap;

/// A worksheet loaded into memory: sparse cells plus merged regions.
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Source file name
    pub file_name: String,
    /// Sheet name
    pub name: String,
    /// All non-empty cells, in the order they were read
    pub cells: Vec<Cell>,
    /// Merged regions declared by the sheet
    pub merged: Vec<CellRange>,
    /// Index mapping from (row, column) to position in `cells`
    indexes: HashMap<(usize, usize), usize>,
    /// Actual data range (determined from cell data)
    pub row_upper_bound: Option<usize>,
    pub col_upper_bound: Option<usize>,
}

impl Sheet {
    /// Creates an empty sheet.
    pub fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Builds a sheet from rows of literal text, starting at A1. Empty strings are empty cells.
    pub fn from_rows<R, C>(file_name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let mut sheet = Sheet::new(file_name, "Sheet1");
        for (row, record) in rows.into_iter().enumerate() {
            for (col, value) in record.into_iter().enumerate() {
                let cell = Cell::text(row, col, value.as_ref());
                if !cell.is_empty() {
                    sheet.push(cell);
                }
            }
        }
        sheet
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, replacing any earlier cell at the same position.
    pub fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        match self.indexes.get(&(cell.row, cell.col)) {
            Some(&index) => self.cells[index] = cell,
            None => {
                self.indexes.insert((cell.row, cell.col), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    /// Records a merged region.
    pub fn merge(&mut self, range: CellRange) {
        self.update_bound(range.last_row, range.last_col);
        self.merged.push(range);
    }

    /// Updates the actual data range boundaries based on cell positions.
    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_upper_bound.map(|upper| upper < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_upper_bound.map(|upper| upper < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Returns the non-empty cell at (row, col), if any.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.indexes
            .get(&(row, col))
            .map(|index| &self.cells[*index])
            .filter(|cell| !cell.is_empty())
    }

    /// Returns the merged region anchored at (row, col), if any.
    pub fn merged_at(&self, row: usize, col: usize) -> Option<&CellRange> {
        self.merged.iter().find(|range| range.is_anchor(row, col))
    }

    /// Number of physical rows, counting from row 0.
    pub fn row_count(&self) -> usize {
        self.row_upper_bound.map(|upper| upper + 1).unwrap_or(0)
    }

    /// Returns the text of the column 0 cell of a row, if present.
    pub fn marker(&self, row: usize) -> Option<String> {
        self.get(row, 0).map(|cell| cell.to_string())
    }

    /// Returns true when no cell in `row` from column 1 onward holds data.
    pub fn is_blank_row(&self, row: usize) -> bool {
        let width = self.col_upper_bound.unwrap_or(0);
        !(1..=width).any(|col| self.get(row, col).is_some())
    }
}
