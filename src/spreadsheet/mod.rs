//! # Spreadsheet Reading Module
//!
//! Loads Excel 2007+ workbooks (.xlsx, .xlsm) into in-memory [`Sheet`] grids.
//! A grid keeps every non-empty cell with its storage type plus the merged
//! regions of the worksheet, which the header builder needs to size composite
//! declarations.
pub mod cell;
pub mod criteria;
mod excel;
pub mod range;
pub mod reference;
pub mod sheet;
mod xlsx;

use crate::error::SheetNestError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading a workbook package.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Unsupported or unrecognized file format
    #[error("Cannot detect file format for '{0}'")]
    InvalidFileFormat(String),

    /// A part the workbook refers to is missing from the package
    #[error("Missing part '{0}' in workbook package")]
    FileError(String),

    /// Cell refers to something the package does not hold, e.g. a missing shared string
    #[error("Invalid cell value in {0} sheet {1} at {2}: {3}")]
    CellValueError(String, String, String, String),

    /// Workbook declares no worksheets
    #[error("No worksheet found in '{0}'")]
    SpreadsheetEmptyError(String),
}

/// Common interface for workbook readers.
pub trait Spreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String;

    /// Returns the worksheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Reads the worksheets selected by `criteria`
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SheetNestError>;
}

/// Opens a workbook based on its file extension.
pub fn open_spreadsheet(path: &Path) -> Result<Box<dyn Spreadsheet>, SheetNestError> {
    let name = path.to_string_lossy().to_string();
    match extension_of(path).as_deref() {
        Some("xlsx") | Some("xlsm") => {
            let reader = UnifiedReader::open(path)?;
            Ok(Box::new(XlsxSpreadsheet::open(&name, reader)?))
        }
        _ => Err(SpreadsheetError::InvalidFileFormat(name))?,
    }
}

/// Opens a workbook held in memory. `name` supplies the extension and the file name
/// used in error messages.
pub fn open_spreadsheet_bytes(name: &str, bytes: Vec<u8>) -> Result<Box<dyn Spreadsheet>, SheetNestError> {
    match extension_of(Path::new(name)).as_deref() {
        Some("xlsx") | Some("xlsm") => {
            let reader = UnifiedReader::from_bytes(name, bytes)?;
            Ok(Box::new(XlsxSpreadsheet::open(name, reader)?))
        }
        _ => Err(SpreadsheetError::InvalidFileFormat(name.to_owned()))?,
    }
}

/// Returns true if the path has a workbook extension this crate can read.
pub fn is_supported(path: &Path) -> bool {
    matches!(extension_of(path).as_deref(), Some("xlsx") | Some("xlsm"))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_extensions() {
        let result = open_spreadsheet(Path::new("units.csv"));
        assert!(matches!(
            result,
            Err(SheetNestError::SpreadsheetError(SpreadsheetError::InvalidFileFormat(_)))
        ));
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_supported(Path::new("Units.XLSX")));
        assert!(is_supported(Path::new("macros.xlsm")));
        assert!(!is_supported(Path::new("legacy.xls")));
        assert!(!is_supported(Path::new("noext")));
    }

    #[test]
    fn garbage_bytes_are_not_a_workbook() {
        let result = open_spreadsheet_bytes("broken.xlsx", b"not a zip".to_vec());
        assert!(matches!(result, Err(SheetNestError::ZipError(_))));
    }
}
