//! # sheetnest
//!
//! Converts spreadsheet tables into nested structured data, following a schema
//! written in the sheet's own header rows.
//!
//! ## Table layout
//!
//! - Cell A1 holds `#head`. Header rows follow, each declaring fields as
//!   `name:type` with `type` one of `int`, `float`, `string`, `list`, `dict`
//!   or `class`.
//! - Composite declarations cover several columns (merge the header cell, or
//!   leave the following cells empty) and are refined by the next header row:
//!   `list` by an `int` index and a value, `dict` by an `int`/`string` key and a
//!   value, `class` by any number of fields.
//! - The first data row carries `#data` in column A. Rows whose column A starts
//!   with any other `#` are comments.
//! - The first top-level field keys the result. A row with an empty key cell
//!   continues the entry above it, which is how lists and dicts grow downward.
//!
//! ## Entry points
//!
//! - [`convert_file`] / [`validate_file`]: one workbook.
//! - [`batch::convert_dir`]: every `.xlsx`/`.xlsm` file of a directory.
//! - [`table::parse_sheet`]: an in-memory [`Sheet`], e.g. from [`Sheet::from_rows`].
pub mod batch;
pub mod binder;
pub mod error;
pub mod helpers;
pub mod report;
pub mod schema;
pub mod spreadsheet;
pub mod table;
pub mod value;

#[cfg(feature = "cli")]
pub mod logging;

pub use crate::error::SheetNestError;
pub use crate::report::ErrorKind;
pub use crate::report::TableError;
pub use crate::spreadsheet::criteria::Criteria;
pub use crate::spreadsheet::sheet::Sheet;
pub use crate::table::parse_sheet;
pub use crate::table::validate_sheet;
pub use crate::table::KeyMode;
pub use crate::table::ParseOptions;
pub use crate::table::SheetOutcome;
pub use crate::value::Key;
pub use crate::value::SheetResult;
pub use crate::value::Value;

use crate::report::ErrorReporter;
use crate::spreadsheet::open_spreadsheet;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Default JSON indentation.
pub const DEFAULT_INDENT: usize = 2;

/// Options for converting workbooks.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub parse: ParseOptions,
    /// Which worksheets to read; the active sheet by default
    pub criteria: Criteria,
    /// JSON indentation in spaces; 0 writes compact JSON
    pub indent: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            criteria: Criteria::default(),
            indent: DEFAULT_INDENT,
        }
    }
}

/// The outcome of converting every selected sheet of a workbook.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkbookOutcome {
    /// Workbook path as given
    pub file: String,
    /// Sheets whose header could be built
    pub sheets: Vec<SheetOutcome>,
    /// Sheets rejected because of their header
    pub header_errors: Vec<TableError>,
}

impl WorkbookOutcome {
    /// Header errors first, then row errors sheet by sheet.
    pub fn errors(&self) -> impl Iterator<Item = &TableError> {
        self.header_errors
            .iter()
            .chain(self.sheets.iter().flat_map(|sheet| sheet.errors.iter()))
    }

    pub fn is_success(&self) -> bool {
        self.errors().next().is_none()
    }

    /// The value written to JSON: the sheet result of a single sheet, or an
    /// object keyed by sheet name when several sheets were read.
    pub fn output(&self) -> WorkbookOutput<'_> {
        match self.sheets.as_slice() {
            [sheet] => WorkbookOutput::Single(&sheet.result),
            sheets => WorkbookOutput::BySheet(
                sheets
                    .iter()
                    .map(|sheet| (sheet.sheet.as_str(), &sheet.result))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self, indent: usize) -> Result<String, serde_json::Error> {
        to_json(&self.output(), indent)
    }
}

/// Serializable view of a workbook result.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WorkbookOutput<'a> {
    Single(&'a SheetResult),
    BySheet(IndexMap<&'a str, &'a SheetResult>),
}

/// Reads a workbook and parses every selected sheet.
///
/// `Err` is a file-level problem: the path is missing, the workbook cannot be
/// read, or no sheet was selected.
pub fn convert_file(path: &Path, options: &ConvertOptions) -> Result<WorkbookOutcome, TableError> {
    let file = path.to_string_lossy().to_string();
    let reporter = ErrorReporter::new(&file);
    if !path.exists() {
        Err(reporter.file_level(ErrorKind::FileNotFoundError, "file does not exist"))?
    }

    let unreadable = |error: SheetNestError| reporter.file_level(ErrorKind::InvalidFileFormatError, error.to_string());
    let mut spreadsheet = open_spreadsheet(path).map_err(unreadable)?;
    let sheets = spreadsheet.read_sheets(&options.criteria).map_err(unreadable)?;
    if sheets.is_empty() {
        Err(reporter.file_level(
            ErrorKind::EmptyFileError,
            format!("no worksheet selected among: {}", spreadsheet.sheet_names().join(", ")),
        ))?
    }

    let mut outcome = WorkbookOutcome {
        file,
        sheets: Vec::new(),
        header_errors: Vec::new(),
    };
    for sheet in &sheets {
        match parse_sheet(sheet, &options.parse) {
            Ok(parsed) => outcome.sheets.push(parsed),
            Err(error) => outcome.header_errors.push(error),
        }
    }
    Ok(outcome)
}

/// Checks a workbook and returns every problem found.
pub fn validate_file(path: &Path, options: &ConvertOptions) -> Vec<TableError> {
    match convert_file(path, options) {
        Ok(outcome) => outcome.errors().cloned().collect(),
        Err(error) => vec![error],
    }
}

/// Pretty-prints `value` as JSON with `indent` spaces; 0 gives compact output.
pub fn to_json<T: Serialize + ?Sized>(value: &T, indent: usize) -> Result<String, serde_json::Error> {
    if indent == 0 {
        return serde_json::to_string(value);
    }
    let indent = vec![b' '; indent];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
