//! # Sheet Session
//!
//! Drives one sheet from grid to [`SheetResult`]: builds the header schema,
//! walks the data rows, resolves which key each row belongs to and folds the
//! row fragments per key. Row errors are collected rather than returned so a
//! single pass reports every problem in the sheet.
use crate::binder::merge::Slot;
use crate::binder::RowBinder;
use crate::report::ErrorKind;
use crate::report::ErrorReporter;
use crate::report::TableError;
use crate::schema::builder::build_header;
use crate::schema::builder::RowMarker;
use crate::schema::Schema;
use crate::spreadsheet::sheet::Sheet;
use crate::value::Key;
use crate::value::SheetResult;
use indexmap::IndexMap;

/// How rows without their own key value are attributed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyMode {
    /// A blank key cell continues the nearest key above it; keys are unique
    #[default]
    Inherit,
    /// Every row states its key; rows repeating a key continue that entry
    Repeat,
}

/// Options for parsing one sheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParseOptions {
    /// Top-level field used as the key; the first field when `None`
    pub key_field: Option<String>,
    pub key_mode: KeyMode,
}

/// The outcome of binding every data row of a sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetOutcome {
    /// Sheet name
    pub sheet: String,
    /// Keys whose rows all bound cleanly
    pub result: SheetResult,
    /// Row errors in sheet order, then merge errors in key order
    pub errors: Vec<TableError>,
}

impl SheetOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Per-key accumulator; `Failed` keys are still checked but never reported as results.
enum Entry {
    Open(Slot),
    Failed,
}

/// Which key the next keyless row continues.
enum Cursor {
    /// No key seen yet
    Start,
    Key(Key),
    /// The last key row failed before its key was known
    Lost,
}

struct Session<'a> {
    sheet: &'a Sheet,
    schema: Schema,
    options: &'a ParseOptions,
    reporter: ErrorReporter,
    entries: IndexMap<Key, Entry>,
    cursor: Cursor,
    errors: Vec<TableError>,
}

/// Builds the header schema of `sheet` without binding any data row.
pub fn load_schema(sheet: &Sheet, options: &ParseOptions) -> Result<Schema, TableError> {
    let reporter = ErrorReporter::new(&sheet.file_name);
    let tree = build_header(sheet, &reporter)?;
    Schema::from_tree(tree, options.key_field.as_deref(), &reporter)
}

/// Parses a sheet into its result. `Err` means the header itself is unusable.
pub fn parse_sheet(sheet: &Sheet, options: &ParseOptions) -> Result<SheetOutcome, TableError> {
    let schema = load_schema(sheet, options)?;
    let mut session = Session {
        sheet,
        schema,
        options,
        reporter: ErrorReporter::new(&sheet.file_name),
        entries: IndexMap::new(),
        cursor: Cursor::Start,
        errors: Vec::new(),
    };

    for row in session.schema.data_row..sheet.row_count() {
        // Later `#data` or `#head` markers are ordinary data rows
        if RowMarker::of(sheet, row) == RowMarker::Comment || sheet.is_blank_row(row) {
            continue;
        }
        if let Err(error) = session.bind_row(row) {
            session.errors.push(error);
        }
    }

    let outcome = session.finish();
    tracing::debug!(
        file = %sheet.file_name,
        sheet = %sheet.name,
        keys = outcome.result.len(),
        errors = outcome.errors.len(),
        "parsed sheet"
    );
    Ok(outcome)
}

/// Checks a sheet without exposing values: the header error, or every row error.
pub fn validate_sheet(sheet: &Sheet, options: &ParseOptions) -> Vec<TableError> {
    match parse_sheet(sheet, options) {
        Ok(outcome) => outcome.errors,
        Err(error) => vec![error],
    }
}

impl Session<'_> {
    fn bind_row(&mut self, row: usize) -> Result<(), TableError> {
        let col = self.schema.key.col();
        let key = match self.sheet.get(row, col) {
            None => None,
            Some(cell) => {
                let key = self.schema.key.scalar_type().and_then(|scalar| scalar.coerce(Some(cell)).ok());
                match key.as_ref().and_then(|value| value.as_key()) {
                    Some(key) => Some(key),
                    None => {
                        self.cursor = Cursor::Lost;
                        Err(self.reporter.at(
                            row,
                            col,
                            ErrorKind::TypeConversionError,
                            format!("cannot convert key '{cell}' of '{}'", self.schema.key.name),
                        ))?
                    }
                }
            }
        };

        match (self.options.key_mode, key) {
            (KeyMode::Inherit, Some(key)) => {
                if self.entries.contains_key(&key) {
                    self.cursor = Cursor::Lost;
                    Err(self.reporter.at(
                        row,
                        col,
                        ErrorKind::DuplicateKeyError,
                        format!("key '{key}' already appears above"),
                    ))?
                }
                self.cursor = Cursor::Key(key.clone());
                self.open(row, key)
            }
            (KeyMode::Inherit, None) => match &self.cursor {
                Cursor::Key(key) => {
                    let key = key.clone();
                    self.extend(row, key)
                }
                Cursor::Lost => self.discard(row),
                Cursor::Start => Err(self.missing_key(row, "no key above this row to continue")),
            },
            (KeyMode::Repeat, Some(key)) => {
                if self.entries.contains_key(&key) {
                    self.extend(row, key)
                } else {
                    self.open(row, key)
                }
            }
            (KeyMode::Repeat, None) => Err(self.missing_key(row, "every row must state its key")),
        }
    }

    fn missing_key(&self, row: usize, reason: &str) -> TableError {
        let col = self.schema.key.col();
        let message = format!("'{}' is empty: {reason}", self.schema.key.name);
        self.reporter.at(row, col, ErrorKind::MissingKeyError, message)
    }

    /// Starts a new entry from an enabled row.
    fn open(&mut self, row: usize, key: Key) -> Result<(), TableError> {
        let binder = RowBinder::new(self.sheet, &self.reporter, row);
        let opened = binder
            .bind(&self.schema.row, true)
            .and_then(|fragment| Slot::open(&self.schema.row, fragment, &self.reporter));
        match opened {
            Ok(slot) => {
                self.entries.insert(key, Entry::Open(slot));
                Ok(())
            }
            Err(error) => {
                self.entries.insert(key, Entry::Failed);
                Err(error)
            }
        }
    }

    /// Folds a continuation row into an existing entry.
    fn extend(&mut self, row: usize, key: Key) -> Result<(), TableError> {
        let binder = RowBinder::new(self.sheet, &self.reporter, row);
        let fragment = binder.bind(&self.schema.row, false);
        let entry = self.entries.entry(key).or_insert(Entry::Failed);
        let previous = std::mem::replace(entry, Entry::Failed);
        match (previous, fragment) {
            (Entry::Open(slot), Ok(fragment)) => {
                *entry = Entry::Open(slot.absorb(&self.schema.row, fragment, &self.reporter)?);
                Ok(())
            }
            (_, Err(error)) => Err(error),
            (Entry::Failed, Ok(_)) => Ok(()),
        }
    }

    /// Checks a row whose key could not be resolved; its content is dropped.
    fn discard(&self, row: usize) -> Result<(), TableError> {
        RowBinder::new(self.sheet, &self.reporter, row)
            .bind(&self.schema.row, false)
            .map(|_| ())
    }

    fn finish(mut self) -> SheetOutcome {
        let mut result = SheetResult::new();
        for (key, entry) in std::mem::take(&mut self.entries) {
            if let Entry::Open(slot) = entry {
                match slot.finish(&self.schema.row, &self.reporter) {
                    Ok(value) => result.insert(key, value),
                    Err(error) => self.errors.push(error),
                }
            }
        }
        SheetOutcome {
            sheet: self.sheet.name.to_owned(),
            result,
            errors: self.errors,
        }
    }
}
