//! Cell-accurate error reports for table content.
//!
//! Every problem found while building the header tree or binding data rows is
//! reported as a [`TableError`]: the file, the offending cell, a kind from a
//! closed taxonomy and a human readable message.
use crate::spreadsheet::reference::index_to_reference;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// Closed taxonomy of table errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    FileNotFoundError,
    InvalidFileFormatError,
    EmptyFileError,
    MissingHeaderMarkerError,
    InvalidHeaderFormatError,
    InvalidTypeNameError,
    ChildAdditionError,
    MissingDataMarkerError,
    UnexpectedDataError,
    TypeConversionError,
    InvalidIndexError,
    DuplicateKeyError,
    MissingKeyError,
    /// A converted result could not be serialized or written
    OutputWriteError,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FileNotFoundError => "FileNotFoundError",
            Self::InvalidFileFormatError => "InvalidFileFormatError",
            Self::EmptyFileError => "EmptyFileError",
            Self::MissingHeaderMarkerError => "MissingHeaderMarkerError",
            Self::InvalidHeaderFormatError => "InvalidHeaderFormatError",
            Self::InvalidTypeNameError => "InvalidTypeNameError",
            Self::ChildAdditionError => "ChildAdditionError",
            Self::MissingDataMarkerError => "MissingDataMarkerError",
            Self::UnexpectedDataError => "UnexpectedDataError",
            Self::TypeConversionError => "TypeConversionError",
            Self::InvalidIndexError => "InvalidIndexError",
            Self::DuplicateKeyError => "DuplicateKeyError",
            Self::MissingKeyError => "MissingKeyError",
            Self::OutputWriteError => "OutputWriteError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located problem in a table.
#[derive(Error, Clone, Debug, PartialEq, Serialize)]
#[error("{kind} at {}: {message}", self.location())]
pub struct TableError {
    /// Source file name
    pub file: String,
    /// Cell reference such as `D3`, absent for file-level problems
    pub cell: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl TableError {
    /// `file!cell`, or just the file for file-level errors.
    pub fn location(&self) -> String {
        match &self.cell {
            Some(cell) => format!("{}!{}", self.file, cell),
            None => self.file.to_owned(),
        }
    }
}

/// Builds [`TableError`]s for one file.
#[derive(Clone, Debug)]
pub struct ErrorReporter {
    file: String,
}

impl ErrorReporter {
    pub fn new(file: &str) -> Self {
        Self { file: file.to_owned() }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Error located at a 0-based grid position.
    pub fn at(&self, row: usize, col: usize, kind: ErrorKind, message: impl Into<String>) -> TableError {
        TableError {
            file: self.file.to_owned(),
            cell: Some(index_to_reference(row, col)),
            kind,
            message: message.into(),
        }
    }

    /// Error about the file as a whole.
    pub fn file_level(&self, kind: ErrorKind, message: impl Into<String>) -> TableError {
        TableError {
            file: self.file.to_owned(),
            cell: None,
            kind,
            message: message.into(),
        }
    }
}
