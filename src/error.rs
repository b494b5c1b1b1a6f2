use thiserror::Error;

/// Main error type for reading workbooks.
/// Aggregates errors from the standard library, dependencies, and internal modules.
///
/// Problems with the *content* of a table (markers, declarations, cell values) are
/// reported as [`crate::report::TableError`] instead.
#[derive(Error, Debug)]
pub enum SheetNestError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    UnifiedReaderError(#[from] crate::helpers::reader::UnifiedReaderError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    RangeError(#[from] crate::spreadsheet::range::RangeError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetNestError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetNestError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_wraps_message() {
        let result: Result<(), SheetNestError> = Err(SheetNestError::WithContextError("boom".to_owned()));
        let error = result.with_prefix("Read worksheet 'Units'").unwrap_err();
        assert_eq!(error.to_string(), "Read worksheet 'Units': boom");
    }

    #[test]
    fn from_parse_errors() {
        let error: SheetNestError = "x".parse::<f64>().unwrap_err().into();
        assert!(matches!(error, SheetNestError::ParseFloatError(_)));
    }
}
