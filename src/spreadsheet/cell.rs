use crate::error::SheetNestError;
use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use std::fmt::Display;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum CellType {
    #[default]
    Empty,
    /// Boolean values (stored as "1" / "0")
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers
    NumberTime,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Text, either inline or resolved from the shared string table
    Text,
    /// Shared string table reference, only seen while a worksheet is being read
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::NumberTime),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Analyzes format codes for date/time patterns.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, _) => Self::NumberTime,
            (false, false, _) => Self::Number,
        }
    }

    /// Returns true for numeric storage, including date/time formatted numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Number
                | Self::NumberDateTime1900
                | Self::NumberDate1900
                | Self::NumberTime
                | Self::NumberDateTime1904
                | Self::NumberDate1904
        )
    }
}

/// Represents a single cell in a spreadsheet with position, type, and value.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    /// Cell data type
    pub kind: CellType,
    /// Cell value as stored in the file
    pub value: String,
}

impl Cell {
    /// Creates a text cell.
    pub fn text(row: usize, col: usize, value: &str) -> Cell {
        let kind = if value.is_empty() { CellType::Empty } else { CellType::Text };
        Cell { row, col, kind, value: value.to_owned() }
    }

    /// Creates a plain numeric cell.
    pub fn number(row: usize, col: usize, value: f64) -> Cell {
        Cell { row, col, kind: CellType::Number, value: value.to_string() }
    }

    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Checks if the cell holds no data. Whitespace-only text counts as data.
    pub fn is_empty(&self) -> bool {
        self.kind == CellType::Empty || self.value.is_empty()
    }

    /// Converts the stored number to a 64-bit integer when it has no fractional part.
    pub fn to_bigint(&self) -> Result<i64, String> {
        let number = self.to_double()?;
        if number.fract() == 0.0 && number >= i64::MIN as f64 && number <= i64::MAX as f64 {
            Ok(number as i64)
        } else {
            Err(format!("'{}' is not a whole number", self.value))
        }
    }

    /// Converts the stored value to double-precision floating point.
    pub fn to_double(&self) -> Result<f64, String> {
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| format!("parse '{}' to double failed", self.value))
    }
}

impl Display for Cell {
    /// Renders the cell the way a reader would see it in the spreadsheet.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = match self.kind {
            CellType::Boolean => Ok(if self.value == "1" { "true" } else { "false" }.to_owned()),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false),
            CellType::NumberDate1900 => to_date_string(&self.value, false),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true),
            CellType::NumberDate1904 => to_date_string(&self.value, true),
            CellType::NumberTime => to_time_string(&self.value),
            CellType::IsoDateTime => Ok(self.value.replace('T', " ")),
            _ => Ok(self.value.to_owned()),
        };
        // Fall back to the stored number when a date serial is out of range.
        write!(f, "{}", rendered.unwrap_or_else(|_| self.value.to_owned()))
    }
}

/// Converts Excel numeric date to ISO date string.
/// Handles Lotus 1-2-3 leap year bug for 1900 epoch.
fn to_date_string(value: &str, is_1904: bool) -> Result<String, SheetNestError> {
    let days = value.parse::<f64>()?.trunc() as i64;
    let duration = Duration::days(
        days + if is_1904 {
            1462
        } else if days < 60 {
            1
        } else {
            0
        },
    );
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal");
    let date = epoch
        .checked_add_signed(duration)
        .ok_or_else(|| SheetNestError::WithContextError(format!("date serial '{value}' out of range")))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Converts Excel numeric time to ISO time string.
fn to_time_string(value: &str) -> Result<String, SheetNestError> {
    let factor = value.parse::<f64>()?.fract();
    let mut total = (factor * 86_400_000f64).round() as i64;
    let milliseconds = total % 1_000;
    total /= 1_000;
    let seconds = total % 60;
    total /= 60;
    let minutes = total % 60;
    let hours = total / 60;
    let timestamp = if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    };
    Ok(timestamp)
}

/// Converts Excel numeric datetime to ISO datetime string.
fn to_datetime_string(value: &str, is_1904: bool) -> Result<String, SheetNestError> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Ok(format!("{date} {time}"))
}
