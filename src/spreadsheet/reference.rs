//! Conversions between Excel-style cell references ("B7", "AA10") and 0-based indexes.

/// Converts column letters to a 0-based column index ("A" => 0, "AA" => 26).
pub fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .chars()
        .map(|letter| letter as usize - 'A' as usize + 1)
        .reduce(|index, digit| index * 26 + digit)
        .map(|column| column - 1)
}

/// Converts a 1-based row number string to a 0-based row index.
pub fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse()
        .ok()
        .filter(|row| *row > 0)
        .map(|row: usize| row - 1)
}

/// Converts a 0-based column index to column letters.
pub fn index_to_col(col: usize) -> String {
    let mut column = col + 1;
    let mut letters = String::new();
    while column > 0 {
        column -= 1;
        letters.insert(0, (b'A' + (column % 26) as u8) as char);
        column /= 26;
    }
    letters
}

/// Converts 0-based row & column indexes to an Excel-style reference in upper case.
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}

/// Parses an Excel-style reference into 0-based (row, column) indexes.
///
/// Absolute markers (`$B$7`) are accepted and ignored.
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(index_to_col(0), "A");
        assert_eq!(index_to_col(25), "Z");
        assert_eq!(index_to_col(26), "AA");
        assert_eq!(index_to_col(701), "ZZ");
        assert_eq!(index_to_col(702), "AAA");
        assert_eq!(col_to_index("a"), Some(0));
        assert_eq!(col_to_index("AA"), Some(26));
        assert_eq!(col_to_index("ZZ"), Some(701));
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);
    }

    #[test]
    fn references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(2, 3), "D3");
        assert_eq!(reference_to_index("D3"), Some((2, 3)));
        assert_eq!(reference_to_index("$AB$12"), Some((11, 27)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("ABC"), None);
    }
}
