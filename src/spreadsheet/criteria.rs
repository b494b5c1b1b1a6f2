use glob::Pattern;

/// Criteria for selecting which worksheets of a workbook to convert.
#[derive(Clone, Debug, Default)]
pub struct Criteria {
    /// Sheet name patterns. `None` selects only the workbook's active sheet.
    pub sheet_name_patterns: Option<Vec<Pattern>>,
}

impl Criteria {
    /// Builds criteria from glob patterns, e.g. `["Unit*", "Skills"]`.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, glob::PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| Pattern::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Criteria {
            sheet_name_patterns: Some(patterns).filter(|patterns| !patterns.is_empty()),
        })
    }

    /// Checks if a sheet should be read.
    /// Without patterns only the active sheet is accepted.
    pub(crate) fn accept(&self, sheet_name: &str, is_active: bool) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => is_active,
        }
    }
}
