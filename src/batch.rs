//! Converts every workbook of a directory into one JSON file per workbook.
use crate::convert_file;
use crate::report::ErrorKind;
use crate::report::ErrorReporter;
use crate::report::TableError;
use crate::ConvertOptions;
use glob::MatchOptions;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a whole batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    GlobError(#[from] glob::GlobError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result of converting one workbook.
#[derive(Clone, Debug, PartialEq)]
pub struct FileReport {
    /// Workbook file name, without the directory
    pub name: String,
    /// JSON file written on success
    pub output: Option<PathBuf>,
    pub errors: Vec<TableError>,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }
}

/// Per-file results and totals of a batch run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Workbook extensions picked up by a batch run.
const WORKBOOK_PATTERNS: [&str; 2] = ["*.xlsx", "*.xlsm"];

/// Converts each `*.xlsx`/`*.xlsm` file of `input` into `output/<stem>.json`.
///
/// Stale `*.json` files in `output` are removed first. A failing workbook, or a
/// JSON file that cannot be written, is recorded in the report and never stops
/// the remaining ones.
pub fn convert_dir(input: &Path, output: &Path, options: &ConvertOptions) -> Result<BatchReport, BatchError> {
    if !input.exists() {
        Err(BatchError::InputNotFound(input.to_path_buf()))?
    }
    if !input.is_dir() {
        Err(BatchError::NotADirectory(input.to_path_buf()))?
    }

    fs::create_dir_all(output)?;
    clear_json(output)?;

    let workbooks = find_workbooks(input)?;
    if workbooks.is_empty() {
        tracing::warn!(dir = %input.display(), "no Excel files found");
    }

    let mut report = BatchReport::default();
    for path in workbooks {
        let file = convert_workbook(&path, output, options);
        if file.is_success() {
            report.succeeded += 1;
        } else {
            report.failed += 1;
        }
        report.files.push(file);
    }
    tracing::info!(succeeded = report.succeeded, failed = report.failed, "batch complete");
    Ok(report)
}

/// Converts one workbook; every failure, including writing its JSON, stays in the report.
fn convert_workbook(path: &Path, output: &Path, options: &ConvertOptions) -> FileReport {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let failed = |errors: Vec<TableError>| FileReport {
        name: name.to_owned(),
        output: None,
        errors,
    };

    let outcome = match convert_file(path, options) {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!(file = %name, "{error}");
            return failed(vec![error]);
        }
    };
    if !outcome.is_success() {
        let errors = outcome.errors().cloned().collect::<Vec<_>>();
        tracing::info!(file = %name, errors = errors.len(), "workbook has errors");
        return failed(errors);
    }

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let target = output.join(format!("{stem}.json"));
    let written = outcome
        .to_json(options.indent)
        .map_err(BatchError::from)
        .and_then(|json| Ok(fs::write(&target, json)?));
    if let Err(error) = written {
        tracing::warn!(file = %name, output = %target.display(), "{error}");
        let reporter = ErrorReporter::new(&outcome.file);
        return failed(vec![reporter.file_level(
            ErrorKind::OutputWriteError,
            format!("cannot write '{}': {error}", target.display()),
        )]);
    }

    tracing::info!(file = %name, output = %target.display(), "converted workbook");
    FileReport {
        name,
        output: Some(target),
        errors: Vec::new(),
    }
}

/// Workbooks of `dir` in name order, skipping Excel lock files (`~$name.xlsx`).
fn find_workbooks(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let mut paths = Vec::new();
    for pattern in WORKBOOK_PATTERNS {
        for entry in glob::glob_with(&format!("{root}/{pattern}"), options)? {
            let path = entry?;
            let is_lock_file = path
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("~$"))
                .unwrap_or(false);
            if is_lock_file {
                tracing::warn!(file = %path.display(), "skipping Excel lock file");
            } else if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Removes `*.json` files directly inside `dir`.
fn clear_json(dir: &Path) -> Result<(), BatchError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path.extension().map(|extension| extension == "json").unwrap_or(false);
        if is_json && path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_must_be_a_directory() {
        let temp = tempfile::tempdir().unwrap();
        let options = ConvertOptions::default();

        let missing = temp.path().join("missing");
        let result = convert_dir(&missing, &temp.path().join("out"), &options);
        assert!(matches!(result, Err(BatchError::InputNotFound(_))));

        let file = temp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let result = convert_dir(&file, &temp.path().join("out"), &options);
        assert!(matches!(result, Err(BatchError::NotADirectory(_))));
    }

    #[test]
    fn empty_directory_clears_stale_json() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("old.json"), "{}").unwrap();
        fs::write(output.join("keep.txt"), "x").unwrap();
        fs::write(input.join("~$locked.xlsx"), "x").unwrap();

        let report = convert_dir(&input, &output, &ConvertOptions::default()).unwrap();
        assert_eq!(report, BatchReport::default());
        assert!(!output.join("old.json").exists());
        assert!(output.join("keep.txt").exists());
    }

    #[test]
    fn broken_workbooks_are_counted() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("b.xlsx"), "not a zip").unwrap();
        fs::write(temp.path().join("a.XLSM"), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "x").unwrap();

        let output = temp.path().join("json");
        let report = convert_dir(temp.path(), &output, &ConvertOptions::default()).unwrap();
        let names = report.files.iter().map(|file| file.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["a.XLSM", "b.xlsx"]);
        assert_eq!((report.succeeded, report.failed), (0, 2));
        assert!(output.is_dir());
    }
}
