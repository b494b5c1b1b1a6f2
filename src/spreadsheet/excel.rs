//! Package-level helpers for SpreadsheetML workbooks
use crate::error::SheetNestError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use zip::ZipArchive;

/// XML tag name for relationship elements
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Worksheet entry found in `xl/workbook.xml`
#[derive(Clone, Debug, PartialEq)]
pub(super) struct SheetEntry {
    /// Sheet name as shown on the tab
    pub(super) name: String,
    /// Worksheet part inside the package
    pub(super) path: String,
    /// Whether this is the tab the workbook opens on
    pub(super) active: bool,
}

/// Workbook-level metadata
pub(super) struct Workbook {
    pub(super) sheets: Vec<SheetEntry>,
    pub(super) is_1904: bool,
}

/// Opens a workbook package and loads its metadata
///
/// # Returns
/// Tuple of the zip handle, the number format per style index and the worksheets
pub(super) fn open<W, F>(
    file_name: &str,
    reader: UnifiedReader,
    load_workbook: W,
    load_number_formats: F,
) -> Result<(ZipArchive<UnifiedReader>, Vec<CellType>, Vec<SheetEntry>), SheetNestError>
where
    W: Fn(&mut ZipArchive<UnifiedReader>) -> Result<Workbook, SheetNestError>,
    F: Fn(&mut ZipArchive<UnifiedReader>, bool) -> Result<Vec<CellType>, SheetNestError>,
{
    let mut zip = ZipArchive::new(reader)?;
    let workbook = load_workbook(&mut zip)?;
    if workbook.sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
    }

    let number_formats = load_number_formats(&mut zip, workbook.is_1904)?;
    Ok((zip, number_formats, workbook.sheets))
}

/// Loads worksheet relationships, mapping relationship IDs to worksheet paths
pub(super) fn load_relationships(zip: &mut ZipArchive<UnifiedReader>, path: &str) -> Result<HashMap<String, String>, SheetNestError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps style indexes to cell types using custom and built-in number formats
pub(super) fn resolve_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the package
pub(super) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}
