use crate::error::ResultMessage;
use crate::error::SheetNestError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::SheetEntry;
use crate::spreadsheet::excel::Workbook;
use crate::spreadsheet::range::CellRange;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_WORKBOOK_VIEW: QName = QName(b"workbookView"); // Window state, holds the active tab
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content
const TAG_MERGE_CELL: QName = QName(b"mergeCell");    // Merged region

/// An Excel XLSX/XLSM workbook
pub(crate) struct XlsxSpreadsheet {
    /// File name of the spreadsheet
    pub(crate) name: String,
    /// ZIP archive containing the package parts
    zip: ZipArchive<UnifiedReader>,
    /// Parsed number formats for cell type detection, indexed by style
    number_formats: Vec<CellType>,
    /// Worksheets in workbook order
    sheets: Vec<SheetEntry>,
    /// Shared string table, loaded on first use
    shared_strings: Option<Vec<String>>,
}

impl XlsxSpreadsheet {
    /// Opens a workbook package and parses its structure
    pub(crate) fn open(file_name: &str, reader: UnifiedReader) -> Result<XlsxSpreadsheet, SheetNestError> {
        let (zip, number_formats, sheets) = excel::open(file_name, reader, load_workbook, load_number_formats)?;
        tracing::debug!(file = file_name, sheets = sheets.len(), "opened workbook");
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip,
            number_formats,
            sheets,
            shared_strings: None,
        })
    }

    /// Loads the shared string table from `xl/sharedStrings.xml`
    fn load_shared_strings(&mut self) -> Result<Vec<String>, SheetNestError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };

        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                let string = reader.read_text(TAG_SHARED_STRING_ITEM, false)?;
                shared_strings.push(string);
            }
        });
        Ok(shared_strings)
    }

    /// Reads one worksheet part into a grid
    fn read_sheet(&mut self, entry: &SheetEntry, shared_strings: &[String]) -> Result<Sheet, SheetNestError> {
        let mut sheet = Sheet::new(&self.name, &entry.name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self.zip.xml_reader(&entry.path)?
            .ok_or_else(|| SpreadsheetError::FileError(entry.path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(number) = event.get_attribute_value("r")? {
                    row_count = number.parse::<usize>()?.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                value.clear();
                kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::Text,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                if let Some(format_id) = event.get_attribute_value("s")? {
                    if kind == CellType::Number && !format_id.is_empty() {
                        let index = format_id.parse::<usize>()?;
                        kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                    }
                }
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = reader.read_text(TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = reader.read_text(TAG_VALUE, true)?;
            }
            Event::End(event) if !value.is_empty() && event.name() == TAG_CELL => {
                // Error cells such as `#DIV/0!` stay in the grid; only fields that bind them reject them
                match kind {
                    CellType::SharedString => {
                        let index = value.trim().parse::<usize>()?;
                        let text = shared_strings.get(index).ok_or_else(|| {
                            SpreadsheetError::CellValueError(
                                sheet.file_name.to_owned(),
                                sheet.name.to_owned(),
                                index_to_reference(row, col),
                                format!("shared string #{index} does not exist"),
                            )
                        })?;
                        sheet.push(Cell::text(row, col, text));
                    }
                    _ => sheet.push(Cell { row, col, kind, value: value.to_owned() }),
                }
                value.clear();
            }
            Event::Start(event) if event.name() == TAG_MERGE_CELL => {
                if let Some(reference) = event.get_attribute_value("ref")? {
                    sheet.merge(CellRange::try_from(reference.as_ref())?);
                }
            }
        });
        Ok(sheet)
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|entry| entry.name.to_owned()).collect()
    }

    /// Reads the worksheets accepted by `criteria`, resolving shared strings
    /// and recording merged regions.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SheetNestError> {
        let selected = self
            .sheets
            .iter()
            .filter(|entry| criteria.accept(&entry.name, entry.active))
            .cloned()
            .collect::<Vec<_>>();
        if selected.is_empty() {
            tracing::warn!(file = %self.name, "no worksheet matches the sheet selection");
            return Ok(Vec::new());
        }

        let shared_strings = match self.shared_strings.take() {
            Some(strings) => strings,
            None => self.load_shared_strings().with_prefix("Read shared strings")?,
        };
        let mut sheets = Vec::<Sheet>::new();
        for entry in &selected {
            let sheet = self.read_sheet(entry, &shared_strings);
            sheets.push(sheet.with_prefix(&format!("Read worksheet '{}'", entry.name))?);
        }
        self.shared_strings = Some(shared_strings);
        Ok(sheets)
    }
}

/// Loads worksheet names, paths and the active tab from `xl/workbook.xml`,
/// and determines the date system (1900 vs 1904) used in the file.
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<Workbook, SheetNestError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<SheetEntry> = Vec::new();
    let mut is_1904 = false;
    let mut active_tab = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push(SheetEntry {
                        name: name.to_string(),
                        path: path.to_owned(),
                        active: false,
                    });
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_VIEW => {
            if let Some(tab) = event.get_attribute_value("activeTab")? {
                active_tab = tab.parse::<usize>()?;
            }
        }
    });

    // An out-of-range tab falls back to the first sheet
    let active_tab = if active_tab < sheets.len() { active_tab } else { 0 };
    if let Some(entry) = sheets.get_mut(active_tab) {
        entry.active = true;
    }
    Ok(Workbook { sheets, is_1904 })
}

/// Loads number formats and cell styles from `xl/styles.xml`
///
/// # Returns
/// Vector of CellType values indexed by style ID
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, SheetNestError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => {
            format_indexes_context = false;
        }
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::resolve_number_formats(format_indexes, custom_formats, is_1904))
}
