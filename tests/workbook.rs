//! End-to-end tests over real `.xlsx` packages written with the `zip` crate.

use pretty_assertions::assert_eq;
use serde_json::json;
use sheetnest::batch::convert_dir;
use sheetnest::convert_file;
use sheetnest::spreadsheet::reference::index_to_reference;
use sheetnest::validate_file;
use sheetnest::ConvertOptions;
use sheetnest::Criteria;
use sheetnest::ErrorKind;
use std::fs;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

struct SheetSpec {
    name: &'static str,
    rows: Vec<Vec<&'static str>>,
    merges: Vec<&'static str>,
}

fn heroes() -> SheetSpec {
    SheetSpec {
        name: "Heroes",
        rows: vec![
            vec!["#head", "name:string", "hp:int", "skills:list"],
            vec!["", "", "", "idx:int", "value:string"],
            vec!["#data", "Nyxra", "10000", "0", "Shadowstep"],
            vec!["", "", "", "1", "Twilight Veil"],
            vec!["# retired heroes below"],
            vec!["", "Orin", "8000", "0", "Ward"],
        ],
        merges: vec!["D1:E1"],
    }
}

fn items() -> SheetSpec {
    SheetSpec {
        name: "Items",
        rows: vec![
            vec!["#head", "id:int", "label:string"],
            vec!["#data", "1", "Potion"],
            vec!["", "2", "Elixir"],
        ],
        merges: Vec::new(),
    }
}

fn broken() -> SheetSpec {
    SheetSpec {
        name: "Broken",
        rows: vec![vec!["#head", "id:int", "power:bogus"], vec!["#data", "1", "2"]],
        merges: Vec::new(),
    }
}

/// Formula results written as error cells (`t="e"`).
const ERROR_VALUES: [&str; 2] = ["#DIV/0!", "#N/A"];

/// Writes a minimal SpreadsheetML package. Numeric text becomes a number cell,
/// values from `ERROR_VALUES` become error cells, anything else goes through the
/// shared string table.
fn write_workbook(path: &Path, sheets: &[SheetSpec], active: usize) {
    let options = SimpleFileOptions::default();
    let mut zip = ZipWriter::new(fs::File::create(path).unwrap());
    let mut shared_strings = Vec::<&str>::new();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();

    let mut workbook = format!(
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><bookViews><workbookView activeTab="{active}"/></bookViews><sheets>"#
    );
    let mut relationships = String::from(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for (index, sheet) in sheets.iter().enumerate() {
        let number = index + 1;
        workbook.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, sheet.name));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));

        let mut xml = String::from("<worksheet><sheetData>");
        for (row, cells) in sheet.rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
            for (col, value) in cells.iter().enumerate() {
                let reference = index_to_reference(row, col);
                if value.is_empty() {
                    continue;
                } else if ERROR_VALUES.contains(value) {
                    xml.push_str(&format!(r#"<c r="{reference}" t="e"><v>{value}</v></c>"#));
                } else if value.parse::<f64>().is_ok() {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
                } else {
                    let index = match shared_strings.iter().position(|text| text == value) {
                        Some(index) => index,
                        None => {
                            shared_strings.push(value);
                            shared_strings.len() - 1
                        }
                    };
                    xml.push_str(&format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
        if !sheet.merges.is_empty() {
            xml.push_str(&format!(r#"<mergeCells count="{}">"#, sheet.merges.len()));
            for merge in &sheet.merges {
                xml.push_str(&format!(r#"<mergeCell ref="{merge}"/>"#));
            }
            xml.push_str("</mergeCells>");
        }
        xml.push_str("</worksheet>");

        zip.start_file(format!("xl/worksheets/sheet{number}.xml"), options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    workbook.push_str("</sheets></workbook>");
    relationships.push_str("</Relationships>");

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(workbook.as_bytes()).unwrap();
    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(relationships.as_bytes()).unwrap();

    let mut sst = format!(r#"<sst count="{0}" uniqueCount="{0}">"#, shared_strings.len());
    for text in &shared_strings {
        sst.push_str(&format!("<si><t>{text}</t></si>"));
    }
    sst.push_str("</sst>");
    zip.start_file("xl/sharedStrings.xml", options).unwrap();
    zip.write_all(sst.as_bytes()).unwrap();

    zip.finish().unwrap();
}

fn parsed(json: &str) -> serde_json::Value {
    serde_json::from_str(json).unwrap()
}

fn heroes_json() -> serde_json::Value {
    json!({
        "Nyxra": {"hp": 10000, "skills": ["Shadowstep", "Twilight Veil"]},
        "Orin": {"hp": 8000, "skills": ["Ward"]}
    })
}

#[test]
fn active_sheet_with_merged_header() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("heroes.xlsx");
    write_workbook(&path, &[heroes(), items()], 0);

    let outcome = convert_file(&path, &ConvertOptions::default()).unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.errors().collect::<Vec<_>>());
    assert_eq!(outcome.sheets.len(), 1);
    assert_eq!(outcome.sheets[0].sheet, "Heroes");
    assert_eq!(parsed(&outcome.to_json(2).unwrap()), heroes_json());
}

#[test]
fn active_tab_and_sheet_patterns() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("data.xlsm");
    write_workbook(&path, &[heroes(), items()], 1);

    let outcome = convert_file(&path, &ConvertOptions::default()).unwrap();
    assert_eq!(
        parsed(&outcome.to_json(0).unwrap()),
        json!({"1": {"label": "Potion"}, "2": {"label": "Elixir"}})
    );

    let options = ConvertOptions {
        criteria: Criteria::with_patterns(["*"]).unwrap(),
        ..ConvertOptions::default()
    };
    let outcome = convert_file(&path, &options).unwrap();
    let json = outcome.to_json(0).unwrap();
    assert!(json.starts_with(r#"{"Heroes":"#), "{json}");
    assert_eq!(
        parsed(&json),
        json!({
            "Heroes": heroes_json(),
            "Items": {"1": {"label": "Potion"}, "2": {"label": "Elixir"}}
        })
    );

    let options = ConvertOptions {
        criteria: Criteria::with_patterns(["Missing*"]).unwrap(),
        ..ConvertOptions::default()
    };
    let error = convert_file(&path, &options).unwrap_err();
    assert_eq!(error.kind, ErrorKind::EmptyFileError);
}

#[test]
fn header_errors_point_at_the_cell() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.xlsx");
    write_workbook(&path, &[broken()], 0);

    let errors = validate_file(&path, &ConvertOptions::default());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::InvalidTypeNameError);
    assert_eq!(errors[0].cell.as_deref(), Some("C1"));
    assert_eq!(errors[0].file, path.to_string_lossy());
}

#[test]
fn batch_writes_one_json_per_workbook() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("tables");
    let output = temp.path().join("json");
    fs::create_dir_all(&input).unwrap();
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("stale.json"), "{}").unwrap();

    write_workbook(&input.join("heroes.xlsx"), &[heroes()], 0);
    write_workbook(&input.join("broken.xlsx"), &[broken()], 0);
    fs::write(input.join("~$heroes.xlsx"), "lock").unwrap();

    let report = convert_dir(&input, &output, &ConvertOptions::default()).unwrap();
    let names = report.files.iter().map(|file| file.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["broken.xlsx", "heroes.xlsx"]);
    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert_eq!(report.files[0].errors[0].kind, ErrorKind::InvalidTypeNameError);

    assert!(!output.join("stale.json").exists());
    assert!(!output.join("broken.json").exists());
    let written = fs::read_to_string(output.join("heroes.json")).unwrap();
    assert!(written.starts_with("{\n  \"Nyxra\": {\n    \"hp\": 10000,"), "{written}");
    assert_eq!(parsed(&written), heroes_json());
}

#[test]
fn error_cells_fail_only_where_bound() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("formulas.xlsx");
    let sheet = SheetSpec {
        name: "Formulas",
        rows: vec![
            vec!["#head", "id:int", "hp:int", "note:string"],
            vec!["#data", "1", "5", "#N/A"],
            vec!["# scratch", "#DIV/0!"],
            vec!["", "2", "#DIV/0!", "ok"],
        ],
        merges: Vec::new(),
    };
    write_workbook(&path, &[sheet], 0);

    let outcome = convert_file(&path, &ConvertOptions::default()).unwrap();
    let errors = outcome.errors().collect::<Vec<_>>();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::TypeConversionError);
    assert_eq!(errors[0].cell.as_deref(), Some("C4"));
    assert_eq!(
        serde_json::to_value(&outcome.sheets[0].result).unwrap(),
        json!({"1": {"hp": 5, "note": "#N/A"}})
    );
}

#[test]
fn unwritable_output_fails_only_its_workbook() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("tables");
    let output = temp.path().join("json");
    fs::create_dir_all(&input).unwrap();
    // A directory where the JSON file should go cannot be overwritten
    fs::create_dir_all(output.join("heroes.json")).unwrap();

    write_workbook(&input.join("heroes.xlsx"), &[heroes()], 0);
    write_workbook(&input.join("items.xlsx"), &[items()], 0);

    let report = convert_dir(&input, &output, &ConvertOptions::default()).unwrap();
    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert_eq!(report.files[0].name, "heroes.xlsx");
    assert_eq!(report.files[0].output, None);
    assert_eq!(report.files[0].errors.len(), 1);
    assert_eq!(report.files[0].errors[0].kind, ErrorKind::OutputWriteError);
    assert_eq!(report.files[0].errors[0].cell, None);

    let written = fs::read_to_string(output.join("items.json")).unwrap();
    assert_eq!(parsed(&written), json!({"1": {"label": "Potion"}, "2": {"label": "Elixir"}}));
}
