//! Builds the [`HeaderTree`] of a sheet from its marker and declaration rows.
use crate::report::ErrorKind;
use crate::report::ErrorReporter;
use crate::report::TableError;
use crate::schema::registry::NodeKind;
use crate::schema::registry::ScalarType;
use crate::schema::HeaderTree;
use crate::schema::TypeNode;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::sheet::Sheet;
use std::collections::HashSet;
use std::ops::Range;

pub const HEAD_MARKER: &str = "#head";
pub const DATA_MARKER: &str = "#data";

/// Row classification by the text in column 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RowMarker {
    Head,
    Data,
    Comment,
    Plain,
}

impl RowMarker {
    pub fn of(sheet: &Sheet, row: usize) -> RowMarker {
        match sheet.marker(row).as_deref() {
            Some(HEAD_MARKER) => RowMarker::Head,
            Some(DATA_MARKER) => RowMarker::Data,
            Some(text) if text.starts_with('#') => RowMarker::Comment,
            _ => RowMarker::Plain,
        }
    }
}

/// Recursive descent over the header rows of one sheet.
struct HeaderBuilder<'a> {
    sheet: &'a Sheet,
    reporter: &'a ErrorReporter,
    /// Grid rows of the header block, comments and blank rows removed
    rows: Vec<usize>,
    /// Declaration cells claimed by some node
    consumed: HashSet<(usize, usize)>,
}

/// Reads the header block of `sheet`: checks the `#head` and `#data` markers and
/// builds the declaration tree between them.
pub fn build_header(sheet: &Sheet, reporter: &ErrorReporter) -> Result<HeaderTree, TableError> {
    if sheet.is_empty() {
        Err(reporter.file_level(ErrorKind::EmptyFileError, format!("sheet '{}' has no cells", sheet.name)))?
    }
    if RowMarker::of(sheet, 0) != RowMarker::Head {
        let found = sheet.marker(0).unwrap_or_else(|| "empty".to_owned());
        Err(reporter.at(
            0,
            0,
            ErrorKind::MissingHeaderMarkerError,
            format!("expected '{HEAD_MARKER}', found '{found}'"),
        ))?
    }

    let data_row = (0..sheet.row_count())
        .find(|row| RowMarker::of(sheet, *row) == RowMarker::Data)
        .ok_or_else(|| {
            reporter.file_level(
                ErrorKind::MissingDataMarkerError,
                format!("no '{DATA_MARKER}' row in sheet '{}'", sheet.name),
            )
        })?;

    let rows = (0..data_row)
        .filter(|row| match RowMarker::of(sheet, *row) {
            RowMarker::Comment => false,
            RowMarker::Head => true,
            _ => sheet.marker(*row).is_some() || !sheet.is_blank_row(*row),
        })
        .collect::<Vec<_>>();
    let width = declared_width(sheet, &rows);

    let mut builder = HeaderBuilder {
        sheet,
        reporter,
        rows,
        consumed: HashSet::new(),
    };
    let mut root = TypeNode::new("", NodeKind::Class, 0, 1..width);
    let (children, depth) = builder.children(0, 1..width, "")?;
    for child in children {
        builder.attach(&mut root, child)?;
    }

    builder.check_consumed(depth, width)?;
    if let Some(&row) = builder.rows.get(depth) {
        let found = sheet.marker(row).unwrap_or_else(|| "empty".to_owned());
        Err(reporter.at(
            row,
            0,
            ErrorKind::MissingDataMarkerError,
            format!("expected '{DATA_MARKER}' after {depth} header row(s), found '{found}'"),
        ))?
    }

    tracing::debug!(
        file = reporter.file(),
        sheet = %sheet.name,
        fields = root.children.len(),
        depth,
        width,
        "built header tree"
    );
    Ok(HeaderTree {
        nodes: root.children,
        depth,
        width,
        data_row,
    })
}

/// One past the rightmost header cell or merged header region.
fn declared_width(sheet: &Sheet, rows: &[usize]) -> usize {
    let cells = sheet
        .cells
        .iter()
        .filter(|cell| !cell.is_empty() && rows.contains(&cell.row))
        .map(|cell| cell.col);
    let merges = sheet
        .merged
        .iter()
        .filter(|range| rows.contains(&range.first_row))
        .map(|range| range.last_col);
    cells.chain(merges).max().map(|col| col + 1).unwrap_or(1).max(1)
}

/// Splits `name:type` into a trimmed name and resolved kind.
pub fn parse_declaration(cell: &Cell, reporter: &ErrorReporter) -> Result<(String, NodeKind), TableError> {
    let text = cell.to_string();
    let (name, type_name) = text.trim().split_once(':').ok_or_else(|| {
        reporter.at(
            cell.row,
            cell.col,
            ErrorKind::InvalidHeaderFormatError,
            format!("header must be in format 'name:type', got '{text}'"),
        )
    })?;

    let name = name.trim();
    if name.is_empty() {
        Err(reporter.at(
            cell.row,
            cell.col,
            ErrorKind::InvalidHeaderFormatError,
            format!("missing field name in '{text}'"),
        ))?
    }
    let kind = type_name
        .parse::<NodeKind>()
        .map_err(|message| reporter.at(cell.row, cell.col, ErrorKind::InvalidTypeNameError, message))?;
    Ok((name.to_owned(), kind))
}

impl HeaderBuilder<'_> {
    /// Reads the declarations of header row `level` inside `span`.
    /// Returns them with the number of header rows they occupy.
    fn children(&mut self, level: usize, span: Range<usize>, parent: &str) -> Result<(Vec<TypeNode>, usize), TableError> {
        let row = self.rows[level];
        let mut nodes = Vec::<TypeNode>::new();
        let mut depth = 1usize;
        let mut col = span.start;
        while col < span.end {
            let cell = match self.sheet.get(row, col) {
                Some(cell) => cell,
                None if col == span.start => {
                    let message = if parent.is_empty() {
                        "no declaration in the first column".to_owned()
                    } else {
                        format!("'{parent}' has no declaration under its first column")
                    };
                    Err(self.reporter.at(row, col, ErrorKind::InvalidHeaderFormatError, message))?
                }
                None => match self.next_declared(row, col, span.end) {
                    // Leave the gap to `TypeNode::add_child`
                    Some(next) => {
                        col = next;
                        continue;
                    }
                    None => Err(self.reporter.at(
                        row,
                        col,
                        ErrorKind::ChildAdditionError,
                        format!("columns of '{parent}' from here on have no declaration"),
                    ))?,
                },
            };

            let end = match self.sheet.merged_at(row, col) {
                Some(range) => range.last_col + 1,
                None => self.next_declared(row, col + 1, span.end).unwrap_or(span.end),
            };
            self.consumed.insert((row, col));

            let (name, kind) = parse_declaration(cell, self.reporter)?;
            if nodes.iter().any(|node| node.name == name) {
                Err(self.reporter.at(
                    row,
                    col,
                    ErrorKind::InvalidHeaderFormatError,
                    format!("duplicate field name '{name}'"),
                ))?
            }

            let (node, rows) = self.node(level, TypeNode::new(&name, kind, row, col..end))?;
            depth = depth.max(rows);
            nodes.push(node);
            col = end;
        }
        Ok((nodes, depth))
    }

    /// Completes a declaration, descending into the next header row for composites.
    fn node(&mut self, level: usize, mut node: TypeNode) -> Result<(TypeNode, usize), TableError> {
        let (row, col) = (node.row, node.col());
        let invalid = |message: String| self.reporter.at(row, col, ErrorKind::InvalidHeaderFormatError, message);

        if let NodeKind::Scalar(_) = node.kind {
            if node.span.len() > 1 {
                Err(invalid(format!("{} field '{}' spans {} columns", node.kind, node.name, node.span.len())))?
            }
            return Ok((node, 1));
        }
        if level + 1 >= self.rows.len() {
            Err(invalid(format!("{} field '{}' has no header row below it", node.kind, node.name)))?
        }

        let (children, rows) = self.children(level + 1, node.span.clone(), &node.name)?;
        let invalid = |message: String| self.reporter.at(row, col, ErrorKind::InvalidHeaderFormatError, message);
        match node.kind {
            NodeKind::List | NodeKind::Dict if children.len() != 2 => Err(invalid(format!(
                "{} field '{}' needs exactly 2 children, found {}",
                node.kind,
                node.name,
                children.len()
            )))?,
            NodeKind::List if children[0].kind != NodeKind::Scalar(ScalarType::Int) => Err(invalid(format!(
                "index of list '{}' must be int, found {}",
                node.name, children[0].kind
            )))?,
            NodeKind::Dict
                if !matches!(children[0].kind, NodeKind::Scalar(ScalarType::Int) | NodeKind::Scalar(ScalarType::String)) =>
            {
                Err(invalid(format!(
                    "key of dict '{}' must be int or string, found {}",
                    node.name, children[0].kind
                )))?
            }
            _ => (),
        }

        for child in children {
            self.attach(&mut node, child)?;
        }
        Ok((node, rows + 1))
    }

    fn attach(&self, parent: &mut TypeNode, child: TypeNode) -> Result<(), TableError> {
        let (row, col) = (child.row, child.col());
        parent
            .add_child(child)
            .map_err(|error| self.reporter.at(row, col, ErrorKind::ChildAdditionError, error.to_string()))
    }

    /// First non-empty cell of `row` in `[from, end)`.
    fn next_declared(&self, row: usize, from: usize, end: usize) -> Option<usize> {
        (from..end).find(|col| self.sheet.get(row, *col).is_some())
    }

    /// Every declaration in rows `1..depth` must belong to some composite.
    fn check_consumed(&self, depth: usize, width: usize) -> Result<(), TableError> {
        for &row in self.rows.iter().take(depth).skip(1) {
            for col in 1..width {
                if let Some(cell) = self.sheet.get(row, col) {
                    if !self.consumed.contains(&(row, col)) {
                        Err(self.reporter.at(
                            row,
                            col,
                            ErrorKind::ChildAdditionError,
                            format!("declaration '{cell}' has no composite parent"),
                        ))?
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::range::CellRange;

    fn build(rows: &[&[&str]]) -> Result<HeaderTree, TableError> {
        build_sheet(&Sheet::from_rows("t.xlsx", rows.iter().map(|row| row.iter())))
    }

    fn build_sheet(sheet: &Sheet) -> Result<HeaderTree, TableError> {
        build_header(sheet, &ErrorReporter::new("t.xlsx"))
    }

    fn located(result: Result<HeaderTree, TableError>) -> (ErrorKind, Option<String>) {
        let error = result.unwrap_err();
        (error.kind, error.cell)
    }

    #[test]
    fn nested_list_header() {
        let tree = build(&[
            &["#head", "name:string", "hp:int", "skills:list", ""],
            &["", "", "", "idx:int", "value:string"],
            &["#data", "Nyxra", "10000", "0", "Shadowstep"],
        ])
        .unwrap();

        assert_eq!(tree.depth, 2);
        assert_eq!(tree.width, 5);
        assert_eq!(tree.data_row, 2);
        let names = tree.nodes.iter().map(|node| node.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["name", "hp", "skills"]);
        let skills = &tree.nodes[2];
        assert_eq!(skills.kind, NodeKind::List);
        assert_eq!(skills.span, 3..5);
        assert_eq!(skills.key_child().map(|node| node.kind), Some(NodeKind::Scalar(ScalarType::Int)));
        assert_eq!(skills.value_child().map(|node| node.span.clone()), Some(4..5));
    }

    #[test]
    fn top_level_spans_cover_declared_columns() {
        let tree = build(&[
            &["#head", "id:int", "stats:class", "", "", "tags:dict", ""],
            &["", "", "atk:int", "def:int", "spd:float", "k:string", "v:int"],
            &["#data"],
        ])
        .unwrap();

        let mut next = 1;
        for node in &tree.nodes {
            assert_eq!(node.span.start, next);
            next = node.span.end;
        }
        assert_eq!(next, tree.width);
        assert_eq!(tree.nodes[1].children.len(), 3);
    }

    #[test]
    fn merged_cells_define_spans() {
        let mut sheet = Sheet::from_rows(
            "t.xlsx",
            [
                vec!["#head", "id:int", "pos:class", "", "note:string"],
                vec!["", "", "x:int", "y:int", ""],
                vec!["#data"],
            ],
        );
        sheet.merge(CellRange::try_from("C1:D1").unwrap());
        let tree = build_sheet(&sheet).unwrap();
        assert_eq!(tree.nodes[1].span, 2..4);
        assert_eq!(tree.nodes[2].span, 4..5);
    }

    #[test]
    fn merged_cell_overrunning_parent() {
        let mut sheet = Sheet::from_rows(
            "t.xlsx",
            [
                vec!["#head", "id:int", "pos:class", "", "note:string"],
                vec!["", "", "x:int", "y:class", ""],
                vec!["", "", "", "a:int", "b:int"],
                vec!["#data"],
            ],
        );
        sheet.merge(CellRange::try_from("C1:D1").unwrap());
        sheet.merge(CellRange::try_from("D2:E2").unwrap());
        assert_eq!(located(build_sheet(&sheet)), (ErrorKind::ChildAdditionError, Some("D2".to_owned())));
    }

    #[test]
    fn three_level_nesting() {
        let tree = build(&[
            &["#head", "id:int", "waves:list", ""],
            &["", "", "i:int", "wave:class"],
            &["", "", "", "count:int"],
            &["#data"],
        ])
        .unwrap();
        assert_eq!(tree.depth, 3);
        assert_eq!(tree.nodes[1].depth(), 3);
    }

    #[test]
    fn comment_rows_are_skipped() {
        let tree = build(&[
            &["#head", "id:int", "tags:list", ""],
            &["# designer notes", "x", "y", "z"],
            &["", "", "i:int", "v:string"],
            &["#data", "1", "0", "a"],
        ])
        .unwrap();
        assert_eq!(tree.depth, 2);
    }

    #[test]
    fn marker_errors() {
        assert_eq!(
            located(build(&[&["head", "id:int"], &["#data"]])),
            (ErrorKind::MissingHeaderMarkerError, Some("A1".to_owned()))
        );
        assert_eq!(
            located(build(&[&["#head", "id:int"], &["foo", "1"], &["#data", "2"]])),
            (ErrorKind::MissingDataMarkerError, Some("A2".to_owned()))
        );
        assert_eq!(located(build(&[&["#head", "id:int"], &["", "1"]])), (ErrorKind::MissingDataMarkerError, None));
        assert_eq!(located(build(&[])), (ErrorKind::EmptyFileError, None));
    }

    #[test]
    fn declaration_errors() {
        assert_eq!(
            located(build(&[&["#head", "id:int", "hp"], &["#data"]])),
            (ErrorKind::InvalidHeaderFormatError, Some("C1".to_owned()))
        );
        assert_eq!(
            located(build(&[&["#head", "id:int", ":int"], &["#data"]])),
            (ErrorKind::InvalidHeaderFormatError, Some("C1".to_owned()))
        );
        assert_eq!(
            located(build(&[&["#head", "id:int", "hp:bool"], &["#data"]])),
            (ErrorKind::InvalidTypeNameError, Some("C1".to_owned()))
        );
        assert_eq!(
            located(build(&[&["#head", "id:int", "id:string"], &["#data"]])),
            (ErrorKind::InvalidHeaderFormatError, Some("C1".to_owned()))
        );
        assert_eq!(
            located(build(&[&["#head", "", "id:int"], &["#data"]])),
            (ErrorKind::InvalidHeaderFormatError, Some("B1".to_owned()))
        );
    }

    #[test]
    fn composite_shape_errors() {
        // list without an int index
        assert_eq!(
            located(build(&[
                &["#head", "id:int", "l:list", ""],
                &["", "", "i:string", "v:int"],
                &["#data"],
            ])),
            (ErrorKind::InvalidHeaderFormatError, Some("C1".to_owned()))
        );
        // dict with three children
        assert_eq!(
            located(build(&[
                &["#head", "id:int", "d:dict", "", ""],
                &["", "", "k:string", "v:int", "w:int"],
                &["#data"],
            ])),
            (ErrorKind::InvalidHeaderFormatError, Some("C1".to_owned()))
        );
        // composite in the last header row
        assert_eq!(
            located(build(&[&["#head", "id:int", "c:class"], &["#data"]])),
            (ErrorKind::InvalidHeaderFormatError, Some("C1".to_owned()))
        );
        // composite whose first column is empty below it
        assert_eq!(
            located(build(&[
                &["#head", "id:int", "c:class", ""],
                &["", "", "", "v:int"],
                &["#data"],
            ])),
            (ErrorKind::InvalidHeaderFormatError, Some("C2".to_owned()))
        );
    }

    #[test]
    fn scalar_spanning_columns() {
        let mut sheet = Sheet::from_rows("t.xlsx", [vec!["#head", "id:int", "hp:int", ""], vec!["#data"]]);
        sheet.merge(CellRange::try_from("C1:D1").unwrap());
        assert_eq!(located(build_sheet(&sheet)), (ErrorKind::InvalidHeaderFormatError, Some("C1".to_owned())));
    }

    #[test]
    fn declaration_under_scalar() {
        assert_eq!(
            located(build(&[
                &["#head", "id:int", "c:class", ""],
                &["", "x:int", "a:int", "b:int"],
                &["#data"],
            ])),
            (ErrorKind::ChildAdditionError, Some("B2".to_owned()))
        );
    }
}
