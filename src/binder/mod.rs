//! # Row Binder
//!
//! Applies a [`TypeNode`] tree to one physical data row. A row either opens a
//! new value (the branch is *enabled*) or continues the value opened by an
//! earlier row (the branch is *disabled*): disabled scalar cells must stay
//! empty, and a list or dict whose index cell is filled appends a new element
//! even in a disabled branch. What one row contributes is a [`Fragment`];
//! [`merge::Slot`] folds fragments into complete values.
pub mod merge;

use crate::report::ErrorKind;
use crate::report::ErrorReporter;
use crate::report::TableError;
use crate::schema::registry::NodeKind;
use crate::schema::registry::ScalarType;
use crate::schema::TypeNode;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::sheet::Sheet;
use crate::value::Key;
use crate::value::Value;

/// Grid position `(row, col)`.
pub type Position = (usize, usize);

/// The contribution of one physical row to a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Fragment {
    /// Nothing in this row
    Blank,
    Scalar(Value, Position),
    List(Option<Element<i64>>),
    Dict(Option<Element<Key>>),
    /// One fragment per child, in declaration order
    Class(Vec<Fragment>),
}

/// An element a row adds to a list or dict.
#[derive(Clone, Debug, PartialEq)]
pub enum Element<K> {
    /// The index cell was filled: a new element starts here
    New { key: K, at: Position, value: Box<Fragment> },
    /// The index cell was empty: the content extends the latest element
    Latest(Box<Fragment>),
}

impl Fragment {
    pub fn is_blank(&self) -> bool {
        matches!(self, Fragment::Blank)
    }

    /// First cell that contributed to this fragment.
    pub fn anchor(&self) -> Option<Position> {
        match self {
            Fragment::Blank => None,
            Fragment::Scalar(_, at) => Some(*at),
            Fragment::List(element) => element.as_ref().and_then(Element::anchor),
            Fragment::Dict(element) => element.as_ref().and_then(Element::anchor),
            Fragment::Class(fields) => fields.iter().find_map(Fragment::anchor),
        }
    }
}

impl<K> Element<K> {
    fn anchor(&self) -> Option<Position> {
        match self {
            Element::New { at, .. } => Some(*at),
            Element::Latest(value) => value.anchor(),
        }
    }
}

/// Binds the cells of one data row.
pub struct RowBinder<'a> {
    sheet: &'a Sheet,
    reporter: &'a ErrorReporter,
    row: usize,
}

impl<'a> RowBinder<'a> {
    pub fn new(sheet: &'a Sheet, reporter: &'a ErrorReporter, row: usize) -> Self {
        Self { sheet, reporter, row }
    }

    fn cell(&self, col: usize) -> Option<&'a Cell> {
        self.sheet.get(self.row, col)
    }

    /// Depth-first binding of `node`. Stops at the first error in the row.
    pub fn bind(&self, node: &TypeNode, enabled: bool) -> Result<Fragment, TableError> {
        match node.kind {
            NodeKind::Scalar(scalar) => self.bind_scalar(node, scalar, enabled),
            NodeKind::List => Ok(self.bind_list(node, enabled)?.map(Fragment::List).unwrap_or(Fragment::Blank)),
            NodeKind::Dict => Ok(self.bind_dict(node, enabled)?.map(Fragment::Dict).unwrap_or(Fragment::Blank)),
            NodeKind::Class => {
                let fields = node
                    .children
                    .iter()
                    .map(|child| self.bind(child, enabled))
                    .collect::<Result<Vec<_>, _>>()?;
                if !enabled && fields.iter().all(Fragment::is_blank) {
                    Ok(Fragment::Blank)
                } else {
                    Ok(Fragment::Class(fields))
                }
            }
        }
    }

    fn bind_scalar(&self, node: &TypeNode, scalar: ScalarType, enabled: bool) -> Result<Fragment, TableError> {
        let col = node.col();
        let cell = self.cell(col);
        if !enabled {
            return match cell {
                None => Ok(Fragment::Blank),
                Some(cell) => Err(self.reporter.at(
                    self.row,
                    col,
                    ErrorKind::UnexpectedDataError,
                    format!("'{}' must be empty here, found '{cell}'", node.name),
                )),
            };
        }

        let value = scalar.coerce(cell).map_err(|message| {
            self.reporter.at(self.row, col, ErrorKind::TypeConversionError, format!("{}: {message}", node.name))
        })?;
        Ok(Fragment::Scalar(value, (self.row, col)))
    }

    /// `Some(None)` is an enabled list without an element in this row;
    /// `None` means the row contributes nothing.
    fn bind_list(&self, node: &TypeNode, enabled: bool) -> Result<Option<Option<Element<i64>>>, TableError> {
        let (index_node, value_node) = self.pair(node)?;
        let col = index_node.col();
        match self.cell(col) {
            Some(cell) => {
                let index = ScalarType::Int
                    .coerce(Some(cell))
                    .ok()
                    .and_then(|value| match value {
                        Value::Int(index) if index >= 0 => Some(index),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        self.reporter.at(
                            self.row,
                            col,
                            ErrorKind::InvalidIndexError,
                            format!("index of '{}' must be a non-negative integer, found '{cell}'", node.name),
                        )
                    })?;
                let value = self.bind(value_node, true)?;
                Ok(Some(Some(Element::New { key: index, at: (self.row, col), value: Box::new(value) })))
            }
            None => self.continue_latest(value_node, enabled),
        }
    }

    fn bind_dict(&self, node: &TypeNode, enabled: bool) -> Result<Option<Option<Element<Key>>>, TableError> {
        let (key_node, value_node) = self.pair(node)?;
        let col = key_node.col();
        match self.cell(col) {
            Some(cell) => {
                let scalar = key_node.scalar_type().unwrap_or(ScalarType::String);
                let key = scalar
                    .coerce(Some(cell))
                    .map_err(|message| {
                        self.reporter.at(
                            self.row,
                            col,
                            ErrorKind::TypeConversionError,
                            format!("key of '{}': {message}", node.name),
                        )
                    })?
                    .as_key()
                    .ok_or_else(|| {
                        self.reporter.at(
                            self.row,
                            col,
                            ErrorKind::TypeConversionError,
                            format!("key of '{}' must be int or string", node.name),
                        )
                    })?;
                let value = self.bind(value_node, true)?;
                Ok(Some(Some(Element::New { key, at: (self.row, col), value: Box::new(value) })))
            }
            None => self.continue_latest(value_node, enabled),
        }
    }

    /// Empty index cell: whatever the value subtree holds extends the latest element.
    fn continue_latest<K>(&self, value_node: &TypeNode, enabled: bool) -> Result<Option<Option<Element<K>>>, TableError> {
        let value = self.bind(value_node, false)?;
        let element = if value.is_blank() { None } else { Some(Element::Latest(Box::new(value))) };
        Ok(match (enabled, element) {
            (false, None) => None,
            (_, element) => Some(element),
        })
    }

    fn pair<'n>(&self, node: &'n TypeNode) -> Result<(&'n TypeNode, &'n TypeNode), TableError> {
        node.key_child().zip(node.value_child()).ok_or_else(|| {
            self.reporter.at(
                node.row,
                node.col(),
                ErrorKind::InvalidHeaderFormatError,
                format!("{} field '{}' needs exactly 2 children", node.kind, node.name),
            )
        })
    }
}
