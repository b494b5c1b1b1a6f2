//! # Header Schema
//!
//! The header rows of a sheet declare the shape of every data row as a tree of
//! `name:type` declarations. Each declaration owns a half-open range of grid
//! columns; composite declarations (`list`, `dict`, `class`) split their range
//! among the declarations in the next header row.
//!
//! ```text
//! #head | name:string | hp:int | skills:list          |
//!       |             |        | idx:int | value:string |
//! #data | Nyxra       | 10000  | 0       | Shadowstep   |
//! ```
pub mod builder;
pub mod registry;

use crate::report::ErrorKind;
use crate::report::ErrorReporter;
use crate::report::TableError;
use crate::schema::registry::NodeKind;
use crate::schema::registry::ScalarType;
use crate::spreadsheet::reference::index_to_col;
use std::ops::Range;
use thiserror::Error;

/// Structural violations when attaching a child declaration to its parent.
#[derive(Error, Debug, PartialEq)]
pub enum ChildError {
    #[error("{0} field '{1}' cannot have children")]
    ScalarParent(NodeKind, String),

    #[error("{0} field '{1}' already has its two children")]
    TooManyChildren(NodeKind, String),

    #[error("'{child}' starts at column {found} but column {expected} of '{parent}' has no declaration")]
    Gap { parent: String, child: String, expected: String, found: String },

    #[error("'{child}' extends to column {found}, past the end of '{parent}' at column {limit}")]
    Overrun { parent: String, child: String, limit: String, found: String },
}

/// One header declaration and its subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeNode {
    pub name: String,
    pub kind: NodeKind,
    /// Grid columns covered by this declaration, `[start, end)`
    pub span: Range<usize>,
    pub children: Vec<TypeNode>,
    /// Grid row of the declaring cell
    pub row: usize,
}

impl TypeNode {
    pub fn new(name: &str, kind: NodeKind, row: usize, span: Range<usize>) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            span,
            children: Vec::new(),
            row,
        }
    }

    /// Grid column of the declaring cell.
    pub fn col(&self) -> usize {
        self.span.start
    }

    /// Attaches the next child. Children must tile the parent's span from left to right.
    pub fn add_child(&mut self, child: TypeNode) -> Result<(), ChildError> {
        match self.kind {
            NodeKind::Scalar(_) => Err(ChildError::ScalarParent(self.kind, self.name.to_owned()))?,
            NodeKind::List | NodeKind::Dict if self.children.len() >= 2 => {
                Err(ChildError::TooManyChildren(self.kind, self.name.to_owned()))?
            }
            _ => (),
        }

        let expected = self.children.last().map(|last| last.span.end).unwrap_or(self.span.start);
        if child.span.start != expected {
            Err(ChildError::Gap {
                parent: self.name.to_owned(),
                child: child.name.to_owned(),
                expected: index_to_col(expected),
                found: index_to_col(child.span.start),
            })?
        }
        if child.span.end > self.span.end {
            Err(ChildError::Overrun {
                parent: self.name.to_owned(),
                child: child.name.to_owned(),
                limit: index_to_col(self.span.end - 1),
                found: index_to_col(child.span.end - 1),
            })?
        }

        self.children.push(child);
        Ok(())
    }

    /// The index child of a list or the key child of a dict.
    pub fn key_child(&self) -> Option<&TypeNode> {
        match self.kind {
            NodeKind::List | NodeKind::Dict => self.children.first(),
            _ => None,
        }
    }

    /// The value child of a list or dict.
    pub fn value_child(&self) -> Option<&TypeNode> {
        match self.kind {
            NodeKind::List | NodeKind::Dict => self.children.get(1),
            _ => None,
        }
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Number of header rows this subtree occupies.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(TypeNode::depth).max().unwrap_or(0)
    }
}

/// The declarations of one sheet, as found in its header rows.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderTree {
    /// Top-level declarations, left to right
    pub nodes: Vec<TypeNode>,
    /// Number of header rows in use
    pub depth: usize,
    /// One past the last declared column
    pub width: usize,
    /// Grid row holding the `#data` marker
    pub data_row: usize,
}

/// A header tree split into the key field and the shape of the remaining fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    /// Top-level field whose value keys the sheet result
    pub key: TypeNode,
    /// Synthetic class over the other top-level fields, or the value child of
    /// a sheet-wide dict
    pub row: TypeNode,
    pub depth: usize,
    pub width: usize,
    pub data_row: usize,
}

impl Schema {
    /// Picks the key field (the first field unless `key_field` names another one).
    ///
    /// A header made of a single `dict` declaration describes the whole sheet:
    /// its key child keys the result and its value child is the row shape.
    pub fn from_tree(tree: HeaderTree, key_field: Option<&str>, reporter: &ErrorReporter) -> Result<Schema, TableError> {
        let HeaderTree { mut nodes, depth, width, data_row } = tree;
        if key_field.is_none() && nodes.len() == 1 && nodes[0].kind == NodeKind::Dict {
            let mut sheet = nodes.remove(0);
            let (row, col) = (sheet.row, sheet.col());
            let value = sheet.children.pop();
            let key = sheet.children.pop();
            let (key, row_shape) = key.zip(value).ok_or_else(|| {
                reporter.at(
                    row,
                    col,
                    ErrorKind::InvalidHeaderFormatError,
                    format!("dict field '{}' needs a key and a value", sheet.name),
                )
            })?;
            return Ok(Schema { key, row: row_shape, depth, width, data_row });
        }

        let position = match key_field {
            None => 0,
            Some(name) => nodes.iter().position(|node| node.name == name).ok_or_else(|| {
                reporter.at(0, 0, ErrorKind::InvalidHeaderFormatError, format!("key field '{name}' is not declared"))
            })?,
        };
        if nodes.is_empty() {
            Err(reporter.at(0, 1, ErrorKind::InvalidHeaderFormatError, "no field is declared"))?
        }
        let key = nodes.remove(position);

        match key.kind {
            NodeKind::Scalar(ScalarType::Int) | NodeKind::Scalar(ScalarType::String) => (),
            kind => Err(reporter.at(
                key.row,
                key.col(),
                ErrorKind::InvalidHeaderFormatError,
                format!("key field '{}' must be int or string, found {kind}", key.name),
            ))?,
        }

        let start = nodes.first().map(|node| node.span.start).unwrap_or(width);
        let end = nodes.last().map(|node| node.span.end).unwrap_or(width);
        let mut row = TypeNode::new("", NodeKind::Class, 0, start..end);
        row.children = nodes;

        Ok(Schema { key, row, depth, width, data_row })
    }
}
