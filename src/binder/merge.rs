//! Folds row fragments into complete bound values.
use crate::binder::Element;
use crate::binder::Fragment;
use crate::binder::Position;
use crate::report::ErrorKind;
use crate::report::ErrorReporter;
use crate::report::TableError;
use crate::schema::TypeNode;
use crate::value::Key;
use crate::value::Value;
use indexmap::IndexMap;

/// Accumulated value of one node across the rows of a key.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Scalar(Value),
    List(Vec<Item<i64>>),
    Dict(Vec<Item<Key>>),
    Class(Vec<Slot>),
}

/// A list or dict element together with the cell that opened it.
#[derive(Clone, Debug, PartialEq)]
pub struct Item<K> {
    pub key: K,
    pub at: Position,
    pub slot: Slot,
}

fn error_at(reporter: &ErrorReporter, at: Option<Position>, kind: ErrorKind, message: String) -> TableError {
    match at {
        Some((row, col)) => reporter.at(row, col, kind, message),
        None => reporter.file_level(kind, message),
    }
}

fn shape_mismatch(reporter: &ErrorReporter, node: &TypeNode, fragment: &Fragment) -> TableError {
    error_at(
        reporter,
        fragment.anchor(),
        ErrorKind::UnexpectedDataError,
        format!("row shape does not match {} field '{}'", node.kind, node.name),
    )
}

fn nothing_to_continue(reporter: &ErrorReporter, node: &TypeNode, fragment: &Fragment) -> TableError {
    error_at(
        reporter,
        fragment.anchor(),
        ErrorKind::UnexpectedDataError,
        format!("'{}' has no element to continue", node.name),
    )
}

impl Slot {
    /// Starts an accumulator from a row that opened `node`.
    pub fn open(node: &TypeNode, fragment: Fragment, reporter: &ErrorReporter) -> Result<Slot, TableError> {
        match fragment {
            Fragment::Scalar(value, _) => Ok(Slot::Scalar(value)),
            Fragment::List(element) => {
                let mut items = Vec::new();
                Self::push(node, &mut items, element, reporter)?;
                Ok(Slot::List(items))
            }
            Fragment::Dict(element) => {
                let mut items = Vec::new();
                Self::push(node, &mut items, element, reporter)?;
                Ok(Slot::Dict(items))
            }
            Fragment::Class(fields) if fields.len() == node.children.len() => {
                let slots = node
                    .children
                    .iter()
                    .zip(fields)
                    .map(|(child, field)| Slot::open(child, field, reporter))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Slot::Class(slots))
            }
            fragment => Err(shape_mismatch(reporter, node, &fragment)),
        }
    }

    /// Extends the accumulator with a row that continues `node`.
    pub fn absorb(self, node: &TypeNode, fragment: Fragment, reporter: &ErrorReporter) -> Result<Slot, TableError> {
        match (self, fragment) {
            (slot, Fragment::Blank) => Ok(slot),
            (Slot::List(mut items), Fragment::List(element)) => {
                Self::push(node, &mut items, element, reporter)?;
                Ok(Slot::List(items))
            }
            (Slot::Dict(mut items), Fragment::Dict(element)) => {
                Self::push(node, &mut items, element, reporter)?;
                Ok(Slot::Dict(items))
            }
            (Slot::Class(slots), Fragment::Class(fields)) if fields.len() == slots.len() => {
                let slots = node
                    .children
                    .iter()
                    .zip(slots.into_iter().zip(fields))
                    .map(|(child, (slot, field))| slot.absorb(child, field, reporter))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Slot::Class(slots))
            }
            (_, fragment) => Err(shape_mismatch(reporter, node, &fragment)),
        }
    }

    /// Adds a new element or extends the latest one.
    fn push<K>(
        node: &TypeNode,
        items: &mut Vec<Item<K>>,
        element: Option<Element<K>>,
        reporter: &ErrorReporter,
    ) -> Result<(), TableError> {
        let value_node = node.value_child().ok_or_else(|| {
            error_at(
                reporter,
                Some((node.row, node.col())),
                ErrorKind::InvalidHeaderFormatError,
                format!("{} field '{}' has no value child", node.kind, node.name),
            )
        })?;

        match element {
            None => (),
            Some(Element::New { key, at, value }) => {
                let slot = Slot::open(value_node, *value, reporter)?;
                items.push(Item { key, at, slot });
            }
            Some(Element::Latest(value)) => match items.pop() {
                Some(mut item) => {
                    item.slot = item.slot.absorb(value_node, *value, reporter)?;
                    items.push(item);
                }
                None => Err(nothing_to_continue(reporter, node, &value))?,
            },
        }
        Ok(())
    }

    /// Validates the accumulated elements and produces the final value.
    ///
    /// List elements are ordered by index; the indexes must run without gaps or
    /// repeats from the smallest one. Dict keys must be unique.
    pub fn finish(self, node: &TypeNode, reporter: &ErrorReporter) -> Result<Value, TableError> {
        match self {
            Slot::Scalar(value) => Ok(value),
            Slot::List(mut items) => {
                items.sort_by_key(|item| item.key);
                let value_node = node.value_child().unwrap_or(node);
                let mut values = Vec::with_capacity(items.len());
                let mut previous = None::<i64>;
                for item in items {
                    if let Some(previous) = previous {
                        if previous.checked_add(1) != Some(item.key) {
                            let message = if item.key == previous {
                                format!("duplicate index {} in '{}'", item.key, node.name)
                            } else {
                                format!("index {} in '{}' follows {}, indexes must be contiguous", item.key, node.name, previous)
                            };
                            Err(error_at(reporter, Some(item.at), ErrorKind::InvalidIndexError, message))?
                        }
                    }
                    previous = Some(item.key);
                    values.push(item.slot.finish(value_node, reporter)?);
                }
                Ok(Value::List(values))
            }
            Slot::Dict(items) => {
                let value_node = node.value_child().unwrap_or(node);
                let mut map = IndexMap::with_capacity(items.len());
                for item in items {
                    if map.contains_key(&item.key) {
                        Err(error_at(
                            reporter,
                            Some(item.at),
                            ErrorKind::DuplicateKeyError,
                            format!("duplicate key '{}' in '{}'", item.key, node.name),
                        ))?
                    }
                    let value = item.slot.finish(value_node, reporter)?;
                    map.insert(item.key, value);
                }
                Ok(Value::Map(map))
            }
            Slot::Class(slots) => {
                let mut map = IndexMap::with_capacity(slots.len());
                for (child, slot) in node.children.iter().zip(slots) {
                    map.insert(Key::Str(child.name.to_owned()), slot.finish(child, reporter)?);
                }
                Ok(Value::Map(map))
            }
        }
    }
}
