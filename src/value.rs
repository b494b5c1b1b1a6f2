//! Bound values produced from data rows.
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Display;

/// Key of a dict entry or of a sheet result.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{value}"),
            Key::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_owned())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

/// A fully bound value. Its shape always matches the type node it came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Dicts and classes; classes use their field names as string keys
    Map(IndexMap<Key, Value>),
}

impl Value {
    /// Converts a scalar into a map key. Floats and composites are not keys.
    pub fn as_key(&self) -> Option<Key> {
        match self {
            Value::Int(value) => Some(Key::Int(*value)),
            Value::Str(value) => Some(Key::Str(value.to_owned())),
            _ => None,
        }
    }

    /// Looks up a class field or dict entry by string key.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(&Key::from(name)),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

/// Final per-sheet mapping from key to bound value, in first-appearance order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SheetResult(IndexMap<Key, Value>);

impl SheetResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: Key, value: Value) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> IndexMap<Key, Value> {
        self.0
    }
}
