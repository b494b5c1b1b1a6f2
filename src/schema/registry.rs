//! Type registry: the closed set of declarable types and scalar coercion.
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::value::Value;
use std::fmt::Display;
use std::str::FromStr;

/// Type names accepted in header declarations, in the order they are listed to users.
pub const TYPE_NAMES: [&str; 6] = ["int", "float", "string", "list", "dict", "class"];

/// Leaf types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Float,
    String,
}

/// Every kind a header declaration can have.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Scalar(ScalarType),
    List,
    Dict,
    Class,
}

impl NodeKind {
    pub fn is_composite(&self) -> bool {
        !matches!(self, NodeKind::Scalar(_))
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Scalar(scalar) => scalar.as_str(),
            NodeKind::List => "list",
            NodeKind::Dict => "dict",
            NodeKind::Class => "class",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    /// Resolves a declared type name; whitespace and case are ignored.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" => Ok(NodeKind::Scalar(ScalarType::Int)),
            "float" => Ok(NodeKind::Scalar(ScalarType::Float)),
            "string" => Ok(NodeKind::Scalar(ScalarType::String)),
            "list" => Ok(NodeKind::List),
            "dict" => Ok(NodeKind::Dict),
            "class" => Ok(NodeKind::Class),
            _ => Err(format!(
                "unknown type '{}', expected one of: {}",
                name.trim(),
                TYPE_NAMES.join(", ")
            )),
        }
    }
}

impl ScalarType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::String => "string",
        }
    }

    /// Converts a cell to a primitive of this type. `None` is an empty cell.
    ///
    /// The error message quotes the raw cell text.
    pub fn coerce(&self, cell: Option<&Cell>) -> Result<Value, String> {
        let cell = match cell.filter(|cell| !cell.is_empty()) {
            Some(cell) => cell,
            None if *self == ScalarType::String => return Ok(Value::Str(String::new())),
            None => return Err(format!("empty cell cannot be converted to {}", self.as_str())),
        };

        match self {
            ScalarType::Int => to_int(cell).map(Value::Int),
            ScalarType::Float => to_float(cell).map(Value::Float),
            ScalarType::String => Ok(Value::Str(cell.to_string())),
        }
    }
}

fn to_int(cell: &Cell) -> Result<i64, String> {
    let converted = match cell.kind {
        CellType::Error => return Err(format!("cell holds the error value '{}'", cell.value)),
        CellType::Boolean => Ok(if cell.value == "1" { 1 } else { 0 }),
        kind if kind.is_numeric() => cell.to_bigint(),
        _ => cell.value.trim().parse::<i64>().map_err(|e| e.to_string()),
    };
    converted.map_err(|_| format!("cannot convert '{}' to int", cell.value))
}

fn to_float(cell: &Cell) -> Result<f64, String> {
    let converted = match cell.kind {
        CellType::Error => return Err(format!("cell holds the error value '{}'", cell.value)),
        CellType::Boolean => Ok(if cell.value == "1" { 1.0 } else { 0.0 }),
        _ => cell.to_double(),
    };
    converted.map_err(|_| format!("cannot convert '{}' to float", cell.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Cell {
        Cell::text(4, 1, value)
    }

    #[test]
    fn resolves_names_case_insensitively() {
        assert_eq!(" Int ".parse::<NodeKind>(), Ok(NodeKind::Scalar(ScalarType::Int)));
        assert_eq!("LIST".parse::<NodeKind>(), Ok(NodeKind::List));
        assert!(NodeKind::Dict.is_composite());
        assert!(!NodeKind::Scalar(ScalarType::String).is_composite());

        let message = "bool".parse::<NodeKind>().unwrap_err();
        assert_eq!(message, "unknown type 'bool', expected one of: int, float, string, list, dict, class");
    }

    #[test]
    fn coerces_text() {
        assert_eq!(ScalarType::Int.coerce(Some(&text("42"))), Ok(Value::Int(42)));
        assert_eq!(ScalarType::Int.coerce(Some(&text(" -7 "))), Ok(Value::Int(-7)));
        assert_eq!(ScalarType::Float.coerce(Some(&text("3.14"))), Ok(Value::Float(3.14)));
        assert_eq!(ScalarType::String.coerce(Some(&text("3.14"))), Ok(Value::from("3.14")));
        assert_eq!(
            ScalarType::Int.coerce(Some(&text("abc"))),
            Err("cannot convert 'abc' to int".to_owned())
        );
        assert!(ScalarType::Int.coerce(Some(&text("4.5"))).is_err());
        assert!(ScalarType::Float.coerce(Some(&text("inf"))).is_err());
    }

    #[test]
    fn coerces_numbers() {
        assert_eq!(ScalarType::Int.coerce(Some(&Cell::number(0, 0, 10000.0))), Ok(Value::Int(10000)));
        assert!(ScalarType::Int.coerce(Some(&Cell::number(0, 0, 2.5))).is_err());
        assert_eq!(ScalarType::Float.coerce(Some(&Cell::number(0, 0, 2.5))), Ok(Value::Float(2.5)));
        assert_eq!(ScalarType::String.coerce(Some(&Cell::number(0, 0, 12.0))), Ok(Value::from("12")));
    }

    #[test]
    fn error_cells_are_not_numbers() {
        let error = Cell { row: 2, col: 1, kind: CellType::Error, value: "#DIV/0!".to_owned() };
        assert_eq!(
            ScalarType::Int.coerce(Some(&error)),
            Err("cell holds the error value '#DIV/0!'".to_owned())
        );
        assert!(ScalarType::Float.coerce(Some(&error)).is_err());
        assert_eq!(ScalarType::String.coerce(Some(&error)), Ok(Value::from("#DIV/0!")));
    }

    #[test]
    fn empty_cells() {
        assert_eq!(ScalarType::String.coerce(None), Ok(Value::from("")));
        assert_eq!(ScalarType::String.coerce(Some(&text(""))), Ok(Value::from("")));
        assert!(ScalarType::Int.coerce(None).is_err());
        assert!(ScalarType::Float.coerce(None).is_err());
    }
}
