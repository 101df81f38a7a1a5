//! Request-scoped tabular values shared by the adapter and the spreadsheet layer.

use std::fmt;

use bytes::Bytes;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A single scalar spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Ordered rows of ordered cells. Rows may have different lengths.
pub type RowTable = Vec<Vec<Cell>>;

impl Cell {
    /// Infer a cell from a text field: integer, then float, else string.
    pub fn infer(text: &str) -> Self {
        if text.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = text.parse::<i64>() {
            return Cell::Int(i);
        }
        // Integers beyond i64 stay exact as text instead of rounding through f64.
        if is_integer_text(text) {
            return Cell::String(text.to_string());
        }
        if let Ok(f) = text.parse::<f64>() {
            if f.is_finite() {
                return Cell::Float(f);
            }
        }
        Cell::String(text.to_string())
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::String(String::new()),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::String(s) => Value::String(s.clone()),
        }
    }
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{:.0}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Cell::String(s) => f.write_str(s),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_str(""),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Int(i) => serializer.serialize_i64(*i),
            Cell::Float(f) => serializer.serialize_f64(*f),
            Cell::String(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Empty),
            },
            Value::String(s) if s.is_empty() => Cell::Empty,
            Value::String(s) => Cell::String(s.clone()),
            other => Cell::String(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::String(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::String(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Float(f)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

/// A named row table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub rows: RowTable,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: RowTable) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Ordered collection of sheets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Book {
    pub sheets: Vec<Sheet>,
}

impl Book {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Sheet name to rows, keeping sheet order.
    pub fn to_dict(&self) -> Map<String, Value> {
        self.sheets
            .iter()
            .map(|sheet| {
                let rows = sheet
                    .rows
                    .iter()
                    .map(|row| Value::Array(row.iter().map(Cell::to_json).collect()))
                    .collect();
                (sheet.name.clone(), Value::Array(rows))
            })
            .collect()
    }
}

impl From<Sheet> for Book {
    fn from(sheet: Sheet) -> Self {
        Book::new(vec![sheet])
    }
}

/// Caller options forwarded to the parser next to the derived keys.
pub type ParseOptions = Map<String, Value>;

pub const FILE_TYPE_KEY: &str = "file_type";
pub const FILE_CONTENT_KEY: &str = "file_content";

/// One parser invocation: the upload's file type, its re-encoded bytes, and
/// whatever options the caller supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseParams {
    pub file_type: String,
    pub file_content: Bytes,
    pub options: ParseOptions,
}

impl ParseParams {
    /// Merge caller options with the derived keys. Options named
    /// `file_type` or `file_content` are dropped; the derived values win.
    pub fn new(
        file_type: impl Into<String>,
        file_content: impl Into<Bytes>,
        mut options: ParseOptions,
    ) -> Self {
        options.remove(FILE_TYPE_KEY);
        options.remove(FILE_CONTENT_KEY);
        Self {
            file_type: file_type.into(),
            file_content: file_content.into(),
            options,
        }
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn option_usize(&self, key: &str) -> Option<usize> {
        self.options
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }
}

/// Generated file ready to be wrapped into a transport response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePayload {
    pub content: Bytes,
    pub content_type: String,
    pub status: u16,
    pub file_name: Option<String>,
}
