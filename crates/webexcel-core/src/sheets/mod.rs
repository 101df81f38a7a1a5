//! Spreadsheet I/O layer.
//!
//! Parses uploaded bytes described by [`ParseParams`] into books, sheets and
//! row tables, and renders tables back into downloadable bytes.
//!
//! ## Recognized options
//!
//! - `sheet_name` / `sheet_index`: which sheet of a workbook to read
//! - `delimiter`: single-character field separator for csv/tsv
//! - `start_row`, `row_limit`, `start_column`, `column_limit`: window applied
//!   to the selected sheet
//!
//! Anything else in the options map is ignored.

pub mod reader;
pub mod writer;

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{Book, Cell, ParseParams, RowTable, Sheet};

pub use writer::{save_book_to_memory, save_sheet_to_memory};

/// Spreadsheet formats known to the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Csv,
    Tsv,
    Xlsx,
    Xlsm,
    Xlsb,
    Xls,
    Ods,
}

impl FromStr for FileType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            "tsv" => Ok(FileType::Tsv),
            "xlsx" => Ok(FileType::Xlsx),
            "xlsm" => Ok(FileType::Xlsm),
            "xlsb" => Ok(FileType::Xlsb),
            "xls" => Ok(FileType::Xls),
            "ods" => Ok(FileType::Ods),
            _ => Err(AppError::UnsupportedFileType(s.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Tsv => "tsv",
            FileType::Xlsx => "xlsx",
            FileType::Xlsm => "xlsm",
            FileType::Xlsb => "xlsb",
            FileType::Xls => "xls",
            FileType::Ods => "ods",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileType::Csv => "text/csv",
            FileType::Tsv => "text/tab-separated-values",
            FileType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileType::Xlsm => "application/vnd.ms-excel.sheet.macroEnabled.12",
            FileType::Xlsb => "application/vnd.ms-excel.sheet.binary.macroEnabled.12",
            FileType::Xls => "application/vnd.ms-excel",
            FileType::Ods => "application/vnd.oasis.opendocument.spreadsheet",
        }
    }

    /// Text formats holding exactly one sheet.
    pub fn is_delimited(&self) -> bool {
        matches!(self, FileType::Csv | FileType::Tsv)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, FileType::Csv | FileType::Tsv | FileType::Xlsx)
    }
}

/// Parse the whole workbook described by `params`.
pub fn get_book(params: &ParseParams) -> Result<Book, AppError> {
    let file_type = FileType::from_str(&params.file_type)?;
    let book = if file_type.is_delimited() {
        reader::read_delimited(params, file_type)?
    } else {
        reader::read_workbook(params)?
    };
    tracing::debug!(
        file_type = %file_type,
        sheets = book.sheets.len(),
        "Parsed spreadsheet upload"
    );
    Ok(book)
}

/// Parse the sheet selected by `sheet_name` / `sheet_index` (default: first)
/// and apply the row/column window options.
pub fn get_sheet(params: &ParseParams) -> Result<Sheet, AppError> {
    let book = get_book(params)?;
    let mut sheet = select_sheet(book, params)?;
    sheet.rows = apply_window(sheet.rows, params);
    Ok(sheet)
}

pub fn get_array(params: &ParseParams) -> Result<RowTable, AppError> {
    Ok(get_sheet(params)?.rows)
}

/// Rows after the first, keyed by the first row.
pub fn get_records(params: &ParseParams) -> Result<Vec<Map<String, Value>>, AppError> {
    Ok(rows_to_records(&get_array(params)?))
}

/// Columns keyed by the first row.
pub fn get_dict(params: &ParseParams) -> Result<Map<String, Value>, AppError> {
    Ok(rows_to_column_dict(&get_array(params)?))
}

fn select_sheet(book: Book, params: &ParseParams) -> Result<Sheet, AppError> {
    if let Some(name) = params.option_str("sheet_name") {
        return book
            .sheets
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| AppError::SheetNotFound(name.to_string()));
    }

    let index = params.option_usize("sheet_index").unwrap_or(0);
    let count = book.sheets.len();
    book.sheets.into_iter().nth(index).ok_or_else(|| {
        AppError::SheetNotFound(format!("index {} (book has {} sheets)", index, count))
    })
}

fn apply_window(rows: RowTable, params: &ParseParams) -> RowTable {
    let start_row = params.option_usize("start_row").unwrap_or(0);
    let row_limit = params.option_usize("row_limit").unwrap_or(usize::MAX);
    let start_column = params.option_usize("start_column");
    let column_limit = params.option_usize("column_limit");

    rows.into_iter()
        .skip(start_row)
        .take(row_limit)
        .map(|row| {
            if start_column.is_none() && column_limit.is_none() {
                return row;
            }
            row.into_iter()
                .skip(start_column.unwrap_or(0))
                .take(column_limit.unwrap_or(usize::MAX))
                .collect()
        })
        .collect()
}

fn header_names(header: &[Cell]) -> Vec<String> {
    header.iter().map(|c| c.to_string()).collect()
}

/// Interpret the first row as column names and the remaining rows as records.
/// Short rows are padded with empty values; extra cells are dropped.
pub fn rows_to_records(rows: &RowTable) -> Vec<Map<String, Value>> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };
    let names = header_names(header);

    body.iter()
        .map(|row| {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = row.get(i).map_or_else(empty_value, Cell::to_json);
                    (name.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Interpret the first row as column names and collect each column's values.
pub fn rows_to_column_dict(rows: &RowTable) -> Map<String, Value> {
    let Some((header, body)) = rows.split_first() else {
        return Map::new();
    };

    header_names(header)
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let column = body
                .iter()
                .map(|row| row.get(i).map_or_else(empty_value, Cell::to_json))
                .collect();
            (name, Value::Array(column))
        })
        .collect()
}

fn empty_value() -> Value {
    Cell::Empty.to_json()
}

/// Header row plus one row per record. Without `columns` the header is every
/// key in first-seen order; missing values become empty cells.
pub fn records_to_rows(records: &[Map<String, Value>], columns: Option<&[&str]>) -> RowTable {
    let header: Vec<String> = match columns {
        Some(columns) => columns.iter().map(|c| c.to_string()).collect(),
        None => {
            let mut seen: Vec<String> = Vec::new();
            for key in records.iter().flat_map(|record| record.keys()) {
                if !seen.contains(key) {
                    seen.push(key.clone());
                }
            }
            seen
        }
    };
    if header.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header.iter().map(|name| Cell::from(name.as_str())).collect());
    for record in records {
        rows.push(
            header
                .iter()
                .map(|name| record.get(name).map(Cell::from).unwrap_or_default())
                .collect(),
        );
    }
    rows
}

/// Header of column names, then the columns laid side by side. Columns
/// shorter than the longest are padded with empty cells.
pub fn column_dict_to_rows(columns: &Map<String, Value>) -> RowTable {
    if columns.is_empty() {
        return Vec::new();
    }

    let values: Vec<Vec<Cell>> = columns
        .values()
        .map(|value| match value {
            Value::Array(items) => items.iter().map(Cell::from).collect(),
            scalar => vec![Cell::from(scalar)],
        })
        .collect();
    let height = values.iter().map(Vec::len).max().unwrap_or(0);

    let mut rows = Vec::with_capacity(height + 1);
    rows.push(columns.keys().map(|name| Cell::from(name.as_str())).collect());
    for i in 0..height {
        rows.push(
            values
                .iter()
                .map(|column| column.get(i).cloned().unwrap_or_default())
                .collect(),
        );
    }
    rows
}

/// Build a book from sheet name to rows, where rows is an array of arrays.
pub fn book_from_dict(dict: &Map<String, Value>) -> Result<Book, AppError> {
    dict.iter()
        .map(|(name, rows)| {
            let Value::Array(rows) = rows else {
                return Err(AppError::InvalidInput(format!(
                    "Sheet '{}' must be an array of rows",
                    name
                )));
            };
            let rows = rows
                .iter()
                .map(|row| match row {
                    Value::Array(cells) => Ok(cells.iter().map(Cell::from).collect()),
                    _ => Err(AppError::InvalidInput(format!(
                        "Every row of sheet '{}' must be an array",
                        name
                    ))),
                })
                .collect::<Result<RowTable, AppError>>()?;
            Ok(Sheet::new(name.clone(), rows))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Book::new)
}
