//! Readers for delimited text (csv) and binary workbooks (calamine).

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use super::FileType;
use crate::error::AppError;
use crate::models::{Book, Cell, ParseParams, RowTable, Sheet};

/// 2^53: beyond this, whole floats no longer map to distinct integers.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Read a csv/tsv upload as a single-sheet book named after its type.
pub fn read_delimited(params: &ParseParams, file_type: FileType) -> Result<Book, AppError> {
    let delimiter = match params.option_str("delimiter") {
        Some(d) => parse_delimiter(d)?,
        None if file_type == FileType::Tsv => b'\t',
        None => b',',
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(params.file_content.as_ref());

    let mut rows = RowTable::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| AppError::parse(file_type.extension(), e))?;
        rows.push(record.iter().map(Cell::infer).collect());
    }

    Ok(Sheet::new(file_type.extension(), rows).into())
}

/// Read every worksheet of an xlsx/xlsm/xlsb/xls/ods upload.
pub fn read_workbook(params: &ParseParams) -> Result<Book, AppError> {
    let cursor = Cursor::new(params.file_content.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| AppError::parse(params.file_type.as_str(), e))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| AppError::parse(params.file_type.as_str(), e))?;
        sheets.push(Sheet::new(name, range_to_rows(&range)));
    }

    Ok(Book::new(sheets))
}

fn parse_delimiter(value: &str) -> Result<u8, AppError> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(AppError::InvalidInput(format!(
            "delimiter must be a single ASCII character, got '{}'",
            value
        ))),
    }
}

/// Convert a calamine range to rows, keeping the sheet's leading blank
/// rows and columns so cell positions survive.
fn range_to_rows(range: &Range<Data>) -> RowTable {
    let Some((start_row, start_col)) = range.start() else {
        return RowTable::new();
    };

    let mut rows: RowTable = (0..start_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells: Vec<Cell> = (0..start_col).map(|_| Cell::Empty).collect();
        cells.extend(row.iter().map(data_to_cell));
        rows.push(cells);
    }
    rows
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::String(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        // Workbooks store every number as a float; whole values read back as integers.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT => {
            Cell::Int(*f as i64)
        }
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::String(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::String(s.clone()),
        Data::Error(e) => Cell::String(e.to_string()),
    }
}
