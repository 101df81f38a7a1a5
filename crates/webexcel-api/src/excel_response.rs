//! Outbound adapter: spreadsheet downloads as HTTP responses.
//!
//! The `make_response_from_*` family on [`ExcelResponder`] renders tabular
//! data through the spreadsheet layer and hands the bytes to a
//! [`ResponseFactory`]. The default factory is [`build_response`].

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use webexcel_core::{
    sheets::{self, FileType},
    AppError, Book, ResponsePayload, RowTable, Sheet,
};

/// Build a response carrying `content` with the given content type and
/// status. A non-empty `file_name` adds
/// `Content-Disposition: attachment; filename=<file_name>`, written as-is.
pub fn build_response(
    content: impl Into<Bytes>,
    content_type: &str,
    status: u16,
    file_name: Option<&str>,
) -> Result<Response, AppError> {
    let status = StatusCode::from_u16(status)
        .map_err(|_| AppError::InvalidInput(format!("Invalid HTTP status code: {}", status)))?;
    let content_type = HeaderValue::from_str(content_type)
        .map_err(|_| AppError::InvalidInput(format!("Invalid content type: {}", content_type)))?;

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type);

    if let Some(name) = file_name.filter(|name| !name.is_empty()) {
        // The http crate refuses control characters, so CR/LF cannot split the header.
        let disposition = HeaderValue::from_bytes(format!("attachment; filename={}", name).as_bytes())
            .map_err(|_| {
                AppError::InvalidInput(format!("File name cannot be sent in a header: {:?}", name))
            })?;
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    builder
        .body(Body::from(content.into()))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// Turns generated spreadsheet bytes into a transport response.
pub trait ResponseFactory: Send + Sync {
    fn make(&self, payload: ResponsePayload) -> Result<Response, AppError>;
}

/// Default factory: attachment responses via [`build_response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentResponseFactory;

impl ResponseFactory for AttachmentResponseFactory {
    fn make(&self, payload: ResponsePayload) -> Result<Response, AppError> {
        build_response(
            payload.content,
            &payload.content_type,
            payload.status,
            payload.file_name.as_deref(),
        )
    }
}

impl<F> ResponseFactory for F
where
    F: Fn(ResponsePayload) -> Result<Response, AppError> + Send + Sync,
{
    fn make(&self, payload: ResponsePayload) -> Result<Response, AppError> {
        self(payload)
    }
}

/// Serialized rows of one named table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub name: String,
    pub records: Vec<Map<String, Value>>,
}

impl TableData {
    /// Serialize `rows` into records. Every row must serialize to an object.
    pub fn from_rows<T: Serialize>(name: impl Into<String>, rows: &[T]) -> Result<Self, AppError> {
        let name = name.into();
        let records = rows
            .iter()
            .map(|row| -> Result<Map<String, Value>, AppError> {
                match serde_json::to_value(row)? {
                    Value::Object(map) => Ok(map),
                    other => Err(AppError::InvalidInput(format!(
                        "Rows of table '{}' must serialize to objects, got {}",
                        name, other
                    ))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { name, records })
    }

    fn into_sheet(self) -> Sheet {
        Sheet::new(self.name, sheets::records_to_rows(&self.records, None))
    }
}

/// Renders tabular data into downloadable responses.
#[derive(Clone)]
pub struct ExcelResponder {
    factory: Arc<dyn ResponseFactory>,
}

impl Default for ExcelResponder {
    fn default() -> Self {
        Self::new(Arc::new(AttachmentResponseFactory))
    }
}

impl std::fmt::Debug for ExcelResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExcelResponder").finish_non_exhaustive()
    }
}

impl ExcelResponder {
    pub fn new(factory: Arc<dyn ResponseFactory>) -> Self {
        Self { factory }
    }

    /// Render a sheet or book as `file_type` and wrap it into a response.
    pub fn make_response(
        &self,
        data: impl Into<Book>,
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        let file_type = FileType::from_str(file_type)?;
        let book = data.into();
        let content = sheets::save_book_to_memory(&book, file_type)?;

        tracing::debug!(
            file_type = %file_type,
            sheets = book.sheets.len(),
            bytes = content.len(),
            "Rendered spreadsheet response"
        );

        self.factory.make(ResponsePayload {
            content,
            content_type: file_type.content_type().to_string(),
            status,
            file_name: file_name
                .filter(|name| !name.is_empty())
                .map(|name| with_extension(name, file_type)),
        })
    }

    pub fn make_response_from_array(
        &self,
        rows: RowTable,
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        self.make_response(Sheet::new("Sheet1", rows), file_type, status, file_name)
    }

    /// Column name to column values (a scalar counts as a one-cell column).
    pub fn make_response_from_dict(
        &self,
        columns: &Map<String, Value>,
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        let rows = sheets::column_dict_to_rows(columns);
        self.make_response(Sheet::new("Sheet1", rows), file_type, status, file_name)
    }

    pub fn make_response_from_records(
        &self,
        records: &[Map<String, Value>],
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        let rows = sheets::records_to_rows(records, None);
        self.make_response(Sheet::new("Sheet1", rows), file_type, status, file_name)
    }

    /// Sheet name to rows, each rows value an array of arrays.
    pub fn make_response_from_book_dict(
        &self,
        book: &Map<String, Value>,
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        let book = sheets::book_from_dict(book)?;
        self.make_response(book, file_type, status, file_name)
    }

    /// All fields of every row, in a sheet named after the table.
    pub fn make_response_from_a_table<T: Serialize>(
        &self,
        table_name: &str,
        rows: &[T],
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        let sheet = TableData::from_rows(table_name, rows)?.into_sheet();
        self.make_response(sheet, file_type, status, file_name)
    }

    /// Selected fields of every row, with `column_names` as the header.
    pub fn make_response_from_query_sets<T: Serialize>(
        &self,
        rows: &[T],
        column_names: &[&str],
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        let table = TableData::from_rows("Sheet1", rows)?;
        let rows = sheets::records_to_rows(&table.records, Some(column_names));
        self.make_response(Sheet::new(table.name, rows), file_type, status, file_name)
    }

    /// One sheet per table, in the given order.
    pub fn make_response_from_tables(
        &self,
        tables: Vec<TableData>,
        file_type: &str,
        status: u16,
        file_name: Option<&str>,
    ) -> Result<Response, AppError> {
        let book = Book::new(tables.into_iter().map(TableData::into_sheet).collect());
        self.make_response(book, file_type, status, file_name)
    }
}

fn with_extension(file_name: &str, file_type: FileType) -> String {
    let suffix = format!(".{}", file_type.extension());
    if file_name.to_lowercase().ends_with(&suffix) {
        file_name.to_string()
    } else {
        format!("{}{}", file_name, suffix)
    }
}
