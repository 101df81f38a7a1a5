//! Spreadsheet upload handlers.
//!
//! Every route reads the uploads under `field_name`, taken from the query,
//! then from a plain form field of that name, then the configured default.
//! Remaining query parameters are passed to the parser as options.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde_json::{Map, Value};
use webexcel_core::{ParseOptions, RowTable};

use crate::error::HttpAppError;
use crate::excel_request::ExcelRequest;
use crate::state::AppState;

const FIELD_NAME_PARAM: &str = "field_name";
const FILE_NAME_PARAM: &str = "file_name";
/// Parse options read as integers; every other option stays a string.
const INTEGER_OPTIONS: &[&str] = &[
    "sheet_index",
    "start_row",
    "row_limit",
    "start_column",
    "column_limit",
];

/// Query string split into the adapter's own parameters and parser options.
#[derive(Debug, Default, PartialEq)]
pub struct ExcelQuery {
    pub field_name: Option<String>,
    pub file_name: Option<String>,
    pub options: ParseOptions,
}

impl ExcelQuery {
    /// Integer options holding a non-negative integer become numbers.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = ExcelQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                FIELD_NAME_PARAM => query.field_name = Some(value),
                FILE_NAME_PARAM => query.file_name = Some(value),
                _ => {
                    let value = match value.parse::<u64>() {
                        Ok(n) if INTEGER_OPTIONS.contains(&key.as_str()) => Value::from(n),
                        _ => Value::String(value),
                    };
                    query.options.insert(key, value);
                }
            }
        }
        query
    }

    fn field_name(&self, request: &ExcelRequest) -> String {
        self.field_name
            .as_deref()
            .or_else(|| request.form_value(FIELD_NAME_PARAM))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| request.default_field_name())
            .to_string()
    }
}

/// Combined rows of every upload under the field.
pub async fn load_array(
    Query(pairs): Query<Vec<(String, String)>>,
    mut request: ExcelRequest,
) -> Result<Json<RowTable>, HttpAppError> {
    let query = ExcelQuery::from_pairs(pairs);
    let field_name = query.field_name(&request);
    let rows = request.load_combined_rows(&field_name, query.options)?;
    Ok(Json(rows))
}

pub async fn load_records(
    Query(pairs): Query<Vec<(String, String)>>,
    mut request: ExcelRequest,
) -> Result<Json<Vec<Map<String, Value>>>, HttpAppError> {
    let query = ExcelQuery::from_pairs(pairs);
    let field_name = query.field_name(&request);
    let records = request.load_records(&field_name, query.options)?;
    Ok(Json(records))
}

/// Sheet name to rows of the first upload under the field.
pub async fn load_book(
    Query(pairs): Query<Vec<(String, String)>>,
    mut request: ExcelRequest,
) -> Result<Json<Map<String, Value>>, HttpAppError> {
    let query = ExcelQuery::from_pairs(pairs);
    let field_name = query.field_name(&request);
    let book = request.load_book_dict(&field_name, query.options)?;
    Ok(Json(book))
}

/// Re-render the combined rows of the uploads as `file_type`.
pub async fn convert(
    State(state): State<AppState>,
    Path(file_type): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    mut request: ExcelRequest,
) -> Result<Response, HttpAppError> {
    let query = ExcelQuery::from_pairs(pairs);
    let field_name = query.field_name(&request);
    let rows = request.load_combined_rows(&field_name, query.options)?;

    tracing::info!(
        field_name = %field_name,
        file_type = %file_type,
        rows = rows.len(),
        "Converting uploaded spreadsheets"
    );

    let response = state.responder.make_response_from_array(
        rows,
        &file_type,
        200,
        query.file_name.as_deref(),
    )?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_query_split() {
        let query = ExcelQuery::from_pairs(pairs(&[
            ("field_name", "sheets"),
            ("file_name", "out"),
            ("sheet_name", "2023"),
            ("start_row", "2"),
            ("delimiter", ";"),
        ]));
        assert_eq!(query.field_name.as_deref(), Some("sheets"));
        assert_eq!(query.file_name.as_deref(), Some("out"));
        assert_eq!(
            Value::Object(query.options),
            json!({"sheet_name": "2023", "start_row": 2, "delimiter": ";"})
        );
    }

    #[test]
    fn test_only_integer_options_become_numbers() {
        let query = ExcelQuery::from_pairs(pairs(&[
            ("sheet_index", "1"),
            ("delimiter", "9"),
            ("row_limit", "ten"),
        ]));
        assert_eq!(
            Value::Object(query.options),
            json!({"sheet_index": 1, "delimiter": "9", "row_limit": "ten"})
        );
    }

    #[test]
    fn test_field_name_falls_back_to_form_then_default() {
        let request = ExcelRequest::new(Vec::new(), Default::default());
        assert_eq!(ExcelQuery::default().field_name(&request), "file");

        let request = request.with_form_value("field_name", "sheets");
        assert_eq!(ExcelQuery::default().field_name(&request), "sheets");

        let query = ExcelQuery::from_pairs(pairs(&[("field_name", "upload")]));
        assert_eq!(query.field_name(&request), "upload");
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(ExcelQuery::from_pairs(Vec::new()), ExcelQuery::default());
    }
}
