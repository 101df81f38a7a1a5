//! Inbound adapter: spreadsheet uploads from multipart requests.
//!
//! [`ExcelRequest`] buffers a `multipart/form-data` body. Parts that carry a
//! filename become upload entries; the other parts are kept as plain form
//! values. Uploads are then turned into [`ParseParams`] and handed to the
//! spreadsheet layer.

use axum::extract::{FromRef, FromRequest, Multipart, Request};
use bytes::Bytes;
use serde_json::{Map, Value};
use webexcel_core::{sheets, AppError, Config, ParseOptions, ParseParams, RowTable, Transcoder};

use crate::error::HttpAppError;

/// Upload settings injected into every [`ExcelRequest`] through router state.
#[derive(Debug, Clone)]
pub struct ExcelAdapter {
    pub transcoder: Option<Transcoder>,
    pub default_field_name: String,
}

impl Default for ExcelAdapter {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ExcelAdapter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transcoder: config.transcoder,
            default_field_name: config.default_field_name.clone(),
        }
    }
}

/// One file part of the multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadEntry {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content: Option<Bytes>,
}

impl UploadEntry {
    pub fn new(
        field_name: impl Into<String>,
        file_name: Option<String>,
        content: Option<Bytes>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name,
            content,
        }
    }

    /// A complete upload: named file with content.
    pub fn file(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self::new(field_name, Some(file_name.into()), Some(content.into()))
    }

    fn into_parts(self) -> (Option<String>, Option<Bytes>) {
        let file_type = self.file_name.as_deref().and_then(file_type_of);
        (file_type, self.content)
    }
}

/// File type of an upload: the text between the first and second `.` of
/// the filename. `report.final.xlsx` is therefore `final`, not `xlsx`.
pub fn file_type_of(file_name: &str) -> Option<String> {
    file_name.split('.').nth(1).map(str::to_string)
}

#[derive(Debug)]
pub struct ExcelRequest {
    uploads: Vec<UploadEntry>,
    form: Vec<(String, String)>,
    adapter: ExcelAdapter,
}

impl<S> FromRequest<S> for ExcelRequest
where
    S: Send + Sync,
    ExcelAdapter: FromRef<S>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let adapter = ExcelAdapter::from_ref(state);
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Multipart(e.body_text()))?;
        Ok(Self::from_multipart(multipart, adapter).await?)
    }
}

impl ExcelRequest {
    pub fn new(uploads: Vec<UploadEntry>, adapter: ExcelAdapter) -> Self {
        Self {
            uploads,
            form: Vec::new(),
            adapter,
        }
    }

    /// Buffer every part of `multipart`, keeping upload order.
    pub async fn from_multipart(
        mut multipart: Multipart,
        adapter: ExcelAdapter,
    ) -> Result<Self, AppError> {
        let mut request = Self::new(Vec::new(), adapter);

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Multipart(format!("Failed to read multipart: {}", e)))?
        {
            let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

            match field.file_name().map(|s| s.to_string()) {
                Some(file_name) => {
                    let data = field.bytes().await.map_err(|e| {
                        AppError::Multipart(format!("Failed to read file data: {}", e))
                    })?;
                    request
                        .uploads
                        .push(UploadEntry::new(field_name, Some(file_name), Some(data)));
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        AppError::Multipart(format!("Failed to read form field: {}", e))
                    })?;
                    request = request.with_form_value(field_name, text);
                }
            }
        }

        tracing::debug!(
            uploads = request.uploads.len(),
            form_fields = request.form.len(),
            "Buffered multipart request"
        );

        Ok(request)
    }

    /// Add a plain form value, as a non-file multipart part would.
    pub fn with_form_value(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Field used when the caller does not name one.
    pub fn default_field_name(&self) -> &str {
        &self.adapter.default_field_name
    }

    /// First plain (non-file) form value named `name`.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Yield `(file_type, content)` for every upload under `field_name`, in
    /// upload order. The matching uploads are removed from the request, so a
    /// second call for the same field yields nothing.
    pub fn iterate_uploads(
        &mut self,
        field_name: &str,
    ) -> impl Iterator<Item = (Option<String>, Option<Bytes>)> {
        let (matched, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.uploads)
            .into_iter()
            .partition(|entry| entry.field_name == field_name);
        self.uploads = rest;
        matched.into_iter().map(UploadEntry::into_parts)
    }

    /// Lazily turn each upload under `field_name` into parser parameters.
    ///
    /// The content is re-encoded when the adapter has a transcoder. Caller
    /// options are merged in, except `file_type` and `file_content`, which
    /// always come from the upload.
    pub fn build_parse_params(
        &mut self,
        field_name: &str,
        options: ParseOptions,
    ) -> impl Iterator<Item = Result<ParseParams, AppError>> {
        let transcoder = self.adapter.transcoder;
        let field = field_name.to_string();

        self.iterate_uploads(field_name)
            .map(move |(file_type, content)| match (file_type, content) {
                (Some(file_type), Some(content)) => {
                    let content = match transcoder {
                        Some(transcoder) => transcoder.transcode(&content)?,
                        None => content,
                    };
                    Ok(ParseParams::new(file_type, content, options.clone()))
                }
                (file_type, content) => {
                    tracing::debug!(
                        field_name = %field,
                        has_file_type = file_type.is_some(),
                        has_content = content.is_some(),
                        "Rejected incomplete upload"
                    );
                    Err(AppError::MissingParameter(format!(
                        "upload under '{}' is missing its {}",
                        field,
                        if file_type.is_none() {
                            "file type"
                        } else {
                            "content"
                        }
                    )))
                }
            })
    }

    /// Parse every upload under `field_name` and concatenate the rows in
    /// upload order. Column counts are not reconciled.
    pub fn load_combined_rows(
        &mut self,
        field_name: &str,
        options: ParseOptions,
    ) -> Result<RowTable, AppError> {
        let mut rows = RowTable::new();
        for params in self.build_parse_params(field_name, options) {
            let params = params?;
            let parsed = sheets::get_array(&params)?;
            tracing::debug!(
                field_name = %field_name,
                file_type = %params.file_type,
                rows = parsed.len(),
                "Parsed upload"
            );
            rows.extend(parsed);
        }
        Ok(rows)
    }

    /// Records from every upload under `field_name`; each upload's first row
    /// names its columns.
    pub fn load_records(
        &mut self,
        field_name: &str,
        options: ParseOptions,
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        let mut records = Vec::new();
        for params in self.build_parse_params(field_name, options) {
            records.extend(sheets::get_records(&params?)?);
        }
        Ok(records)
    }

    /// Column name to column values for the first upload under `field_name`.
    pub fn load_column_dict(
        &mut self,
        field_name: &str,
        options: ParseOptions,
    ) -> Result<Map<String, Value>, AppError> {
        match self.build_parse_params(field_name, options).next() {
            Some(params) => sheets::get_dict(&params?),
            None => Ok(Map::new()),
        }
    }

    /// Sheet name to rows for the first upload under `field_name`.
    pub fn load_book_dict(
        &mut self,
        field_name: &str,
        options: ParseOptions,
    ) -> Result<Map<String, Value>, AppError> {
        match self.build_parse_params(field_name, options).next() {
            Some(params) => Ok(sheets::get_book(&params?)?.to_dict()),
            None => Ok(Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use webexcel_core::Cell;

    fn request(uploads: Vec<UploadEntry>) -> ExcelRequest {
        ExcelRequest::new(uploads, ExcelAdapter::default())
    }

    fn ints(rows: &[&[i64]]) -> RowTable {
        rows.iter()
            .map(|row| row.iter().map(|&i| Cell::Int(i)).collect())
            .collect()
    }

    #[test]
    fn test_absent_field_yields_nothing() {
        let mut req = request(vec![UploadEntry::file("other", "a.csv", "1,2\n")]);
        assert_eq!(req.iterate_uploads("file").count(), 0);
        assert!(req
            .load_combined_rows("file", ParseOptions::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_single_csv_upload() {
        let mut req = request(vec![UploadEntry::file("file", "data.csv", "1,2\n3,4\n")]);
        let params: Vec<_> = req
            .build_parse_params("file", ParseOptions::new())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].file_type, "csv");

        let mut req = request(vec![UploadEntry::file("file", "data.csv", "1,2\n3,4\n")]);
        let rows = req.load_combined_rows("file", ParseOptions::new()).unwrap();
        assert_eq!(rows, ints(&[&[1, 2], &[3, 4]]));
    }

    #[test]
    fn test_uploads_sharing_a_field_are_concatenated_in_order() {
        let mut req = request(vec![
            UploadEntry::file("file", "a.csv", "1,2\n"),
            UploadEntry::file("other", "x.csv", "9,9\n"),
            UploadEntry::file("file", "b.csv", "3,4\n"),
        ]);
        let rows = req.load_combined_rows("file", ParseOptions::new()).unwrap();
        assert_eq!(rows, ints(&[&[1, 2], &[3, 4]]));
    }

    #[test]
    fn test_mismatched_widths_pass_through() {
        let mut req = request(vec![
            UploadEntry::file("file", "a.csv", "1,2,3\n"),
            UploadEntry::file("file", "b.tsv", "4\n"),
        ]);
        let rows = req.load_combined_rows("file", ParseOptions::new()).unwrap();
        assert_eq!(rows, ints(&[&[1, 2, 3], &[4]]));
    }

    #[test]
    fn test_form_value_returns_first_match() {
        let req = request(vec![UploadEntry::file("file", "a.csv", "1\n")])
            .with_form_value("note", "first")
            .with_form_value("note", "second");
        assert_eq!(req.form_value("note"), Some("first"));
        assert_eq!(req.form_value("file"), None);
        assert_eq!(req.form_value("missing"), None);
    }

    #[test]
    fn test_uploads_are_consumed_once() {
        let mut req = request(vec![UploadEntry::file("file", "a.csv", "1\n")]);
        assert_eq!(req.iterate_uploads("file").count(), 1);
        assert_eq!(req.iterate_uploads("file").count(), 0);
    }

    #[test]
    fn test_missing_content_is_an_error() {
        let mut req = request(vec![UploadEntry::new(
            "file",
            Some("data.csv".to_string()),
            None,
        )]);
        let result: Vec<_> = req.build_parse_params("file", ParseOptions::new()).collect();
        assert_eq!(result.len(), 1);
        assert!(matches!(result[0], Err(AppError::MissingParameter(_))));
    }

    #[test]
    fn test_missing_extension_is_an_error() {
        let mut req = request(vec![UploadEntry::file("file", "README", "1\n")]);
        let err = req
            .load_combined_rows("file", ParseOptions::new())
            .unwrap_err();
        assert!(matches!(err, AppError::MissingParameter(_)));
    }

    #[test]
    fn test_file_type_is_first_dot_segment() {
        assert_eq!(file_type_of("report.final.xlsx"), Some("final".to_string()));
        assert_eq!(file_type_of("data.csv"), Some("csv".to_string()));
        assert_eq!(file_type_of("README"), None);

        let mut req = request(vec![UploadEntry::file("file", "report.final.xlsx", "x")]);
        let (file_type, _) = req.iterate_uploads("file").next().unwrap();
        assert_eq!(file_type.as_deref(), Some("final"));
    }

    #[test]
    fn test_gbk_upload_is_reencoded() {
        // "名,1" encoded as GBK
        let gbk = Bytes::from_static(&[0xC3, 0xFB, b',', b'1', b'\n']);
        let mut req = request(vec![UploadEntry::file("file", "names.csv", gbk)]);
        let params = req
            .build_parse_params("file", ParseOptions::new())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(std::str::from_utf8(&params.file_content).unwrap(), "名,1\n");
    }

    #[test]
    fn test_transcoding_can_be_disabled() {
        let adapter = ExcelAdapter {
            transcoder: None,
            ..ExcelAdapter::default()
        };
        let raw = Bytes::from_static(&[0xC3, 0xFB]);
        let mut req = ExcelRequest::new(
            vec![UploadEntry::file("file", "a.csv", raw.clone())],
            adapter,
        );
        let params = req
            .build_parse_params("file", ParseOptions::new())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(params.file_content, raw);
    }

    #[test]
    fn test_options_cannot_override_derived_keys() {
        let mut options = ParseOptions::new();
        options.insert("file_type".to_string(), json!("xlsx"));
        options.insert("row_limit".to_string(), json!(1));

        let mut req = request(vec![UploadEntry::file("file", "a.csv", "1\n2\n")]);
        let params = req
            .build_parse_params("file", options.clone())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(params.file_type, "csv");
        assert_eq!(params.options.get("row_limit"), Some(&json!(1)));

        let mut req = request(vec![UploadEntry::file("file", "a.csv", "1\n2\n")]);
        assert_eq!(
            req.load_combined_rows("file", options).unwrap(),
            ints(&[&[1]])
        );
    }

    #[test]
    fn test_records_dict_and_book() {
        let csv = "name,qty\napple,3\npear,5\n";

        let mut req = request(vec![
            UploadEntry::file("file", "a.csv", csv),
            UploadEntry::file("file", "b.csv", "name,qty\nfig,1\n"),
        ]);
        let records = req.load_records("file", ParseOptions::new()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(Value::Object(records[2].clone()), json!({"name": "fig", "qty": 1}));

        let mut req = request(vec![UploadEntry::file("file", "a.csv", csv)]);
        let dict = req.load_column_dict("file", ParseOptions::new()).unwrap();
        assert_eq!(
            Value::Object(dict),
            json!({"name": ["apple", "pear"], "qty": [3, 5]})
        );

        let mut req = request(vec![UploadEntry::file("file", "a.csv", csv)]);
        let book = req.load_book_dict("file", ParseOptions::new()).unwrap();
        assert_eq!(book["csv"], json!([["name", "qty"], ["apple", 3], ["pear", 5]]));

        let mut req = request(Vec::new());
        assert!(req.load_book_dict("file", ParseOptions::new()).unwrap().is_empty());
    }
}
