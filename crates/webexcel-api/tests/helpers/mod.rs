//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p webexcel-api --test excel_test`.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use webexcel_api::setup::routes;
use webexcel_api::state::AppState;
use webexcel_core::Config;

/// API path for the spreadsheet routes (e.g. `/api/v0/excel/array`).
pub fn excel_path(path: &str) -> String {
    format!("{}/excel{}", routes::API_PREFIX, path)
}

pub fn setup_test_server() -> TestServer {
    setup_test_server_with(Config::default())
}

pub fn setup_test_server_with(config: Config) -> TestServer {
    let app = routes::setup_routes(AppState::new(config));
    TestServer::new(app.into_make_service()).expect("Failed to create test server")
}

/// A file part named `file_name` holding `content`.
pub fn file_part(file_name: &str, content: impl Into<bytes::Bytes>) -> Part {
    Part::bytes(content.into()).file_name(file_name.to_string())
}

/// Multipart form with every `(file_name, content)` under the same field.
pub fn upload_form(field_name: &str, files: &[(&str, &'static [u8])]) -> MultipartForm {
    files
        .iter()
        .fold(MultipartForm::new(), |form, (file_name, content)| {
            form.add_part(field_name.to_string(), file_part(file_name, *content))
        })
}
