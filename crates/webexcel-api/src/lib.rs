//! webexcel HTTP API library
//!
//! Spreadsheet upload extraction, attachment responses, and the demo server
//! wiring built on top of them.

pub mod error;
pub mod excel_request;
pub mod excel_response;
pub mod handlers;
pub mod setup;
pub mod state;
mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use excel_request::{ExcelAdapter, ExcelRequest, UploadEntry};
pub use excel_response::{
    build_response, AttachmentResponseFactory, ExcelResponder, ResponseFactory, TableData,
};
pub use state::AppState;
