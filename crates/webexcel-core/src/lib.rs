//! webexcel core library
//!
//! Domain types, error taxonomy, configuration, upload re-encoding and the
//! spreadsheet I/O layer shared by the HTTP adapter.

pub mod config;
pub mod encoding;
pub mod error;
pub mod models;
pub mod sheets;

// Re-export commonly used types
pub use config::Config;
pub use encoding::Transcoder;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{Book, Cell, ParseOptions, ParseParams, ResponsePayload, RowTable, Sheet};
pub use sheets::FileType;
