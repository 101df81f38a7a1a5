//! Application state and sub-state extractors.
//!
//! Extractors pull only what they need out of [`AppState`] via axum's
//! `FromRef`; [`ExcelRequest`](crate::excel_request::ExcelRequest) reads the
//! [`ExcelAdapter`] this way.

use std::sync::Arc;

use axum::extract::FromRef;
use webexcel_core::Config;

use crate::excel_request::ExcelAdapter;
use crate::excel_response::ExcelResponder;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub adapter: ExcelAdapter,
    pub responder: ExcelResponder,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            adapter: ExcelAdapter::from_config(&config),
            responder: ExcelResponder::default(),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for ExcelAdapter {
    fn from_ref(state: &AppState) -> Self {
        state.adapter.clone()
    }
}

impl FromRef<AppState> for ExcelResponder {
    fn from_ref(state: &AppState) -> Self {
        state.responder.clone()
    }
}
