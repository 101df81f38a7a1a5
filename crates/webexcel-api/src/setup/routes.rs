//! Route configuration and setup

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub const API_PREFIX: &str = "/api/v0";

/// Setup all application routes
pub fn setup_routes(state: AppState) -> Router<()> {
    let excel_routes = Router::new()
        .route("/array", post(handlers::excel::load_array))
        .route("/records", post(handlers::excel::load_records))
        .route("/book", post(handlers::excel::load_book))
        .route("/convert/{file_type}", post(handlers::excel::convert));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest(&format!("{}/excel", API_PREFIX), excel_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
