pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::email::handlers;
use crate::email::upload::{FORM_FIELDS_ALLOWANCE, MAX_FILE_BYTES};
use crate::errors::AppError;
use crate::state::AppState;

async fn not_found() -> AppError {
    AppError::NotFound
}

pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/", get(health::info_handler).fallback(not_found))
        .route(
            "/api/templates",
            get(handlers::handle_list_templates).fallback(not_found),
        )
        .route(
            "/api/generate-email",
            post(handlers::handle_generate_email).fallback(not_found),
        )
        .nest_service("/uploads", uploads)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_FILE_BYTES + FORM_FIELDS_ALLOWANCE))
        .with_state(state)
}
