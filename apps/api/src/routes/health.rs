use axum::Json;
use serde_json::{json, Value};

/// GET /
/// Liveness check that also lists the API endpoints.
pub async fn info_handler() -> Json<Value> {
    Json(json!({
        "message": "Job Mail Generator API is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "templates": "/api/templates",
            "generateEmail": "/api/generate-email"
        }
    }))
}
