use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant renders as `{ "success": false, "error": ..., "details"?: ... }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large")]
    FileTooLarge,

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Endpoint not found")]
    NotFound,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::UnsupportedFileType(mime) => (
                StatusCode::BAD_REQUEST,
                "Invalid file type. Only images, text files, and PDFs are allowed.".to_string(),
                Some(mime.clone()),
            ),
            AppError::FileTooLarge => (
                StatusCode::BAD_REQUEST,
                "File too large. Maximum size is 10MB.".to_string(),
                None,
            ),
            AppError::Multipart(msg) => (
                StatusCode::BAD_REQUEST,
                "Malformed multipart form data".to_string(),
                Some(msg.clone()),
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "Endpoint not found".to_string(),
                None,
            ),
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate email".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Io(e) => {
                tracing::error!("File I/O error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate email".to_string(),
                    Some(format!("Error reading file: {e}")),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(e.to_string()),
                )
            }
        };

        let mut body = json!({
            "success": false,
            "error": error,
        });
        if let Some(details) = details {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_has_no_details() {
        let (status, body) = render(AppError::Validation("missing".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_file_too_large_is_client_error() {
        let (status, body) = render(AppError::FileTooLarge).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "File too large. Maximum size is 10MB.");
    }

    #[tokio::test]
    async fn test_llm_error_surfaces_details() {
        let err = AppError::Llm(LlmError::Api {
            status: 403,
            message: "API key not valid".to_string(),
        });
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate email");
        assert!(body["details"]
            .as_str()
            .unwrap()
            .contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let (status, body) = render(AppError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Endpoint not found");
    }
}
