//! Axum route handlers for the Email API.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::{error, info};

use crate::email::extract::{extract, JobDescription};
use crate::email::prompts::build_prompt;
use crate::email::templates::{self, TemplateSummary, DEFAULT_TEMPLATE_ID};
use crate::email::upload::{parse_form, GenerateForm};
use crate::errors::AppError;
use crate::llm_client::GenerationRequest;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TemplatesResponse {
    pub success: bool,
    pub templates: Vec<TemplateSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateEmailResponse {
    pub success: bool,
    pub email: String,
    pub template_used: String,
    pub template_name: &'static str,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/templates
pub async fn handle_list_templates() -> Json<TemplatesResponse> {
    Json(TemplatesResponse {
        success: true,
        templates: templates::summaries(),
    })
}

/// POST /api/generate-email
///
/// Multipart fields: `file` (optional), `text` (optional), `template`,
/// `userDetails`. An uploaded file takes precedence over `text`.
pub async fn handle_generate_email(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerateEmailResponse>, AppError> {
    let multipart = multipart.map_err(|rejection| AppError::Multipart(rejection.body_text()))?;
    let GenerateForm {
        text,
        template,
        user_details,
        file,
    } = parse_form(multipart, &state.config.upload_dir).await?;

    let text = text.filter(|t| !t.trim().is_empty());
    let template_id = template
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string());

    info!(
        has_text = text.is_some(),
        has_file = file.is_some(),
        template = %template_id,
        user_details_len = user_details.as_ref().map(String::len).unwrap_or(0),
        "Request received"
    );

    let job_description = match (file, text) {
        (Some(upload), _) => {
            info!(
                file = %upload.original_name,
                mime = %upload.mime_type,
                size = upload.size,
                "Processing file"
            );
            let extracted = extract(&upload).await;
            if let Err(e) = upload.discard() {
                error!("Error deleting file: {e}");
            }
            extracted?
        }
        (None, Some(text)) => JobDescription::Text(text),
        (None, None) => {
            return Err(AppError::Validation(
                "Either text description or file upload is required".to_string(),
            ))
        }
    };

    let template = templates::resolve(&template_id);
    let prompt = build_prompt(template, &job_description, user_details.as_deref());

    info!("Sending request to text generator...");
    let email = state
        .generator
        .generate(&GenerationRequest {
            prompt,
            attachment: job_description.into_attachment(),
        })
        .await?;
    info!("Email generated successfully");

    Ok(Json(GenerateEmailResponse {
        success: true,
        email,
        template_used: template_id,
        template_name: template.name,
    }))
}
