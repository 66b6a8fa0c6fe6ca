//! Turns a stored upload into a job description.
//!
//! Plain text is read verbatim. PDFs go through `pdf-extract`; a PDF with no
//! usable text layer (scanned pages) is attached to the model instead, as are
//! images.

use bytes::Bytes;
use tracing::warn;

use crate::email::upload::StoredUpload;
use crate::errors::AppError;
use crate::llm_client::Attachment;

#[derive(Debug, Clone)]
pub enum JobDescription {
    Text(String),
    Attachment(Attachment),
}

impl JobDescription {
    pub fn into_attachment(self) -> Option<Attachment> {
        match self {
            JobDescription::Attachment(a) => Some(a),
            JobDescription::Text(_) => None,
        }
    }
}

pub async fn extract(upload: &StoredUpload) -> Result<JobDescription, AppError> {
    match upload.mime_type.as_str() {
        "text/plain" => {
            let bytes = tokio::fs::read(upload.path()).await?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if text.trim().is_empty() {
                return Err(AppError::Validation(
                    "Uploaded text file is empty".to_string(),
                ));
            }
            Ok(JobDescription::Text(text))
        }
        "application/pdf" => {
            let path = upload.path().to_path_buf();
            let parsed = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&path).map_err(|e| e.to_string())
            })
            .await;
            match parsed {
                Ok(Ok(text)) if !text.trim().is_empty() => Ok(JobDescription::Text(text)),
                Ok(Ok(_)) => {
                    warn!(file = %upload.original_name, "PDF has no text layer, attaching file");
                    attach(upload).await
                }
                Ok(Err(e)) => {
                    warn!(file = %upload.original_name, "PDF text extraction failed ({e}), attaching file");
                    attach(upload).await
                }
                Err(e) => {
                    warn!(file = %upload.original_name, "PDF parser aborted ({e}), attaching file");
                    attach(upload).await
                }
            }
        }
        mime if mime.starts_with("image/") => attach(upload).await,
        other => Err(AppError::UnsupportedFileType(other.to_string())),
    }
}

async fn attach(upload: &StoredUpload) -> Result<JobDescription, AppError> {
    let data = tokio::fs::read(upload.path()).await?;
    Ok(JobDescription::Attachment(Attachment {
        mime_type: canonical_mime(&upload.mime_type).to_string(),
        data: Bytes::from(data),
    }))
}

/// `image/jpg` is accepted from browsers but is not a registered type.
fn canonical_mime(mime: &str) -> &str {
    match mime {
        "image/jpg" => "image/jpeg",
        other => other,
    }
}
