//! Multipart form parsing and transient upload storage.
//!
//! An uploaded file is streamed into a `tempfile::TempPath` inside the upload
//! directory. The file is unlinked by `StoredUpload::discard`, or on drop when
//! a request bails out early.

use std::path::Path;

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::AppError;

/// Per-file upload limit.
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Headroom on top of `MAX_FILE_BYTES` for the text fields and multipart framing.
pub const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "text/plain",
    "application/pdf",
];

const MAX_STORED_NAME_LEN: usize = 100;

/// A file held on disk for the duration of one request.
#[derive(Debug)]
pub struct StoredUpload {
    path: TempPath,
    pub mime_type: String,
    pub original_name: String,
    pub size: usize,
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the stored file, reporting any I/O failure.
    pub fn discard(self) -> std::io::Result<()> {
        self.path.close()
    }
}

#[cfg(test)]
impl StoredUpload {
    pub(crate) fn for_tests(path: TempPath, mime_type: &str, size: usize) -> Self {
        Self {
            path,
            mime_type: mime_type.to_string(),
            original_name: "upload".to_string(),
            size,
        }
    }
}

/// The fields of a `POST /api/generate-email` form.
#[derive(Debug, Default)]
pub struct GenerateForm {
    pub text: Option<String>,
    pub template: Option<String>,
    pub user_details: Option<String>,
    pub file: Option<StoredUpload>,
}

/// Reads every field of the form. A file part is validated and stored as it
/// arrives; field order does not matter.
pub async fn parse_form(
    mut multipart: Multipart,
    upload_dir: &Path,
) -> Result<GenerateForm, AppError> {
    let mut form = GenerateForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if form.file.is_some() {
                    return Err(AppError::Validation(
                        "Only one file may be uploaded per request".to_string(),
                    ));
                }
                form.file = store_file(field, upload_dir).await?;
            }
            "text" => form.text = Some(field.text().await.map_err(multipart_error)?),
            "template" => form.template = Some(field.text().await.map_err(multipart_error)?),
            "userDetails" => {
                form.user_details = Some(field.text().await.map_err(multipart_error)?)
            }
            _ => debug!(field = %name, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// Streams one file part to disk. Returns `None` for the empty, nameless part
/// a browser sends when the file input was left blank.
async fn store_file(
    mut field: Field<'_>,
    upload_dir: &Path,
) -> Result<Option<StoredUpload>, AppError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let mime_type = mime_essence(field.content_type());

    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        if original_name.is_empty() && is_empty_part(&mut field).await? {
            return Ok(None);
        }
        return Err(AppError::UnsupportedFileType(mime_type));
    }

    let named = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!("-{}", sanitize_file_name(&original_name)))
        .tempfile_in(upload_dir)?;
    let (file, path) = named.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut size = 0usize;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len();
        if size > MAX_FILE_BYTES {
            return Err(AppError::FileTooLarge);
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if size == 0 && original_name.is_empty() {
        return Ok(None);
    }

    debug!(
        file = %original_name,
        mime = %mime_type,
        size,
        path = %path.display(),
        "Stored upload"
    );

    Ok(Some(StoredUpload {
        path,
        mime_type,
        original_name,
        size,
    }))
}

async fn is_empty_part(field: &mut Field<'_>) -> Result<bool, AppError> {
    let mut empty = true;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        empty &= chunk.is_empty();
    }
    Ok(empty)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge
    } else {
        AppError::Multipart(e.body_text())
    }
}

/// `"Text/Plain; charset=utf-8"` → `"text/plain"`. Missing → `application/octet-stream`.
fn mime_essence(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Keeps the last path component of a client-supplied name, restricted to a
/// filesystem-safe character set.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STORED_NAME_LEN)
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_essence_strips_parameters() {
        assert_eq!(
            mime_essence(Some("Text/Plain; charset=utf-8")),
            "text/plain"
        );
        assert_eq!(mime_essence(Some("image/png")), "image/png");
        assert_eq!(mime_essence(None), "application/octet-stream");
        assert_eq!(mime_essence(Some("  ")), "application/octet-stream");
    }

    #[test]
    fn test_allowed_types_cover_images_text_and_pdf() {
        for mime in ["image/jpeg", "image/jpg", "image/png", "image/webp", "text/plain", "application/pdf"] {
            assert!(ALLOWED_MIME_TYPES.contains(&mime), "{mime} should be allowed");
        }
        assert!(!ALLOWED_MIME_TYPES.contains(&"image/gif"));
        assert!(!ALLOWED_MIME_TYPES.contains(&"application/zip"));
    }

    #[test]
    fn test_sanitize_drops_directories_and_odd_chars() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\jobs\\role desc.pdf"), "role_desc.pdf");
        assert_eq!(sanitize_file_name("jd (final).txt"), "jd__final_.txt");
    }

    #[test]
    fn test_sanitize_empty_or_dots_becomes_placeholder() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    #[test]
    fn test_sanitize_truncates_long_names() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_file_name(&long).len(), MAX_STORED_NAME_LEN);
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let named = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir.path())
            .unwrap();
        let upload = StoredUpload::for_tests(named.into_temp_path(), "text/plain", 0);
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        upload.discard().unwrap();
        assert!(!path.exists());
    }
}
