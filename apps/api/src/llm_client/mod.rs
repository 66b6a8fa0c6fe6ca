/// LLM Client: the single point of entry for all Gemini API calls.
///
/// No other module may call the Gemini API directly. Handlers depend on the
/// `TextGenerator` trait carried in `AppState`, never on `GeminiClient`.
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Response blocked by provider: {0}")]
    Blocked(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A file handed to the model as inline data instead of extracted text.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Bytes,
}

/// One text-generation call: a prompt plus an optional attached file.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub attachment: Option<Attachment>,
}

/// Text generation backend. Implement this to swap providers without touching
/// the handlers.
///
/// Carried in `AppState` as `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the generated text unmodified.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyContent)?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(LlmError::Blocked("SAFETY".to_string()));
        }

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiClient
// ────────────────────────────────────────────────────────────────────────────

/// Wraps the Gemini `generateContent` endpoint with bounded retry.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_attempts: u32,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        max_attempts: u32,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn call_once(&self, body: &GenerateContentRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)?;

        let usage = parsed.usage_metadata.as_ref();
        debug!(
            model = %self.model,
            input_tokens = usage.map(|u| u.prompt_token_count).unwrap_or(0),
            output_tokens = usage.map(|u| u.candidates_token_count).unwrap_or(0),
            "Gemini call succeeded"
        );

        parsed.into_text()
    }
}

fn build_request_body<'a>(
    request: &'a GenerationRequest,
    encoded: Option<String>,
) -> GenerateContentRequest<'a> {
    let mut parts = Vec::with_capacity(2);
    if let (Some(attachment), Some(data)) = (&request.attachment, encoded) {
        parts.push(RequestPart::InlineData {
            inline_data: InlineData {
                mime_type: &attachment.mime_type,
                data,
            },
        });
    }
    parts.push(RequestPart::Text {
        text: &request.prompt,
    });

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let encoded = request
            .attachment
            .as_ref()
            .map(|a| STANDARD.encode(&a.data));
        let body = build_request_body(request, encoded);

        debug!(
            model = %self.model,
            prompt_len = request.prompt.len(),
            has_attachment = request.attachment.is_some(),
            "Sending request to Gemini"
        );

        let client = self;
        let body = &body;
        with_retry(self.max_attempts, move || client.call_once(body)).await
    }
}

/// Runs `call` up to `max_attempts` times, retrying only retryable errors.
async fn with_retry<F, Fut>(max_attempts: u32, mut call: F) -> Result<String, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, LlmError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1).min(5)));
                warn!(
                    "Gemini call attempt {} failed ({}), retrying after {}ms...",
                    attempt,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> LlmError {
        LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        }
    }

    fn parse(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_only_request_body() {
        let request = GenerationRequest {
            prompt: "Write an email".to_string(),
            attachment: None,
        };
        let body = serde_json::to_value(build_request_body(&request, None)).unwrap();
        assert_eq!(
            body,
            json!({"contents": [{"role": "user", "parts": [{"text": "Write an email"}]}]})
        );
    }

    #[test]
    fn test_attachment_precedes_prompt_as_inline_data() {
        let request = GenerationRequest {
            prompt: "Describe".to_string(),
            attachment: Some(Attachment {
                mime_type: "image/png".to_string(),
                data: Bytes::from_static(b"png"),
            }),
        };
        let encoded = Some(STANDARD.encode(b"png"));
        let body = serde_json::to_value(build_request_body(&request, encoded)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "cG5n");
        assert_eq!(parts[1]["text"], "Describe");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Subject: Hi\n"}, {"text": "Dear team"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
        }));
        assert_eq!(response.into_text().unwrap(), "Subject: Hi\nDear team");
    }

    #[test]
    fn test_blocked_prompt_is_reported() {
        let response = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert!(matches!(response.into_text(), Err(LlmError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_safety_finish_reason_is_blocked() {
        let response = parse(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
        }));
        assert!(matches!(response.into_text(), Err(LlmError::Blocked(_))));
    }

    #[test]
    fn test_no_candidates_is_empty_content() {
        let response = parse(json!({"candidates": []}));
        assert!(matches!(response.into_text(), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_retryable_statuses() {
        let rate_limited = LlmError::Api {
            status: 429,
            message: String::new(),
        };
        let unavailable = LlmError::Api {
            status: 503,
            message: String::new(),
        };
        let bad_key = LlmError::Api {
            status: 400,
            message: String::new(),
        };
        assert!(rate_limited.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!bad_key.is_retryable());
        assert!(!LlmError::EmptyContent.is_retryable());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(
            "key".to_string(),
            "http://localhost:9000/v1beta/".to_string(),
            DEFAULT_MODEL.to_string(),
            1,
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_at_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(3, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Api { status: 503, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_never_retries() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(1, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(5, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(LlmError::Api {
                    status: 400,
                    message: "API key not valid".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Api { status: 400, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failure() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(3, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 2 {
                    Err(unavailable())
                } else {
                    Ok("Subject: Hello".to_string())
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "Subject: Hello");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
