//! Gemini REST backend
//!
//! Implements [`GenerativeBackend`] against the Generative Language API:
//! `models/{model}:generateContent` for chat and multimodal prompts, and the
//! Files API (resumable upload + `GET files/{id}`) for media that has to be
//! processed remotely before it can be referenced.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{
    display_name_for, with_retry, AssetHandle, AssetState, GenAiError, GenerateRequest,
    GenerativeBackend, MediaPart, Result, RetryPolicy, Role, Turn, UploadRequest,
};
use crate::config::{ApiKey, Config, DEFAULT_BASE_URL};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Finish reasons that mean the candidate was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Gemini API client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// Create a client with default endpoint, timeouts and retry policy.
    pub fn new(api_key: ApiKey) -> Result<Self> {
        Self::build(
            api_key,
            DEFAULT_BASE_URL,
            Duration::from_secs(120),
            RetryPolicy::default(),
        )
    }

    /// Create a client from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(
            config.api_key.clone(),
            &config.base_url,
            config.requests.timeout(),
            config.requests.retry_policy(),
        )
    }

    fn build(
        api_key: ApiKey,
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(GenAiError::Config("API key must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| GenAiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Set a custom base URL (e.g., for proxy or testing).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set the retry policy for idempotent calls.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn generate_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    async fn post_generate(
        &self,
        model: &str,
        body: &GenerateContentRequest,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let mut request = self
            .client
            .post(self.generate_url(model))
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = ensure_success(request.send().await?).await?;
        let parsed: GenerateContentResponse = read_json(response).await?;

        if let Some(usage) = &parsed.usage_metadata {
            tracing::debug!(
                model,
                prompt_tokens = usage.prompt_token_count.unwrap_or(0),
                output_tokens = usage.candidates_token_count.unwrap_or(0),
                "generateContent usage"
            );
        }
        extract_text(parsed)
    }

    async fn run_generate(
        &self,
        operation: &str,
        model: &str,
        body: GenerateContentRequest,
        timeout: Option<Duration>,
    ) -> Result<String> {
        with_retry(self.retry, operation, || {
            self.post_generate(model, &body, timeout)
        })
        .await
    }

    async fn fetch_file(&self, name: &str) -> Result<AssetHandle> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let file: FileResource = read_json(response).await?;
        Ok(file.into())
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, model: &str, turns: &[Turn]) -> Result<String> {
        if turns.is_empty() {
            return Err(GenAiError::InvalidRequest(
                "conversation must include at least one turn".to_string(),
            ));
        }
        let body = GenerateContentRequest {
            contents: turns.iter().map(Content::from_turn).collect(),
        };
        tracing::debug!(model, turns = turns.len(), "sending chat history");
        self.run_generate("chat", model, body, None).await
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let mut parts = Vec::with_capacity(request.media.len() + 1);
        parts.push(Part::text(&request.prompt));
        parts.extend(request.media.iter().map(Part::from_media));

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some(Role::User.as_str().to_string()),
                parts,
            }],
        };
        tracing::debug!(
            model = %request.model,
            media_parts = request.media.len(),
            timeout_secs = request.timeout.map(|t| t.as_secs()),
            "sending generateContent"
        );
        self.run_generate("generate", &request.model, body, request.timeout)
            .await
    }

    async fn upload_file(&self, request: UploadRequest) -> Result<AssetHandle> {
        let data = tokio::fs::read(&request.path).await.map_err(|e| {
            GenAiError::Io(format!("failed to read {}: {e}", request.path.display()))
        })?;
        let display_name = if request.display_name.is_empty() {
            display_name_for(&request.path)
        } else {
            request.display_name.clone()
        };

        // Resumable protocol: the start call returns a session URL that
        // receives the bytes and finalizes the file in one request.
        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, self.api_key.expose())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", &request.mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = ensure_success(start).await?;

        let upload_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                GenAiError::ParseResponse("upload start response missing upload URL".to_string())
            })?;

        let size = data.len();
        let finish = self
            .client
            .post(&upload_url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .body(data)
            .send()
            .await?;
        let finish = ensure_success(finish).await?;
        let uploaded: UploadResponse = read_json(finish).await?;

        let handle: AssetHandle = uploaded.file.into();
        tracing::info!(
            asset = %handle.name,
            state = %handle.state,
            bytes = size,
            mime_type = %request.mime_type,
            "file registered"
        );
        Ok(handle)
    }

    async fn get_file(&self, name: &str) -> Result<AssetHandle> {
        with_retry(self.retry, "get_file", || self.fetch_file(name)).await
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn from_turn(turn: &Turn) -> Self {
        Self {
            role: Some(turn.role.as_str().to_string()),
            parts: vec![Part::text(&turn.text)],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    fn from_media(media: &MediaPart) -> Self {
        match media {
            MediaPart::Inline { mime_type, data } => Self {
                inline_data: Some(InlineData {
                    mime_type: mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                }),
                ..Self::default()
            },
            MediaPart::FileRef { mime_type, uri } => Self {
                file_data: Some(FileData {
                    mime_type: mime_type.clone(),
                    file_uri: uri.clone(),
                }),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

impl From<FileResource> for AssetHandle {
    fn from(file: FileResource) -> Self {
        AssetHandle {
            state: AssetState::from_remote(&file.state),
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            display_name: file.display_name,
            error: file.error.map(|e| e.message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Pass successful responses through; map everything else to an error.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable>".to_string());

    Err(map_status(status, retry_after, &body))
}

fn map_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> GenAiError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(code) => format!("{} ({})", parsed.error.message, code),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    };

    match status.as_u16() {
        401 | 403 => GenAiError::Authentication(message),
        429 => GenAiError::RateLimited { retry_after },
        400 | 404 | 422 => GenAiError::InvalidRequest(message),
        code => GenAiError::Api {
            status: code,
            message,
        },
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| GenAiError::ParseResponse(e.to_string()))
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GenAiError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or(GenAiError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(text);
    }
    match candidate.finish_reason {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(GenAiError::Blocked(reason))
        }
        _ => Err(GenAiError::EmptyResponse),
    }
}
