//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use genai_studio::ai::{
    AssetHandle, AssetState, GenAiError, GenerateRequest, GenerativeBackend, Result, Turn,
    UploadRequest,
};
use genai_studio::config::{ApiKey, Config};
use genai_studio::server::{router, AppState};
use parking_lot::Mutex;
use tower::ServiceExt;

pub const BOUNDARY: &str = "genai-studio-test-boundary";

/// In-memory backend with scripted replies and asset states.
#[derive(Default)]
pub struct FakeBackend {
    pub states: Mutex<VecDeque<AssetState>>,
    pub replies: Mutex<VecDeque<Result<String>>>,
    pub generate_calls: Mutex<Vec<GenerateRequest>>,
    pub chat_calls: Mutex<Vec<Vec<Turn>>>,
    pub uploads: Mutex<u32>,
}

impl FakeBackend {
    pub fn with_states(states: &[AssetState]) -> Self {
        let backend = Self::default();
        backend.states.lock().extend(states.iter().copied());
        backend
    }

    pub fn push_reply(&self, reply: Result<String>) {
        self.replies.lock().push_back(reply);
    }

    fn next_state(&self) -> AssetState {
        let mut states = self.states.lock();
        if states.len() > 1 {
            states.pop_front().unwrap_or(AssetState::Ready)
        } else {
            states.front().copied().unwrap_or(AssetState::Ready)
        }
    }

    fn next_reply(&self) -> Result<String> {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("fake reply".to_string()))
    }

    fn handle(&self, state: AssetState) -> AssetHandle {
        AssetHandle {
            name: "files/fake".to_string(),
            uri: "https://files.test/fake".to_string(),
            mime_type: "video/mp4".to_string(),
            display_name: None,
            state,
            error: (state == AssetState::Failed).then(|| "could not decode".to_string()),
        }
    }
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, _model: &str, turns: &[Turn]) -> Result<String> {
        self.chat_calls.lock().push(turns.to_vec());
        self.next_reply()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        self.generate_calls.lock().push(request);
        self.next_reply()
    }

    async fn upload_file(&self, request: UploadRequest) -> Result<AssetHandle> {
        if !request.path.exists() {
            return Err(GenAiError::Io("staged file missing".to_string()));
        }
        *self.uploads.lock() += 1;
        Ok(self.handle(self.next_state()))
    }

    async fn get_file(&self, _name: &str) -> Result<AssetHandle> {
        Ok(self.handle(self.next_state()))
    }
}

/// Config with a key set and fast polling.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.api_key = ApiKey::new("test-key");
    config.polling.interval_secs = 1;
    config.polling.max_attempts = 3;
    config.sessions.max_sessions = 4;
    config
}

pub fn app(backend: Arc<FakeBackend>) -> axum::Router {
    router(AppState::new(test_config(), backend))
}

pub async fn send(app: &axum::Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// One part of a multipart body: (name, optional file name + content type, data).
pub struct Part<'a> {
    pub name: &'a str,
    pub file: Option<(&'a str, &'a str)>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.file {
            Some((filename, content_type)) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        part.name, filename, content_type
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn analyze_request(kind: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/analyze/{kind}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}
