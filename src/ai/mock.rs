//! Scripted backend for unit tests.

use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    AssetHandle, AssetState, GenAiError, GenerateRequest, GenerativeBackend, Result, Turn,
    UploadRequest,
};

/// Replays a fixed sequence of asset states and records every call.
#[derive(Default)]
pub struct ScriptedBackend {
    states: Mutex<VecDeque<AssetState>>,
    replies: Mutex<VecDeque<Result<String>>>,
    upload_error: Mutex<Option<GenAiError>>,
    pub generate_calls: Mutex<Vec<GenerateRequest>>,
    pub chat_calls: Mutex<Vec<Vec<Turn>>>,
    pub uploaded_paths: Mutex<Vec<PathBuf>>,
    pub status_queries: Mutex<u32>,
}

impl ScriptedBackend {
    /// First state is reported by the upload, the rest by status queries.
    /// Once the script runs out the last state repeats.
    pub fn with_states(states: &[AssetState]) -> Self {
        let backend = Self::default();
        backend.states.lock().extend(states.iter().copied());
        backend
    }

    pub fn reply(self, reply: Result<String>) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn failing_upload(self, error: GenAiError) -> Self {
        *self.upload_error.lock() = Some(error);
        self
    }

    fn next_state(&self) -> AssetState {
        let mut states = self.states.lock();
        if states.len() > 1 {
            states.pop_front().unwrap_or(AssetState::Processing)
        } else {
            states.front().copied().unwrap_or(AssetState::Ready)
        }
    }

    fn next_reply(&self) -> Result<String> {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("mock reply".to_string()))
    }

    fn handle(&self, state: AssetState) -> AssetHandle {
        AssetHandle {
            name: "files/scripted".to_string(),
            uri: "https://files.test/scripted".to_string(),
            mime_type: "video/mp4".to_string(),
            display_name: None,
            state,
            error: (state == AssetState::Failed).then(|| "transcode error".to_string()),
        }
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
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
        assert!(request.path.exists(), "uploaded file must exist");
        self.uploaded_paths.lock().push(request.path);
        if let Some(err) = self.upload_error.lock().take() {
            return Err(err);
        }
        Ok(self.handle(self.next_state()))
    }

    async fn get_file(&self, _name: &str) -> Result<AssetHandle> {
        *self.status_queries.lock() += 1;
        Ok(self.handle(self.next_state()))
    }
}
