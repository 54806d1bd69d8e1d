//! Media analysis pipeline
//!
//! Image and audio are small enough to travel inline with the prompt. Video
//! goes through the remote Files service: stage locally, register, wait for
//! processing, then reference the asset by URI from the inference request.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::readiness::{wait_until_ready, PollPolicy, ReadinessError};
use super::{audio_mime, image_mime, validate_upload, MediaError, MediaKind, StagedFile};
use crate::ai::{
    display_name_for, GenAiError, GenerateRequest, GenerativeBackend, MediaPart, UploadRequest,
};
use crate::config::{Config, ModelsConfig};

/// Errors that can occur during media analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("a prompt is required")]
    MissingPrompt,

    #[error(transparent)]
    Input(#[from] MediaError),

    #[error("remote processing of {asset} failed: {reason}")]
    ProcessingFailed { asset: String, reason: String },

    #[error("{asset} was not ready after {attempts} status checks")]
    ProcessingTimedOut { asset: String, attempts: u32 },

    #[error(transparent)]
    Inference(#[from] GenAiError),

    #[error("failed to stage upload: {0}")]
    Staging(String),
}

impl From<ReadinessError> for AnalysisError {
    fn from(e: ReadinessError) -> Self {
        match e {
            ReadinessError::Failed { asset, reason } => {
                AnalysisError::ProcessingFailed { asset, reason }
            }
            ReadinessError::TimedOut { asset, attempts } => {
                AnalysisError::ProcessingTimedOut { asset, attempts }
            }
            ReadinessError::Backend(e) => AnalysisError::Inference(e),
        }
    }
}

/// A user upload: original file name plus bytes.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    /// Type declared by the client, if any
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MediaUpload {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Runs prompt + media inference against a [`GenerativeBackend`].
#[derive(Clone)]
pub struct Analyzer {
    backend: Arc<dyn GenerativeBackend>,
    models: ModelsConfig,
    poll: PollPolicy,
    video_timeout: Duration,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: &Config) -> Self {
        Self {
            backend,
            models: config.models.clone(),
            poll: config.polling.policy(),
            video_timeout: config.requests.video_timeout(),
        }
    }

    /// Override the readiness polling policy.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Dispatch on the media kind.
    pub async fn analyze(
        &self,
        kind: MediaKind,
        prompt: &str,
        upload: MediaUpload,
    ) -> Result<String, AnalysisError> {
        match kind {
            MediaKind::Image => self.analyze_image(prompt, upload).await,
            MediaKind::Audio => self.analyze_audio(prompt, upload).await,
            MediaKind::Video => self.analyze_video(prompt, upload).await,
        }
    }

    pub async fn analyze_image(
        &self,
        prompt: &str,
        upload: MediaUpload,
    ) -> Result<String, AnalysisError> {
        let prompt = require_prompt(prompt)?;
        let mime_type = image_mime(&upload.filename)?;
        require_data(&upload)?;
        self.generate_inline(MediaKind::Image, prompt, mime_type, upload.data)
            .await
    }

    pub async fn analyze_audio(
        &self,
        prompt: &str,
        upload: MediaUpload,
    ) -> Result<String, AnalysisError> {
        let prompt = require_prompt(prompt)?;
        let mime_type = audio_mime(upload.content_type.as_deref(), &upload.filename)?;
        require_data(&upload)?;
        self.generate_inline(MediaKind::Audio, prompt, mime_type, upload.data)
            .await
    }

    /// Stage, register, wait for processing, then infer.
    ///
    /// The staged file is gone when this returns, on every path.
    pub async fn analyze_video(
        &self,
        prompt: &str,
        upload: MediaUpload,
    ) -> Result<String, AnalysisError> {
        let prompt = require_prompt(prompt)?;
        let extension = validate_upload(MediaKind::Video, &upload.filename)?;
        require_data(&upload)?;
        let mime_type = super::video_mime(&upload.filename)?;

        let staged = StagedFile::write(MediaKind::Video, &extension, upload.data)
            .await
            .map_err(|e| AnalysisError::Staging(e.to_string()))?;

        let asset = self
            .backend
            .upload_file(UploadRequest {
                path: staged.path().to_path_buf(),
                mime_type: mime_type.to_string(),
                display_name: display_name_for(std::path::Path::new(&upload.filename)),
            })
            .await?;
        tracing::info!(asset = %asset.name, state = %asset.state, "video registered");

        let asset = wait_until_ready(self.backend.as_ref(), asset, self.poll).await?;

        let request = GenerateRequest::new(&self.models.video, prompt)
            .with_media(MediaPart::from_asset(&asset))
            .with_timeout(self.video_timeout);
        let text = self.backend.generate(request).await?;

        if let Err(e) = staged.remove() {
            tracing::warn!(error = %e, "failed to remove staged upload");
        }
        tracing::info!(asset = %asset.name, chars = text.len(), "video analysis complete");
        Ok(text)
    }

    async fn generate_inline(
        &self,
        kind: MediaKind,
        prompt: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<String, AnalysisError> {
        let bytes = data.len();
        let request = GenerateRequest::new(&self.models.analysis, prompt).with_media(
            MediaPart::Inline {
                mime_type: mime_type.to_string(),
                data,
            },
        );
        let text = self.backend.generate(request).await?;
        tracing::info!(%kind, mime_type, bytes, chars = text.len(), "analysis complete");
        Ok(text)
    }
}

fn require_prompt(prompt: &str) -> Result<&str, AnalysisError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        Err(AnalysisError::MissingPrompt)
    } else {
        Ok(prompt)
    }
}

fn require_data(upload: &MediaUpload) -> Result<(), AnalysisError> {
    if upload.data.is_empty() {
        Err(MediaError::EmptyData.into())
    } else {
        Ok(())
    }
}
