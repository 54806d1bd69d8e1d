//! Backend Types
//!
//! Conversation turns, media parts and remote asset handles shared by the
//! backend trait and its implementations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Role of a turn in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Get the role as the wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single (role, text) turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    /// Create a user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create a model turn
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A non-text part attached to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPart {
    /// Raw bytes sent inline with the request
    Inline { mime_type: String, data: Vec<u8> },
    /// A file previously registered with the remote Files service
    FileRef { mime_type: String, uri: String },
}

impl MediaPart {
    /// MIME type the part is declared with
    pub fn mime_type(&self) -> &str {
        match self {
            MediaPart::Inline { mime_type, .. } | MediaPart::FileRef { mime_type, .. } => {
                mime_type
            }
        }
    }

    /// Reference a ready asset.
    pub fn from_asset(asset: &AssetHandle) -> Self {
        MediaPart::FileRef {
            mime_type: asset.mime_type.clone(),
            uri: asset.uri.clone(),
        }
    }
}

/// One-shot generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model to use
    pub model: String,
    /// Prompt text, sent as the first part
    pub prompt: String,
    /// Media parts following the prompt
    pub media: Vec<MediaPart>,
    /// Per-request timeout overriding the client default
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    /// Create a text-only request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            media: Vec::new(),
            timeout: None,
        }
    }

    /// Attach a media part
    pub fn with_media(mut self, part: MediaPart) -> Self {
        self.media.push(part);
        self
    }

    /// Set a request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Processing state of a remote asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl AssetState {
    /// Map the remote wire state. Unknown values are treated as pending.
    pub fn from_remote(state: &str) -> Self {
        match state {
            "PROCESSING" => AssetState::Processing,
            "ACTIVE" => AssetState::Ready,
            "FAILED" => AssetState::Failed,
            _ => AssetState::Pending,
        }
    }

    /// Whether polling should stop at this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Ready | AssetState::Failed)
    }
}

impl std::fmt::Display for AssetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssetState::Pending => "PENDING",
            AssetState::Processing => "PROCESSING",
            AssetState::Ready => "READY",
            AssetState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Reference to a file registered with the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHandle {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    /// URI used to reference the file from a generation request
    pub uri: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub state: AssetState,
    /// Remote error message reported alongside a failed state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// File to register with the remote service
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub mime_type: String,
    pub display_name: String,
}
