//! Media pipeline module
//!
//! - **validation**: per-kind extension allowlists and MIME derivation
//! - **staging**: [`StagedFile`], the transient local copy of an upload
//! - **readiness**: bounded polling of a remote asset until it is usable
//! - **analysis**: [`Analyzer`], prompt + media inference for each kind

pub mod analysis;
pub mod readiness;
pub mod staging;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use analysis::{AnalysisError, Analyzer, MediaUpload};
pub use readiness::{wait_until_ready, PollPolicy};
pub use staging::StagedFile;

/// Input validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("unsupported {kind} file '{filename}': expected one of {allowed}")]
    UnsupportedExtension {
        kind: MediaKind,
        filename: String,
        allowed: String,
    },

    #[error("file name is required")]
    MissingFileName,

    #[error("unsupported {kind} type '{mime}'")]
    UnsupportedMime { kind: MediaKind, mime: String },

    #[error("media data is empty")]
    EmptyData,
}

/// Kind of media a user can submit for analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Audio, MediaKind::Video];

    /// Lowercase extensions accepted for this kind
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => &["jpg", "jpeg", "png"],
            MediaKind::Audio => &["mp3", "wav"],
            MediaKind::Video => &["mp4"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(format!(
                "unknown media kind '{other}' (expected image, audio or video)"
            )),
        }
    }
}

/// Check a file name against the kind's allowlist and return the
/// lowercased extension.
pub fn validate_upload(kind: MediaKind, filename: &str) -> Result<String, MediaError> {
    if filename.trim().is_empty() {
        return Err(MediaError::MissingFileName);
    }
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if kind.allowed_extensions().contains(&ext.as_str()) => Ok(ext),
        _ => Err(MediaError::UnsupportedExtension {
            kind,
            filename: filename.to_string(),
            allowed: kind.allowed_extensions().join(", "),
        }),
    }
}

/// MIME type for an accepted image file.
pub fn image_mime(filename: &str) -> Result<&'static str, MediaError> {
    match validate_upload(MediaKind::Image, filename)?.as_str() {
        "png" => Ok("image/png"),
        _ => Ok("image/jpeg"),
    }
}

/// MIME type for an audio upload.
///
/// The declared type wins when present; it may be a full MIME type or a
/// bare subtype such as `wav`. Without one the file extension decides.
pub fn audio_mime(declared: Option<&str>, filename: &str) -> Result<&'static str, MediaError> {
    let extension = validate_upload(MediaKind::Audio, filename)?;

    let declared = declared.map(str::trim).filter(|d| !d.is_empty());
    let Some(declared) = declared else {
        return Ok(normalize_audio_subtype(&extension).unwrap_or("audio/mp3"));
    };

    let lower = declared.to_ascii_lowercase();
    // Drop parameters like "; codecs=1".
    let essence = lower.split(';').next().unwrap_or_default().trim();
    let subtype = essence.strip_prefix("audio/").unwrap_or(essence);

    normalize_audio_subtype(subtype).ok_or_else(|| MediaError::UnsupportedMime {
        kind: MediaKind::Audio,
        mime: declared.to_string(),
    })
}

fn normalize_audio_subtype(subtype: &str) -> Option<&'static str> {
    match subtype {
        "wav" | "x-wav" | "wave" | "vnd.wave" => Some("audio/wav"),
        "mp3" | "mpeg" | "mpeg3" | "x-mp3" | "x-mpeg" => Some("audio/mp3"),
        _ => None,
    }
}

/// MIME type for an accepted video file.
pub fn video_mime(filename: &str) -> Result<&'static str, MediaError> {
    validate_upload(MediaKind::Video, filename)?;
    Ok("video/mp4")
}
