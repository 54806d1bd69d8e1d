//! Route handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;
use super::{page, AppState};
use crate::ai::Turn;
use crate::media::{MediaKind, MediaUpload};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaKindInfo {
    pub kind: MediaKind,
    pub extensions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub reply: String,
    pub turn_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub kind: MediaKind,
    pub text: String,
}

pub async fn index() -> Html<String> {
    Html(page::render())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn media_kinds() -> Json<Vec<MediaKindInfo>> {
    Json(
        MediaKind::ALL
            .iter()
            .map(|kind| MediaKindInfo {
                kind: *kind,
                extensions: kind
                    .allowed_extensions()
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
            })
            .collect(),
    )
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let (session_id, handle) = state.sessions.create()?;
    let turns = handle.lock().await.turns().to_vec();
    Ok((StatusCode::CREATED, Json(SessionView { session_id, turns })))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let handle = state.sessions.get(session_id)?;
    let turns = handle.lock().await.turns().to_vec();
    Ok(Json(SessionView { session_id, turns }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(parse_session_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let Json(payload) =
        payload.map_err(|e| ApiError::new(e.status(), "invalid_input", e.body_text()))?;

    let handle = state.sessions.get(session_id)?;
    let mut session = handle.lock().await;
    let reply = session
        .send(
            state.backend.as_ref(),
            &state.config.models.chat,
            &payload.message,
        )
        .await?;

    Ok(Json(SendMessageResponse {
        reply,
        turn_count: session.turns().len(),
    }))
}

/// `multipart/form-data` with a `file` part and a `prompt` part.
pub async fn analyze(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let kind: MediaKind = kind
        .parse()
        .map_err(|e: String| ApiError::invalid_input(e))?;

    let mut upload: Option<MediaUpload> = None;
    let mut prompt = String::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .filter(|ct| *ct != "application/octet-stream")
                    .map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                let mut file = MediaUpload::new(filename, data.to_vec());
                if let Some(content_type) = content_type {
                    file = file.with_content_type(content_type);
                }
                upload = Some(file);
            }
            "prompt" => {
                prompt = field.text().await.map_err(multipart_error)?;
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::invalid_input("a file is required"))?;
    tracing::info!(
        %kind,
        filename = %upload.filename,
        bytes = upload.data.len(),
        "analysis requested"
    );

    let text = state.analyzer.analyze(kind, &prompt, upload).await?;
    Ok(Json(AnalyzeResponse { kind, text }))
}

fn parse_session_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::invalid_input(format!("invalid session id '{id}'")))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(e.status(), "invalid_input", e.body_text())
}
