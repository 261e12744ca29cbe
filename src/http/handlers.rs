use super::state::AppState;
use crate::app;
use crate::error::{ErrorResponse, RecorderError, RecorderResult};
use crate::host::{HostCommand, HotkeyAction};
use crate::media::{AudioDevice, CaptureSource, VideoBlob, WEBM_VP9_MIME};
use crate::permission::{PermissionState, PermissionStatus};
use crate::persist::SaveVideoResponse;
use crate::session::{RecordingOptions, SessionSnapshot, SessionStatus, StopResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use base64::Engine;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveVideoRequest {
    /// Base64-encoded capture bytes
    pub data: String,

    /// Requested container, without the dot
    pub extension: String,

    /// Container the bytes are in (default: WebM/VP9)
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct PermissionRetryResponse {
    pub state: PermissionState,
}

#[derive(Debug, Serialize)]
pub struct HotkeyResponse {
    pub action: Option<HotkeyAction>,
}

// ============================================================================
// Error mapping
// ============================================================================

impl IntoResponse for RecorderError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecorderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RecorderError::PermissionRequired => StatusCode::FORBIDDEN,
            RecorderError::Media(crate::media::MediaError::NotAllowed(_)) => StatusCode::FORBIDDEN,
            RecorderError::SessionActive | RecorderError::NoCaptureSources => StatusCode::CONFLICT,
            RecorderError::Host(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /sources
/// Screens and windows available for capture
pub async fn get_sources(State(state): State<AppState>) -> RecorderResult<Json<Vec<CaptureSource>>> {
    Ok(Json(state.host.get_sources().await?))
}

/// POST /commands/:command
/// Run a payload-free window host command
pub async fn run_command(
    State(state): State<AppState>,
    Path(command): Path<String>,
) -> RecorderResult<StatusCode> {
    let command: HostCommand = command.parse()?;
    debug!("Host command {:?}", command);
    state.host.execute(command).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /commands/save-video
/// Persist a capture, converting it if a different container is requested
pub async fn save_video(
    State(state): State<AppState>,
    Json(req): Json<SaveVideoRequest>,
) -> RecorderResult<Json<SaveVideoResponse>> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(req.data.as_bytes())
        .map_err(|e| RecorderError::InvalidRequest(format!("invalid base64 payload: {}", e)))?;
    let mime_type = req.mime_type.unwrap_or_else(|| WEBM_VP9_MIME.to_string());

    info!("Saving {} byte capture as .{}", data.len(), req.extension);
    let outcome = state
        .host
        .save_video(VideoBlob::new(data, mime_type), req.extension)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /hotkeys/:accelerator
/// Deliver a global shortcut press
pub async fn trigger_hotkey(
    State(state): State<AppState>,
    Path(accelerator): Path<String>,
) -> RecorderResult<Json<HotkeyResponse>> {
    let action = state.host.trigger_hotkey(accelerator).await?;
    Ok(Json(HotkeyResponse { action }))
}

/// GET /session
/// Snapshot of the current session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

/// POST /session/start
/// Acquire the screen and begin the countdown
pub async fn start_session(
    State(state): State<AppState>,
) -> RecorderResult<(StatusCode, Json<StartSessionResponse>)> {
    let session_id = state.controller.start().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartSessionResponse {
            session_id,
            status: state.controller.status(),
        }),
    ))
}

/// POST /session/pause
pub async fn pause_session(State(state): State<AppState>) -> RecorderResult<Json<StatusResponse>> {
    let status = state.controller.pause().await?;
    Ok(Json(StatusResponse { status }))
}

/// POST /session/resume
pub async fn resume_session(State(state): State<AppState>) -> RecorderResult<Json<StatusResponse>> {
    let status = state.controller.resume().await?;
    Ok(Json(StatusResponse { status }))
}

/// POST /session/toggle-pause
pub async fn toggle_pause(State(state): State<AppState>) -> RecorderResult<Json<StatusResponse>> {
    let status = state.controller.toggle_pause().await?;
    Ok(Json(StatusResponse { status }))
}

/// POST /session/stop
/// Stop and save, or cancel a running countdown
pub async fn stop_session(State(state): State<AppState>) -> RecorderResult<Json<StopResult>> {
    Ok(Json(state.controller.stop().await?))
}

/// GET /settings
pub async fn get_settings(State(state): State<AppState>) -> Json<RecordingOptions> {
    Json(state.controller.options().await)
}

/// PUT /settings
/// Options for the next session
pub async fn update_settings(
    State(state): State<AppState>,
    Json(options): Json<RecordingOptions>,
) -> RecorderResult<Json<RecordingOptions>> {
    Ok(Json(state.controller.update_options(options).await?))
}

/// GET /devices/microphones
pub async fn list_microphones(State(state): State<AppState>) -> RecorderResult<Json<Vec<AudioDevice>>> {
    Ok(Json(state.controller.refresh_microphones().await?))
}

/// GET /permissions
pub async fn get_permissions(State(state): State<AppState>) -> Json<PermissionStatus> {
    Json(state.permission.status().await)
}

/// POST /permissions/retry
pub async fn retry_permissions(
    State(state): State<AppState>,
) -> RecorderResult<Json<PermissionRetryResponse>> {
    let state = app::retry_permissions(&state.permission, &state.controller).await?;
    Ok(Json(PermissionRetryResponse { state }))
}

/// GET /events
/// UI events as server-sent events, named by kind
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default()
                        .event(event.kind())
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default().comment("unserializable event"));
                    return Some((Ok::<_, Infallible>(sse), rx));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Event stream lagged by {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
