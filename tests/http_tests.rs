use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use screenrec::host::{Desktop, HeadlessDesktop, Surface};
use screenrec::persist::{TranscodeError, Transcoder};
use screenrec::{create_router, App, AppState, Config, SyntheticMedia};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct UnusedTranscoder;

#[async_trait]
impl Transcoder for UnusedTranscoder {
    async fn transcode(&self, _input: &Path, _output: &Path, _video_codec: &str) -> Result<(), TranscodeError> {
        Err(TranscodeError::Failed {
            status: "exit status: 1".to_string(),
            stderr: "not available in tests".to_string(),
        })
    }

    fn name(&self) -> &str {
        "unused"
    }
}

async fn setup() -> (Router, App, Arc<HeadlessDesktop>, TempDir) {
    let dir = TempDir::new().unwrap();
    let desktop = Arc::new(HeadlessDesktop::new(dir.path().join("videos")));
    let app = App::launch(
        &Config::default(),
        Arc::new(SyntheticMedia::default()),
        desktop.clone(),
        Arc::new(UnusedTranscoder),
    )
    .await
    .unwrap();
    let router = create_router(AppState::from(&app));
    (router, app, desktop, dir)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let (router, _app, _desktop, _dir) = setup().await;
    let (status, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_surface_commands() {
    let (router, _app, desktop, _dir) = setup().await;

    let (status, _) = send(&router, "POST", "/commands/show-camera", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(desktop.is_visible(Surface::CameraBubble));

    let (status, _) = send(&router, "POST", "/commands/hide-camera", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!desktop.is_visible(Surface::CameraBubble));

    let (status, body) = send(&router, "POST", "/commands/explode", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_sources_and_permissions() {
    let (router, _app, _desktop, _dir) = setup().await;

    let (status, body) = send(&router, "GET", "/sources", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "screen:0:0");

    let (status, body) = send(&router, "GET", "/permissions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "granted");

    let (status, body) = send(&router, "GET", "/devices/microphones", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["deviceId"], "default");
    assert_eq!(body[0]["kind"], "audioinput");
}

#[tokio::test]
async fn test_save_video_writes_native_container() {
    let (router, _app, _desktop, dir) = setup().await;
    let payload = b"\x1a\x45\xdf\xa3webm bytes".to_vec();

    let (status, body) = send(
        &router,
        "POST",
        "/commands/save-video",
        Some(json!({
            "data": base64::engine::general_purpose::STANDARD.encode(&payload),
            "extension": "webm",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let file_path = body["filePath"].as_str().unwrap();
    assert!(Path::new(file_path).starts_with(dir.path().join("videos")));
    assert_eq!(std::fs::read(file_path).unwrap(), payload);
}

#[tokio::test]
async fn test_save_video_conversion_failure_reports_fallback() {
    let (router, _app, _desktop, dir) = setup().await;
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();

    let (status, body) = send(
        &router,
        "POST",
        "/commands/save-video",
        Some(json!({
            "data": base64::engine::general_purpose::STANDARD.encode(&payload),
            "extension": "mp4",
            "mimeType": "video/webm; codecs=vp9",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Conversion failed. Saved as recording-"));
    assert!(error.ends_with(".mp4.webm"));

    let name = error.trim_start_matches("Conversion failed. Saved as ");
    let fallback = std::fs::read(dir.path().join("videos").join(name)).unwrap();
    assert_eq!(fallback, payload);
}

#[tokio::test]
async fn test_save_video_accepts_multi_megabyte_capture() {
    let (router, _app, _desktop, _dir) = setup().await;
    let payload: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 256) as u8).collect();

    let (status, body) = send(
        &router,
        "POST",
        "/commands/save-video",
        Some(json!({
            "data": base64::engine::general_purpose::STANDARD.encode(&payload),
            "extension": "webm",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let file_path = body["filePath"].as_str().unwrap();
    assert_eq!(std::fs::read(file_path).unwrap().len(), payload.len());
}

#[tokio::test]
async fn test_save_video_honours_configured_upload_limit() {
    let (_router, app, _desktop, _dir) = setup().await;
    let router = create_router(AppState::from(&app).with_upload_limit_mb(1));
    let payload = vec![0u8; 2 * 1024 * 1024];

    let (status, _) = send(
        &router,
        "POST",
        "/commands/save-video",
        Some(json!({
            "data": base64::engine::general_purpose::STANDARD.encode(&payload),
            "extension": "webm",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_save_video_rejects_bad_payload() {
    let (router, _app, _desktop, _dir) = setup().await;
    let (status, body) = send(
        &router,
        "POST",
        "/commands/save-video",
        Some(json!({ "data": "not base64!", "extension": "webm" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_session_start_conflict_and_cancel() {
    let (router, _app, _desktop, _dir) = setup().await;

    let (status, body) = send(&router, "POST", "/session/start", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "countdown");
    let session_id = body["sessionId"].clone();

    let (status, body) = send(&router, "POST", "/session/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SESSION_ACTIVE");

    let (status, body) = send(&router, "GET", "/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "countdown");
    assert_eq!(body["sessionId"], session_id);

    let (status, body) = send(&router, "POST", "/session/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "countdown");

    let (status, body) = send(&router, "POST", "/session/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "countdown-cancelled");

    let (_, body) = send(&router, "GET", "/session", None).await;
    assert_eq!(body["status"], "idle");
    assert_eq!(body["durationSecs"], 0);
}

#[tokio::test]
async fn test_settings_round_trip() {
    let (router, _app, _desktop, _dir) = setup().await;

    let (status, body) = send(
        &router,
        "PUT",
        "/settings",
        Some(json!({ "quality": "720", "highlighterEnabled": true, "microphoneId": "default" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quality"], "720");

    let (_, body) = send(&router, "GET", "/settings", None).await;
    assert_eq!(body["highlighterEnabled"], true);

    let (status, _) = send(
        &router,
        "PUT",
        "/settings",
        Some(json!({ "microphoneId": "unplugged" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hotkey_resolution() {
    let (router, _app, _desktop, _dir) = setup().await;

    let (status, body) = send(&router, "POST", "/hotkeys/F10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "pause-resume");

    let (_, body) = send(&router, "POST", "/hotkeys/F12", None).await;
    assert!(body["action"].is_null());
}
