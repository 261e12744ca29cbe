use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.upload_limit;
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Window host
        .route("/sources", get(handlers::get_sources))
        .route(
            "/commands/save-video",
            post(handlers::save_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/commands/:command", post(handlers::run_command))
        .route("/hotkeys/:accelerator", post(handlers::trigger_hotkey))
        // Session control
        .route("/session", get(handlers::get_session))
        .route("/session/start", post(handlers::start_session))
        .route("/session/pause", post(handlers::pause_session))
        .route("/session/resume", post(handlers::resume_session))
        .route("/session/toggle-pause", post(handlers::toggle_pause))
        .route("/session/stop", post(handlers::stop_session))
        // Settings and devices
        .route(
            "/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/devices/microphones", get(handlers::list_microphones))
        .route("/permissions", get(handlers::get_permissions))
        .route("/permissions/retry", post(handlers::retry_permissions))
        // Event stream
        .route("/events", get(handlers::event_stream))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
