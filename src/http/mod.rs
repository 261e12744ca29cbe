//! HTTP API server for the recorder UI
//!
//! This module exposes the window host and session controller over REST:
//! - GET /sources, POST /commands/:command - Surface commands and capture sources
//! - POST /commands/save-video - Persist a base64 capture
//! - POST /session/{start,pause,resume,toggle-pause,stop}, GET /session - Session control
//! - GET/PUT /settings, GET /devices/microphones - Recording options
//! - GET /permissions, POST /permissions/retry - Permission gate
//! - POST /hotkeys/:accelerator - Deliver a global shortcut
//! - GET /events - Server-sent UI events
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{SaveVideoRequest, StartSessionResponse};
pub use routes::create_router;
pub use state::{AppState, DEFAULT_UPLOAD_LIMIT};
