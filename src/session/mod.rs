//! Recording session management
//!
//! This module provides the `SessionController` that drives one capture at a time:
//! - Countdown before capture, cancellable by stop
//! - Screen, microphone and system audio composed into one encoded stream
//! - Pause/resume in place and a paused-aware duration counter
//! - Flushing, releasing every track and handing the capture off for saving

mod config;
mod controller;
mod state;
mod stats;

pub use config::{RecordingOptions, SessionConfig};
pub use controller::SessionController;
pub use state::{SessionCommand, SessionStatus};
pub use stats::{SessionSnapshot, StopOutcome, StopResult};
