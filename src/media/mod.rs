//! Media capture abstractions
//!
//! Models the capture primitives the session controller composes:
//! - `MediaDevices` for acquiring screen, camera and microphone streams
//! - `MediaTrack` / `MediaStream` handles with explicit stop semantics
//! - `MediaRecorder` for chunked encoding with in-place pause/resume

pub mod devices;
pub mod recorder;
pub mod synthetic;
pub mod track;

use thiserror::Error;

pub use devices::{
    AudioConstraint, AudioDevice, CaptureSource, DeviceKind, DisplayConstraints, MediaDevices,
    Quality, Resolution, UserMediaConstraints,
};
pub use recorder::{
    container_extension, MediaRecorder, RecorderOptions, RecorderState, VideoBlob, MP4_MIME,
    WEBM_VP9_MIME,
};
pub use synthetic::{PermissionBehavior, SyntheticConfig, SyntheticMedia};
pub use track::{MediaStream, MediaTrack, TrackKind, TrackState};

/// Failures reported by a capture backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Access refused by the user or blocked by OS privacy policy
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device not readable: {0}")]
    NotReadable(String),

    /// The request was dismissed before completing
    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Unsupported: {0}")]
    NotSupported(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}
