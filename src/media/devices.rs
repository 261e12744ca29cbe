use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::recorder::{MediaRecorder, RecorderOptions};
use super::track::MediaStream;
use super::MediaError;

/// Capture quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "1080")]
    FullHd,
    #[serde(rename = "720")]
    Hd,
}

impl Quality {
    /// Maximum capture resolution requested for this preset
    pub fn resolution(self) -> Resolution {
        match self {
            Quality::FullHd => Resolution {
                width: 1920,
                height: 1080,
            },
            Quality::Hd => Resolution {
                width: 1280,
                height: 720,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::FullHd => "1080",
            Quality::Hd => "720",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('p') {
            "1080" => Ok(Quality::FullHd),
            "720" => Ok(Quality::Hd),
            other => Err(format!("unknown quality '{}' (expected 1080 or 720)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A screen or window that can be captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// An enumerated media device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDevice {
    pub device_id: String,
    pub label: String,
    pub kind: DeviceKind,
}

/// Constraints for acquiring a screen capture stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConstraints {
    pub source_id: String,
    pub max_width: u32,
    pub max_height: u32,
    /// Capture system audio together with the screen
    pub audio: bool,
}

impl DisplayConstraints {
    pub fn for_source(source: &CaptureSource, quality: Quality) -> Self {
        let Resolution { width, height } = quality.resolution();
        Self {
            source_id: source.id.clone(),
            max_width: width,
            max_height: height,
            audio: true,
        }
    }
}

/// Constraints for acquiring camera and/or microphone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMediaConstraints {
    /// `Some` requests audio; an inner device id pins an exact microphone
    pub audio: Option<AudioConstraint>,
    pub video: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraint {
    pub device_id: Option<String>,
}

impl UserMediaConstraints {
    /// Camera plus default microphone, used for permission probes
    pub fn camera_and_microphone() -> Self {
        Self {
            audio: Some(AudioConstraint::default()),
            video: true,
        }
    }

    pub fn microphone(device_id: Option<String>) -> Self {
        Self {
            audio: Some(AudioConstraint { device_id }),
            video: false,
        }
    }
}

/// Platform media capture capabilities
///
/// Implementations wrap the OS capture stack; `SyntheticMedia` provides
/// generated streams for tests and headless runs.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire a screen capture stream
    async fn display_media(&self, constraints: &DisplayConstraints) -> Result<MediaStream, MediaError>;

    /// Acquire camera and/or microphone tracks
    async fn user_media(&self, constraints: &UserMediaConstraints) -> Result<MediaStream, MediaError>;

    /// List available input and output devices
    async fn enumerate_devices(&self) -> Result<Vec<AudioDevice>, MediaError>;

    /// Whether the recorder can produce the given container
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Create a chunked recorder over a stream
    fn create_recorder(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> Result<Box<dyn MediaRecorder>, MediaError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
