use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::MixerConfig;
use crate::media::Quality;

/// Timing and output settings for the session controller
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of countdown ticks before capture starts
    pub countdown_secs: u32,

    /// Spacing between countdown ticks
    pub countdown_tick: Duration,

    /// Spacing between duration counter increments
    pub duration_tick: Duration,

    /// How often the recorder emits a chunk
    pub timeslice: Duration,

    /// Delay before minimizing the control panel so it stays out of the capture
    pub minimize_delay: Duration,

    /// Container requested when saving (converted if it differs from the capture)
    pub output_extension: String,

    /// Audio mixing graph settings
    pub mixer: MixerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            countdown_tick: Duration::from_secs(1),
            duration_tick: Duration::from_secs(1),
            timeslice: Duration::from_secs(1),
            minimize_delay: Duration::from_millis(200),
            output_extension: "mp4".to_string(),
            mixer: MixerConfig::default(),
        }
    }
}

/// User-adjustable recording settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingOptions {
    pub quality: Quality,

    /// Show the cursor highlight overlay while recording
    pub highlighter_enabled: bool,

    /// Microphone device id; `None` uses the system default
    pub microphone_id: Option<String>,
}
