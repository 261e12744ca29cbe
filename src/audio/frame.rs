use serde::{Deserialize, Serialize};

/// Where an audio frame originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioStreamSource {
    /// System audio captured alongside the screen
    Screen,
    /// Microphone input
    Microphone,
    /// Output of the mixing graph
    Mixed,
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the track started
    pub timestamp_ms: u64,
    /// Audio stream source
    pub source: AudioStreamSource,
}

impl AudioFrame {
    /// Duration covered by this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let per_channel = self.samples.len() as u64 / self.channels as u64;
        per_channel * 1000 / self.sample_rate as u64
    }
}
