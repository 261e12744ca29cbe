use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::MediaError;

pub const MP4_MIME: &str = "video/mp4";
pub const WEBM_VP9_MIME: &str = "video/webm; codecs=vp9";

/// Recorder lifecycle, mirroring the browser MediaRecorder states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    Inactive,
    Recording,
    Paused,
}

#[derive(Debug, Clone)]
pub struct RecorderOptions {
    /// Container and codec to produce
    pub mime_type: String,
    /// Interval at which encoded data is emitted as a chunk
    pub timeslice: Duration,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            mime_type: WEBM_VP9_MIME.to_string(),
            timeslice: Duration::from_secs(1),
        }
    }
}

/// Chunked encoder over a media stream
#[async_trait]
pub trait MediaRecorder: Send + Sync {
    /// Start encoding
    ///
    /// Returns a channel that yields encoded chunks and closes after `stop`
    /// has flushed the final chunk.
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, MediaError>;

    /// Suspend encoding in place
    fn pause(&mut self) -> Result<(), MediaError>;

    /// Resume a paused encoder
    fn resume(&mut self) -> Result<(), MediaError>;

    /// Flush pending data and stop
    async fn stop(&mut self) -> Result<(), MediaError>;

    fn state(&self) -> RecorderState;

    fn mime_type(&self) -> &str;
}

/// File extension of the container described by a MIME type
pub fn container_extension(mime_type: &str) -> &'static str {
    let container = mime_type.split(';').next().unwrap_or("").trim();
    match container {
        "video/mp4" => "mp4",
        "video/x-matroska" => "mkv",
        _ => "webm",
    }
}

/// Captured bytes together with their container type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoBlob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl VideoBlob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Concatenate recorded chunks in order
    pub fn from_chunks(chunks: &[Vec<u8>], mime_type: impl Into<String>) -> Self {
        Self::new(chunks.concat(), mime_type)
    }

    /// Extension of the blob's own container
    pub fn native_extension(&self) -> &'static str {
        container_extension(&self.mime_type)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
