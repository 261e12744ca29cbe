//! Capture persistence
//!
//! Writes finished captures to disk and converts them to another container
//! through an external encoder, keeping the original bytes if that fails.

mod save;
mod transcode;

pub use save::{append_extension, default_file_name, SaveOutcome, SaveSettings, SaveVideoResponse, VideoSaver};
pub use transcode::{find_ffmpeg, FfmpegTranscoder, TranscodeError, Transcoder, DEFAULT_VIDEO_CODEC};
