use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Default video codec requested when converting captures
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// External container conversion
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into `output`, re-encoding video with `video_codec`
    async fn transcode(&self, input: &Path, output: &Path, video_codec: &str) -> Result<(), TranscodeError>;

    fn name(&self) -> &str;
}

/// Transcoder backed by an `ffmpeg` executable
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve `ffmpeg` from PATH, falling back to the bare name
    pub fn from_path() -> Self {
        Self::new(find_ffmpeg().unwrap_or_else(|| PathBuf::from("ffmpeg")))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn args(input: &Path, output: &Path, video_codec: &str) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-c:v".to_string(),
            video_codec.to_string(),
            output.display().to_string(),
        ]
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::from_path()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, video_codec: &str) -> Result<(), TranscodeError> {
        let args = Self::args(input, output, video_codec);
        info!("Starting FFmpeg conversion: {:?}", args);

        let result = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!("FFmpeg conversion failed ({}): {}", result.status, stderr);
            return Err(TranscodeError::Failed {
                status: result.status.to_string(),
                stderr,
            });
        }

        info!("FFmpeg conversion finished: {}", output.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Locate an ffmpeg executable on PATH
pub fn find_ffmpeg() -> Option<PathBuf> {
    let exe = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(exe))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_args_request_codec() {
        let args = FfmpegTranscoder::args(Path::new("/tmp/in.webm"), Path::new("/tmp/out.mp4"), "libx264");

        assert_eq!(args.first().map(String::as_str), Some("-y"));
        let codec_at = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[codec_at + 1], "libx264");
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/ffmpeg-binary");
        let result = transcoder
            .transcode(Path::new("/tmp/in.webm"), Path::new("/tmp/out.mp4"), "libx264")
            .await;

        assert!(matches!(result, Err(TranscodeError::Spawn { .. })));
    }
}
