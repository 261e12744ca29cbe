use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::transcode::{Transcoder, DEFAULT_VIDEO_CODEC};
use crate::error::RecorderResult;
use crate::media::VideoBlob;

/// Result of persisting a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum SaveOutcome {
    /// File written at the requested destination
    #[serde(rename_all = "camelCase")]
    Saved { file_path: PathBuf },
    /// Conversion failed; the original bytes were kept at `fallback_path`
    #[serde(rename_all = "camelCase")]
    ConversionFailed { fallback_path: PathBuf, error: String },
    /// The user dismissed the save-path chooser
    Canceled,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

/// Wire shape of the `save-video` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaveVideoResponse {
    #[serde(rename_all = "camelCase")]
    Saved { success: bool, file_path: PathBuf },
    Failed { success: bool, error: String },
    Canceled { canceled: bool },
}

impl From<SaveOutcome> for SaveVideoResponse {
    fn from(outcome: SaveOutcome) -> Self {
        match outcome {
            SaveOutcome::Saved { file_path } => SaveVideoResponse::Saved {
                success: true,
                file_path,
            },
            SaveOutcome::ConversionFailed { error, .. } => SaveVideoResponse::Failed {
                success: false,
                error,
            },
            SaveOutcome::Canceled => SaveVideoResponse::Canceled { canceled: true },
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaveSettings {
    /// Codec requested from the transcoder
    pub video_codec: String,
    /// Where captures are staged before conversion
    pub temp_dir: PathBuf,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// Default file name offered by the save-path chooser
pub fn default_file_name(extension: &str) -> String {
    format!(
        "recording-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        extension.trim_start_matches('.')
    )
}

/// `<path>.<extension>`, keeping the existing extension in the name
pub fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Writes captures to disk, converting containers when needed
pub struct VideoSaver {
    transcoder: Arc<dyn Transcoder>,
    settings: SaveSettings,
}

impl VideoSaver {
    pub fn new(transcoder: Arc<dyn Transcoder>, settings: SaveSettings) -> Self {
        Self {
            transcoder,
            settings,
        }
    }

    /// Persist `blob` at `destination`
    ///
    /// A destination whose extension matches the blob's container is written
    /// as-is. Anything else goes through the transcoder; if that fails the
    /// partial output is removed and the original bytes are kept next to it
    /// with the native extension appended.
    pub async fn save(&self, blob: &VideoBlob, destination: &Path) -> RecorderResult<SaveOutcome> {
        let native = blob.native_extension();
        let requested = destination
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        if requested.eq_ignore_ascii_case(native) {
            tokio::fs::write(destination, &blob.data).await?;
            info!("Saved {} bytes to {}", blob.len(), destination.display());
            return Ok(SaveOutcome::Saved {
                file_path: destination.to_path_buf(),
            });
        }

        tokio::fs::create_dir_all(&self.settings.temp_dir).await?;
        let temp_path = self
            .settings
            .temp_dir
            .join(format!("capture-{}.{}", uuid::Uuid::new_v4(), native));
        tokio::fs::write(&temp_path, &blob.data).await?;

        info!(
            "Converting {} -> {} with {} ({})",
            temp_path.display(),
            destination.display(),
            self.transcoder.name(),
            self.settings.video_codec
        );

        match self
            .transcoder
            .transcode(&temp_path, destination, &self.settings.video_codec)
            .await
        {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                    warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
                }
                Ok(SaveOutcome::Saved {
                    file_path: destination.to_path_buf(),
                })
            }
            Err(e) => {
                warn!("Conversion failed: {}", e);

                match tokio::fs::remove_file(destination).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => warn!("Failed to remove partial output {}: {}", destination.display(), err),
                }

                let fallback_path = append_extension(destination, native);
                tokio::fs::copy(&temp_path, &fallback_path).await?;

                tokio::spawn(async move {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                });

                let name = fallback_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| fallback_path.display().to_string());
                warn!("Original capture kept at {}", fallback_path.display());

                Ok(SaveOutcome::ConversionFailed {
                    error: format!("Conversion failed. Saved as {}", name),
                    fallback_path,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_extension_keeps_original_name() {
        let path = append_extension(Path::new("/videos/demo.mp4"), "webm");
        assert_eq!(path, PathBuf::from("/videos/demo.mp4.webm"));
    }

    #[test]
    fn test_default_file_name() {
        let name = default_file_name(".mp4");
        assert!(name.starts_with("recording-"));
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn test_response_wire_shapes() {
        let saved = SaveVideoResponse::from(SaveOutcome::Saved {
            file_path: PathBuf::from("/v/a.mp4"),
        });
        assert_eq!(
            serde_json::to_value(&saved).unwrap(),
            serde_json::json!({"success": true, "filePath": "/v/a.mp4"})
        );

        let failed = SaveVideoResponse::from(SaveOutcome::ConversionFailed {
            fallback_path: PathBuf::from("/v/a.mp4.webm"),
            error: "Conversion failed. Saved as a.mp4.webm".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"success": false, "error": "Conversion failed. Saved as a.mp4.webm"})
        );

        let canceled = SaveVideoResponse::from(SaveOutcome::Canceled);
        assert_eq!(
            serde_json::to_value(&canceled).unwrap(),
            serde_json::json!({"canceled": true})
        );
    }
}
