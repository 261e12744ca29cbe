use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::host::{HostSettings, DEFAULT_PAUSE_RESUME, DEFAULT_START_STOP};
use crate::media::Quality;
use crate::persist::{FfmpegTranscoder, SaveSettings, DEFAULT_VIDEO_CODEC};
use crate::session::{RecordingOptions, SessionConfig};

/// Prefix for environment overrides, e.g. `SCREENREC__SERVICE__HTTP__PORT=9000`
const ENV_PREFIX: &str = "SCREENREC";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    pub cursor: CursorConfig,
    pub ffmpeg: FfmpegConfig,
    pub hotkeys: HotkeyConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "screenrec".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Largest accepted save-video request body
    pub max_upload_mb: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7878,
            max_upload_mb: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// "1080" or "720"
    pub quality: Quality,
    pub highlighter: bool,
    pub microphone_id: Option<String>,
    pub countdown_secs: u32,
    pub timeslice_ms: u64,
    pub minimize_delay_ms: u64,
    pub output_extension: String,
    /// Where headless saves land; `~` is expanded
    pub output_dir: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            highlighter: false,
            microphone_id: None,
            countdown_secs: 3,
            timeslice_ms: 1000,
            minimize_delay_ms: 200,
            output_extension: "mp4".to_string(),
            output_dir: "~/Videos/screenrec".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub poll_interval_ms: u64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 16 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Explicit ffmpeg path; searched on PATH when unset
    pub binary: Option<String>,
    pub video_codec: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: None,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub start_stop: String,
    pub pause_resume: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            start_stop: DEFAULT_START_STOP.to_string(),
            pause_resume: DEFAULT_PAUSE_RESUME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Event fan-out is disabled when unset
    pub url: Option<String>,
    /// Also forward 60 Hz cursor positions
    pub forward_cursor: bool,
}

impl Config {
    /// Load from an optional config file plus `SCREENREC__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.recording.output_dir).into_owned())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            countdown_secs: self.recording.countdown_secs,
            timeslice: Duration::from_millis(self.recording.timeslice_ms.max(1)),
            minimize_delay: Duration::from_millis(self.recording.minimize_delay_ms),
            output_extension: self.recording.output_extension.clone(),
            ..SessionConfig::default()
        }
    }

    pub fn recording_options(&self) -> RecordingOptions {
        RecordingOptions {
            quality: self.recording.quality,
            highlighter_enabled: self.recording.highlighter,
            microphone_id: self.recording.microphone_id.clone(),
        }
    }

    pub fn host_settings(&self) -> HostSettings {
        HostSettings {
            start_stop_hotkey: self.hotkeys.start_stop.clone(),
            pause_resume_hotkey: self.hotkeys.pause_resume.clone(),
            cursor_poll_interval: Duration::from_millis(self.cursor.poll_interval_ms.max(1)),
        }
    }

    pub fn save_settings(&self) -> SaveSettings {
        SaveSettings {
            video_codec: self.ffmpeg.video_codec.clone(),
            ..SaveSettings::default()
        }
    }

    /// ffmpeg from config, then PATH, then the bare name
    pub fn transcoder(&self) -> FfmpegTranscoder {
        match &self.ffmpeg.binary {
            Some(binary) => FfmpegTranscoder::new(shellexpand::tilde(binary).into_owned()),
            None => FfmpegTranscoder::from_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load("/nonexistent/screenrec-config").unwrap();
        assert_eq!(config.service.http.port, 7878);
        assert_eq!(config.service.http.max_upload_mb, 1024);
        assert_eq!(config.recording.countdown_secs, 3);
        assert_eq!(config.recording.output_extension, "mp4");
        assert_eq!(config.hotkeys.start_stop, "F9");
        assert_eq!(config.cursor.poll_interval_ms, 16);
        assert!(config.nats.url.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[recording]\nquality = \"720\"\nhighlighter = true\noutput_dir = \"~/captures\"\n\n[service.http]\nport = 9100\n"
        )
        .unwrap();

        let path = file.path().with_extension("");
        let config = Config::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.recording.quality, Quality::Hd);
        assert!(config.recording_options().highlighter_enabled);
        assert_eq!(config.service.http.port, 9100);
        assert_eq!(config.service.http.bind, "127.0.0.1");
        assert!(!config.output_dir().to_string_lossy().starts_with('~'));
    }
}
