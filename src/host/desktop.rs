use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::surface::{DisplayInfo, Point, Surface, SurfaceSpec};
use crate::error::{RecorderError, RecorderResult};
use crate::media::CaptureSource;

/// Windowing and OS integration used by the window host
#[async_trait]
pub trait Desktop: Send + Sync {
    fn primary_display(&self) -> DisplayInfo;

    fn create_surface(&self, spec: &SurfaceSpec) -> RecorderResult<()>;

    fn destroy_surface(&self, surface: Surface);

    fn set_visible(&self, surface: Surface, visible: bool) -> RecorderResult<()>;

    fn is_visible(&self, surface: Surface) -> bool;

    fn minimize(&self, surface: Surface) -> RecorderResult<()>;

    /// Screens available for capture, primary first
    fn capture_sources(&self) -> RecorderResult<Vec<CaptureSource>>;

    /// Global pointer position in screen coordinates
    fn pointer_position(&self) -> Point;

    /// Ask where to save a file; `None` when the user cancels
    async fn choose_save_path(&self, default_name: &str, extension: &str) -> Option<PathBuf>;

    /// Open a URI with the platform handler
    fn open_external(&self, uri: &str) -> RecorderResult<()>;
}

/// Deep link to the OS camera privacy page
pub fn privacy_settings_uri() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("ms-settings:privacy-webcam")
    } else if cfg!(target_os = "macos") {
        Some("x-apple.systempreferences:com.apple.preference.security?Privacy_Camera")
    } else {
        None
    }
}

fn launch_uri(uri: &str) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    let command = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", "", uri]);
        c
    };

    #[cfg(target_os = "macos")]
    let command = {
        let mut c = std::process::Command::new("open");
        c.arg(uri);
        c
    };

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let command = {
        let mut c = std::process::Command::new("xdg-open");
        c.arg(uri);
        c
    };

    run_opener(command)
}

/// Waits for the opener so no child is left unreaped
fn run_opener(mut command: std::process::Command) -> std::io::Result<()> {
    let status = command.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("opener exited with {}", status),
        ))
    }
}

#[derive(Debug, Clone, Copy)]
struct SurfaceRecord {
    spec: SurfaceSpec,
    visible: bool,
    minimized: bool,
}

#[derive(Debug, Default)]
struct HeadlessState {
    surfaces: HashMap<Surface, SurfaceRecord>,
    pointer: Point,
    opened: Vec<String>,
    cancel_next_save: bool,
}

/// Desktop without real windows
///
/// Tracks surface state in memory, serves a fixed source list and saves into
/// an output directory without prompting. Used by the headless host and tests.
pub struct HeadlessDesktop {
    display: DisplayInfo,
    sources: Vec<CaptureSource>,
    output_dir: PathBuf,
    launch_external: bool,
    state: Mutex<HeadlessState>,
}

impl HeadlessDesktop {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            display: DisplayInfo::default(),
            sources: vec![CaptureSource {
                id: "screen:0:0".to_string(),
                name: "Entire Screen".to_string(),
            }],
            output_dir: output_dir.into(),
            launch_external: false,
            state: Mutex::new(HeadlessState::default()),
        }
    }

    pub fn with_sources(mut self, sources: Vec<CaptureSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_display(mut self, display: DisplayInfo) -> Self {
        self.display = display;
        self
    }

    /// Actually hand URIs to the platform opener instead of only recording them
    pub fn launching_external(mut self, launch: bool) -> Self {
        self.launch_external = launch;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_pointer(&self, point: Point) {
        self.state().pointer = point;
    }

    pub fn is_minimized(&self, surface: Surface) -> bool {
        self.state()
            .surfaces
            .get(&surface)
            .map(|r| r.minimized)
            .unwrap_or(false)
    }

    pub fn surface_spec(&self, surface: Surface) -> Option<SurfaceSpec> {
        self.state().surfaces.get(&surface).map(|r| r.spec)
    }

    pub fn opened_uris(&self) -> Vec<String> {
        self.state().opened.clone()
    }

    /// Make the next save-path request behave as if the user cancelled
    pub fn cancel_next_save(&self) {
        self.state().cancel_next_save = true;
    }
}

#[async_trait]
impl Desktop for HeadlessDesktop {
    fn primary_display(&self) -> DisplayInfo {
        self.display
    }

    fn create_surface(&self, spec: &SurfaceSpec) -> RecorderResult<()> {
        debug!("Creating surface {:?} at {:?}", spec.surface, spec.bounds);
        self.state().surfaces.insert(
            spec.surface,
            SurfaceRecord {
                spec: *spec,
                visible: spec.visible,
                minimized: false,
            },
        );
        Ok(())
    }

    fn destroy_surface(&self, surface: Surface) {
        self.state().surfaces.remove(&surface);
    }

    fn set_visible(&self, surface: Surface, visible: bool) -> RecorderResult<()> {
        let mut state = self.state();
        let record = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| RecorderError::Platform(format!("surface {:?} does not exist", surface)))?;
        record.visible = visible;
        if visible {
            record.minimized = false;
        }
        Ok(())
    }

    fn is_visible(&self, surface: Surface) -> bool {
        self.state()
            .surfaces
            .get(&surface)
            .map(|r| r.visible && !r.minimized)
            .unwrap_or(false)
    }

    fn minimize(&self, surface: Surface) -> RecorderResult<()> {
        let mut state = self.state();
        let record = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| RecorderError::Platform(format!("surface {:?} does not exist", surface)))?;
        record.minimized = true;
        Ok(())
    }

    fn capture_sources(&self) -> RecorderResult<Vec<CaptureSource>> {
        Ok(self.sources.clone())
    }

    fn pointer_position(&self) -> Point {
        self.state().pointer
    }

    async fn choose_save_path(&self, default_name: &str, _extension: &str) -> Option<PathBuf> {
        if std::mem::take(&mut self.state().cancel_next_save) {
            info!("Save dialog cancelled");
            return None;
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            tracing::warn!("Cannot create output directory {}: {}", self.output_dir.display(), e);
            return None;
        }
        Some(self.output_dir.join(default_name))
    }

    fn open_external(&self, uri: &str) -> RecorderResult<()> {
        info!("Opening {}", uri);
        self.state().opened.push(uri.to_string());
        if self.launch_external {
            launch_uri(uri).map_err(|e| RecorderError::Platform(format!("failed to open {}: {}", uri, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headless_save_path_and_cancel() {
        let dir = tempfile::TempDir::new().unwrap();
        let desktop = HeadlessDesktop::new(dir.path().join("out"));

        let path = desktop.choose_save_path("recording-1.mp4", "mp4").await.unwrap();
        assert_eq!(path, dir.path().join("out").join("recording-1.mp4"));
        assert!(dir.path().join("out").is_dir());

        desktop.cancel_next_save();
        assert!(desktop.choose_save_path("recording-2.mp4", "mp4").await.is_none());
        assert!(desktop.choose_save_path("recording-3.mp4", "mp4").await.is_some());
    }

    #[test]
    fn test_visibility_requires_surface() {
        let desktop = HeadlessDesktop::new("/tmp");
        assert!(desktop.set_visible(Surface::CameraBubble, true).is_err());

        let spec = SurfaceSpec::for_surface(Surface::CameraBubble, &desktop.primary_display());
        desktop.create_surface(&spec).unwrap();
        assert!(!desktop.is_visible(Surface::CameraBubble));
        desktop.set_visible(Surface::CameraBubble, true).unwrap();
        assert!(desktop.is_visible(Surface::CameraBubble));
    }

    #[cfg(unix)]
    #[test]
    fn test_opener_is_waited_on() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("opened");

        let mut ok = std::process::Command::new("sh");
        ok.args(["-c", &format!("sleep 0.1; touch {}", marker.display())]);
        run_opener(ok).unwrap();
        assert!(marker.exists());

        assert!(run_opener(std::process::Command::new("false")).is_err());
    }
}
