use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::cursor::{CursorBroadcaster, DEFAULT_POLL_INTERVAL};
use super::desktop::{privacy_settings_uri, Desktop};
use super::hotkeys::{HotkeyAction, HotkeyRegistry, DEFAULT_PAUSE_RESUME, DEFAULT_START_STOP};
use super::surface::{Surface, SurfaceSpec};
use crate::error::{RecorderError, RecorderResult};
use crate::events::{EventBus, UiEvent};
use crate::media::{CaptureSource, VideoBlob};
use crate::persist::{default_file_name, SaveOutcome, VideoSaver};

type Reply<T> = oneshot::Sender<RecorderResult<T>>;

enum HostRequest {
    ShowCamera(Reply<()>),
    HideCamera(Reply<()>),
    ShowCursor(Reply<()>),
    HideCursor(Reply<()>),
    GetSources(Reply<Vec<CaptureSource>>),
    MinimizeWindow(Reply<()>),
    OpenSettings(Reply<()>),
    SaveVideo {
        blob: VideoBlob,
        extension: String,
        reply: Reply<SaveOutcome>,
    },
    TriggerHotkey {
        accelerator: String,
        reply: Reply<Option<HotkeyAction>>,
    },
    Shutdown(Reply<()>),
}

/// Payload-free commands, addressable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostCommand {
    ShowCamera,
    HideCamera,
    ShowCursor,
    HideCursor,
    MinimizeWindow,
    OpenWinSettings,
}

impl FromStr for HostCommand {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "show-camera" => Ok(HostCommand::ShowCamera),
            "hide-camera" => Ok(HostCommand::HideCamera),
            "show-cursor" => Ok(HostCommand::ShowCursor),
            "hide-cursor" => Ok(HostCommand::HideCursor),
            "minimize-window" => Ok(HostCommand::MinimizeWindow),
            "open-win-settings" => Ok(HostCommand::OpenWinSettings),
            other => Err(RecorderError::InvalidRequest(format!("unknown command '{}'", other))),
        }
    }
}

/// Cloneable handle for sending commands to the window host
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostRequest>,
}

impl HostHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> HostRequest) -> RecorderResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RecorderError::Host("window host has stopped".to_string()))?;
        rx.await
            .map_err(|_| RecorderError::Host("window host dropped the request".to_string()))?
    }

    pub async fn show_camera(&self) -> RecorderResult<()> {
        self.request(HostRequest::ShowCamera).await
    }

    pub async fn hide_camera(&self) -> RecorderResult<()> {
        self.request(HostRequest::HideCamera).await
    }

    /// Show the overlay and start pointer polling
    pub async fn show_cursor(&self) -> RecorderResult<()> {
        self.request(HostRequest::ShowCursor).await
    }

    /// Hide the overlay; polling has stopped when this returns
    pub async fn hide_cursor(&self) -> RecorderResult<()> {
        self.request(HostRequest::HideCursor).await
    }

    pub async fn get_sources(&self) -> RecorderResult<Vec<CaptureSource>> {
        self.request(HostRequest::GetSources).await
    }

    pub async fn minimize_window(&self) -> RecorderResult<()> {
        self.request(HostRequest::MinimizeWindow).await
    }

    pub async fn open_settings(&self) -> RecorderResult<()> {
        self.request(HostRequest::OpenSettings).await
    }

    pub async fn save_video(&self, blob: VideoBlob, extension: impl Into<String>) -> RecorderResult<SaveOutcome> {
        let extension = extension.into();
        self.request(|reply| HostRequest::SaveVideo {
            blob,
            extension,
            reply,
        })
        .await
    }

    /// Deliver a global shortcut press
    pub async fn trigger_hotkey(&self, accelerator: impl Into<String>) -> RecorderResult<Option<HotkeyAction>> {
        let accelerator = accelerator.into();
        self.request(|reply| HostRequest::TriggerHotkey { accelerator, reply })
            .await
    }

    pub async fn execute(&self, command: HostCommand) -> RecorderResult<()> {
        match command {
            HostCommand::ShowCamera => self.show_camera().await,
            HostCommand::HideCamera => self.hide_camera().await,
            HostCommand::ShowCursor => self.show_cursor().await,
            HostCommand::HideCursor => self.hide_cursor().await,
            HostCommand::MinimizeWindow => self.minimize_window().await,
            HostCommand::OpenWinSettings => self.open_settings().await,
        }
    }

    /// Tear the host down: hide surfaces, stop polling, release shortcuts
    pub async fn shutdown(&self) -> RecorderResult<()> {
        self.request(HostRequest::Shutdown).await
    }
}

#[derive(Debug, Clone)]
pub struct HostSettings {
    pub start_stop_hotkey: String,
    pub pause_resume_hotkey: String,
    pub cursor_poll_interval: Duration,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            start_stop_hotkey: DEFAULT_START_STOP.to_string(),
            pause_resume_hotkey: DEFAULT_PAUSE_RESUME.to_string(),
            cursor_poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Owns the surfaces, cursor polling, shortcuts and persistence
pub struct WindowHost {
    desktop: Arc<dyn Desktop>,
    events: EventBus,
    cursor: CursorBroadcaster,
    hotkeys: HotkeyRegistry,
    saver: Arc<VideoSaver>,
    settings: HostSettings,
}

impl WindowHost {
    pub fn new(desktop: Arc<dyn Desktop>, events: EventBus, saver: Arc<VideoSaver>, settings: HostSettings) -> Self {
        let cursor = CursorBroadcaster::new(Arc::clone(&desktop), events.clone(), settings.cursor_poll_interval);
        Self {
            desktop,
            events,
            cursor,
            hotkeys: HotkeyRegistry::new(),
            saver,
            settings,
        }
    }

    /// Create surfaces, register shortcuts and start serving commands
    pub fn spawn(mut self) -> RecorderResult<(HostHandle, JoinHandle<()>)> {
        self.setup()?;
        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(self.run(rx));
        Ok((HostHandle { tx }, task))
    }

    fn setup(&mut self) -> RecorderResult<()> {
        let primary = self.desktop.primary_display();
        for spec in SurfaceSpec::layout(&primary) {
            self.desktop.create_surface(&spec)?;
        }

        let start_stop = self.settings.start_stop_hotkey.clone();
        let pause_resume = self.settings.pause_resume_hotkey.clone();
        self.hotkeys.register(&start_stop, HotkeyAction::StartStop)?;
        self.hotkeys.register(&pause_resume, HotkeyAction::PauseResume)?;

        info!(
            "Window host ready on {}x{} display",
            primary.width, primary.height
        );
        Ok(())
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HostRequest>) {
        while let Some(request) = rx.recv().await {
            match request {
                HostRequest::ShowCamera(reply) => {
                    let _ = reply.send(self.set_visible(Surface::CameraBubble, true));
                }
                HostRequest::HideCamera(reply) => {
                    let _ = reply.send(self.set_visible(Surface::CameraBubble, false));
                }
                HostRequest::ShowCursor(reply) => {
                    let result = self.set_visible(Surface::CursorOverlay, true);
                    if result.is_ok() {
                        self.cursor.start().await;
                    }
                    let _ = reply.send(result);
                }
                HostRequest::HideCursor(reply) => {
                    self.cursor.stop().await;
                    let _ = reply.send(self.set_visible(Surface::CursorOverlay, false));
                }
                HostRequest::GetSources(reply) => {
                    let _ = reply.send(self.desktop.capture_sources());
                }
                HostRequest::MinimizeWindow(reply) => {
                    let _ = reply.send(self.desktop.minimize(Surface::ControlPanel));
                }
                HostRequest::OpenSettings(reply) => {
                    let result = match privacy_settings_uri() {
                        Some(uri) => self.desktop.open_external(uri),
                        None => Err(RecorderError::Platform(
                            "no privacy settings page on this platform".to_string(),
                        )),
                    };
                    let _ = reply.send(result);
                }
                HostRequest::SaveVideo {
                    blob,
                    extension,
                    reply,
                } => {
                    // Conversion can take a while; keep serving surface commands meanwhile
                    let desktop = Arc::clone(&self.desktop);
                    let saver = Arc::clone(&self.saver);
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let result = save_video(desktop.as_ref(), &saver, blob, &extension).await;
                        match &result {
                            Ok(outcome) => events.publish(UiEvent::SaveCompleted {
                                outcome: outcome.clone(),
                            }),
                            Err(e) => error!("Failed to save video: {}", e),
                        }
                        let _ = reply.send(result);
                    });
                }
                HostRequest::TriggerHotkey { accelerator, reply } => {
                    let action = self.hotkeys.resolve(&accelerator);
                    match action {
                        Some(action) => self.events.publish(action.event()),
                        None => warn!("No shortcut bound to {}", accelerator),
                    }
                    let _ = reply.send(Ok(action));
                }
                HostRequest::Shutdown(reply) => {
                    self.teardown().await;
                    let _ = reply.send(Ok(()));
                    return;
                }
            }
        }

        // Every handle dropped
        self.teardown().await;
    }

    fn set_visible(&self, surface: Surface, visible: bool) -> RecorderResult<()> {
        self.desktop.set_visible(surface, visible)?;
        self.events.publish(UiEvent::SurfaceVisibility { surface, visible });
        Ok(())
    }

    async fn teardown(&mut self) {
        info!("Shutting down window host");
        self.cursor.stop().await;
        self.hotkeys.unregister_all();
        for surface in Surface::ALL {
            self.desktop.destroy_surface(surface);
        }
    }
}

async fn save_video(
    desktop: &dyn Desktop,
    saver: &VideoSaver,
    blob: VideoBlob,
    extension: &str,
) -> RecorderResult<SaveOutcome> {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() {
        return Err(RecorderError::InvalidRequest("missing file extension".to_string()));
    }

    let Some(destination) = desktop
        .choose_save_path(&default_file_name(extension), extension)
        .await
    else {
        return Ok(SaveOutcome::Canceled);
    };

    saver.save(&blob, &destination).await
}
