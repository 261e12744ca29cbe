//! Application wiring
//!
//! Builds the event bus, window host, permission gate and session controller,
//! and routes global shortcuts to the controller.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::RecorderResult;
use crate::events::{EventBus, UiEvent};
use crate::host::{Desktop, HostHandle, WindowHost};
use crate::media::MediaDevices;
use crate::nats::{spawn_event_bridge, NatsClient};
use crate::permission::{PermissionGate, PermissionState};
use crate::persist::{Transcoder, VideoSaver};
use crate::session::{SessionController, SessionStatus};

pub struct App {
    events: EventBus,
    host: HostHandle,
    controller: SessionController,
    permission: Arc<PermissionGate>,
    host_task: JoinHandle<()>,
    hotkey_task: JoinHandle<()>,
    bridge_task: Option<JoinHandle<()>>,
}

impl App {
    /// Start the host, probe permissions and enumerate microphones
    pub async fn launch(
        config: &Config,
        media: Arc<dyn MediaDevices>,
        desktop: Arc<dyn Desktop>,
        transcoder: Arc<dyn Transcoder>,
    ) -> RecorderResult<Self> {
        info!("Starting {} with {} capture backend", config.service.name, media.name());

        let events = EventBus::default();
        let saver = Arc::new(VideoSaver::new(transcoder, config.save_settings()));
        let (host, host_task) =
            WindowHost::new(desktop, events.clone(), saver, config.host_settings()).spawn()?;

        let permission = Arc::new(PermissionGate::new(Arc::clone(&media)));
        let state = permission.check().await;
        info!("Camera/microphone permission: {:?}", state);

        let controller = SessionController::new(
            media,
            host.clone(),
            events.clone(),
            Arc::clone(&permission),
            config.session_config(),
            config.recording_options(),
        );
        if let Err(e) = controller.refresh_microphones().await {
            warn!("Failed to enumerate microphones: {}", e);
        }

        let hotkey_task = tokio::spawn(dispatch_hotkeys(events.subscribe(), controller.clone()));

        Ok(Self {
            events,
            host,
            controller,
            permission,
            host_task,
            hotkey_task,
            bridge_task: None,
        })
    }

    /// Forward UI events to NATS
    pub fn attach_nats(&mut self, client: Arc<NatsClient>, forward_cursor: bool) {
        if let Some(previous) = self.bridge_task.take() {
            previous.abort();
        }
        self.bridge_task = Some(spawn_event_bridge(client, self.events.subscribe(), forward_cursor));
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn host(&self) -> &HostHandle {
        &self.host
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn permission(&self) -> &Arc<PermissionGate> {
        &self.permission
    }

    /// Ask for camera/microphone access again
    pub async fn retry_permissions(&self) -> RecorderResult<PermissionState> {
        retry_permissions(&self.permission, &self.controller).await
    }

    /// Drop any active session, then tear the host down
    pub async fn shutdown(self) {
        info!("Shutting down");
        self.controller.discard().await;
        self.hotkey_task.abort();
        if let Some(bridge) = self.bridge_task {
            bridge.abort();
        }
        if let Err(e) = self.host.shutdown().await {
            warn!("Window host shutdown: {}", e);
        }
        if let Err(e) = self.host_task.await {
            error!("Window host task failed: {}", e);
        }
    }
}

/// Re-probe access; microphones are re-enumerated once granted so labels appear
pub async fn retry_permissions(
    permission: &PermissionGate,
    controller: &SessionController,
) -> RecorderResult<PermissionState> {
    let state = permission.retry().await?;
    if state == PermissionState::Granted {
        controller.refresh_microphones().await?;
    }
    Ok(state)
}

/// Map shortcut events onto session commands
///
/// Start/stop is ignored during the countdown; pause/resume only applies
/// to a running or paused capture.
async fn dispatch_hotkeys(mut events: broadcast::Receiver<UiEvent>, controller: SessionController) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Hotkey dispatcher skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            UiEvent::HotkeyStartStop => match controller.status() {
                SessionStatus::Idle => {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        // Failures are already published as session-failed
                        let _ = controller.start().await;
                    });
                }
                SessionStatus::Recording | SessionStatus::Paused => {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        let _ = controller.stop().await;
                    });
                }
                status => debug!("Start/stop shortcut ignored while {:?}", status),
            },
            UiEvent::HotkeyPauseResume => {
                if controller.status().is_capturing() {
                    if let Err(e) = controller.toggle_pause().await {
                        warn!("Pause shortcut failed: {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}
