use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::{RecordingOptions, SessionConfig};
use super::state::{SessionCommand, SessionStatus};
use super::stats::{SessionSnapshot, StopOutcome, StopResult};
use crate::audio::AudioGraph;
use crate::error::{RecorderError, RecorderResult};
use crate::events::{EventBus, UiEvent};
use crate::host::HostHandle;
use crate::media::{
    AudioDevice, DeviceKind, DisplayConstraints, MediaDevices, MediaRecorder, MediaStream, Quality,
    RecorderOptions, UserMediaConstraints, VideoBlob, MP4_MIME, WEBM_VP9_MIME,
};
use crate::permission::PermissionGate;

/// Everything a single session holds between start and stop
struct ActiveSession {
    id: Uuid,
    started_at: DateTime<Utc>,

    /// Options captured when the session started
    options: RecordingOptions,

    screen: MediaStream,
    microphone: Option<MediaStream>,
    mixed: Option<MediaStream>,
    graph: Option<AudioGraph>,
    recorder: Option<Box<dyn MediaRecorder>>,

    /// Encoded chunks in arrival order
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,

    duration: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,

    /// Dropping this cancels the countdown
    countdown_cancel: Option<oneshot::Sender<()>>,

    collector: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    minimize: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn new(options: RecordingOptions, screen: MediaStream) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            options,
            screen,
            microphone: None,
            mixed: None,
            graph: None,
            recorder: None,
            chunks: Arc::new(Mutex::new(Vec::new())),
            duration: Arc::new(AtomicU64::new(0)),
            paused: Arc::new(AtomicBool::new(false)),
            countdown_cancel: None,
            collector: None,
            ticker: None,
            minimize: None,
        }
    }

    /// Cancel timers and stop every track this session acquired
    fn release(&mut self) {
        self.countdown_cancel = None;
        for task in [self.collector.take(), self.ticker.take(), self.minimize.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        self.recorder = None;
        if let Some(graph) = self.graph.take() {
            graph.close();
        }
        if let Some(mixed) = self.mixed.take() {
            mixed.stop();
        }
        if let Some(microphone) = self.microphone.take() {
            microphone.stop();
        }
        self.screen.stop();
        debug!("Released media for session {}", self.id);
    }
}

struct Inner {
    status: SessionStatus,
    session: Option<ActiveSession>,
}

struct Shared {
    media: Arc<dyn MediaDevices>,
    host: HostHandle,
    events: EventBus,
    permission: Arc<PermissionGate>,
    config: SessionConfig,
    options: RwLock<RecordingOptions>,
    microphones: RwLock<Vec<AudioDevice>>,
    status_tx: watch::Sender<SessionStatus>,
    inner: Mutex<Inner>,
}

/// Drives the countdown / record / pause / stop lifecycle
///
/// Cheap to clone; all clones control the same session. At most one session
/// exists at a time and every command is serialized through an internal lock,
/// so hotkeys and API calls cannot interleave mid-transition.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        media: Arc<dyn MediaDevices>,
        host: HostHandle,
        events: EventBus,
        permission: Arc<PermissionGate>,
        config: SessionConfig,
        options: RecordingOptions,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                media,
                host,
                events,
                permission,
                config,
                options: RwLock::new(options),
                microphones: RwLock::new(Vec::new()),
                status_tx,
                inner: Mutex::new(Inner {
                    status: SessionStatus::Idle,
                    session: None,
                }),
            }),
        }
    }

    /// Current status, without waiting on an in-flight command
    pub fn status(&self) -> SessionStatus {
        *self.shared.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Acquire the screen and begin the countdown
    ///
    /// Rejected with `SessionActive` while any session exists. Capture
    /// begins when the countdown elapses.
    pub async fn start(&self) -> RecorderResult<Uuid> {
        let result = self.start_session().await;
        if let Err(e) = &result {
            error!("Failed to start recording: {}", e);
            self.publish_failure(e);
        }
        result
    }

    async fn start_session(&self) -> RecorderResult<Uuid> {
        let mut inner = self.shared.inner.lock().await;
        if inner.status != SessionStatus::Idle {
            warn!("Start requested while {:?}", inner.status);
            return Err(RecorderError::SessionActive);
        }

        if !self.shared.permission.is_granted().await {
            return Err(RecorderError::PermissionRequired);
        }

        let sources = self.shared.host.get_sources().await?;
        let Some(source) = sources.into_iter().next() else {
            warn!("No screen or window available to capture");
            return Err(RecorderError::NoCaptureSources);
        };

        let options = self.shared.options.read().await.clone();
        let constraints = DisplayConstraints::for_source(&source, options.quality);
        info!(
            "Capturing '{}' at {}x{}",
            source.name, constraints.max_width, constraints.max_height
        );
        let screen = self.shared.media.display_media(&constraints).await?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let mut session = ActiveSession::new(options, screen);
        session.countdown_cancel = Some(cancel_tx);
        let id = session.id;

        inner.session = Some(session);
        self.transition(&mut inner, SessionCommand::Start);
        drop(inner);

        self.spawn_countdown(id, cancel_rx);
        info!("Session {} counting down", id);
        Ok(id)
    }

    fn spawn_countdown(&self, id: Uuid, mut cancel: oneshot::Receiver<()>) {
        let controller = self.clone();
        tokio::spawn(async move {
            let tick = controller.shared.config.countdown_tick;
            for remaining in (1..=controller.shared.config.countdown_secs).rev() {
                controller
                    .shared
                    .events
                    .publish(UiEvent::CountdownTick { remaining });
                tokio::select! {
                    _ = sleep(tick) => {}
                    _ = &mut cancel => {
                        debug!("Countdown for session {} cancelled", id);
                        return;
                    }
                }
            }

            if let Err(e) = controller.begin_capture(id).await {
                error!("Failed to begin capture: {}", e);
                controller.publish_failure(&e);
            }
        });
    }

    async fn begin_capture(&self, id: Uuid) -> RecorderResult<()> {
        let mut inner = self.shared.inner.lock().await;
        let current = inner.session.as_ref().map(|s| s.id);
        if inner.status != SessionStatus::Countdown || current != Some(id) {
            debug!("Session {} is no longer counting down", id);
            return Ok(());
        }

        let Some(session) = inner.session.as_mut() else {
            return Ok(());
        };
        session.countdown_cancel = None;
        let highlighter = session.options.highlighter_enabled;

        if let Err(e) = self.capture(session).await {
            if let Some(mut session) = inner.session.take() {
                session.release();
            }
            self.force_idle(&mut inner);
            return Err(e);
        }

        self.transition(&mut inner, SessionCommand::CountdownElapsed);
        info!("Session {} recording", id);

        if let Err(e) = self.shared.host.show_camera().await {
            warn!("Failed to show camera bubble: {}", e);
        }
        if highlighter {
            if let Err(e) = self.shared.host.show_cursor().await {
                warn!("Failed to show cursor highlight: {}", e);
            }
        }

        // Move the control panel out of the capture once recording is underway
        let host = self.shared.host.clone();
        let delay = self.shared.config.minimize_delay;
        let minimize = tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = host.minimize_window().await {
                warn!("Failed to minimize control panel: {}", e);
            }
        });
        if let Some(session) = inner.session.as_mut() {
            session.minimize = Some(minimize);
        }

        Ok(())
    }

    /// Acquire the microphone, mix audio and start the encoder
    async fn capture(&self, session: &mut ActiveSession) -> RecorderResult<()> {
        let constraints = UserMediaConstraints::microphone(session.options.microphone_id.clone());
        match self.shared.media.user_media(&constraints).await {
            Ok(stream) => session.microphone = Some(stream),
            Err(e) => warn!("Recording without microphone: {}", e),
        }

        let mut audio_tracks = session.screen.audio_tracks();
        if let Some(microphone) = &session.microphone {
            audio_tracks.extend(microphone.audio_tracks());
        }
        let graph = AudioGraph::connect(&audio_tracks, self.shared.config.mixer.clone());
        debug!("Mixing {} audio sources", graph.node_count());

        let mut tracks = session.screen.video_tracks();
        tracks.push(graph.destination());
        let mixed = MediaStream::new(tracks);
        session.graph = Some(graph);
        session.mixed = Some(mixed.clone());

        let mime_type = if self.shared.media.is_type_supported(MP4_MIME) {
            MP4_MIME
        } else {
            WEBM_VP9_MIME
        };
        let mut recorder = self.shared.media.create_recorder(
            mixed,
            RecorderOptions {
                mime_type: mime_type.to_string(),
                timeslice: self.shared.config.timeslice,
            },
        )?;
        let mut chunk_rx = recorder.start().await?;
        session.recorder = Some(recorder);
        info!("Encoder started ({})", mime_type);

        let chunks = Arc::clone(&session.chunks);
        session.collector = Some(tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                if !chunk.is_empty() {
                    chunks.lock().await.push(chunk);
                }
            }
        }));

        let duration = Arc::clone(&session.duration);
        let paused = Arc::clone(&session.paused);
        let events = self.shared.events.clone();
        let period = self.shared.config.duration_tick;
        session.ticker = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if paused.load(Ordering::SeqCst) {
                    continue;
                }
                let seconds = duration.fetch_add(1, Ordering::SeqCst) + 1;
                events.publish(UiEvent::DurationTick { seconds });
            }
        }));

        Ok(())
    }

    /// Suspend the encoder; a no-op unless recording
    pub async fn pause(&self) -> RecorderResult<SessionStatus> {
        let mut inner = self.shared.inner.lock().await;
        if inner.status == SessionStatus::Recording {
            self.set_paused(&mut inner, true)?;
        } else {
            debug!("Pause ignored while {:?}", inner.status);
        }
        Ok(inner.status)
    }

    /// Continue a paused encoder; a no-op unless paused
    pub async fn resume(&self) -> RecorderResult<SessionStatus> {
        let mut inner = self.shared.inner.lock().await;
        if inner.status == SessionStatus::Paused {
            self.set_paused(&mut inner, false)?;
        } else {
            debug!("Resume ignored while {:?}", inner.status);
        }
        Ok(inner.status)
    }

    pub async fn toggle_pause(&self) -> RecorderResult<SessionStatus> {
        let mut inner = self.shared.inner.lock().await;
        match inner.status {
            SessionStatus::Recording => self.set_paused(&mut inner, true)?,
            SessionStatus::Paused => self.set_paused(&mut inner, false)?,
            status => debug!("Pause toggle ignored while {:?}", status),
        }
        Ok(inner.status)
    }

    fn set_paused(&self, inner: &mut Inner, paused: bool) -> RecorderResult<()> {
        if let Some(session) = inner.session.as_mut() {
            if let Some(recorder) = session.recorder.as_mut() {
                if paused {
                    recorder.pause()?;
                } else {
                    recorder.resume()?;
                }
            }
            session.paused.store(paused, Ordering::SeqCst);
        }

        let command = if paused {
            SessionCommand::Pause
        } else {
            SessionCommand::Resume
        };
        self.transition(inner, command);
        info!("Recording {}", if paused { "paused" } else { "resumed" });
        Ok(())
    }

    /// Stop the session
    ///
    /// During the countdown this cancels it and releases the screen without
    /// producing a file. While recording or paused, the encoder is flushed,
    /// every track is stopped and the capture is handed to the host for saving.
    pub async fn stop(&self) -> RecorderResult<StopResult> {
        let result = self.stop_session().await;
        if let Err(e) = &result {
            error!("Failed to finish recording: {}", e);
            self.publish_failure(e);
        }
        result
    }

    async fn stop_session(&self) -> RecorderResult<StopResult> {
        let mut inner = self.shared.inner.lock().await;
        match inner.status {
            SessionStatus::Countdown => {
                if let Some(mut session) = inner.session.take() {
                    session.release();
                    info!("Session {} cancelled during countdown", session.id);
                }
                self.transition(&mut inner, SessionCommand::Stop);
                return Ok(StopResult::CountdownCancelled);
            }
            SessionStatus::Recording | SessionStatus::Paused => {}
            status => {
                debug!("Stop ignored while {:?}", status);
                return Ok(StopResult::NotActive);
            }
        }

        let Some(mut session) = inner.session.take() else {
            self.force_idle(&mut inner);
            return Ok(StopResult::NotActive);
        };
        self.transition(&mut inner, SessionCommand::Stop);

        let mut mime_type = WEBM_VP9_MIME.to_string();
        if let Some(recorder) = session.recorder.as_mut() {
            mime_type = recorder.mime_type().to_string();
            if let Err(e) = recorder.stop().await {
                warn!("Encoder did not stop cleanly: {}", e);
            }
        }
        if let Some(ticker) = session.ticker.take() {
            ticker.abort();
        }
        // The chunk channel closes once the encoder has flushed
        if let Some(collector) = session.collector.take() {
            if let Err(e) = collector.await {
                warn!("Chunk collector failed: {}", e);
            }
        }

        let chunks = std::mem::take(&mut *session.chunks.lock().await);
        let duration_secs = session.duration.swap(0, Ordering::SeqCst);

        if let Err(e) = self.shared.host.hide_camera().await {
            warn!("Failed to hide camera bubble: {}", e);
        }
        if let Err(e) = self.shared.host.hide_cursor().await {
            warn!("Failed to hide cursor highlight: {}", e);
        }

        session.release();
        self.transition(&mut inner, SessionCommand::Finish);
        self.shared
            .events
            .publish(UiEvent::DurationTick { seconds: 0 });
        drop(inner);

        let blob = VideoBlob::from_chunks(&chunks, mime_type.clone());
        info!(
            "Session {} stopped after {}s: {} chunks, {} bytes",
            session.id,
            duration_secs,
            chunks.len(),
            blob.len()
        );

        let bytes = blob.len();
        let save = self
            .shared
            .host
            .save_video(blob, self.shared.config.output_extension.clone())
            .await?;

        Ok(StopResult::Finished(StopOutcome {
            session_id: session.id,
            duration_secs,
            chunk_count: chunks.len(),
            bytes,
            mime_type,
            save,
        }))
    }

    /// Drop any active session without saving
    pub async fn discard(&self) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(mut session) = inner.session.take() {
            if let Some(recorder) = session.recorder.as_mut() {
                if let Err(e) = recorder.stop().await {
                    debug!("Encoder stop during discard: {}", e);
                }
            }
            session.release();
            warn!("Discarded session {} without saving", session.id);
        }
        if inner.status != SessionStatus::Idle {
            self.force_idle(&mut inner);
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.inner.lock().await;
        match &inner.session {
            Some(session) => {
                let chunks = session.chunks.lock().await;
                SessionSnapshot {
                    status: inner.status,
                    session_id: Some(session.id),
                    started_at: Some(session.started_at),
                    duration_secs: session.duration.load(Ordering::SeqCst),
                    chunk_count: chunks.len(),
                    recorded_bytes: chunks.iter().map(Vec::len).sum(),
                    options: session.options.clone(),
                }
            }
            None => SessionSnapshot {
                status: inner.status,
                session_id: None,
                started_at: None,
                duration_secs: 0,
                chunk_count: 0,
                recorded_bytes: 0,
                options: self.shared.options.read().await.clone(),
            },
        }
    }

    /// Options for the next session
    pub async fn options(&self) -> RecordingOptions {
        self.shared.options.read().await.clone()
    }

    /// Replace the options used by the next session
    ///
    /// The active session, if any, keeps the options it started with.
    pub async fn update_options(&self, options: RecordingOptions) -> RecorderResult<RecordingOptions> {
        if let Some(id) = &options.microphone_id {
            let microphones = self.shared.microphones.read().await;
            if !microphones.is_empty() && !microphones.iter().any(|m| &m.device_id == id) {
                return Err(RecorderError::InvalidRequest(format!("unknown microphone '{}'", id)));
            }
        }

        info!(
            "Recording options: quality={}, highlighter={}, microphone={:?}",
            options.quality, options.highlighter_enabled, options.microphone_id
        );
        *self.shared.options.write().await = options.clone();
        Ok(options)
    }

    pub async fn set_quality(&self, quality: Quality) -> RecorderResult<RecordingOptions> {
        let mut options = self.options().await;
        options.quality = quality;
        self.update_options(options).await
    }

    pub async fn set_highlighter(&self, enabled: bool) -> RecorderResult<RecordingOptions> {
        let mut options = self.options().await;
        options.highlighter_enabled = enabled;
        self.update_options(options).await
    }

    pub async fn select_microphone(&self, device_id: impl Into<String>) -> RecorderResult<RecordingOptions> {
        let mut options = self.options().await;
        options.microphone_id = Some(device_id.into());
        self.update_options(options).await
    }

    /// Last enumerated microphones
    pub async fn microphones(&self) -> Vec<AudioDevice> {
        self.shared.microphones.read().await.clone()
    }

    /// Re-enumerate audio inputs
    ///
    /// Falls back to the first input when the selected one has gone away.
    pub async fn refresh_microphones(&self) -> RecorderResult<Vec<AudioDevice>> {
        let microphones: Vec<AudioDevice> = self
            .shared
            .media
            .enumerate_devices()
            .await?
            .into_iter()
            .filter(|device| device.kind == DeviceKind::AudioInput)
            .collect();

        {
            let mut options = self.shared.options.write().await;
            let selected_present = options
                .microphone_id
                .as_ref()
                .is_some_and(|id| microphones.iter().any(|m| &m.device_id == id));
            if !selected_present {
                options.microphone_id = microphones.first().map(|m| m.device_id.clone());
            }
        }

        info!("Found {} microphones", microphones.len());
        *self.shared.microphones.write().await = microphones.clone();
        Ok(microphones)
    }

    fn transition(&self, inner: &mut Inner, command: SessionCommand) -> bool {
        match inner.status.apply(command) {
            Some(next) => {
                debug!("Session {:?} -> {:?}", inner.status, next);
                inner.status = next;
                self.shared.status_tx.send_replace(next);
                self.shared
                    .events
                    .publish(UiEvent::StatusChanged { status: next });
                true
            }
            None => {
                debug!("Ignoring {:?} while {:?}", command, inner.status);
                false
            }
        }
    }

    /// Return to idle after a failure outside the normal transitions
    fn force_idle(&self, inner: &mut Inner) {
        inner.status = SessionStatus::Idle;
        self.shared.status_tx.send_replace(SessionStatus::Idle);
        self.shared.events.publish(UiEvent::StatusChanged {
            status: SessionStatus::Idle,
        });
    }

    fn publish_failure(&self, error: &RecorderError) {
        self.shared.events.publish(UiEvent::SessionFailed {
            error: error.into(),
        });
    }
}
