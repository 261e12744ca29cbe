//! Synthetic capture backend
//!
//! Produces generated tracks and a text-framed recorder so the whole session
//! lifecycle can run without OS capture APIs (tests, headless hosts, demos).
//! Every request is counted so callers can assert which streams were acquired.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant};
use tracing::{debug, info};

use super::devices::{AudioDevice, DeviceKind, DisplayConstraints, MediaDevices, UserMediaConstraints};
use super::recorder::{MediaRecorder, RecorderOptions, RecorderState, WEBM_VP9_MIME};
use super::track::{MediaStream, MediaTrack};
use super::MediaError;
use crate::audio::{AudioFrame, AudioStreamSource};

/// EBML magic that opens every Matroska/WebM file
const EBML_MAGIC: [u8; 4] = [0x1a, 0x45, 0xdf, 0xa3];

/// How camera/microphone requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionBehavior {
    Allow,
    /// One-time refusal (prompt dismissed)
    Deny,
    /// Refusal enforced by OS privacy settings
    Block,
}

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub permission: PermissionBehavior,
    pub microphones: Vec<AudioDevice>,
    /// Attach a system-audio track to screen captures
    pub screen_audio: bool,
    pub supported_mime_types: Vec<String>,
    pub audio_frame_interval: Duration,
    pub sample_rate: u32,
    pub channels: u16,
    pub amplitude: i16,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            permission: PermissionBehavior::Allow,
            microphones: vec![AudioDevice {
                device_id: "default".to_string(),
                label: "Synthetic Microphone".to_string(),
                kind: DeviceKind::AudioInput,
            }],
            screen_audio: true,
            supported_mime_types: vec![WEBM_VP9_MIME.to_string(), "video/webm".to_string()],
            audio_frame_interval: Duration::from_millis(20),
            sample_rate: 48000,
            channels: 2,
            amplitude: 1000,
        }
    }
}

/// Generated media devices
pub struct SyntheticMedia {
    config: SyntheticConfig,
    permission: Mutex<PermissionBehavior>,
    display_requests: AtomicUsize,
    user_media_requests: AtomicUsize,
    last_display: Mutex<Option<DisplayConstraints>>,
    issued: Mutex<Vec<MediaTrack>>,
}

impl SyntheticMedia {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            permission: Mutex::new(config.permission),
            config,
            display_requests: AtomicUsize::new(0),
            user_media_requests: AtomicUsize::new(0),
            last_display: Mutex::new(None),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Change how subsequent camera/microphone requests are answered
    pub fn set_permission(&self, behavior: PermissionBehavior) {
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    pub fn display_requests(&self) -> usize {
        self.display_requests.load(Ordering::SeqCst)
    }

    pub fn user_media_requests(&self) -> usize {
        self.user_media_requests.load(Ordering::SeqCst)
    }

    pub fn last_display_constraints(&self) -> Option<DisplayConstraints> {
        self.last_display.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Tracks handed out so far that have not been stopped
    pub fn live_tracks(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|track| track.is_live())
            .count()
    }

    fn issue(&self, track: MediaTrack) -> MediaTrack {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(track.clone());
        track
    }

    fn audio_track(&self, label: &str, source: AudioStreamSource) -> MediaTrack {
        let track = self.issue(MediaTrack::audio(label));
        spawn_tone(track.clone(), &self.config, source);
        track
    }
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

/// Feed a constant-amplitude square wave into an audio track until it ends
fn spawn_tone(track: MediaTrack, config: &SyntheticConfig, source: AudioStreamSource) {
    let frame_interval = config.audio_frame_interval;
    let samples_per_frame = (config.sample_rate as u128 * frame_interval.as_millis() / 1000) as usize
        * config.channels as usize;
    let sample_rate = config.sample_rate;
    let channels = config.channels;
    let amplitude = config.amplitude;

    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = interval(frame_interval);
        loop {
            ticker.tick().await;
            let frame = AudioFrame {
                samples: (0..samples_per_frame)
                    .map(|i| if (i / 64) % 2 == 0 { amplitude } else { -amplitude })
                    .collect(),
                sample_rate,
                channels,
                timestamp_ms: started.elapsed().as_millis() as u64,
                source,
            };
            if !track.push_audio(frame) {
                break;
            }
        }
        debug!("Synthetic tone for '{}' finished", track.label());
    });
}

#[async_trait]
impl MediaDevices for SyntheticMedia {
    async fn display_media(&self, constraints: &DisplayConstraints) -> Result<MediaStream, MediaError> {
        self.display_requests.fetch_add(1, Ordering::SeqCst);
        *self.last_display.lock().unwrap_or_else(PoisonError::into_inner) = Some(constraints.clone());

        info!(
            "Synthetic display capture of {} at {}x{}",
            constraints.source_id, constraints.max_width, constraints.max_height
        );

        let mut tracks = vec![self.issue(MediaTrack::video(format!("Screen {}", constraints.source_id)))];
        if constraints.audio && self.config.screen_audio {
            tracks.push(self.audio_track("System Audio", AudioStreamSource::Screen));
        }
        Ok(MediaStream::new(tracks))
    }

    async fn user_media(&self, constraints: &UserMediaConstraints) -> Result<MediaStream, MediaError> {
        self.user_media_requests.fetch_add(1, Ordering::SeqCst);

        let behavior = *self.permission.lock().unwrap_or_else(PoisonError::into_inner);
        match behavior {
            PermissionBehavior::Allow => {}
            PermissionBehavior::Deny => {
                return Err(MediaError::Aborted("Permission dismissed".to_string()))
            }
            PermissionBehavior::Block => {
                return Err(MediaError::NotAllowed("Permission denied".to_string()))
            }
        }

        let mut tracks = Vec::new();
        if let Some(audio) = &constraints.audio {
            let device = match &audio.device_id {
                Some(id) => self.config.microphones.iter().find(|d| &d.device_id == id),
                None => self.config.microphones.first(),
            };
            let device = device.ok_or_else(|| {
                MediaError::NotFound(audio.device_id.clone().unwrap_or_else(|| "microphone".to_string()))
            })?;
            tracks.push(self.audio_track(&device.label, AudioStreamSource::Microphone));
        }
        if constraints.video {
            tracks.push(self.issue(MediaTrack::video("Synthetic Camera")));
        }

        Ok(MediaStream::new(tracks))
    }

    async fn enumerate_devices(&self) -> Result<Vec<AudioDevice>, MediaError> {
        let mut devices = self.config.microphones.clone();
        devices.push(AudioDevice {
            device_id: "synthetic-camera".to_string(),
            label: "Synthetic Camera".to_string(),
            kind: DeviceKind::VideoInput,
        });
        Ok(devices)
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.config
            .supported_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime_type))
    }

    fn create_recorder(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> Result<Box<dyn MediaRecorder>, MediaError> {
        if !self.is_type_supported(&options.mime_type) {
            return Err(MediaError::NotSupported(options.mime_type));
        }
        Ok(Box::new(SyntheticRecorder::new(stream, options)))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Recorder that emits one text cluster per timeslice
///
/// Each cluster records how many audio samples arrived while recording, so
/// paused stretches are visibly absent from the output.
pub struct SyntheticRecorder {
    stream: MediaStream,
    options: RecorderOptions,
    state_tx: watch::Sender<RecorderState>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticRecorder {
    pub fn new(stream: MediaStream, options: RecorderOptions) -> Self {
        let (state_tx, _) = watch::channel(RecorderState::Inactive);
        Self {
            stream,
            options,
            state_tx,
            stop_tx: None,
            task: None,
        }
    }
}

async fn next_frame(rx: &mut Option<broadcast::Receiver<AudioFrame>>) -> AudioFrame {
    loop {
        match rx {
            Some(receiver) => match receiver.recv().await {
                Ok(frame) => return frame,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => *rx = None,
            },
            None => futures::future::pending::<()>().await,
        }
    }
}

fn cluster(sequence: u64, samples: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    if sequence == 0 {
        bytes.extend_from_slice(&EBML_MAGIC);
        bytes.extend_from_slice(b"webm\n");
    }
    bytes.extend_from_slice(format!("cluster {} samples={}\n", sequence, samples).as_bytes());
    bytes
}

#[async_trait]
impl MediaRecorder for SyntheticRecorder {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, MediaError> {
        if *self.state_tx.borrow() != RecorderState::Inactive || self.task.is_some() {
            return Err(MediaError::InvalidState("recorder already started".to_string()));
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let state_rx = self.state_tx.subscribe();
        let mut audio_rx = self
            .stream
            .audio_tracks()
            .first()
            .and_then(MediaTrack::subscribe_audio);
        let timeslice = self.options.timeslice;

        self.state_tx.send_replace(RecorderState::Recording);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + timeslice, timeslice);
            let mut sequence = 0u64;
            let mut pending_samples = 0usize;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *state_rx.borrow() == RecorderState::Recording {
                            if chunk_tx.send(cluster(sequence, pending_samples)).await.is_err() {
                                break;
                            }
                            sequence += 1;
                            pending_samples = 0;
                        }
                    }
                    frame = next_frame(&mut audio_rx) => {
                        if *state_rx.borrow() == RecorderState::Recording {
                            pending_samples += frame.samples.len();
                        }
                    }
                    _ = &mut stop_rx => {
                        // Flush whatever was encoded since the last timeslice
                        let _ = chunk_tx.send(cluster(sequence, pending_samples)).await;
                        break;
                    }
                }
            }
            debug!("Synthetic recorder emitted {} clusters", sequence + 1);
        });

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);

        Ok(chunk_rx)
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        if *self.state_tx.borrow() != RecorderState::Recording {
            return Err(MediaError::InvalidState("recorder is not recording".to_string()));
        }
        self.state_tx.send_replace(RecorderState::Paused);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), MediaError> {
        if *self.state_tx.borrow() != RecorderState::Paused {
            return Err(MediaError::InvalidState("recorder is not paused".to_string()));
        }
        self.state_tx.send_replace(RecorderState::Recording);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), MediaError> {
        self.state_tx.send_replace(RecorderState::Inactive);

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| MediaError::Aborted(format!("recorder task failed: {}", e)))?;
        }
        Ok(())
    }

    fn state(&self) -> RecorderState {
        *self.state_tx.borrow()
    }

    fn mime_type(&self) -> &str {
        &self.options.mime_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::UserMediaConstraints;

    #[tokio::test(start_paused = true)]
    async fn test_recorder_skips_paused_timeslices() {
        let media = SyntheticMedia::default();
        let stream = MediaStream::new(vec![MediaTrack::video("screen")]);
        let mut recorder = media
            .create_recorder(
                stream,
                RecorderOptions {
                    mime_type: WEBM_VP9_MIME.to_string(),
                    timeslice: Duration::from_secs(1),
                },
            )
            .unwrap();

        let mut chunks = recorder.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        recorder.pause().unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        recorder.resume().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        recorder.stop().await.unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = chunks.recv().await {
            received.push(chunk);
        }

        // Two slices before the pause, one after, plus the final flush
        assert_eq!(received.len(), 4);
        assert!(received[0].starts_with(&EBML_MAGIC));
        assert_eq!(recorder.state(), RecorderState::Inactive);
    }

    #[tokio::test]
    async fn test_pause_requires_recording() {
        let media = SyntheticMedia::default();
        let mut recorder = media
            .create_recorder(MediaStream::new(vec![]), RecorderOptions::default())
            .unwrap();

        assert!(matches!(recorder.pause(), Err(MediaError::InvalidState(_))));
        assert!(matches!(recorder.resume(), Err(MediaError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_unsupported_mime_is_rejected() {
        let media = SyntheticMedia::default();
        let result = media.create_recorder(
            MediaStream::new(vec![]),
            RecorderOptions {
                mime_type: "video/mp4".to_string(),
                timeslice: Duration::from_secs(1),
            },
        );
        assert!(matches!(result, Err(MediaError::NotSupported(_))));
    }

    #[tokio::test]
    async fn test_blocked_permission_reports_not_allowed() {
        let media = SyntheticMedia::new(SyntheticConfig {
            permission: PermissionBehavior::Block,
            ..SyntheticConfig::default()
        });

        let result = media
            .user_media(&UserMediaConstraints::camera_and_microphone())
            .await;
        assert!(matches!(result, Err(MediaError::NotAllowed(_))));
        assert_eq!(media.user_media_requests(), 1);
    }

    #[tokio::test]
    async fn test_unknown_microphone_not_found() {
        let media = SyntheticMedia::default();
        let result = media
            .user_media(&UserMediaConstraints::microphone(Some("missing".to_string())))
            .await;
        assert!(matches!(result, Err(MediaError::NotFound(_))));
    }
}
