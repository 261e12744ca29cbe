use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

use crate::audio::AudioFrame;

const AUDIO_TRACK_CAPACITY: usize = 64;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Lifecycle of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Live,
    Ended,
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    live: AtomicBool,
    /// Present while an audio track is live; dropped on stop so subscribers see the end
    audio_tx: Mutex<Option<broadcast::Sender<AudioFrame>>>,
}

/// Handle to a single audio or video track
///
/// Clones share the same underlying track, so stopping any clone ends it everywhere.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn video(label: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, label.into(), None)
    }

    pub fn audio(label: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(AUDIO_TRACK_CAPACITY);
        Self::new(TrackKind::Audio, label.into(), Some(tx))
    }

    fn new(kind: TrackKind, label: String, audio_tx: Option<broadcast::Sender<AudioFrame>>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: uuid::Uuid::new_v4().to_string(),
                kind,
                label,
                live: AtomicBool::new(true),
                audio_tx: Mutex::new(audio_tx),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn ready_state(&self) -> TrackState {
        if self.is_live() {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }

    /// Stop the track. Idempotent.
    pub fn stop(&self) {
        if self.inner.live.swap(false, Ordering::SeqCst) {
            self.inner
                .audio_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            debug!("Stopped {:?} track '{}' ({})", self.inner.kind, self.inner.label, self.inner.id);
        }
    }

    /// Subscribe to the PCM frames of a live audio track
    pub fn subscribe_audio(&self) -> Option<broadcast::Receiver<AudioFrame>> {
        self.inner
            .audio_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    /// Deliver a frame to subscribers. Returns false once the track has ended.
    pub fn push_audio(&self, frame: AudioFrame) -> bool {
        let guard = self.inner.audio_tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                // No subscribers is fine; the frame is simply not heard
                let _ = tx.send(frame);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("state", &self.ready_state())
            .finish()
    }
}

/// An ordered set of tracks acquired together
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Video)
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == kind).cloned().collect()
    }

    /// True while at least one track is live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop every track in the stream
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioStreamSource;

    #[test]
    fn test_stream_partitions_tracks_by_kind() {
        let stream = MediaStream::new(vec![
            MediaTrack::video("screen"),
            MediaTrack::audio("system"),
            MediaTrack::audio("mic"),
        ]);

        assert_eq!(stream.video_tracks().len(), 1);
        assert_eq!(stream.audio_tracks().len(), 2);
        assert!(stream.is_active());

        stream.stop();
        assert!(!stream.is_active());
        assert!(stream.tracks().iter().all(|t| t.ready_state() == TrackState::Ended));
    }

    #[tokio::test]
    async fn test_stopping_audio_track_closes_subscribers() {
        let track = MediaTrack::audio("mic");
        let mut rx = track.subscribe_audio().unwrap();

        let frame = AudioFrame {
            samples: vec![1, 2],
            sample_rate: 48000,
            channels: 2,
            timestamp_ms: 0,
            source: AudioStreamSource::Microphone,
        };
        assert!(track.push_audio(frame));
        assert_eq!(rx.recv().await.unwrap().samples, vec![1, 2]);

        track.clone().stop();
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
        assert!(track.subscribe_audio().is_none());
    }

    #[test]
    fn test_video_track_has_no_audio() {
        let track = MediaTrack::video("camera");
        assert!(track.subscribe_audio().is_none());
        assert_eq!(track.kind(), TrackKind::Video);
    }
}
