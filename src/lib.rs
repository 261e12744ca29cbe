pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod http;
pub mod media;
pub mod nats;
pub mod permission;
pub mod persist;
pub mod session;

pub use app::App;
pub use audio::{AudioFrame, AudioGraph, AudioMixer, AudioStreamSource, MixerConfig};
pub use config::Config;
pub use error::{ErrorResponse, RecorderError, RecorderResult};
pub use events::{EventBus, UiEvent};
pub use host::{HeadlessDesktop, HostCommand, HostHandle, WindowHost};
pub use http::{create_router, AppState};
pub use media::{MediaDevices, MediaError, SyntheticMedia};
pub use nats::{EventMessage, NatsClient};
pub use permission::{PermissionGate, PermissionState};
pub use persist::{FfmpegTranscoder, SaveOutcome, VideoSaver};
pub use session::{RecordingOptions, SessionConfig, SessionController, SessionSnapshot, SessionStatus, StopResult};
