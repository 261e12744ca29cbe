pub mod frame;
pub mod graph;
pub mod mixer;

pub use frame::{AudioFrame, AudioStreamSource};
pub use graph::AudioGraph;
pub use mixer::{AudioMixer, MixerConfig};
