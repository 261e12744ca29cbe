// Audio mixer for combining the live audio tracks of a session
//
// Each connected track feeds one input of the mixer:
// - Screen audio (applications, browser, etc.)
// - Microphone input (user's voice)
//
// The mixer buffers frames per input, waits until every open input has
// data (or the oldest frame exceeds the buffering delay), and mixes the
// samples together using simple addition with clipping.

use std::collections::VecDeque;
use tracing::{debug, info, warn};

use super::frame::{AudioFrame, AudioStreamSource};

/// Configuration for audio mixer
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Sample rate expected on every input and produced on the output
    pub sample_rate: u32,
    /// Number of channels in output
    pub channels: u16,
    /// Maximum buffering delay in milliseconds (default: 200ms)
    /// A silent input cannot hold back the mix for longer than this
    pub max_buffer_delay_ms: u64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            max_buffer_delay_ms: 200,
        }
    }
}

/// Audio mixer that combines multiple audio inputs
pub struct AudioMixer {
    config: MixerConfig,
    /// Buffers for each input, indexed by graph node
    buffers: Vec<VecDeque<AudioFrame>>,
    /// Whether each input may still deliver frames
    open: Vec<bool>,
    current_position_ms: u64,
}

impl AudioMixer {
    pub fn new(config: MixerConfig, inputs: usize) -> Self {
        info!(
            "Audio mixer initialized: {}Hz, {} channels, {} inputs",
            config.sample_rate, config.channels, inputs
        );

        Self {
            config,
            buffers: (0..inputs).map(|_| VecDeque::new()).collect(),
            open: vec![true; inputs],
            current_position_ms: 0,
        }
    }

    pub fn input_count(&self) -> usize {
        self.buffers.len()
    }

    /// Buffer a frame for the given input
    pub fn push(&mut self, input: usize, frame: AudioFrame) {
        if frame.sample_rate != self.config.sample_rate {
            warn!(
                "Frame sample rate mismatch: expected {}, got {}. Dropping frame.",
                self.config.sample_rate, frame.sample_rate
            );
            return;
        }

        if frame.channels != self.config.channels {
            warn!(
                "Frame channel count mismatch: expected {}, got {}. Dropping frame.",
                self.config.channels, frame.channels
            );
            return;
        }

        let Some(buffer) = self.buffers.get_mut(input) else {
            warn!("Frame for unknown mixer input {}", input);
            return;
        };

        debug!(
            "Buffered {:?} frame on input {}: {}ms ({} samples)",
            frame.source,
            input,
            frame.timestamp_ms,
            frame.samples.len()
        );
        buffer.push_back(frame);

        self.cleanup_old_frames();
    }

    /// Mark an input as finished; its buffered frames are still mixed
    pub fn close_input(&mut self, input: usize) {
        if let Some(open) = self.open.get_mut(input) {
            *open = false;
        }
    }

    /// True once every input is closed and drained
    pub fn is_finished(&self) -> bool {
        self.open.iter().all(|open| !open) && self.buffers.iter().all(|b| b.is_empty())
    }

    /// Remove frames that are too old (beyond max buffer delay)
    fn cleanup_old_frames(&mut self) {
        let cutoff_time = self
            .current_position_ms
            .saturating_sub(self.config.max_buffer_delay_ms);

        for (input, buffer) in self.buffers.iter_mut().enumerate() {
            while let Some(frame) = buffer.front() {
                if frame.timestamp_ms < cutoff_time {
                    warn!(
                        "Dropping old frame on input {} at {}ms (current position: {}ms)",
                        input, frame.timestamp_ms, self.current_position_ms
                    );
                    buffer.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    fn ready(&self) -> bool {
        let oldest = self
            .buffers
            .iter()
            .filter_map(|b| b.front())
            .map(|f| f.timestamp_ms)
            .min();
        let Some(oldest) = oldest else {
            return false;
        };

        let all_open_have_data = self
            .buffers
            .iter()
            .zip(&self.open)
            .all(|(buffer, open)| !open || !buffer.is_empty());
        if all_open_have_data {
            return true;
        }

        let newest = self
            .buffers
            .iter()
            .filter_map(|b| b.back())
            .map(|f| f.timestamp_ms)
            .max()
            .unwrap_or(oldest);
        newest.saturating_sub(oldest) > self.config.max_buffer_delay_ms
    }

    /// Mix the next chunk of audio if enough input is buffered
    pub fn next_mixed(&mut self) -> Option<AudioFrame> {
        if !self.ready() {
            return None;
        }

        let frames: Vec<AudioFrame> = self
            .buffers
            .iter_mut()
            .filter_map(|buffer| buffer.pop_front())
            .collect();

        let mixed = self.mix_frames(&frames)?;
        self.current_position_ms = mixed.timestamp_ms;
        Some(mixed)
    }

    /// Mix frames together by adding their samples
    ///
    /// Uses the earliest timestamp and the longest frame; shorter frames
    /// are padded with silence.
    fn mix_frames(&self, frames: &[AudioFrame]) -> Option<AudioFrame> {
        let timestamp_ms = frames.iter().map(|f| f.timestamp_ms).min()?;
        let max_len = frames.iter().map(|f| f.samples.len()).max().unwrap_or(0);

        let mixed_samples: Vec<i16> = (0..max_len)
            .map(|i| {
                let sum: i32 = frames
                    .iter()
                    .map(|frame| frame.samples.get(i).copied().unwrap_or(0) as i32)
                    .sum();
                sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            })
            .collect();

        debug!(
            "Mixed {} frames at {}ms: {} samples total",
            frames.len(),
            timestamp_ms,
            mixed_samples.len()
        );

        Some(AudioFrame {
            samples: mixed_samples,
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            timestamp_ms,
            source: AudioStreamSource::Mixed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>, timestamp_ms: u64, source: AudioStreamSource) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 48000,
            channels: 2,
            timestamp_ms,
            source,
        }
    }

    #[test]
    fn test_mixer_creation() {
        let mixer = AudioMixer::new(MixerConfig::default(), 2);

        assert_eq!(mixer.input_count(), 2);
        assert_eq!(mixer.current_position_ms, 0);
        assert!(!mixer.is_finished());
    }

    #[test]
    fn test_mix_waits_for_every_open_input() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), 2);

        mixer.push(0, frame(vec![100, 200, 300], 0, AudioStreamSource::Screen));
        assert!(mixer.next_mixed().is_none(), "Microphone has not delivered yet");

        mixer.push(1, frame(vec![50, 100, 150], 0, AudioStreamSource::Microphone));
        let mixed = mixer.next_mixed().expect("both inputs buffered");

        assert_eq!(mixed.samples, vec![150, 300, 450]);
        assert_eq!(mixed.source, AudioStreamSource::Mixed);
    }

    #[test]
    fn test_mix_frames_with_clipping() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), 2);

        mixer.push(0, frame(vec![i16::MAX - 100, i16::MIN + 10], 0, AudioStreamSource::Screen));
        mixer.push(1, frame(vec![200, -200], 0, AudioStreamSource::Microphone));
        let mixed = mixer.next_mixed().unwrap();

        assert_eq!(mixed.samples[0], i16::MAX);
        assert_eq!(mixed.samples[1], i16::MIN);
    }

    #[test]
    fn test_mix_frames_different_lengths() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), 2);

        mixer.push(0, frame(vec![100, 200], 0, AudioStreamSource::Screen));
        mixer.push(1, frame(vec![50, 100, 150, 200], 0, AudioStreamSource::Microphone));
        let mixed = mixer.next_mixed().unwrap();

        assert_eq!(mixed.samples, vec![150, 300, 150, 200]);
    }

    #[test]
    fn test_closed_input_does_not_block() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), 2);

        mixer.close_input(1);
        mixer.push(0, frame(vec![7, 8], 40, AudioStreamSource::Screen));

        let mixed = mixer.next_mixed().unwrap();
        assert_eq!(mixed.samples, vec![7, 8]);
        assert_eq!(mixed.timestamp_ms, 40);
    }

    #[test]
    fn test_silent_input_bounded_by_buffer_delay() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), 2);

        for ts in [0, 100, 200] {
            mixer.push(0, frame(vec![1], ts, AudioStreamSource::Screen));
        }
        assert!(mixer.next_mixed().is_none(), "Still within the 200ms window");

        mixer.push(0, frame(vec![1], 300, AudioStreamSource::Screen));
        let mixed = mixer.next_mixed().unwrap();
        assert_eq!(mixed.timestamp_ms, 0);
    }

    #[test]
    fn test_mismatched_format_is_dropped() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), 1);

        let mut wrong_rate = frame(vec![1, 2], 0, AudioStreamSource::Screen);
        wrong_rate.sample_rate = 16000;
        mixer.push(0, wrong_rate);

        mixer.close_input(0);
        assert!(mixer.next_mixed().is_none());
        assert!(mixer.is_finished());
    }
}
