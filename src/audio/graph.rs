// Per-session audio mixing graph
//
// One source node per live audio track feeds a shared mixer; the mixer
// writes into a single destination track that the recorder consumes.
// A graph is built for each session and torn down with it.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::frame::AudioFrame;
use super::mixer::{AudioMixer, MixerConfig};
use crate::media::MediaTrack;

enum NodeMessage {
    Frame(usize, AudioFrame),
    Closed(usize),
}

pub struct AudioGraph {
    destination: MediaTrack,
    node_count: usize,
    node_tasks: Vec<JoinHandle<()>>,
    mixer_task: JoinHandle<()>,
}

impl AudioGraph {
    /// Connect every live audio track to a new destination track
    pub fn connect(tracks: &[MediaTrack], config: MixerConfig) -> Self {
        let destination = MediaTrack::audio("Mixed Audio");
        let (node_tx, mut node_rx) = mpsc::channel::<NodeMessage>(256);

        let receivers: Vec<(String, broadcast::Receiver<AudioFrame>)> = tracks
            .iter()
            .filter(|track| track.is_live())
            .filter_map(|track| track.subscribe_audio().map(|rx| (track.label().to_string(), rx)))
            .collect();
        let node_count = receivers.len();

        let node_tasks = receivers
            .into_iter()
            .enumerate()
            .map(|(index, (label, mut rx))| {
                let node_tx = node_tx.clone();
                tokio::spawn(async move {
                    debug!("Audio node {} connected to '{}'", index, label);
                    loop {
                        match rx.recv().await {
                            Ok(frame) => {
                                if node_tx.send(NodeMessage::Frame(index, frame)).await.is_err() {
                                    return;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                debug!("Audio node {} lagged by {} frames", index, skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    let _ = node_tx.send(NodeMessage::Closed(index)).await;
                })
            })
            .collect();
        drop(node_tx);

        let output = destination.clone();
        let mixer_task = tokio::spawn(async move {
            let mut mixer = AudioMixer::new(config, node_count);

            while let Some(message) = node_rx.recv().await {
                match message {
                    NodeMessage::Frame(index, frame) => mixer.push(index, frame),
                    NodeMessage::Closed(index) => mixer.close_input(index),
                }
                while let Some(mixed) = mixer.next_mixed() {
                    if !output.push_audio(mixed) {
                        return;
                    }
                }
            }

            for index in 0..node_count {
                mixer.close_input(index);
            }
            while let Some(mixed) = mixer.next_mixed() {
                output.push_audio(mixed);
            }
            output.stop();
        });

        info!("Audio graph connected with {} source nodes", node_count);

        Self {
            destination,
            node_count,
            node_tasks,
            mixer_task,
        }
    }

    /// The mixed output track
    pub fn destination(&self) -> MediaTrack {
        self.destination.clone()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Disconnect every node and end the destination track
    pub fn close(self) {
        for task in &self.node_tasks {
            task.abort();
        }
        self.mixer_task.abort();
        self.destination.stop();
        debug!("Audio graph closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioStreamSource;

    fn frame(value: i16, timestamp_ms: u64, source: AudioStreamSource) -> AudioFrame {
        AudioFrame {
            samples: vec![value; 4],
            sample_rate: 48000,
            channels: 2,
            timestamp_ms,
            source,
        }
    }

    #[tokio::test]
    async fn test_graph_mixes_screen_and_microphone() {
        let screen = MediaTrack::audio("System Audio");
        let mic = MediaTrack::audio("Microphone");
        let graph = AudioGraph::connect(&[screen.clone(), mic.clone()], MixerConfig::default());
        assert_eq!(graph.node_count(), 2);

        let mut output = graph.destination().subscribe_audio().unwrap();

        // Let the node tasks subscribe before frames are pushed
        tokio::task::yield_now().await;
        screen.push_audio(frame(100, 0, AudioStreamSource::Screen));
        mic.push_audio(frame(23, 0, AudioStreamSource::Microphone));

        let mixed = output.recv().await.unwrap();
        assert_eq!(mixed.samples, vec![123; 4]);
        assert_eq!(mixed.source, AudioStreamSource::Mixed);

        graph.close();
        screen.stop();
        mic.stop();
    }

    #[tokio::test]
    async fn test_ended_tracks_are_not_connected() {
        let live = MediaTrack::audio("live");
        let ended = MediaTrack::audio("ended");
        ended.stop();

        let graph = AudioGraph::connect(&[live.clone(), ended, MediaTrack::video("screen")], MixerConfig::default());
        assert_eq!(graph.node_count(), 1);
        graph.close();
    }

    #[tokio::test]
    async fn test_destination_ends_when_sources_end() {
        let screen = MediaTrack::audio("System Audio");
        let graph = AudioGraph::connect(&[screen.clone()], MixerConfig::default());
        let destination = graph.destination();
        let mut output = destination.subscribe_audio().unwrap();

        screen.stop();

        assert!(matches!(output.recv().await, Err(broadcast::error::RecvError::Closed)));
        assert!(!destination.is_live());
    }
}
