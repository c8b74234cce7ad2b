//! Audio mix graph.
//!
//! Every input flows through its own gain stage into a single summing
//! output. Inputs can be added, disconnected, replaced or removed while the
//! output is being pulled; none of these touch the other inputs.

use std::sync::Arc;

use clipcast_common::error::ClipcastResult;
use clipcast_media_model::{AudioSource, AudioTrack};
use parking_lot::Mutex;

/// Identifier of an input within one graph.
pub type SourceId = u64;

/// Snapshot of one input's gain stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSourceHandle {
    pub id: SourceId,
    pub label: String,
    pub gain: f32,
    pub connected: bool,
}

struct MixInput {
    id: SourceId,
    track: Option<AudioTrack>,
    gain: f32,
    connected: bool,
}

struct MixState {
    inputs: Vec<MixInput>,
    next_id: SourceId,
    sample_rate: u32,
    closed: bool,
}

/// A live N-to-1 audio mixer. Clones share the same graph.
#[derive(Clone)]
pub struct AudioMixGraph {
    state: Arc<Mutex<MixState>>,
}

impl AudioMixGraph {
    /// Build a graph over `sources`, pairing each with the gain at the same
    /// index. Missing gains default to unity. Zero sources are allowed and
    /// produce a silent output.
    pub fn create_mixer(sources: Vec<AudioTrack>, gains: &[f32], sample_rate: u32) -> Self {
        let graph = Self {
            state: Arc::new(Mutex::new(MixState {
                inputs: Vec::new(),
                next_id: 0,
                sample_rate,
                closed: false,
            })),
        };
        for (index, track) in sources.into_iter().enumerate() {
            graph.add_source(track, gains.get(index).copied().unwrap_or(1.0));
        }
        tracing::debug!(inputs = graph.sources().len(), sample_rate, "Created audio mix graph");
        graph
    }

    pub fn sample_rate(&self) -> u32 {
        self.state.lock().sample_rate
    }

    /// Connect a new input. Returns its id, or `None` once the graph is
    /// closed.
    pub fn add_source(&self, track: AudioTrack, gain: f32) -> Option<SourceId> {
        let mut state = self.state.lock();
        if state.closed {
            tracing::warn!(label = track.label(), "Audio mix is closed, ignoring new source");
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        tracing::info!(id, label = track.label(), gain, "Connected audio source");
        state.inputs.push(MixInput {
            id,
            track: Some(track),
            gain: sanitize_gain(gain),
            connected: true,
        });
        Some(id)
    }

    /// Disconnect an input but keep its gain stage for a later
    /// [`replace_source`](Self::replace_source).
    pub fn disconnect_source(&self, id: SourceId) -> bool {
        let mut state = self.state.lock();
        match state.inputs.iter_mut().find(|input| input.id == id) {
            Some(input) => {
                input.track = None;
                input.connected = false;
                tracing::info!(id, "Disconnected audio source");
                true
            }
            None => false,
        }
    }

    /// Drop an input and its gain stage entirely.
    pub fn remove_source(&self, id: SourceId) -> bool {
        let mut state = self.state.lock();
        let before = state.inputs.len();
        state.inputs.retain(|input| input.id != id);
        let removed = state.inputs.len() != before;
        if removed {
            tracing::info!(id, "Removed audio source");
        }
        removed
    }

    /// Hot-swap the track behind an input, keeping its gain.
    pub fn replace_source(&self, id: SourceId, track: AudioTrack) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            tracing::warn!(id, label = track.label(), "Audio mix is closed, ignoring replacement");
            return false;
        }
        match state.inputs.iter_mut().find(|input| input.id == id) {
            Some(input) => {
                tracing::info!(id, label = track.label(), "Replaced audio source");
                input.track = Some(track);
                input.connected = true;
                true
            }
            None => false,
        }
    }

    pub fn set_gain(&self, id: SourceId, gain: f32) -> bool {
        let mut state = self.state.lock();
        match state.inputs.iter_mut().find(|input| input.id == id) {
            Some(input) => {
                input.gain = sanitize_gain(gain);
                true
            }
            None => false,
        }
    }

    pub fn sources(&self) -> Vec<AudioSourceHandle> {
        self.state
            .lock()
            .inputs
            .iter()
            .map(|input| AudioSourceHandle {
                id: input.id,
                label: input
                    .track
                    .as_ref()
                    .map(|t| t.label().to_string())
                    .unwrap_or_default(),
                gain: input.gain,
                connected: input.connected,
            })
            .collect()
    }

    /// Pull `frames` mixed samples, clamped to `[-1, 1]`.
    ///
    /// A failing input is marked disconnected and contributes silence from
    /// then on.
    pub fn pull_mixed(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        let mut state = self.state.lock();
        if state.closed {
            return out;
        }

        for input in state.inputs.iter_mut().filter(|input| input.connected) {
            let Some(track) = input.track.as_ref() else {
                continue;
            };
            match track.pull(frames) {
                Ok(samples) => {
                    for (acc, sample) in out.iter_mut().zip(samples.iter()) {
                        *acc += sample * input.gain;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        id = input.id,
                        label = track.label(),
                        error = %e,
                        "Audio source failed, disconnecting"
                    );
                    input.connected = false;
                    input.track = None;
                }
            }
        }

        for sample in &mut out {
            *sample = sample.clamp(-1.0, 1.0);
        }
        out
    }

    /// The mixed output as a track that encoders can pull from.
    pub fn output_track(&self) -> AudioTrack {
        AudioTrack::new(
            "mix",
            Arc::new(MixOutput {
                graph: self.clone(),
            }),
        )
    }

    /// Close the graph. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.inputs.clear();
        tracing::debug!("Closed audio mix graph");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl std::fmt::Debug for AudioMixGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixGraph")
            .field("sources", &self.sources())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn sanitize_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain.max(0.0)
    } else {
        1.0
    }
}

struct MixOutput {
    graph: AudioMixGraph,
}

impl AudioSource for MixOutput {
    fn pull(&self, frames: usize) -> ClipcastResult<Vec<f32>> {
        Ok(self.graph.pull_mixed(frames))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use clipcast_common::error::ClipcastError;

    use super::*;

    struct Constant(f32);

    impl AudioSource for Constant {
        fn pull(&self, frames: usize) -> ClipcastResult<Vec<f32>> {
            Ok(vec![self.0; frames])
        }
    }

    /// Fails once `revoked` is set, like a device whose permission was pulled.
    struct Revocable {
        revoked: Arc<AtomicBool>,
    }

    impl AudioSource for Revocable {
        fn pull(&self, frames: usize) -> ClipcastResult<Vec<f32>> {
            if self.revoked.load(Ordering::SeqCst) {
                Err(ClipcastError::permission_blocked("microphone revoked"))
            } else {
                Ok(vec![0.1; frames])
            }
        }
    }

    fn constant(label: &str, value: f32) -> AudioTrack {
        AudioTrack::new(label, Arc::new(Constant(value)))
    }

    #[test]
    fn test_zero_sources_is_silent() {
        let graph = AudioMixGraph::create_mixer(Vec::new(), &[], 48000);
        let output = graph.output_track();
        assert_eq!(output.pull(4).unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn test_gains_apply_per_source() {
        let graph = AudioMixGraph::create_mixer(
            vec![constant("display", 0.2), constant("mic", 0.1)],
            &[0.7, 1.5],
            48000,
        );
        let mixed = graph.pull_mixed(2);
        assert!((mixed[0] - (0.2 * 0.7 + 0.1 * 1.5)).abs() < 1e-6);
    }

    #[test]
    fn test_output_is_clamped() {
        let graph = AudioMixGraph::create_mixer(
            vec![constant("a", 0.9), constant("b", 0.9)],
            &[1.0, 1.0],
            48000,
        );
        assert_eq!(graph.pull_mixed(1), vec![1.0]);
    }

    #[test]
    fn test_removing_one_source_keeps_the_other() {
        let graph = AudioMixGraph::create_mixer(
            vec![constant("display", 0.2), constant("mic", 0.3)],
            &[1.0, 1.0],
            48000,
        );
        let ids: Vec<SourceId> = graph.sources().iter().map(|s| s.id).collect();
        assert!(graph.remove_source(ids[1]));
        let mixed = graph.pull_mixed(3);
        assert!(mixed.iter().all(|s| (*s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_hot_swap_keeps_gain() {
        let graph = AudioMixGraph::create_mixer(vec![constant("mic", 0.1)], &[1.5], 48000);
        let id = graph.sources()[0].id;

        assert!(graph.disconnect_source(id));
        assert_eq!(graph.pull_mixed(1), vec![0.0]);

        assert!(graph.replace_source(id, constant("mic-2", 0.2)));
        let handle = &graph.sources()[0];
        assert!(handle.connected);
        assert_eq!(handle.gain, 1.5);
        assert!((graph.pull_mixed(1)[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_failing_source_is_disconnected() {
        let revoked = Arc::new(AtomicBool::new(false));
        let graph = AudioMixGraph::create_mixer(
            vec![
                constant("display", 0.2),
                AudioTrack::new(
                    "mic",
                    Arc::new(Revocable {
                        revoked: revoked.clone(),
                    }),
                ),
            ],
            &[1.0, 1.0],
            48000,
        );

        assert!((graph.pull_mixed(1)[0] - 0.3).abs() < 1e-6);
        revoked.store(true, Ordering::SeqCst);
        assert!((graph.pull_mixed(1)[0] - 0.2).abs() < 1e-6);
        assert!(!graph.sources()[1].connected);
        assert!((graph.pull_mixed(1)[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_close_is_idempotent_and_silences() {
        let graph = AudioMixGraph::create_mixer(vec![constant("display", 0.5)], &[1.0], 48000);
        let output = graph.output_track();
        assert!(graph.close());
        assert!(!graph.close());
        assert_eq!(output.pull(2).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_closed_graph_ignores_new_sources() {
        let graph = AudioMixGraph::create_mixer(vec![constant("display", 0.5)], &[1.0], 48000);
        let display = graph.sources()[0].id;
        graph.close();

        assert_eq!(graph.add_source(constant("mic", 0.3), 1.5), None);
        assert!(!graph.replace_source(display, constant("mic", 0.3)));
        let sources = graph.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].label, "display");
        assert_eq!(graph.pull_mixed(2), vec![0.0, 0.0]);
    }
}
