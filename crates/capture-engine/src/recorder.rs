//! Dual-stream recorder.
//!
//! Screen (or its live composite) plus the mixed audio go to the primary
//! encoder; the camera, when recorded alongside a screen, goes to a
//! video-only secondary encoder. Stopping is a barrier: the output is
//! assembled only after every started encoder has flushed.

use std::sync::Arc;
use std::time::Duration;

use clipcast_common::error::{ClipcastError, ClipcastResult};
use clipcast_media_model::{AudioTrack, Blob, VideoTrack};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::provider::{Encoder, EncoderEvent, EncoderInput, EncoderOptions, EncoderProvider};

/// Tracks available to the recorder.
#[derive(Debug, Clone, Default)]
pub struct RecorderInputs {
    pub screen: Option<VideoTrack>,
    pub camera: Option<VideoTrack>,
    pub audio: Option<AudioTrack>,
}

/// Which source the primary encoder carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimarySource {
    Screen,
    Camera,
}

/// Encoder inputs decided by [`plan`].
#[derive(Debug, Clone)]
pub struct RecordingPlan {
    pub primary_source: PrimarySource,
    pub primary: EncoderInput,
    pub secondary: Option<EncoderInput>,
}

/// Classify the available tracks into primary and secondary inputs.
///
/// A screen always wins the primary slot and takes the audio with it; the
/// camera then records alone as the secondary. Without a screen the camera
/// is primary and nothing is secondary. Without either there is nothing to
/// record.
pub fn plan(inputs: RecorderInputs) -> Option<RecordingPlan> {
    match (inputs.screen, inputs.camera) {
        (Some(screen), camera) => Some(RecordingPlan {
            primary_source: PrimarySource::Screen,
            primary: EncoderInput {
                video: Some(screen),
                audio: inputs.audio,
            },
            secondary: camera.map(|camera| EncoderInput {
                video: Some(camera),
                audio: None,
            }),
        }),
        (None, Some(camera)) => Some(RecordingPlan {
            primary_source: PrimarySource::Camera,
            primary: EncoderInput {
                video: Some(camera),
                audio: inputs.audio,
            },
            secondary: None,
        }),
        (None, None) => None,
    }
}

type LatchCallback = Box<dyn FnOnce() + Send>;

struct LatchState {
    remaining: usize,
    on_done: Option<LatchCallback>,
}

/// Count-down latch that runs its callback exactly once when the count
/// reaches zero. A latch created with a count of zero fires immediately.
#[derive(Clone)]
pub struct StopLatch {
    state: Arc<Mutex<LatchState>>,
}

impl StopLatch {
    pub fn new<F>(count: usize, on_done: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        if count == 0 {
            on_done();
            return Self {
                state: Arc::new(Mutex::new(LatchState {
                    remaining: 0,
                    on_done: None,
                })),
            };
        }
        Self {
            state: Arc::new(Mutex::new(LatchState {
                remaining: count,
                on_done: Some(Box::new(on_done)),
            })),
        }
    }

    /// Count one participant down. Returns `true` for the call that fired
    /// the callback.
    pub fn count_down(&self) -> bool {
        let callback = {
            let mut state = self.state.lock();
            if state.remaining == 0 {
                return false;
            }
            state.remaining -= 1;
            if state.remaining > 0 {
                return false;
            }
            state.on_done.take()
        };
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }
}

impl std::fmt::Debug for StopLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopLatch")
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// What the recorder produced.
#[derive(Debug, Clone)]
pub struct RecorderOutput {
    pub primary_source: PrimarySource,
    pub primary: Option<Blob>,
    pub secondary: Option<Blob>,
    /// Encoder errors seen while recording. Finalization proceeds anyway.
    pub errors: Vec<String>,
}

impl RecorderOutput {
    pub fn screen_blob(&self) -> Option<&Blob> {
        match self.primary_source {
            PrimarySource::Screen => self.primary.as_ref(),
            PrimarySource::Camera => None,
        }
    }

    /// The camera recording: the secondary next to a screen, otherwise the
    /// primary itself.
    pub fn camera_blob(&self) -> Option<&Blob> {
        match self.primary_source {
            PrimarySource::Screen => self.secondary.as_ref(),
            PrimarySource::Camera => self.primary.as_ref(),
        }
    }
}

/// Called once with the assembled output, before [`DualStreamRecorder::stop`]
/// returns.
pub type FinalizeCallback = Box<dyn FnOnce(&RecorderOutput) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Primary,
    Secondary,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Secondary => "secondary",
        }
    }
}

#[derive(Default)]
struct Collected {
    primary: Option<Blob>,
    secondary: Option<Blob>,
    errors: Vec<String>,
}

/// A running pair of encoders.
pub struct DualStreamRecorder {
    primary_source: PrimarySource,
    encoders: Vec<(Role, Box<dyn Encoder>)>,
    collectors: Vec<JoinHandle<()>>,
    done: oneshot::Receiver<RecorderOutput>,
}

impl DualStreamRecorder {
    /// Create and start the encoders for `plan`.
    ///
    /// A primary that cannot be created or started is fatal. A failing
    /// secondary is logged and recording continues without it.
    pub fn start(
        provider: &dyn EncoderProvider,
        plan: RecordingPlan,
        options: &EncoderOptions,
        slice: Duration,
        on_finalize: Option<FinalizeCallback>,
    ) -> ClipcastResult<Self> {
        let collected = Arc::new(Mutex::new(Collected::default()));

        let mut primary = provider.create(Role::Primary.as_str(), plan.primary, options)?;
        let primary_events = primary
            .start(slice)
            .map_err(|e| ClipcastError::encoder(format!("primary encoder failed to start: {e}")))?;

        let mut started: Vec<(Role, Box<dyn Encoder>, mpsc::UnboundedReceiver<EncoderEvent>)> =
            vec![(Role::Primary, primary, primary_events)];

        if let Some(input) = plan.secondary {
            match provider
                .create(Role::Secondary.as_str(), input, options)
                .and_then(|mut encoder| encoder.start(slice).map(|events| (encoder, events)))
            {
                Ok((encoder, events)) => started.push((Role::Secondary, encoder, events)),
                Err(e) => {
                    tracing::warn!(error = %e, "Secondary encoder unavailable, recording primary only");
                    collected
                        .lock()
                        .errors
                        .push(format!("secondary encoder: {e}"));
                }
            }
        }

        let (done_tx, done) = oneshot::channel();
        let primary_source = plan.primary_source;
        let latch = {
            let collected = collected.clone();
            StopLatch::new(started.len(), move || {
                let collected = std::mem::take(&mut *collected.lock());
                let output = RecorderOutput {
                    primary_source,
                    primary: collected.primary,
                    secondary: collected.secondary,
                    errors: collected.errors,
                };
                tracing::info!(
                    primary_bytes = output.primary.as_ref().map(Blob::len).unwrap_or(0),
                    secondary_bytes = output.secondary.as_ref().map(Blob::len).unwrap_or(0),
                    errors = output.errors.len(),
                    "Recorder finalized"
                );
                if let Some(callback) = on_finalize {
                    callback(&output);
                }
                let _ = done_tx.send(output);
            })
        };

        let mut encoders = Vec::with_capacity(started.len());
        let mut collectors = Vec::with_capacity(started.len());
        for (role, encoder, events) in started {
            let mime_type = encoder.mime_type().to_string();
            collectors.push(tokio::spawn(collect(
                role,
                mime_type,
                events,
                collected.clone(),
                latch.clone(),
            )));
            encoders.push((role, encoder));
        }

        tracing::info!(
            primary = ?primary_source,
            encoders = encoders.len(),
            slice_ms = slice.as_millis() as u64,
            "Recorder started"
        );

        Ok(Self {
            primary_source,
            encoders,
            collectors,
            done,
        })
    }

    pub fn primary_source(&self) -> PrimarySource {
        self.primary_source
    }

    pub fn encoder_count(&self) -> usize {
        self.encoders.len()
    }

    /// Stop every encoder and wait until all of them have flushed.
    pub async fn stop(mut self) -> ClipcastResult<RecorderOutput> {
        for (role, encoder) in &mut self.encoders {
            tracing::debug!(role = role.as_str(), "Stopping encoder");
            encoder.stop();
        }
        let output = (&mut self.done)
            .await
            .map_err(|_| ClipcastError::encoder("recorder finalized without output"))?;
        for collector in self.collectors.drain(..) {
            if let Err(e) = collector.await {
                tracing::warn!(error = %e, "Encoder collector task failed");
            }
        }
        Ok(output)
    }
}

impl Drop for DualStreamRecorder {
    fn drop(&mut self) {
        for (_, encoder) in &mut self.encoders {
            encoder.stop();
        }
    }
}

impl std::fmt::Debug for DualStreamRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualStreamRecorder")
            .field("primary_source", &self.primary_source)
            .field("encoders", &self.encoders.len())
            .finish()
    }
}

async fn collect(
    role: Role,
    mime_type: String,
    mut events: mpsc::UnboundedReceiver<EncoderEvent>,
    collected: Arc<Mutex<Collected>>,
    latch: StopLatch,
) {
    let mut chunks: Vec<Vec<u8>> = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Chunk(chunk) => {
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
            }
            EncoderEvent::Error(e) => {
                tracing::warn!(role = role.as_str(), error = %e, "Encoder reported an error");
                collected.lock().errors.push(format!("{}: {e}", role.as_str()));
            }
            EncoderEvent::Stopped => break,
        }
    }

    let blob = Blob::from_chunks(&chunks, mime_type);
    tracing::debug!(
        role = role.as_str(),
        chunks = chunks.len(),
        bytes = blob.len(),
        "Encoder flushed"
    );
    {
        let mut collected = collected.lock();
        match role {
            Role::Primary => collected.primary = Some(blob),
            Role::Secondary => collected.secondary = Some(blob),
        }
    }
    latch.count_down();
}
