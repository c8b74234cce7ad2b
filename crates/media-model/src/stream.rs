//! Media streams and tracks.
//!
//! A [`MediaStream`] groups the tracks handed out by a capture provider.
//! Tracks wrap a pull-based source: video tracks expose the most recent
//! frame, audio tracks hand out mono samples on demand. Each track carries
//! an [`EndSignal`] that fires when the device stops producing (user revoked
//! sharing, device unplugged) or the track is stopped locally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clipcast_common::error::ClipcastResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A decoded RGBA video frame. Shared, never mutated after publication.
pub type VideoFrame = Arc<image::RgbaImage>;

/// Something that can produce the current video frame.
pub trait VideoSource: Send + Sync {
    /// The most recent frame, or `None` before the first frame is available.
    fn latest_frame(&self) -> Option<VideoFrame>;
}

/// Something that can produce mono audio samples.
pub trait AudioSource: Send + Sync {
    /// Pull exactly `frames` samples. A failing source returns an error and
    /// the caller decides whether to treat it as silence.
    fn pull(&self, frames: usize) -> ClipcastResult<Vec<f32>>;
}

/// A latched, cloneable "this has ended" notification.
#[derive(Clone)]
pub struct EndSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl EndSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Later calls are no-ops.
    pub fn end(&self) {
        self.tx.send_if_modified(|ended| {
            if *ended {
                false
            } else {
                *ended = true;
                true
            }
        });
    }

    pub fn is_ended(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has fired (immediately if it already has).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|ended| *ended).await;
    }
}

impl Default for EndSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EndSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndSignal")
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// A live video track.
#[derive(Clone)]
pub struct VideoTrack {
    id: String,
    label: String,
    source: Arc<dyn VideoSource>,
    enabled: Arc<AtomicBool>,
    ended: EndSignal,
}

impl VideoTrack {
    pub fn new(label: impl Into<String>, source: Arc<dyn VideoSource>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            source,
            enabled: Arc::new(AtomicBool::new(true)),
            ended: EndSignal::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current frame. Disabled and ended tracks yield nothing.
    pub fn latest_frame(&self) -> Option<VideoFrame> {
        if !self.is_enabled() || self.ended.is_ended() {
            return None;
        }
        self.source.latest_frame()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Stop the track. Fires its end signal.
    pub fn stop(&self) {
        self.ended.end();
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_ended()
    }

    pub fn end_signal(&self) -> &EndSignal {
        &self.ended
    }
}

impl std::fmt::Debug for VideoTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoTrack")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("enabled", &self.is_enabled())
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// A live audio track.
#[derive(Clone)]
pub struct AudioTrack {
    id: String,
    label: String,
    source: Arc<dyn AudioSource>,
    ended: EndSignal,
}

impl AudioTrack {
    pub fn new(label: impl Into<String>, source: Arc<dyn AudioSource>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            source,
            ended: EndSignal::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Pull samples. An ended track yields silence.
    pub fn pull(&self, frames: usize) -> ClipcastResult<Vec<f32>> {
        if self.ended.is_ended() {
            return Ok(vec![0.0; frames]);
        }
        self.source.pull(frames)
    }

    pub fn stop(&self) {
        self.ended.end();
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_ended()
    }

    pub fn end_signal(&self) -> &EndSignal {
        &self.ended
    }
}

impl std::fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTrack")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// What a stream was acquired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Display,
    Camera,
    Microphone,
    /// Produced locally by the live compositor or the exporter.
    Composite,
}

/// A group of tracks acquired together.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    kind: StreamKind,
    video: Vec<VideoTrack>,
    audio: Vec<AudioTrack>,
}

impl MediaStream {
    pub fn new(kind: StreamKind, video: Vec<VideoTrack>, audio: Vec<AudioTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            video,
            audio,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn video_tracks(&self) -> &[VideoTrack] {
        &self.video
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.audio
    }

    pub fn video_track(&self) -> Option<&VideoTrack> {
        self.video.first()
    }

    pub fn audio_track(&self) -> Option<&AudioTrack> {
        self.audio.first()
    }

    /// Whether any track is still producing.
    pub fn is_active(&self) -> bool {
        self.video.iter().any(|t| !t.is_ended()) || self.audio.iter().any(|t| !t.is_ended())
    }

    /// Stop every track. Idempotent.
    pub fn stop(&self) {
        for track in &self.video {
            track.stop();
        }
        for track in &self.audio {
            track.stop();
        }
    }
}

/// A video source fed by whoever renders into it (live compositor, exporter).
#[derive(Default)]
pub struct CanvasSource {
    frame: Mutex<Option<VideoFrame>>,
}

impl CanvasSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a freshly rendered frame.
    pub fn publish(&self, frame: image::RgbaImage) {
        *self.frame.lock() = Some(Arc::new(frame));
    }
}

impl VideoSource for CanvasSource {
    fn latest_frame(&self) -> Option<VideoFrame> {
        self.frame.lock().clone()
    }
}
