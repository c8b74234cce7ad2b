//! Synthetic capture and encoder providers.
//!
//! Deterministic stand-ins for real devices and codecs: solid-color video,
//! sine-tone audio, and an encoder that writes sample records instead of a
//! compressed bitstream. Used by tests and by `clipcast simulate`.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipcast_common::clock::{RateController, RecordingClock};
use clipcast_common::error::{ClipcastError, ClipcastResult, ErrorKind};
use clipcast_media_model::samples::{encode_records, rms, FrameSample, SampleRecord, SAMPLES_MIME};
use clipcast_media_model::{
    AudioSource, AudioTrack, MediaStream, StreamKind, VideoFrame, VideoSource, VideoTrack,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::provider::{CaptureProvider, Encoder, EncoderEvent, EncoderInput, EncoderOptions, EncoderProvider};

/// A video source that always shows the same frame.
pub struct SolidColorSource {
    frame: VideoFrame,
}

impl SolidColorSource {
    pub fn new(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self {
            frame: Arc::new(RgbaImage::from_pixel(width.max(1), height.max(1), color)),
        }
    }
}

impl VideoSource for SolidColorSource {
    fn latest_frame(&self) -> Option<VideoFrame> {
        Some(self.frame.clone())
    }
}

/// A continuous sine tone.
pub struct SineSource {
    frequency_hz: f64,
    amplitude: f32,
    sample_rate: u32,
    phase: Mutex<f64>,
}

impl SineSource {
    pub fn new(frequency_hz: f64, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            frequency_hz,
            amplitude,
            sample_rate: sample_rate.max(1),
            phase: Mutex::new(0.0),
        }
    }
}

impl AudioSource for SineSource {
    fn pull(&self, frames: usize) -> ClipcastResult<Vec<f32>> {
        let step = TAU * self.frequency_hz / self.sample_rate as f64;
        let mut phase = self.phase.lock();
        let samples = (0..frames)
            .map(|_| {
                let sample = self.amplitude * phase.sin() as f32;
                *phase = (*phase + step) % TAU;
                sample
            })
            .collect();
        Ok(samples)
    }
}

/// Appearance of the synthetic devices.
#[derive(Debug, Clone)]
pub struct SyntheticDevices {
    pub screen_size: (u32, u32),
    pub screen_color: Rgba<u8>,
    pub camera_size: (u32, u32),
    pub camera_color: Rgba<u8>,
    /// Whether the shared display carries a system audio track.
    pub system_audio: bool,
    pub system_tone_hz: f64,
    pub mic_tone_hz: f64,
    pub amplitude: f32,
    pub sample_rate: u32,
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self {
            screen_size: (160, 90),
            screen_color: Rgba([30, 60, 200, 255]),
            camera_size: (64, 48),
            camera_color: Rgba([220, 80, 40, 255]),
            system_audio: true,
            system_tone_hz: 440.0,
            mic_tone_hz: 220.0,
            amplitude: 0.25,
            sample_rate: 48000,
        }
    }
}

/// Capture provider backed by synthetic devices.
pub struct SyntheticCaptureProvider {
    devices: SyntheticDevices,
    denials: Mutex<HashMap<StreamKind, ErrorKind>>,
    live: Mutex<HashMap<String, MediaStream>>,
    acquisitions: Mutex<HashMap<StreamKind, usize>>,
    releases: AtomicUsize,
}

impl SyntheticCaptureProvider {
    pub fn new() -> Self {
        Self::with_devices(SyntheticDevices::default())
    }

    pub fn with_devices(devices: SyntheticDevices) -> Self {
        Self {
            devices,
            denials: Mutex::new(HashMap::new()),
            live: Mutex::new(HashMap::new()),
            acquisitions: Mutex::new(HashMap::new()),
            releases: AtomicUsize::new(0),
        }
    }

    /// Make every later acquisition of `kind` fail with `error`.
    pub fn deny(&self, kind: StreamKind, error: ErrorKind) {
        self.denials.lock().insert(kind, error);
    }

    pub fn allow(&self, kind: StreamKind) {
        self.denials.lock().remove(&kind);
    }

    /// Simulate the user pressing "stop sharing": the screen video ends.
    pub fn end_screen_share(&self) -> bool {
        let live = self.live.lock();
        let mut ended = false;
        for stream in live.values().filter(|s| s.kind() == StreamKind::Display) {
            for track in stream.video_tracks() {
                track.stop();
                ended = true;
            }
        }
        ended
    }

    /// Successful acquisitions of `kind` so far.
    pub fn acquisitions(&self, kind: StreamKind) -> usize {
        self.acquisitions.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Streams released so far. Each stream counts once.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Streams acquired and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    fn check(&self, kind: StreamKind) -> ClipcastResult<()> {
        match self.denials.lock().get(&kind) {
            Some(error) => Err(ClipcastError::from_kind(
                *error,
                format!("synthetic {kind:?} denied"),
            )),
            None => Ok(()),
        }
    }

    fn register(&self, stream: MediaStream) -> MediaStream {
        *self.acquisitions.lock().entry(stream.kind()).or_insert(0) += 1;
        self.live
            .lock()
            .insert(stream.id().to_string(), stream.clone());
        tracing::debug!(kind = ?stream.kind(), id = stream.id(), "Synthetic stream acquired");
        stream
    }
}

impl Default for SyntheticCaptureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureProvider for SyntheticCaptureProvider {
    async fn acquire_screen(&self) -> ClipcastResult<MediaStream> {
        self.check(StreamKind::Display)?;
        let d = &self.devices;
        let video = VideoTrack::new(
            "synthetic-screen",
            Arc::new(SolidColorSource::new(
                d.screen_size.0,
                d.screen_size.1,
                d.screen_color,
            )),
        );
        let audio = if d.system_audio {
            vec![AudioTrack::new(
                "synthetic-system-audio",
                Arc::new(SineSource::new(d.system_tone_hz, d.amplitude, d.sample_rate)),
            )]
        } else {
            Vec::new()
        };
        Ok(self.register(MediaStream::new(StreamKind::Display, vec![video], audio)))
    }

    async fn acquire_camera(&self) -> ClipcastResult<MediaStream> {
        self.check(StreamKind::Camera)?;
        let d = &self.devices;
        let video = VideoTrack::new(
            "synthetic-camera",
            Arc::new(SolidColorSource::new(
                d.camera_size.0,
                d.camera_size.1,
                d.camera_color,
            )),
        );
        Ok(self.register(MediaStream::new(StreamKind::Camera, vec![video], Vec::new())))
    }

    async fn acquire_microphone(&self) -> ClipcastResult<MediaStream> {
        self.check(StreamKind::Microphone)?;
        let d = &self.devices;
        let audio = AudioTrack::new(
            "synthetic-microphone",
            Arc::new(SineSource::new(d.mic_tone_hz, d.amplitude, d.sample_rate)),
        );
        Ok(self.register(MediaStream::new(
            StreamKind::Microphone,
            Vec::new(),
            vec![audio],
        )))
    }

    fn release(&self, stream: &MediaStream) {
        stream.stop();
        if self.live.lock().remove(stream.id()).is_some() {
            self.releases.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(kind = ?stream.kind(), id = stream.id(), "Synthetic stream released");
        }
    }
}

/// Encoder provider whose encoders write [`SampleRecord`] lines.
pub struct MemoryEncoderProvider {
    sample_fps: u32,
    sample_rate: u32,
    failing: Mutex<HashSet<String>>,
    started: Arc<AtomicUsize>,
}

impl MemoryEncoderProvider {
    /// Sample the inputs `sample_fps` times per second.
    pub fn new(sample_fps: u32, sample_rate: u32) -> Self {
        Self {
            sample_fps: sample_fps.max(1),
            sample_rate: sample_rate.max(1),
            failing: Mutex::new(HashSet::new()),
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make encoders created with `label` fail on creation.
    pub fn fail_label(&self, label: &str) {
        self.failing.lock().insert(label.to_string());
    }

    /// Encoders started so far.
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl EncoderProvider for MemoryEncoderProvider {
    fn create(
        &self,
        label: &str,
        input: EncoderInput,
        _options: &EncoderOptions,
    ) -> ClipcastResult<Box<dyn Encoder>> {
        if self.failing.lock().contains(label) {
            return Err(ClipcastError::encoder(format!(
                "synthetic encoder '{label}' unavailable"
            )));
        }
        if input.is_empty() {
            return Err(ClipcastError::encoder(format!(
                "encoder '{label}' has no tracks"
            )));
        }
        Ok(Box::new(MemoryEncoder {
            label: label.to_string(),
            input,
            sample_fps: self.sample_fps,
            sample_rate: self.sample_rate,
            started: self.started.clone(),
            stop_tx: None,
            task: None,
        }))
    }
}

/// One in-memory encoder.
pub struct MemoryEncoder {
    label: String,
    input: EncoderInput,
    sample_fps: u32,
    sample_rate: u32,
    started: Arc<AtomicUsize>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Encoder for MemoryEncoder {
    fn start(
        &mut self,
        slice: Duration,
    ) -> ClipcastResult<mpsc::UnboundedReceiver<EncoderEvent>> {
        if self.task.is_some() {
            return Err(ClipcastError::encoder(format!(
                "encoder '{}' already started",
                self.label
            )));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let sampler = Sampler {
            input: self.input.clone(),
            frames_per_tick: (self.sample_rate / self.sample_fps).max(1) as usize,
        };
        let period = RateController::new(self.sample_fps).interval();
        let slice = if slice.is_zero() {
            Duration::from_secs(1)
        } else {
            slice
        };

        self.task = Some(tokio::spawn(run_encoder(
            self.label.clone(),
            sampler,
            period,
            slice,
            events_tx,
            stop_rx,
        )));
        self.stop_tx = Some(stop_tx);
        self.started.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(label = %self.label, "Memory encoder started");
        Ok(events_rx)
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    fn mime_type(&self) -> &str {
        SAMPLES_MIME
    }
}

struct Sampler {
    input: EncoderInput,
    frames_per_tick: usize,
}

impl Sampler {
    fn sample(
        &self,
        t: f64,
        events: &mpsc::UnboundedSender<EncoderEvent>,
    ) -> SampleRecord {
        let video = self
            .input
            .video
            .as_ref()
            .and_then(|track| track.latest_frame())
            .map(|frame| FrameSample::from_frame(&frame));
        let audio_rms = self
            .input
            .audio
            .as_ref()
            .and_then(|track| match track.pull(self.frames_per_tick) {
                Ok(samples) => Some(rms(&samples)),
                Err(e) => {
                    let _ = events.send(EncoderEvent::Error(e));
                    None
                }
            });
        SampleRecord {
            t,
            video,
            audio_rms,
        }
    }
}

async fn run_encoder(
    label: String,
    sampler: Sampler,
    period: Duration,
    slice: Duration,
    events: mpsc::UnboundedSender<EncoderEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let clock = RecordingClock::start();
    let mut sample_ticker = tokio::time::interval(period);
    sample_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut slice_ticker = tokio::time::interval_at(clock.epoch() + slice, slice);
    let mut pending: Vec<SampleRecord> = Vec::new();

    let flush = |pending: &mut Vec<SampleRecord>| {
        if pending.is_empty() {
            return;
        }
        match encode_records(pending) {
            Ok(bytes) => {
                let _ = events.send(EncoderEvent::Chunk(bytes));
            }
            Err(e) => {
                let _ = events.send(EncoderEvent::Error(e));
            }
        }
        pending.clear();
    };

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = slice_ticker.tick() => flush(&mut pending),
            _ = sample_ticker.tick() => {
                pending.push(sampler.sample(clock.elapsed_secs(), &events));
            }
        }
    }

    flush(&mut pending);
    tracing::debug!(label = %label, elapsed_secs = clock.elapsed_secs(), "Memory encoder stopped");
    let _ = events.send(EncoderEvent::Stopped);
}
