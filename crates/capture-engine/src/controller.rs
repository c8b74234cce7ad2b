//! Recording controller.
//!
//! Drives one recording session end to end: countdown, device acquisition,
//! audio mix, live preview, dual-stream recorder, and finalization into a
//! [`RecordedArtifact`]. Every state change goes through the
//! [`RecordingLifecycle`]; the controller never decides state on its own.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use clipcast_common::config::RecordingDefaults;
use clipcast_common::error::{ClipcastError, ClipcastResult, ErrorKind};
use clipcast_media_model::{
    EndSignal, MediaStream, ObjectUrlRegistry, RecordedArtifact, StreamKind, WebcamConfig,
    WebcamConfigHandle,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};

use crate::audio_mix::{AudioMixGraph, SourceId};
use crate::lifecycle::{RecordingLifecycle, RecordingState, StateChange, Subscription};
use crate::preview::LivePreview;
use crate::provider::{CaptureProvider, EncoderOptions, EncoderProvider};
use crate::recorder::{plan, DualStreamRecorder, RecorderInputs};
use crate::resources::SessionResources;

/// Which sources a session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingMode {
    ScreenAndCamera,
    ScreenOnly,
    CameraOnly,
}

impl RecordingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordingMode::ScreenAndCamera => "screen-and-camera",
            RecordingMode::ScreenOnly => "screen-only",
            RecordingMode::CameraOnly => "camera-only",
        }
    }

    pub fn uses_screen(self) -> bool {
        !matches!(self, RecordingMode::CameraOnly)
    }

    pub fn uses_camera(self) -> bool {
        !matches!(self, RecordingMode::ScreenOnly)
    }
}

impl std::fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal session error as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&ClipcastError> for SessionFailure {
    fn from(error: &ClipcastError) -> Self {
        let kind = error.kind();
        Self {
            kind,
            message: error.to_string(),
            retryable: kind.is_retryable(),
        }
    }
}

impl SessionFailure {
    pub fn to_error(&self) -> ClipcastError {
        ClipcastError::from_kind(self.kind, self.message.clone())
    }
}

#[derive(Default)]
struct ControllerState {
    resources: Option<SessionResources>,
    mic_source: Option<SourceId>,
    artifact: Option<RecordedArtifact>,
    failure: Option<SessionFailure>,
    countdown_cancel: Option<oneshot::Sender<()>>,
    /// Flips to `true` once the session watcher stored its result.
    finalized: Option<watch::Receiver<bool>>,
    /// Device kinds with a hot-toggle acquisition in flight.
    acquiring: HashSet<StreamKind>,
}

/// Holds a device kind in `ControllerState::acquiring` until dropped.
struct AcquireClaim {
    state: Arc<Mutex<ControllerState>>,
    kind: StreamKind,
}

impl AcquireClaim {
    fn take(state: &Arc<Mutex<ControllerState>>, kind: StreamKind) -> ClipcastResult<Self> {
        if !state.lock().acquiring.insert(kind) {
            return Err(ClipcastError::device_busy(format!(
                "{kind:?} acquisition already in progress"
            )));
        }
        Ok(Self {
            state: state.clone(),
            kind,
        })
    }
}

impl Drop for AcquireClaim {
    fn drop(&mut self) {
        self.state.lock().acquiring.remove(&self.kind);
    }
}

/// Owns the lifecycle and runs recording sessions against the providers.
pub struct RecordingController {
    lifecycle: RecordingLifecycle,
    capture: Arc<dyn CaptureProvider>,
    encoders: Arc<dyn EncoderProvider>,
    defaults: RecordingDefaults,
    encoder_options: EncoderOptions,
    webcam: WebcamConfigHandle,
    urls: Arc<ObjectUrlRegistry>,
    state: Arc<Mutex<ControllerState>>,
}

impl RecordingController {
    pub fn new(
        capture: Arc<dyn CaptureProvider>,
        encoders: Arc<dyn EncoderProvider>,
        defaults: RecordingDefaults,
        encoder_options: EncoderOptions,
    ) -> Self {
        let lifecycle = RecordingLifecycle::new(defaults.max_duration_secs);
        let state: Arc<Mutex<ControllerState>> = Arc::default();

        {
            let state = Arc::downgrade(&state);
            lifecycle.set_release_hook(move || {
                let resources = state
                    .upgrade()
                    .and_then(|state| state.lock().resources.clone());
                if let Some(resources) = resources {
                    resources.release();
                }
            });
        }

        let webcam = WebcamConfigHandle::new(WebcamConfig::bottom_right(
            defaults.canvas_width,
            defaults.canvas_height,
            defaults.webcam_size,
            defaults.webcam_padding,
        ));

        Self {
            lifecycle,
            capture,
            encoders,
            defaults,
            encoder_options,
            webcam,
            urls: Arc::new(ObjectUrlRegistry::new()),
            state,
        }
    }

    pub fn lifecycle(&self) -> &RecordingLifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> RecordingState {
        self.lifecycle.state()
    }

    /// Placement of the camera in the live composite.
    pub fn webcam_config(&self) -> WebcamConfigHandle {
        self.webcam.clone()
    }

    /// Registry for URLs of exported artifacts, shared with the exporter.
    pub fn url_registry(&self) -> Arc<ObjectUrlRegistry> {
        self.urls.clone()
    }

    /// The artifact of the last completed session.
    pub fn artifact(&self) -> Option<RecordedArtifact> {
        self.state.lock().artifact.clone()
    }

    pub fn last_failure(&self) -> Option<SessionFailure> {
        self.state.lock().failure.clone()
    }

    /// The live composite of the running session.
    pub fn preview(&self) -> Option<LivePreview> {
        self.current_resources()?.preview()
    }

    pub fn mix(&self) -> Option<AudioMixGraph> {
        self.current_resources()?.mix()
    }

    /// Run the countdown, acquire devices and start recording.
    ///
    /// Returns once the lifecycle is in `recording`. A session left in
    /// `completed` is reset first.
    pub async fn start(&self, mode: RecordingMode) -> ClipcastResult<()> {
        if self.lifecycle.state() == RecordingState::Completed {
            self.reset()?;
        }
        let from = self.lifecycle.state();
        if !self.lifecycle.transition(RecordingState::Initializing) {
            return Err(ClipcastError::invalid_transition(
                from,
                RecordingState::Initializing,
            ));
        }
        {
            let mut state = self.state.lock();
            state.failure = None;
            state.artifact = None;
            state.mic_source = None;
            state.finalized = None;
        }
        tracing::info!(mode = %mode, "Starting recording session");

        self.countdown().await?;

        let resources = SessionResources::new(self.capture.clone());
        self.state.lock().resources = Some(resources.clone());

        let screen = if mode.uses_screen() {
            match self.capture.acquire_screen().await {
                Ok(stream) => Some(stream),
                Err(e) => return Err(self.fail(&resources, e)),
            }
        } else {
            None
        };
        if let Some(stream) = &screen {
            resources.add_stream(stream.clone());
        }
        self.ensure_initializing(&resources)?;

        let camera = if mode.uses_camera() {
            match self.capture.acquire_camera().await {
                Ok(stream) => Some(stream),
                Err(e) if mode == RecordingMode::CameraOnly => {
                    return Err(self.fail(&resources, e));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Camera unavailable, recording screen only");
                    None
                }
            }
        } else {
            None
        };
        if let Some(stream) = &camera {
            resources.add_stream(stream.clone());
        }
        self.ensure_initializing(&resources)?;

        let microphone = match self.capture.acquire_microphone().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(error = %e, "Microphone unavailable, recording without it");
                None
            }
        };
        if let Some(stream) = &microphone {
            resources.add_stream(stream.clone());
        }
        self.ensure_initializing(&resources)?;

        let mix = self.build_mix(screen.as_ref(), microphone.as_ref());
        resources.set_mix(mix.clone());

        let screen_track = screen.as_ref().and_then(|s| s.video_track().cloned());
        let camera_track = camera.as_ref().and_then(|s| s.video_track().cloned());

        let preview = LivePreview::start(
            screen_track.clone(),
            camera_track.clone(),
            self.webcam.clone(),
            self.defaults.canvas_width,
            self.defaults.canvas_height,
            self.defaults.fps,
        );
        resources.set_preview(preview.clone());

        let primary_video = match &screen_track {
            Some(_) if self.defaults.composite_primary => Some(preview.track()),
            other => other.clone(),
        };
        let Some(recording_plan) = plan(RecorderInputs {
            screen: primary_video,
            camera: camera_track,
            audio: Some(mix.output_track()),
        }) else {
            return Err(self.fail(
                &resources,
                ClipcastError::device_not_found("no video source to record"),
            ));
        };

        let recorder = match DualStreamRecorder::start(
            self.encoders.as_ref(),
            recording_plan,
            &self.encoder_options,
            Duration::from_millis(self.defaults.slice_interval_ms),
            None,
        ) {
            Ok(recorder) => recorder,
            Err(e) => return Err(self.fail(&resources, e)),
        };

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let subscription = self.lifecycle.subscribe(move |change: &StateChange| {
            let _ = changes_tx.send(*change);
        });

        if !self.lifecycle.transition(RecordingState::Recording) {
            drop(recorder);
            resources.release();
            return Err(ClipcastError::invalid_transition(
                self.lifecycle.state(),
                RecordingState::Recording,
            ));
        }
        let session_id = self.lifecycle.session().session_id;

        let screen_ended = screen
            .as_ref()
            .and_then(|s| s.video_track())
            .map(|track| track.end_signal().clone());

        let (finalized_tx, finalized_rx) = watch::channel(false);
        self.state.lock().finalized = Some(finalized_rx);
        let watcher = tokio::spawn(watch_session(SessionWatch {
            lifecycle: self.lifecycle.clone(),
            state: self.state.clone(),
            recorder,
            resources: resources.clone(),
            _subscription: subscription,
            changes: changes_rx,
            screen_ended,
            session_id,
            finalized: finalized_tx,
        }));
        resources.add_task(watcher);
        Ok(())
    }

    /// Abort a running countdown. The session returns to `idle`.
    pub fn cancel_countdown(&self) -> bool {
        let cancel = self.state.lock().countdown_cancel.take();
        match cancel {
            Some(tx) => {
                tracing::info!("Countdown cancelled");
                tx.send(()).is_ok()
            }
            None => false,
        }
    }

    /// Stop recording and wait for the artifact.
    pub async fn stop(&self) -> ClipcastResult<RecordedArtifact> {
        let state = self.lifecycle.state();
        match state {
            RecordingState::Recording => {
                if !self.lifecycle.transition(RecordingState::Stopping) {
                    return Err(ClipcastError::invalid_transition(
                        self.lifecycle.state(),
                        RecordingState::Stopping,
                    ));
                }
            }
            // Auto-stop or a revoked screen share got there first.
            RecordingState::Stopping | RecordingState::Completed => {}
            other => {
                return Err(ClipcastError::invalid_transition(
                    other,
                    RecordingState::Stopping,
                ))
            }
        }
        self.finished().await
    }

    /// Wait until the running session completes (or fails) without
    /// requesting a stop.
    ///
    /// Any number of callers may wait at once; all of them see the same
    /// result.
    pub async fn finished(&self) -> ClipcastResult<RecordedArtifact> {
        let finalized = self.state.lock().finalized.clone();
        if let Some(mut finalized) = finalized {
            // A closed channel means the watcher ended early and left a failure.
            if finalized.wait_for(|done| *done).await.is_err() {
                tracing::debug!("Session watcher ended before finalizing");
            }
        }

        let state = self.state.lock();
        if let Some(artifact) = &state.artifact {
            return Ok(artifact.clone());
        }
        Err(state
            .failure
            .as_ref()
            .map(SessionFailure::to_error)
            .unwrap_or_else(|| ClipcastError::unknown("recording produced no artifact")))
    }

    /// Turn the microphone on or off while recording.
    ///
    /// Turning it off disconnects it from the mix and releases the device;
    /// turning it back on reuses the same gain stage.
    pub async fn toggle_microphone(&self, enabled: bool) -> ClipcastResult<()> {
        let resources = self.active_resources(RecordingState::Recording)?;
        let mix = resources
            .mix()
            .ok_or_else(|| ClipcastError::unknown("no audio mix in the running session"))?;
        let held = resources.stream(StreamKind::Microphone);

        if !enabled {
            if let Some(stream) = held {
                if let Some(id) = self.state.lock().mic_source {
                    mix.disconnect_source(id);
                }
                resources.remove_stream(stream.id());
                tracing::info!("Microphone muted");
            }
            return Ok(());
        }

        if held.is_some() {
            return Ok(());
        }
        let _claim = AcquireClaim::take(&self.state, StreamKind::Microphone)?;
        let stream = self.capture.acquire_microphone().await?;
        let Some(track) = stream.audio_track().cloned() else {
            self.capture.release(&stream);
            return Err(ClipcastError::device_not_found("microphone has no audio track"));
        };
        resources.add_stream(stream);

        let existing = self.state.lock().mic_source;
        let replaced = existing.is_some_and(|id| mix.replace_source(id, track.clone()));
        if !replaced {
            let id = mix
                .add_source(track, self.defaults.mic_gain)
                .ok_or_else(|| ClipcastError::unknown("audio mix closed while unmuting"))?;
            self.state.lock().mic_source = Some(id);
        }
        tracing::info!("Microphone unmuted");
        Ok(())
    }

    /// Show or hide the camera in the live composite.
    ///
    /// The camera recording itself is unaffected. Showing the camera when
    /// none was acquired opens it for the preview only.
    pub async fn toggle_webcam(&self, enabled: bool) -> ClipcastResult<()> {
        let resources = self.active_resources(RecordingState::Recording)?;
        let preview = resources
            .preview()
            .ok_or_else(|| ClipcastError::unknown("no live preview in the running session"))?;

        if !enabled {
            preview.set_camera(None);
            return Ok(());
        }

        let track = match resources
            .stream(StreamKind::Camera)
            .and_then(|s| s.video_track().cloned())
        {
            Some(track) => track,
            None => {
                let _claim = AcquireClaim::take(&self.state, StreamKind::Camera)?;
                let stream = self.capture.acquire_camera().await?;
                let track = stream
                    .video_track()
                    .cloned()
                    .ok_or_else(|| ClipcastError::device_not_found("camera has no video track"));
                resources.add_stream(stream);
                track?
            }
        };
        preview.set_camera(Some(track));
        Ok(())
    }

    /// Discard the last session and return to `idle`.
    ///
    /// Revokes every exported URL. From `error` this is the retry path.
    pub fn reset(&self) -> ClipcastResult<()> {
        let current = self.lifecycle.state();
        if current.is_active() {
            return Err(ClipcastError::invalid_transition(current, RecordingState::Idle));
        }

        let resources = {
            let mut state = self.state.lock();
            state.artifact = None;
            state.failure = None;
            state.mic_source = None;
            state.countdown_cancel = None;
            state.finalized = None;
            state.resources.take()
        };
        if let Some(resources) = resources {
            resources.release();
        }
        let revoked = self.urls.revoke_all();
        tracing::info!(revoked, "Session reset");

        if current != RecordingState::Idle && !self.lifecycle.transition(RecordingState::Idle) {
            return Err(ClipcastError::invalid_transition(
                self.lifecycle.state(),
                RecordingState::Idle,
            ));
        }
        Ok(())
    }

    async fn countdown(&self) -> ClipcastResult<()> {
        let secs = self.defaults.countdown_secs;
        if secs == 0 {
            return Ok(());
        }
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.state.lock().countdown_cancel = Some(cancel_tx);
        tracing::info!(secs, "Countdown started");

        let cancelled = tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => false,
            _ = cancel_rx => true,
        };
        self.state.lock().countdown_cancel = None;

        if cancelled {
            self.lifecycle.transition(RecordingState::Idle);
            return Err(ClipcastError::UserCancelled);
        }
        if self.lifecycle.state() != RecordingState::Initializing {
            return Err(ClipcastError::invalid_transition(
                self.lifecycle.state(),
                RecordingState::Recording,
            ));
        }
        Ok(())
    }

    fn build_mix(
        &self,
        screen: Option<&MediaStream>,
        microphone: Option<&MediaStream>,
    ) -> AudioMixGraph {
        let mut tracks = Vec::new();
        let mut gains = Vec::new();
        if let Some(track) = screen.and_then(MediaStream::audio_track) {
            tracks.push(track.clone());
            gains.push(self.defaults.display_audio_gain);
        }
        let has_mic = match microphone.and_then(MediaStream::audio_track) {
            Some(track) => {
                tracks.push(track.clone());
                gains.push(self.defaults.mic_gain);
                true
            }
            None => false,
        };

        let mix = AudioMixGraph::create_mixer(tracks, &gains, self.defaults.audio_sample_rate);
        if has_mic {
            self.state.lock().mic_source = mix.sources().last().map(|s| s.id);
        }
        mix
    }

    /// Record a fatal failure, move to `error` and release everything.
    fn fail(&self, resources: &SessionResources, error: ClipcastError) -> ClipcastError {
        let failure = SessionFailure::from(&error);
        tracing::warn!(
            kind = %failure.kind,
            retryable = failure.retryable,
            error = %error,
            "Recording session failed"
        );
        self.state.lock().failure = Some(failure);
        self.lifecycle.transition(RecordingState::Error);
        resources.release();
        error
    }

    /// Bail out if someone moved the lifecycle while we were acquiring.
    fn ensure_initializing(&self, resources: &SessionResources) -> ClipcastResult<()> {
        let state = self.lifecycle.state();
        if state == RecordingState::Initializing {
            return Ok(());
        }
        tracing::warn!(state = %state, "Session left initializing during acquisition");
        resources.release();
        Err(ClipcastError::invalid_transition(
            state,
            RecordingState::Recording,
        ))
    }

    fn current_resources(&self) -> Option<SessionResources> {
        self.state.lock().resources.clone()
    }

    fn active_resources(&self, required: RecordingState) -> ClipcastResult<SessionResources> {
        let state = self.lifecycle.state();
        if state != required {
            return Err(ClipcastError::invalid_transition(state, required));
        }
        self.current_resources()
            .filter(|r| !r.is_released())
            .ok_or_else(|| ClipcastError::unknown("no resources held by the running session"))
    }
}

impl std::fmt::Debug for RecordingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingController")
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

struct SessionWatch {
    lifecycle: RecordingLifecycle,
    state: Arc<Mutex<ControllerState>>,
    recorder: DualStreamRecorder,
    resources: SessionResources,
    _subscription: Subscription,
    changes: mpsc::UnboundedReceiver<StateChange>,
    screen_ended: Option<EndSignal>,
    session_id: u64,
    finalized: watch::Sender<bool>,
}

/// Waits for the session to leave `recording`, then finalizes it.
async fn watch_session(mut watch: SessionWatch) {
    let screen_ended = watch.screen_ended.take();
    let ended = async move {
        match screen_ended {
            Some(signal) => signal.wait().await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(ended);
    let mut screen_live = true;

    loop {
        tokio::select! {
            change = watch.changes.recv() => match change {
                Some(change) if change.session_id != watch.session_id => {}
                Some(change) if change.to == RecordingState::Stopping => break,
                Some(change) if change.to == RecordingState::Error => {
                    tracing::warn!(session_id = watch.session_id, "Session errored while recording");
                    drop(watch.recorder);
                    watch.resources.release();
                    return;
                }
                Some(_) => {}
                None => return,
            },
            _ = &mut ended, if screen_live => {
                screen_live = false;
                tracing::info!(session_id = watch.session_id, "Screen share ended, stopping");
                watch.lifecycle.transition(RecordingState::Stopping);
            }
        }
    }

    let SessionWatch {
        lifecycle,
        state,
        recorder,
        resources,
        finalized,
        ..
    } = watch;

    match recorder.stop().await {
        Ok(output) => {
            let duration = lifecycle.elapsed_secs();
            let artifact = RecordedArtifact::new(
                output.screen_blob().cloned(),
                output.camera_blob().cloned(),
                duration,
            );
            // No awaits past this point: release() also aborts this task.
            resources.release();
            tracing::info!(
                artifact = artifact.id(),
                duration_secs = duration,
                screen = artifact.screen_blob().is_some(),
                camera = artifact.camera_blob().is_some(),
                "Recording finalized"
            );
            state.lock().artifact = Some(artifact);
            lifecycle.transition(RecordingState::Completed);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Recorder failed to finalize");
            state.lock().failure = Some(SessionFailure::from(&e));
            resources.release();
            lifecycle.transition(RecordingState::Error);
        }
    }
    finalized.send_replace(true);
}
