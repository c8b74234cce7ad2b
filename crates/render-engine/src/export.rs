//! Post-processing export.
//!
//! Plays a [`RecordedArtifact`] back, composites every frame with the chosen
//! layout and background, and re-encodes the result into one deliverable
//! blob with an object URL.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use clipcast_capture_engine::{
    AudioMixGraph, EncoderEvent, EncoderInput, EncoderOptions, EncoderProvider, RecordingLifecycle,
};
use clipcast_common::clock::{DriftMeasurement, RateController};
use clipcast_common::config::ExportDefaults;
use clipcast_common::error::{ClipcastError, ClipcastResult};
use clipcast_compositor::{render_layout, resolve_background, ResolvedBackground};
use clipcast_media_model::{
    BackgroundOption, Blob, CanvasSource, ExportJob, ExportStatus, ExportedArtifact, LayoutId,
    ObjectUrlRegistry, RecordedArtifact, VideoTrack,
};
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::duration::resolve_duration;
use crate::media::{MediaOpener, PlayableMedia};
use crate::progress::{ExportProgress, ExportStage, ProgressCallback, ProgressTracker};

/// Extra time the render loop waits for end-of-stream past the resolved
/// duration before giving up.
const END_OF_STREAM_GRACE: Duration = Duration::from_secs(5);

/// Slice interval of the export encoder.
const EXPORT_SLICE: Duration = Duration::from_secs(1);

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub job: ExportJob,
    pub exported: ExportedArtifact,
}

/// Renders recorded artifacts into single-file deliverables.
pub struct PostProcessor {
    opener: Arc<dyn MediaOpener>,
    encoders: Arc<dyn EncoderProvider>,
    urls: Arc<ObjectUrlRegistry>,
    lifecycle: Option<RecordingLifecycle>,
    settings: ExportDefaults,
    sample_rate: u32,
    in_flight: Arc<Mutex<HashSet<String>>>,
    jobs: Mutex<HashMap<String, ExportJob>>,
}

impl PostProcessor {
    pub fn new(
        opener: Arc<dyn MediaOpener>,
        encoders: Arc<dyn EncoderProvider>,
        urls: Arc<ObjectUrlRegistry>,
        settings: ExportDefaults,
    ) -> Self {
        Self {
            opener,
            encoders,
            urls,
            lifecycle: None,
            settings,
            sample_rate: 48000,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Refuse exports while `lifecycle` has a session holding devices.
    pub fn with_lifecycle(mut self, lifecycle: RecordingLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    pub fn settings(&self) -> &ExportDefaults {
        &self.settings
    }

    pub fn is_exporting(&self, artifact_id: &str) -> bool {
        self.in_flight.lock().contains(artifact_id)
    }

    /// Latest job recorded for `artifact_id`, including failed ones.
    pub fn job(&self, artifact_id: &str) -> Option<ExportJob> {
        self.jobs.lock().get(artifact_id).cloned()
    }

    /// Export `artifact` with `layout` over `background`.
    ///
    /// At most one export per artifact runs at a time; a second request is
    /// rejected with `ExportInProgress` rather than queued.
    pub async fn export(
        &self,
        artifact: &RecordedArtifact,
        layout: LayoutId,
        background: &BackgroundOption,
        progress: Option<ProgressCallback>,
    ) -> ClipcastResult<ExportResult> {
        if let Some(lifecycle) = &self.lifecycle {
            let state = lifecycle.state();
            if state.is_active() {
                return Err(ClipcastError::export(format!(
                    "cannot export while a recording is {state}"
                )));
            }
        }
        let _claim = InFlightClaim::acquire(&self.in_flight, artifact.id())?;

        let mut job = ExportJob::new(artifact, layout, background.clone());
        job.status = ExportStatus::Running;
        self.store(&job);

        let mut reporter = Reporter {
            callback: progress,
            tracker: ProgressTracker::new(),
            frames: 0,
        };
        reporter.report(ExportStage::Preparing, ExportStatus::Running);
        tracing::info!(
            artifact = artifact.id(),
            job = %job.id,
            layout = %layout,
            background = %background.id,
            "Starting export"
        );

        match self.run(artifact, layout, background, &mut reporter).await {
            Ok(blob) => {
                let url = self.urls.create_url(&blob);
                job.progress = reporter.tracker.finish();
                job.status = ExportStatus::Done;
                self.store(&job);
                reporter.report(ExportStage::Complete, ExportStatus::Done);
                tracing::info!(
                    job = %job.id,
                    bytes = blob.len(),
                    frames = reporter.frames,
                    "Export finished"
                );
                Ok(ExportResult {
                    job,
                    exported: ExportedArtifact { blob, url },
                })
            }
            Err(e) => {
                job.progress = reporter.tracker.value();
                job.status = ExportStatus::Error;
                job.error = Some(e.to_string());
                self.store(&job);
                reporter.report(ExportStage::Failed, ExportStatus::Error);
                tracing::warn!(job = %job.id, error = %e, "Export failed");
                Err(e)
            }
        }
    }

    fn store(&self, job: &ExportJob) {
        self.jobs
            .lock()
            .insert(job.artifact_id.clone(), job.clone());
    }

    async fn run(
        &self,
        artifact: &RecordedArtifact,
        layout: LayoutId,
        background: &BackgroundOption,
        reporter: &mut Reporter,
    ) -> ClipcastResult<Blob> {
        let primary_blob = artifact
            .primary_blob()
            .ok_or_else(|| ClipcastError::export("artifact has no recording to export"))?;
        let primary = self
            .opener
            .open(primary_blob)
            .await
            .map_err(|e| ClipcastError::export(format!("failed to open recording: {e}")))?;
        let secondary = match artifact.secondary_blob() {
            Some(blob) => match self.opener.open(blob).await {
                Ok(media) => Some(media),
                Err(e) => {
                    tracing::warn!(error = %e, "Camera recording unavailable, exporting without it");
                    None
                }
            },
            None => None,
        };

        reporter.report(ExportStage::ResolvingDuration, ExportStatus::Running);
        let probe_timeout = Duration::from_millis(self.settings.duration_probe_timeout_ms);
        let duration = resolve_duration(primary.as_ref(), artifact.duration_secs(), probe_timeout).await;

        reporter.report(ExportStage::Seeking, ExportStatus::Running);
        tokio::try_join!(primary.seek(0.0), async {
            match &secondary {
                Some(media) => media.seek(0.0).await,
                None => Ok(()),
            }
        })?;

        let sources = if artifact.screen_blob().is_some() {
            Sources {
                screen: Some(primary.clone()),
                camera: secondary,
            }
        } else {
            Sources {
                screen: None,
                camera: Some(primary.clone()),
            }
        };

        let mix = AudioMixGraph::create_mixer(Vec::new(), &[], self.sample_rate);
        if let Some(audio) = primary.audio_track() {
            mix.add_source(audio, 1.0);
        }

        let outcome = self
            .render(
                &primary,
                &sources,
                &mix,
                layout,
                &resolve_background(background),
                duration,
                reporter,
            )
            .await;
        mix.close();
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn render(
        &self,
        primary: &Arc<dyn PlayableMedia>,
        sources: &Sources,
        mix: &AudioMixGraph,
        layout: LayoutId,
        background: &ResolvedBackground,
        duration: f64,
        reporter: &mut Reporter,
    ) -> ClipcastResult<Blob> {
        let width = self.settings.width.max(1);
        let height = self.settings.height.max(1);
        let canvas = Arc::new(CanvasSource::new());
        canvas.publish(sources.compose(width, height, layout, background));

        let options = EncoderOptions {
            mime_type: self.settings.mime_type.clone(),
            video_bits_per_second: self.settings.video_bits_per_second,
            frame_rate: self.settings.fps,
        };
        let mut encoder = self.encoders.create(
            "export",
            EncoderInput {
                video: Some(VideoTrack::new("export-canvas", canvas.clone())),
                audio: Some(mix.output_track()),
            },
            &options,
        )?;
        let events = encoder.start(EXPORT_SLICE)?;
        let collector = tokio::spawn(collect_chunks(events));

        sources.play();
        let rendered = self
            .render_loop(primary, sources, &canvas, layout, background, duration, reporter)
            .await;
        sources.pause();

        reporter.report(ExportStage::Finalizing, ExportStatus::Running);
        encoder.stop();
        let output = collector
            .await
            .map_err(|e| ClipcastError::export(format!("encoder collector failed: {e}")))?;
        rendered?;
        if let Some(first) = output.errors.first() {
            return Err(ClipcastError::export(format!(
                "encoder reported {} error(s), first: {first}",
                output.errors.len()
            )));
        }

        let blob = Blob::from_chunks(&output.chunks, encoder.mime_type());
        if blob.is_empty() {
            return Err(ClipcastError::export("encoder produced no output"));
        }
        Ok(blob)
    }

    #[allow(clippy::too_many_arguments)]
    async fn render_loop(
        &self,
        primary: &Arc<dyn PlayableMedia>,
        sources: &Sources,
        canvas: &CanvasSource,
        layout: LayoutId,
        background: &ResolvedBackground,
        duration: f64,
        reporter: &mut Reporter,
    ) -> ClipcastResult<()> {
        let width = self.settings.width.max(1);
        let height = self.settings.height.max(1);
        let deadline = Instant::now() + Duration::from_secs_f64(duration.max(0.0)) + END_OF_STREAM_GRACE;
        let mut ticker = tokio::time::interval(RateController::new(self.settings.fps).interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut realignments = 0u64;

        loop {
            ticker.tick().await;

            if let (Some(_), Some(camera)) = (&sources.screen, &sources.camera) {
                let drift = DriftMeasurement::from_secs(primary.current_time(), camera.current_time());
                if !camera.is_ended() && drift.exceeds_threshold_ms(self.settings.drift_tolerance_ms) {
                    tracing::debug!(drift_ms = drift.drift_ms(), "Re-aligning camera playback");
                    if let Err(e) = camera.seek(primary.current_time()).await {
                        tracing::warn!(error = %e, "Camera re-alignment failed");
                    }
                    realignments += 1;
                }
            }

            canvas.publish(sources.compose(width, height, layout, background));
            reporter.frames += 1;
            reporter.tracker.update(primary.current_time(), duration);
            reporter.report(ExportStage::Rendering, ExportStatus::Running);

            if primary.is_ended() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(ClipcastError::export(format!(
                    "recording did not reach its end within {:.1}s",
                    duration + END_OF_STREAM_GRACE.as_secs_f64()
                )));
            }
        }

        tracing::debug!(frames = reporter.frames, realignments, "Render loop finished");
        Ok(())
    }
}

impl std::fmt::Debug for PostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessor")
            .field("settings", &self.settings)
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

/// Media feeding the screen and camera slots of the layout.
struct Sources {
    screen: Option<Arc<dyn PlayableMedia>>,
    camera: Option<Arc<dyn PlayableMedia>>,
}

impl Sources {
    fn each(&self) -> impl Iterator<Item = &Arc<dyn PlayableMedia>> {
        self.screen.iter().chain(self.camera.iter())
    }

    fn play(&self) {
        self.each().for_each(|media| media.play());
    }

    fn pause(&self) {
        self.each().for_each(|media| media.pause());
    }

    fn compose(
        &self,
        width: u32,
        height: u32,
        layout: LayoutId,
        background: &ResolvedBackground,
    ) -> RgbaImage {
        let screen = self.screen.as_ref().and_then(|m| m.current_frame());
        let camera = self.camera.as_ref().and_then(|m| m.current_frame());
        let mut frame = RgbaImage::new(width, height);
        render_layout(
            &mut frame,
            layout,
            screen.as_deref(),
            camera.as_deref(),
            background,
        );
        frame
    }
}

struct Reporter {
    callback: Option<ProgressCallback>,
    tracker: ProgressTracker,
    frames: u64,
}

impl Reporter {
    fn report(&self, stage: ExportStage, status: ExportStatus) {
        if let Some(callback) = &self.callback {
            callback(ExportProgress {
                progress: self.tracker.value(),
                frames_rendered: self.frames,
                stage,
                status,
            });
        }
    }
}

/// Marks an artifact as exporting until dropped.
struct InFlightClaim {
    set: Arc<Mutex<HashSet<String>>>,
    artifact_id: String,
}

impl InFlightClaim {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, artifact_id: &str) -> ClipcastResult<Self> {
        if !set.lock().insert(artifact_id.to_string()) {
            tracing::warn!(artifact = artifact_id, "Rejected duplicate export");
            return Err(ClipcastError::ExportInProgress {
                artifact: artifact_id.to_string(),
            });
        }
        Ok(Self {
            set: set.clone(),
            artifact_id: artifact_id.to_string(),
        })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.set.lock().remove(&self.artifact_id);
    }
}

/// Everything an encoder emitted up to `Stopped`.
#[derive(Default)]
struct EncoderOutput {
    chunks: Vec<Vec<u8>>,
    errors: Vec<ClipcastError>,
}

async fn collect_chunks(mut events: mpsc::UnboundedReceiver<EncoderEvent>) -> EncoderOutput {
    let mut output = EncoderOutput::default();
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Chunk(chunk) if !chunk.is_empty() => output.chunks.push(chunk),
            EncoderEvent::Chunk(_) => {}
            EncoderEvent::Error(e) => {
                tracing::warn!(error = %e, "Export encoder reported an error");
                output.errors.push(e);
            }
            EncoderEvent::Stopped => break,
        }
    }
    output
}
