use std::sync::Arc;
use std::time::Duration;

use clipcast_capture_engine::synthetic::{MemoryEncoderProvider, SyntheticCaptureProvider, SyntheticDevices};
use clipcast_capture_engine::{
    Encoder, EncoderEvent, EncoderInput, EncoderOptions, EncoderProvider, RecordingController,
    RecordingMode,
};
use clipcast_common::config::{ExportDefaults, RecordingDefaults};
use clipcast_common::error::{ClipcastError, ClipcastResult, ErrorKind};
use clipcast_media_model::samples::{decode_records, encode_records, FrameSample, SampleRecord, SAMPLES_MIME};
use clipcast_media_model::{
    BackgroundOption, Blob, ExportStatus, LayoutId, ObjectUrlRegistry, RecordedArtifact,
};
use clipcast_render_engine::{ExportProgress, ExportStage, PostProcessor, SampleMediaOpener};
use parking_lot::Mutex;
use tokio::sync::mpsc;

const SCREEN: [u8; 4] = [30, 60, 200, 255];
const CAMERA: [u8; 4] = [220, 80, 40, 255];

fn clip(width: u32, height: u32, rgba: [u8; 4], audio: bool, secs: f64) -> Blob {
    let count = (secs * 10.0).round() as usize;
    let records: Vec<SampleRecord> = (0..count)
        .map(|i| SampleRecord {
            t: i as f64 * 0.1,
            video: Some(FrameSample {
                width,
                height,
                rgba,
            }),
            audio_rms: audio.then_some(0.2),
        })
        .collect();
    Blob::new(encode_records(&records).unwrap(), SAMPLES_MIME)
}

fn settings() -> ExportDefaults {
    ExportDefaults {
        width: 320,
        height: 180,
        fps: 30,
        duration_probe_timeout_ms: 1000,
        ..ExportDefaults::default()
    }
}

struct Fixture {
    encoders: Arc<MemoryEncoderProvider>,
    urls: Arc<ObjectUrlRegistry>,
    processor: Arc<PostProcessor>,
}

fn fixture() -> Fixture {
    let encoders = Arc::new(MemoryEncoderProvider::new(10, 48000));
    let urls = Arc::new(ObjectUrlRegistry::new());
    let processor = Arc::new(PostProcessor::new(
        Arc::new(SampleMediaOpener::new(48000)),
        encoders.clone(),
        urls.clone(),
        settings(),
    ));
    Fixture {
        encoders,
        urls,
        processor,
    }
}

fn recorder() -> (Arc<Mutex<Vec<ExportProgress>>>, Box<dyn Fn(ExportProgress) + Send + Sync>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, Box::new(move |p| sink.lock().push(p)))
}

fn center(blob: &Blob) -> Vec<[u8; 4]> {
    decode_records(blob.bytes())
        .unwrap()
        .into_iter()
        .filter_map(|r| r.video.map(|v| v.rgba))
        .collect()
}

/// Encoder that writes one chunk, then reports a codec error and keeps going.
#[derive(Default)]
struct CrashingEncoders {
    input: Mutex<Option<EncoderInput>>,
}

struct CrashingEncoder {
    events: Option<mpsc::UnboundedSender<EncoderEvent>>,
}

impl EncoderProvider for CrashingEncoders {
    fn create(
        &self,
        _label: &str,
        input: EncoderInput,
        _options: &EncoderOptions,
    ) -> ClipcastResult<Box<dyn Encoder>> {
        *self.input.lock() = Some(input);
        Ok(Box::new(CrashingEncoder { events: None }))
    }
}

impl Encoder for CrashingEncoder {
    fn start(&mut self, _slice: Duration) -> ClipcastResult<mpsc::UnboundedReceiver<EncoderEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(EncoderEvent::Chunk(b"x".to_vec()));
        let _ = tx.send(EncoderEvent::Error(ClipcastError::encoder("codec crashed")));
        self.events = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(tx) = self.events.take() {
            let _ = tx.send(EncoderEvent::Stopped);
        }
    }

    fn mime_type(&self) -> &str {
        SAMPLES_MIME
    }
}

fn crashing_fixture() -> (Arc<CrashingEncoders>, Arc<ObjectUrlRegistry>, PostProcessor) {
    let encoders = Arc::new(CrashingEncoders::default());
    let urls = Arc::new(ObjectUrlRegistry::new());
    let processor = PostProcessor::new(
        Arc::new(SampleMediaOpener::new(48000)),
        encoders.clone(),
        urls.clone(),
        settings(),
    );
    (encoders, urls, processor)
}

#[tokio::test(start_paused = true)]
async fn screen_and_camera_export_reports_monotonic_progress() {
    let f = fixture();
    let artifact = RecordedArtifact::new(
        Some(clip(160, 90, SCREEN, true, 2.0)),
        Some(clip(64, 48, CAMERA, false, 2.0)),
        2.0,
    );
    let (seen, callback) = recorder();

    let result = f
        .processor
        .export(
            &artifact,
            LayoutId::ScreenCameraBr,
            &BackgroundOption::none(),
            Some(callback),
        )
        .await
        .unwrap();

    assert_eq!(result.job.status, ExportStatus::Done);
    assert_eq!(result.job.progress, 100.0);
    assert_eq!(f.urls.resolve(&result.exported.url), Some(result.exported.blob.clone()));

    let seen = seen.lock();
    assert!(seen.windows(2).all(|w| w[0].progress <= w[1].progress));
    let last = seen.last().unwrap();
    assert_eq!(last.stage, ExportStage::Complete);
    assert_eq!(last.status, ExportStatus::Done);
    assert_eq!(last.progress, 100.0);
    assert!(seen.iter().any(|p| p.stage == ExportStage::Rendering));

    let records = decode_records(result.exported.blob.bytes()).unwrap();
    assert!(records.len() >= 15);
    assert!(records.iter().all(|r| r.video.unwrap().width == 320));
    assert!(records.iter().any(|r| r.audio_rms.unwrap_or(0.0) > 0.1));
    // The screen fills the middle of the default layout.
    assert!(center(&result.exported.blob).iter().all(|c| *c == SCREEN));

    let job = f.processor.job(artifact.id()).unwrap();
    assert_eq!(job.status, ExportStatus::Done);
    assert!(!f.processor.is_exporting(artifact.id()));
}

#[tokio::test(start_paused = true)]
async fn camera_only_artifact_exports_camera() {
    let f = fixture();
    let artifact = RecordedArtifact::new(None, Some(clip(64, 48, CAMERA, true, 1.0)), 1.0);

    let result = f
        .processor
        .export(&artifact, LayoutId::CameraOnlyFull, &BackgroundOption::none(), None)
        .await
        .unwrap();

    let colors = center(&result.exported.blob);
    assert!(!colors.is_empty());
    assert!(colors.iter().all(|c| *c == CAMERA));
}

#[tokio::test(start_paused = true)]
async fn concurrent_export_of_same_artifact_is_rejected() {
    let f = fixture();
    let artifact = RecordedArtifact::new(Some(clip(160, 90, SCREEN, true, 2.0)), None, 2.0);

    let first = {
        let processor = f.processor.clone();
        let artifact = artifact.clone();
        tokio::spawn(async move {
            processor
                .export(&artifact, LayoutId::ScreenOnly, &BackgroundOption::none(), None)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(f.processor.is_exporting(artifact.id()));

    let err = f
        .processor
        .export(&artifact, LayoutId::ScreenOnly, &BackgroundOption::none(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExportInProgress);

    first.await.unwrap().unwrap();
    assert!(!f.processor.is_exporting(artifact.id()));
    assert_eq!(f.encoders.started_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unreadable_camera_exports_screen_alone() {
    let f = fixture();
    let artifact = RecordedArtifact::new(
        Some(clip(160, 90, SCREEN, true, 1.0)),
        Some(Blob::new(vec![0xde, 0xad], "video/webm")),
        1.0,
    );

    let result = f
        .processor
        .export(&artifact, LayoutId::ScreenCameraRight, &BackgroundOption::none(), None)
        .await
        .unwrap();
    assert_eq!(result.job.status, ExportStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn encoder_failure_marks_job_failed() {
    let f = fixture();
    f.encoders.fail_label("export");
    let artifact = RecordedArtifact::new(Some(clip(160, 90, SCREEN, true, 1.0)), None, 1.0);
    let (seen, callback) = recorder();

    let err = f
        .processor
        .export(&artifact, LayoutId::ScreenOnly, &BackgroundOption::none(), Some(callback))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncoderFailure);

    let job = f.processor.job(artifact.id()).unwrap();
    assert_eq!(job.status, ExportStatus::Error);
    assert!(job.error.is_some());
    assert_eq!(seen.lock().last().unwrap().stage, ExportStage::Failed);
    assert!(!f.processor.is_exporting(artifact.id()));
    assert!(f.urls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn export_waits_for_recording_to_finish() {
    let capture = Arc::new(SyntheticCaptureProvider::with_devices(SyntheticDevices::default()));
    let encoders = Arc::new(MemoryEncoderProvider::new(10, 48000));
    let controller = RecordingController::new(
        capture,
        encoders.clone(),
        RecordingDefaults {
            canvas_width: 64,
            canvas_height: 36,
            fps: 10,
            countdown_secs: 0,
            ..RecordingDefaults::default()
        },
        EncoderOptions::default(),
    );
    let processor = PostProcessor::new(
        Arc::new(SampleMediaOpener::new(48000)),
        encoders,
        controller.url_registry(),
        settings(),
    )
    .with_lifecycle(controller.lifecycle().clone());

    controller.start(RecordingMode::ScreenAndCamera).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let earlier = RecordedArtifact::new(Some(clip(160, 90, SCREEN, false, 1.0)), None, 1.0);
    let err = processor
        .export(&earlier, LayoutId::ScreenOnly, &BackgroundOption::none(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExportFailure);

    let artifact = controller.stop().await.unwrap();
    let result = processor
        .export(
            &artifact,
            LayoutId::ScreenCameraBr,
            &BackgroundOption::from_id_or_none("gradient-sunset"),
            None,
        )
        .await
        .unwrap();

    let devices = SyntheticDevices::default();
    let colors = center(&result.exported.blob);
    assert!(colors.iter().all(|c| *c == devices.screen_color.0));
}

#[tokio::test(start_paused = true)]
async fn encoder_error_during_render_fails_export() {
    let (_encoders, urls, processor) = crashing_fixture();
    let artifact = RecordedArtifact::new(Some(clip(160, 90, SCREEN, true, 1.0)), None, 1.0);
    let (seen, callback) = recorder();

    let err = processor
        .export(&artifact, LayoutId::ScreenOnly, &BackgroundOption::none(), Some(callback))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExportFailure);
    assert!(err.to_string().contains("codec crashed"));

    let job = processor.job(artifact.id()).unwrap();
    assert_eq!(job.status, ExportStatus::Error);
    let last = seen.lock().last().cloned().unwrap();
    assert_eq!(last.stage, ExportStage::Failed);
    assert_eq!(last.status, ExportStatus::Error);
    assert!(urls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_export_closes_its_audio_mix() {
    let (encoders, _urls, processor) = crashing_fixture();
    let artifact = RecordedArtifact::new(Some(clip(160, 90, SCREEN, true, 1.0)), None, 1.0);

    processor
        .export(&artifact, LayoutId::ScreenOnly, &BackgroundOption::none(), None)
        .await
        .unwrap_err();

    // The recording has audio at every position, so only a closed mix is silent.
    let audio = encoders.input.lock().take().unwrap().audio.unwrap();
    let samples = audio.pull(480).unwrap();
    assert_eq!(samples.len(), 480);
    assert!(samples.iter().all(|s| *s == 0.0));
}
