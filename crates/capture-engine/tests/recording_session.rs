use std::sync::Arc;
use std::time::Duration;

use clipcast_capture_engine::synthetic::{MemoryEncoderProvider, SyntheticCaptureProvider, SyntheticDevices};
use clipcast_capture_engine::{EncoderOptions, RecordingController, RecordingMode, RecordingState};
use clipcast_common::config::RecordingDefaults;
use clipcast_common::error::ErrorKind;
use clipcast_media_model::samples::decode_records;
use clipcast_media_model::StreamKind;

struct Harness {
    capture: Arc<SyntheticCaptureProvider>,
    encoders: Arc<MemoryEncoderProvider>,
    controller: Arc<RecordingController>,
}

fn harness(countdown_secs: u64, max_duration_secs: u64, composite_primary: bool) -> Harness {
    let capture = Arc::new(SyntheticCaptureProvider::with_devices(SyntheticDevices::default()));
    let encoders = Arc::new(MemoryEncoderProvider::new(10, 48000));
    let defaults = RecordingDefaults {
        canvas_width: 64,
        canvas_height: 36,
        fps: 10,
        countdown_secs,
        max_duration_secs,
        webcam_size: 16,
        webcam_padding: 2,
        composite_primary,
        ..RecordingDefaults::default()
    };
    let controller = Arc::new(RecordingController::new(
        capture.clone(),
        encoders.clone(),
        defaults,
        EncoderOptions::default(),
    ));
    Harness {
        capture,
        encoders,
        controller,
    }
}

#[tokio::test(start_paused = true)]
async fn screen_and_camera_stop_after_five_seconds() {
    let h = harness(3, 120, false);
    h.controller.start(RecordingMode::ScreenAndCamera).await.unwrap();
    assert_eq!(h.controller.state(), RecordingState::Recording);
    assert_eq!(h.encoders.started_count(), 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let artifact = h.controller.stop().await.unwrap();

    assert_eq!(h.controller.state(), RecordingState::Completed);
    assert!((artifact.duration_secs() - 5.0).abs() < 0.05);
    let screen = artifact.screen_blob().expect("screen blob");
    let camera = artifact.camera_blob().expect("camera blob");

    let devices = SyntheticDevices::default();
    let screen_records = decode_records(screen.bytes()).unwrap();
    assert!(screen_records.len() >= 45);
    assert_eq!(screen_records[0].video.unwrap().rgba, devices.screen_color.0);
    assert!(screen_records.iter().all(|r| r.audio_rms.unwrap_or(0.0) > 0.0));

    let camera_records = decode_records(camera.bytes()).unwrap();
    assert_eq!(camera_records[0].video.unwrap().rgba, devices.camera_color.0);
    assert!(camera_records.iter().all(|r| r.audio_rms.is_none()));

    // Everything acquired was given back.
    assert_eq!(h.capture.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn camera_only_records_camera_as_primary() {
    let h = harness(0, 120, false);
    h.controller.start(RecordingMode::CameraOnly).await.unwrap();
    assert_eq!(h.encoders.started_count(), 1);
    assert_eq!(h.capture.acquisitions(StreamKind::Display), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let artifact = h.controller.stop().await.unwrap();

    assert!(artifact.screen_blob().is_none());
    let primary = artifact.primary_blob().expect("primary blob");
    assert_eq!(Some(primary), artifact.camera_blob());
    assert!(artifact.secondary_blob().is_none());
    let records = decode_records(primary.bytes()).unwrap();
    assert!(records.iter().any(|r| r.audio_rms.unwrap_or(0.0) > 0.0));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_countdown_returns_to_idle() {
    let h = harness(3, 120, false);
    let starting = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.start(RecordingMode::ScreenAndCamera).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.controller.state(), RecordingState::Initializing);
    assert!(h.controller.cancel_countdown());

    let err = starting.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserCancelled);
    assert_eq!(h.controller.state(), RecordingState::Idle);
    assert_eq!(h.encoders.started_count(), 0);
    assert_eq!(h.capture.acquisitions(StreamKind::Display), 0);
    assert_eq!(h.capture.acquisitions(StreamKind::Camera), 0);
}

#[tokio::test(start_paused = true)]
async fn auto_stop_at_max_duration() {
    let h = harness(0, 3, false);
    h.controller.start(RecordingMode::ScreenOnly).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(h.controller.state(), RecordingState::Recording);

    let artifact = h.controller.finished().await.unwrap();
    assert_eq!(h.controller.state(), RecordingState::Completed);
    assert!((artifact.duration_secs() - 3.0).abs() < 0.05);
    assert!(artifact.camera_blob().is_none());
}

#[tokio::test(start_paused = true)]
async fn revoked_screen_share_stops_recording() {
    let h = harness(0, 120, false);
    h.controller.start(RecordingMode::ScreenAndCamera).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(h.capture.end_screen_share());
    let artifact = h.controller.finished().await.unwrap();
    assert_eq!(h.controller.state(), RecordingState::Completed);
    assert!((artifact.duration_secs() - 1.5).abs() < 0.05);
    assert!(artifact.screen_blob().is_some());
}

#[tokio::test(start_paused = true)]
async fn mandatory_source_failure_moves_to_error() {
    let h = harness(0, 120, false);
    h.capture.deny(StreamKind::Display, ErrorKind::PermissionBlocked);

    let err = h
        .controller
        .start(RecordingMode::ScreenAndCamera)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionBlocked);
    assert_eq!(h.controller.state(), RecordingState::Error);
    let failure = h.controller.last_failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::PermissionBlocked);
    assert!(failure.retryable);
    assert_eq!(h.encoders.started_count(), 0);

    // Retry after the user grants access.
    h.capture.allow(StreamKind::Display);
    h.controller.reset().unwrap();
    assert_eq!(h.controller.state(), RecordingState::Idle);
    h.controller.start(RecordingMode::ScreenOnly).await.unwrap();
    assert_eq!(h.controller.state(), RecordingState::Recording);
    h.controller.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_camera_degrades_to_screen_only() {
    let h = harness(0, 120, false);
    h.capture.deny(StreamKind::Camera, ErrorKind::DeviceBusy);

    h.controller.start(RecordingMode::ScreenAndCamera).await.unwrap();
    assert_eq!(h.encoders.started_count(), 1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let artifact = h.controller.stop().await.unwrap();

    assert!(artifact.screen_blob().is_some());
    assert!(artifact.camera_blob().is_none());
    assert!(h.controller.last_failure().is_none());
}

#[tokio::test(start_paused = true)]
async fn muting_microphone_keeps_display_audio() {
    let h = harness(0, 120, false);
    h.controller.start(RecordingMode::ScreenOnly).await.unwrap();
    let mix = h.controller.mix().unwrap();
    assert_eq!(mix.sources().len(), 2);

    h.controller.toggle_microphone(false).await.unwrap();
    assert!(!mix.sources()[1].connected);
    assert!(mix.pull_mixed(480).iter().any(|s| s.abs() > 0.0));

    h.controller.toggle_microphone(true).await.unwrap();
    let sources = mix.sources();
    assert_eq!(sources.len(), 2);
    assert!(sources[1].connected);
    assert_eq!(sources[1].gain, 1.5);
    assert_eq!(h.capture.acquisitions(StreamKind::Microphone), 2);

    h.controller.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn webcam_toggle_only_touches_preview() {
    let h = harness(0, 120, false);
    h.controller.start(RecordingMode::ScreenAndCamera).await.unwrap();
    let preview = h.controller.preview().unwrap();
    assert!(preview.has_camera());

    h.controller.toggle_webcam(false).await.unwrap();
    assert!(!preview.has_camera());
    h.controller.toggle_webcam(true).await.unwrap();
    assert!(preview.has_camera());

    tokio::time::sleep(Duration::from_secs(1)).await;
    let artifact = h.controller.stop().await.unwrap();
    assert!(artifact.camera_blob().is_some());
}

#[tokio::test(start_paused = true)]
async fn composite_primary_records_the_live_canvas() {
    let h = harness(0, 120, true);
    h.controller.start(RecordingMode::ScreenAndCamera).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let artifact = h.controller.stop().await.unwrap();

    let records = decode_records(artifact.screen_blob().unwrap().bytes()).unwrap();
    let frame = records[0].video.unwrap();
    assert_eq!((frame.width, frame.height), (64, 36));
}

#[tokio::test(start_paused = true)]
async fn stop_when_idle_is_rejected() {
    let h = harness(0, 120, false);
    let err = h.controller.stop().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test(start_paused = true)]
async fn starting_again_after_completion_resets() {
    let h = harness(0, 120, false);
    h.controller.start(RecordingMode::ScreenOnly).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let first = h.controller.stop().await.unwrap();

    let url = h.controller.url_registry().create_url(first.screen_blob().unwrap());
    h.controller.start(RecordingMode::ScreenOnly).await.unwrap();
    assert!(h.controller.url_registry().resolve(&url).is_none());
    assert!(h.controller.artifact().is_none());
    assert_eq!(h.controller.lifecycle().session().session_id, 2);
    h.controller.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_and_finished_resolve_to_the_same_artifact() {
    let h = harness(0, 120, false);
    h.controller.start(RecordingMode::ScreenOnly).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let (stopped, finished) = tokio::join!(h.controller.stop(), h.controller.finished());
    let stopped = stopped.unwrap();
    let finished = finished.unwrap();
    assert_eq!(stopped.id(), finished.id());
    assert_eq!(h.controller.state(), RecordingState::Completed);

    // Later waiters see the stored result too.
    assert_eq!(h.controller.finished().await.unwrap().id(), stopped.id());
}

#[tokio::test(start_paused = true)]
async fn waiters_on_auto_stop_all_get_the_artifact() {
    let h = harness(0, 2, false);
    h.controller.start(RecordingMode::ScreenOnly).await.unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.finished().await })
        })
        .collect();
    let mut ids = Vec::new();
    for waiter in waiters {
        ids.push(waiter.await.unwrap().unwrap().id().to_string());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}
