//! Record from synthetic devices, then export.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clipcast_capture_engine::synthetic::{MemoryEncoderProvider, SyntheticCaptureProvider};
use clipcast_capture_engine::{EncoderOptions, RecordingController, RecordingMode};
use clipcast_common::config::{AppConfig, ExportDefaults};
use clipcast_media_model::LayoutId;
use clipcast_render_engine::{ExportProgress, PostProcessor, ProgressCallback, SampleMediaOpener};

pub struct SimulateArgs {
    pub mode: String,
    pub secs: u64,
    pub layout: Option<String>,
    pub background: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub output: Option<PathBuf>,
}

fn parse_mode(value: &str) -> anyhow::Result<RecordingMode> {
    [
        RecordingMode::ScreenAndCamera,
        RecordingMode::ScreenOnly,
        RecordingMode::CameraOnly,
    ]
    .into_iter()
    .find(|mode| mode.as_str() == value)
    .ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown mode: {value}. Use: screen-and-camera, screen-only, camera-only"
        )
    })
}

pub async fn run(config: &AppConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let mode = parse_mode(&args.mode)?;
    let layout = match (&args.layout, mode) {
        (None, RecordingMode::CameraOnly) => LayoutId::CameraOnlyCenter,
        (None, RecordingMode::ScreenOnly) => LayoutId::ScreenOnly,
        (layout, _) => super::layout_arg(layout.as_deref(), &config.export.layout)?,
    };
    let background = super::background_arg(args.background.as_deref(), &config.export.background)?;

    let sample_rate = config.recording.audio_sample_rate;
    let capture = Arc::new(SyntheticCaptureProvider::new());
    let encoders = Arc::new(MemoryEncoderProvider::new(config.recording.fps, sample_rate));
    let controller = RecordingController::new(
        capture.clone(),
        encoders.clone(),
        config.recording.clone(),
        EncoderOptions::default(),
    );

    println!("Recording ({mode}) for {}s", args.secs);
    if config.recording.countdown_secs > 0 {
        println!("  Countdown: {}s", config.recording.countdown_secs);
    }
    controller.start(mode).await?;
    tokio::time::sleep(Duration::from_secs(args.secs)).await;
    let artifact = controller.stop().await?;
    println!(
        "  Recorded {:.1}s (screen: {}, camera: {})",
        artifact.duration_secs(),
        artifact.screen_blob().map_or(0, |b| b.len()),
        artifact.camera_blob().map_or(0, |b| b.len()),
    );
    tracing::debug!(live_streams = capture.live_count(), "Devices after recording");

    let settings = ExportDefaults {
        width: args.width,
        height: args.height,
        fps: args.fps,
        ..config.export.clone()
    };
    let processor = PostProcessor::new(
        Arc::new(SampleMediaOpener::new(sample_rate)),
        encoders,
        controller.url_registry(),
        settings,
    )
    .with_lifecycle(controller.lifecycle().clone())
    .with_sample_rate(sample_rate);

    println!("Exporting");
    println!("  Layout: {} ({})", layout, layout.label());
    println!("  Background: {}", background.id);
    println!("  Resolution: {}x{} @ {}fps", args.width, args.height, args.fps);

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        print!(
            "\r  Progress: {:.1}% ({} frames, {:?})  ",
            p.progress, p.frames_rendered, p.stage
        );
        let _ = std::io::stdout().flush();
    });

    let result = match processor
        .export(&artifact, layout, &background, Some(progress_cb))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            println!("\nExport failed: {e}");
            return Err(e.into());
        }
    };

    let output_path = args.output.unwrap_or_else(|| {
        config
            .output_dir
            .join(format!("{}.samples.jsonl", result.job.id))
    });
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&output_path, result.exported.blob.bytes())?;

    println!("\nExport complete: {}", output_path.display());
    println!("  Type: {}", result.exported.blob.mime_type());
    println!("  Size: {} bytes", result.exported.blob.len());
    println!("  URL: {}", result.exported.url);
    Ok(())
}
