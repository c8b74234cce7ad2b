//! Render one composite frame from still images.

use std::path::PathBuf;

use clipcast_common::config::AppConfig;
use clipcast_compositor::{render_layout, resolve_background};
use image::RgbaImage;

pub struct ComposeArgs {
    pub screen: Option<PathBuf>,
    pub camera: Option<PathBuf>,
    pub layout: Option<String>,
    pub background: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub output: PathBuf,
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<Option<RgbaImage>> {
    path.map(|p| {
        image::open(p)
            .map(|img| img.into_rgba8())
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", p.display()))
    })
    .transpose()
}

pub fn run(config: &AppConfig, args: ComposeArgs) -> anyhow::Result<()> {
    let layout = super::layout_arg(args.layout.as_deref(), &config.export.layout)?;
    let background = super::background_arg(args.background.as_deref(), &config.export.background)?;
    let width = args.width.unwrap_or(config.export.width);
    let height = args.height.unwrap_or(config.export.height);
    if width == 0 || height == 0 {
        anyhow::bail!("Output size must be non-empty, got {width}x{height}");
    }

    let screen = load(args.screen.as_ref())?;
    let camera = load(args.camera.as_ref())?;
    if screen.is_none() && camera.is_none() {
        tracing::warn!("No source images given, rendering background only");
    }

    let mut canvas = RgbaImage::new(width, height);
    render_layout(
        &mut canvas,
        layout,
        screen.as_ref(),
        camera.as_ref(),
        &resolve_background(&background),
    );

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    canvas
        .save(&args.output)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", args.output.display()))?;

    println!("Composite written: {}", args.output.display());
    println!("  Layout: {} ({})", layout, layout.label());
    println!("  Background: {}", background.id);
    println!("  Resolution: {width}x{height}");
    Ok(())
}
