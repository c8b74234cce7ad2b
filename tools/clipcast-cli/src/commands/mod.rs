pub mod backgrounds;
pub mod compose;
pub mod config;
pub mod layouts;
pub mod simulate;

use std::path::Path;

use clipcast_media_model::{BackgroundOption, LayoutId};

/// Resolve a `--layout` argument, falling back to the configured default.
pub fn layout_arg(arg: Option<&str>, configured: &str) -> anyhow::Result<LayoutId> {
    match arg {
        Some(id) => id
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}. Run `clipcast layouts` for the list")),
        None => Ok(LayoutId::from_id_or_default(configured)),
    }
}

/// Resolve a `--background` argument: a catalogue id, `image:<path>`, or a
/// bare path to an existing image file.
pub fn background_arg(arg: Option<&str>, configured: &str) -> anyhow::Result<BackgroundOption> {
    let Some(value) = arg else {
        return Ok(BackgroundOption::from_id_or_none(configured));
    };
    if let Some(option) = BackgroundOption::lookup(value) {
        return Ok(option);
    }
    if Path::new(value).is_file() {
        return Ok(BackgroundOption::image(value));
    }
    Err(anyhow::anyhow!(
        "Unknown background: {value}. Run `clipcast backgrounds` for the list"
    ))
}
