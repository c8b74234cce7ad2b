//! Export progress tracking.

use clipcast_media_model::ExportStatus;
use serde::Serialize;

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    ResolvingDuration,
    Seeking,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgress {
    /// Percentage in `[0, 100]`.
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Current stage.
    pub stage: ExportStage,

    pub status: ExportStatus,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Turns playback position into a percentage that never goes backwards.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    value: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in the current position. Returns the updated percentage.
    pub fn update(&mut self, current_secs: f64, duration_secs: f64) -> f64 {
        if duration_secs > 0.0 && current_secs.is_finite() {
            let percent = (current_secs / duration_secs * 100.0).clamp(0.0, 100.0);
            self.value = self.value.max(percent);
        }
        self.value
    }

    /// Mark the export complete.
    pub fn finish(&mut self) -> f64 {
        self.value = 100.0;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}
