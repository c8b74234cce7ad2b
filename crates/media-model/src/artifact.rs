//! Recorded and exported artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::background::BackgroundOption;
use crate::blob::Blob;
use crate::layout::LayoutId;

/// The raw output of one recording session.
///
/// Immutable once built by the recorder. At least one blob is present.
#[derive(Debug, Clone)]
pub struct RecordedArtifact {
    id: String,
    screen_blob: Option<Blob>,
    camera_blob: Option<Blob>,
    duration_secs: f64,
    created_at: DateTime<Utc>,
}

impl RecordedArtifact {
    pub fn new(screen_blob: Option<Blob>, camera_blob: Option<Blob>, duration_secs: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            screen_blob,
            camera_blob,
            duration_secs: duration_secs.max(0.0),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn screen_blob(&self) -> Option<&Blob> {
        self.screen_blob.as_ref()
    }

    pub fn camera_blob(&self) -> Option<&Blob> {
        self.camera_blob.as_ref()
    }

    /// Recorded wall-clock duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The blob whose clock drives export: screen if present, else camera.
    pub fn primary_blob(&self) -> Option<&Blob> {
        self.screen_blob.as_ref().or(self.camera_blob.as_ref())
    }

    /// The camera blob, when it is not already the primary.
    pub fn secondary_blob(&self) -> Option<&Blob> {
        self.screen_blob.as_ref().and(self.camera_blob.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.screen_blob.is_none() && self.camera_blob.is_none()
    }
}

/// The final single-file deliverable.
#[derive(Debug, Clone)]
pub struct ExportedArtifact {
    pub blob: Blob,
    /// Object URL registered for `blob`; revoke it when done.
    pub url: String,
}

/// Lifecycle of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Idle,
    Running,
    Done,
    Error,
}

/// One export invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub artifact_id: String,
    pub layout: LayoutId,
    pub background: BackgroundOption,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub status: ExportStatus,
    pub error: Option<String>,
}

impl ExportJob {
    pub fn new(artifact: &RecordedArtifact, layout: LayoutId, background: BackgroundOption) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            artifact_id: artifact.id().to_string(),
            layout,
            background,
            progress: 0.0,
            status: ExportStatus::Idle,
            error: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, ExportStatus::Done | ExportStatus::Error)
    }
}
