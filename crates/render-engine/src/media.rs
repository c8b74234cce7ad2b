//! Playable media seam.
//!
//! The exporter plays recorded blobs back through a [`MediaOpener`]. The
//! opened media behaves like a media element: it may not know its duration
//! up front, it can seek, play and pause, and it exposes the frame and audio
//! at the current playback position.

use std::sync::Arc;

use clipcast_common::error::ClipcastResult;
use clipcast_media_model::{AudioTrack, Blob, VideoFrame};
use tokio::sync::watch;

/// Duration as reported by a media container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaDuration {
    Finite(f64),
    /// Streaming containers report this until they have been scanned.
    Infinite,
    Unknown,
}

impl MediaDuration {
    /// The duration in seconds if it is known, finite and positive.
    pub fn finite_secs(self) -> Option<f64> {
        match self {
            MediaDuration::Finite(secs) if secs.is_finite() && secs > 0.0 => Some(secs),
            _ => None,
        }
    }
}

/// A seekable, playable media object.
#[async_trait::async_trait]
pub trait PlayableMedia: Send + Sync {
    fn duration(&self) -> MediaDuration;

    /// Receives every duration change.
    fn subscribe_duration(&self) -> watch::Receiver<MediaDuration>;

    /// Seek to `secs`. Resolves once the new position is ready.
    async fn seek(&self, secs: f64) -> ClipcastResult<()>;

    fn play(&self);

    fn pause(&self);

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    fn is_ended(&self) -> bool;

    /// Frame at the current position, if the media has video.
    fn current_frame(&self) -> Option<VideoFrame>;

    /// Audio following the playback position, if the media has audio.
    fn audio_track(&self) -> Option<AudioTrack>;
}

/// Materializes blobs into playable media.
#[async_trait::async_trait]
pub trait MediaOpener: Send + Sync {
    async fn open(&self, blob: &Blob) -> ClipcastResult<Arc<dyn PlayableMedia>>;
}
