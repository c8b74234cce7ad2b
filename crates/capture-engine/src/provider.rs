//! Capture and encoder provider seams.
//!
//! The engine never talks to devices or codecs directly. A host supplies a
//! [`CaptureProvider`] that hands out live streams and an [`EncoderProvider`]
//! that turns tracks into chunked byte output.

use std::time::Duration;

use clipcast_common::error::{ClipcastError, ClipcastResult};
use clipcast_media_model::{AudioTrack, MediaStream, VideoTrack};
use tokio::sync::mpsc;

/// Abstract interface for device acquisition.
#[async_trait::async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Ask the user for a display to share. Video plus optional system audio.
    async fn acquire_screen(&self) -> ClipcastResult<MediaStream>;

    /// Open the default camera. Video only.
    async fn acquire_camera(&self) -> ClipcastResult<MediaStream>;

    /// Open the default microphone. Audio only.
    async fn acquire_microphone(&self) -> ClipcastResult<MediaStream>;

    /// Stop every track of `stream` and give the device back.
    ///
    /// Must be safe to call more than once for the same stream.
    fn release(&self, stream: &MediaStream);
}

/// Tracks handed to one encoder.
#[derive(Debug, Clone, Default)]
pub struct EncoderInput {
    pub video: Option<VideoTrack>,
    pub audio: Option<AudioTrack>,
}

impl EncoderInput {
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderOptions {
    pub mime_type: String,
    pub video_bits_per_second: u64,
    pub frame_rate: u32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            mime_type: "video/webm;codecs=vp9,opus".to_string(),
            video_bits_per_second: 5_000_000,
            frame_rate: 60,
        }
    }
}

/// Events emitted by a running encoder, in order.
#[derive(Debug)]
pub enum EncoderEvent {
    /// A slice of encoded output. May be empty.
    Chunk(Vec<u8>),
    /// A non-fatal encoder error. The encoder keeps going until stopped.
    Error(ClipcastError),
    /// The encoder flushed its last chunk. Always the final event.
    Stopped,
}

/// Factory for encoders.
pub trait EncoderProvider: Send + Sync {
    fn create(
        &self,
        label: &str,
        input: EncoderInput,
        options: &EncoderOptions,
    ) -> ClipcastResult<Box<dyn Encoder>>;
}

/// A single encoder instance.
pub trait Encoder: Send {
    /// Start encoding, emitting a chunk every `slice`.
    fn start(&mut self, slice: Duration) -> ClipcastResult<mpsc::UnboundedReceiver<EncoderEvent>>;

    /// Request stop. The event stream ends with [`EncoderEvent::Stopped`].
    ///
    /// Calling this before `start` or twice is a no-op.
    fn stop(&mut self);

    fn mime_type(&self) -> &str;
}
