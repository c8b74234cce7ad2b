//! Clipcast Capture Engine
//!
//! Runs recording sessions: a screen and/or camera plus audio, recorded
//! into one or two blobs while a live composite is drawn for preview.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 RecordingController                  │
//! │        (RecordingLifecycle decides every edge)       │
//! │  ┌──────────┐  ┌──────────┐  ┌─────────────────────┐ │
//! │  │ Screen   │  │ Camera   │  │ Display audio + Mic │ │
//! │  └──┬───┬───┘  └──┬───┬───┘  └──────────┬──────────┘ │
//! │     │   │         │   │                 ▼            │
//! │     │   └──► LivePreview ◄──┘    AudioMixGraph        │
//! │     ▼                 ▼                 │            │
//! │  ┌──────────────────────────────────────┴──────────┐ │
//! │  │ DualStreamRecorder: primary (screen + mix)      │ │
//! │  │                     secondary (camera video)    │ │
//! │  └─────────────────────────────────────────────────┘ │
//! │                 ▼ RecordedArtifact                   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Devices and codecs sit behind [`CaptureProvider`] and [`EncoderProvider`];
//! the [`synthetic`] module provides deterministic implementations of both.

pub mod audio_mix;
pub mod controller;
pub mod lifecycle;
pub mod preview;
pub mod provider;
pub mod recorder;
pub mod resources;
pub mod synthetic;

pub use audio_mix::{AudioMixGraph, AudioSourceHandle, SourceId};
pub use controller::{RecordingController, RecordingMode, SessionFailure};
pub use lifecycle::{RecordingLifecycle, RecordingSession, RecordingState, StateChange, Subscription};
pub use preview::LivePreview;
pub use provider::{
    CaptureProvider, Encoder, EncoderEvent, EncoderInput, EncoderOptions, EncoderProvider,
};
pub use recorder::{DualStreamRecorder, PrimarySource, RecorderOutput, StopLatch};
pub use resources::SessionResources;
