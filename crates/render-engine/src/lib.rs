//! Clipcast Render Engine
//!
//! Post-processing pipeline that plays a finished recording back,
//! composites it with a layout and background, and re-encodes the result
//! into a single deliverable.
//!
//! # Pipeline Architecture
//!
//! ```text
//! screen blob ──┐
//!               ├── open ── resolve duration ── seek both to 0
//! camera blob ──┘                                    │
//!                                                    ▼
//!                                 render loop (fixed fps, primary clock)
//!                                   │  layout + background per frame
//!                                   │  camera re-seek on drift
//!                                   ▼
//!                         canvas track + primary audio
//!                                   │
//!                                   ▼
//!                          encoder ── exported blob + URL
//! ```

pub mod duration;
pub mod export;
pub mod media;
pub mod progress;
pub mod synthetic;

pub use duration::{resolve_duration, DURATION_PROBE_SECS};
pub use export::{ExportResult, PostProcessor};
pub use media::{MediaDuration, MediaOpener, PlayableMedia};
pub use progress::{ExportProgress, ExportStage, ProgressCallback, ProgressTracker};
pub use synthetic::SampleMediaOpener;
