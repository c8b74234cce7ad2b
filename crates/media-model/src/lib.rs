//! Clipcast Media Model
//!
//! Defines the data contracts shared by capture, composition and export:
//! - **Streams:** Media streams, video/audio tracks and their end signals
//! - **Blobs:** Immutable encoded buffers and the object URL registry
//! - **Artifacts:** Recorded and exported artifacts, export job state
//! - **Options:** Layout ids, background options and webcam placement
//! - **Samples:** The line-delimited sample container of the in-memory codec
//!
//! Pixel coordinates are canvas pixels; audio is mono `f32` in `[-1.0, 1.0]`.

pub mod artifact;
pub mod background;
pub mod blob;
pub mod layout;
pub mod samples;
pub mod stream;
pub mod webcam;

pub use artifact::*;
pub use background::*;
pub use blob::*;
pub use layout::*;
pub use stream::*;
pub use webcam::*;
