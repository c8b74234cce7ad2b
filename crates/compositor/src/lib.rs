//! Clipcast Frame Compositor
//!
//! Pure drawing functions that combine a screen frame, a camera frame and a
//! background into one canvas. Nothing here owns state: every function
//! writes only the canvas it is handed, so identical inputs always produce
//! identical pixels.
//!
//! - [`geometry`]: rectangles and the `contain`/`cover` fit math
//! - [`raster`]: blending, clipping, gradients, shadows and strokes
//! - [`background`]: background resolution and fills
//! - [`layout`]: the export layout catalogue
//! - [`live`]: the live preview composite driven by [`WebcamConfig`]
//!
//! [`WebcamConfig`]: clipcast_media_model::WebcamConfig

pub mod background;
pub mod geometry;
pub mod layout;
pub mod live;
pub mod raster;

pub use background::{draw_background, resolve_background, ResolvedBackground};
pub use geometry::Rect;
pub use layout::{layout_definition, render_layout, LayoutDefinition, LAYOUTS};
pub use live::compose_live;
