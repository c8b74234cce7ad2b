//! Export layout catalogue.
//!
//! Each layout is a pure placement function from canvas geometry to the
//! rectangles where the screen and camera frames go. [`render_layout`] then
//! paints the background and draws whichever frames are present.

use clipcast_media_model::LayoutId;
use image::{Rgba, RgbaImage};

use crate::background::{draw_background, ResolvedBackground};
use crate::geometry::{contain_rect, cover_crop, Rect};
use crate::raster::{circle_shadow, draw_image, fill_rect, stroke_circle, Clip, BLACK, WHITE};

pub const PADDING: f64 = 24.0;
pub const GAP: f64 = 24.0;
pub const CORNER_RADIUS: f64 = 16.0;
/// PiP bubble diameter as a fraction of canvas height.
pub const PIP_FACTOR: f64 = 0.25;
/// Distance from the PiP bubble to the canvas edges.
pub const PIP_INSET: f64 = PADDING + 32.0;
/// Camera column width as a fraction of the padded width.
pub const SIDE_CAMERA_FRACTION: f64 = 0.3;
pub const PIP_BORDER_WIDTH: f64 = 4.0;
pub const PIP_SHADOW_BLUR: f64 = 20.0;
pub const PIP_SHADOW_OFFSET_Y: f64 = 4.0;
pub const PIP_SHADOW_COLOR: Rgba<u8> = Rgba([0, 0, 0, 128]);

/// Canvas geometry handed to placement functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutGeometry {
    pub width: f64,
    pub height: f64,
}

impl LayoutGeometry {
    pub fn of(canvas: &RgbaImage) -> Self {
        Self {
            width: canvas.width() as f64,
            height: canvas.height() as f64,
        }
    }

    pub fn full(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn padded(&self) -> Rect {
        self.full().inset(PADDING)
    }
}

/// How a camera frame is fitted and clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStyle {
    /// Cover-fit circle with drop shadow and white border.
    Bubble,
    /// Cover-fit rounded rectangle.
    Panel,
    /// Contain-fit rounded rectangle with black letterbox.
    Framed,
    /// Cover-fit with no clip.
    FullBleed,
}

/// Output of a placement function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub screen: Option<Rect>,
    pub camera: Option<(Rect, CameraStyle)>,
}

/// An entry in the layout catalogue.
#[derive(Debug, Clone, Copy)]
pub struct LayoutDefinition {
    pub id: LayoutId,
    pub label: &'static str,
    pub place: fn(&LayoutGeometry) -> Placement,
}

pub static LAYOUTS: [LayoutDefinition; 7] = [
    LayoutDefinition {
        id: LayoutId::ScreenCameraBr,
        label: "Bottom Right",
        place: place_pip_bottom_right,
    },
    LayoutDefinition {
        id: LayoutId::ScreenCameraBl,
        label: "Bottom Left",
        place: place_pip_bottom_left,
    },
    LayoutDefinition {
        id: LayoutId::ScreenCameraLeft,
        label: "Camera Left",
        place: place_camera_left,
    },
    LayoutDefinition {
        id: LayoutId::ScreenCameraRight,
        label: "Camera Right",
        place: place_camera_right,
    },
    LayoutDefinition {
        id: LayoutId::CameraOnlyCenter,
        label: "Centered",
        place: place_camera_center,
    },
    LayoutDefinition {
        id: LayoutId::CameraOnlyFull,
        label: "Full Screen",
        place: place_camera_full,
    },
    LayoutDefinition {
        id: LayoutId::ScreenOnly,
        label: "Screen Only",
        place: place_screen_only,
    },
];

/// Catalogue entry for `id`. Falls back to the first (default) entry.
pub fn layout_definition(id: LayoutId) -> &'static LayoutDefinition {
    LAYOUTS
        .iter()
        .find(|layout| layout.id == id)
        .unwrap_or(&LAYOUTS[0])
}

fn pip_rect(geometry: &LayoutGeometry, right: bool) -> Rect {
    let size = geometry.height * PIP_FACTOR;
    let x = if right {
        geometry.width - PIP_INSET - size
    } else {
        PIP_INSET
    };
    Rect::new(x, geometry.height - PIP_INSET - size, size, size)
}

fn place_pip_bottom_right(geometry: &LayoutGeometry) -> Placement {
    Placement {
        screen: Some(geometry.padded()),
        camera: Some((pip_rect(geometry, true), CameraStyle::Bubble)),
    }
}

fn place_pip_bottom_left(geometry: &LayoutGeometry) -> Placement {
    Placement {
        screen: Some(geometry.padded()),
        camera: Some((pip_rect(geometry, false), CameraStyle::Bubble)),
    }
}

/// Split the padded area into a camera column and a screen column.
fn side_by_side(geometry: &LayoutGeometry, camera_first: bool) -> Placement {
    let area = geometry.padded();
    let camera_w = area.w * SIDE_CAMERA_FRACTION;
    let screen_w = (area.w - camera_w - GAP).max(0.0);

    let (camera_x, screen_x) = if camera_first {
        (area.x, area.x + camera_w + GAP)
    } else {
        (area.x + screen_w + GAP, area.x)
    };

    Placement {
        screen: Some(Rect::new(screen_x, area.y, screen_w, area.h)),
        camera: Some((
            Rect::new(camera_x, area.y, camera_w, area.h),
            CameraStyle::Panel,
        )),
    }
}

fn place_camera_left(geometry: &LayoutGeometry) -> Placement {
    side_by_side(geometry, true)
}

fn place_camera_right(geometry: &LayoutGeometry) -> Placement {
    side_by_side(geometry, false)
}

fn place_camera_center(geometry: &LayoutGeometry) -> Placement {
    Placement {
        screen: None,
        camera: Some((geometry.padded(), CameraStyle::Framed)),
    }
}

fn place_camera_full(geometry: &LayoutGeometry) -> Placement {
    Placement {
        screen: None,
        camera: Some((geometry.full(), CameraStyle::FullBleed)),
    }
}

fn place_screen_only(geometry: &LayoutGeometry) -> Placement {
    Placement {
        screen: Some(geometry.padded()),
        camera: None,
    }
}

/// Contain-fit inside a rounded rectangle with a black letterbox.
pub(crate) fn draw_contained(canvas: &mut RgbaImage, frame: &RgbaImage, rect: Rect, radius: f64) {
    let clip = Clip::rounded(rect, radius);
    fill_rect(canvas, rect, BLACK, &clip);
    let dst = contain_rect(frame.width() as f64, frame.height() as f64, rect);
    draw_image(
        canvas,
        frame,
        Rect::from_size(frame.width() as f64, frame.height() as f64),
        dst,
        &clip,
    );
}

pub(crate) fn draw_covered(canvas: &mut RgbaImage, frame: &RgbaImage, rect: Rect, clip: &Clip) {
    let crop = cover_crop(frame.width() as f64, frame.height() as f64, rect);
    draw_image(canvas, frame, crop, rect, clip);
}

/// Circle cover-fit with a drop shadow beneath and a white ring on top.
fn draw_bubble(canvas: &mut RgbaImage, frame: &RgbaImage, rect: Rect) {
    let clip = Clip::circle_in(rect);
    let Clip::Circle { cx, cy, radius } = clip else {
        return;
    };
    circle_shadow(
        canvas,
        cx,
        cy + PIP_SHADOW_OFFSET_Y,
        radius,
        PIP_SHADOW_BLUR,
        PIP_SHADOW_COLOR,
    );
    let diameter = radius * 2.0;
    draw_covered(canvas, frame, Rect::new(rect.x, rect.y, diameter, diameter), &clip);
    stroke_circle(canvas, cx, cy, radius, PIP_BORDER_WIDTH, WHITE);
}

fn draw_camera(canvas: &mut RgbaImage, frame: &RgbaImage, rect: Rect, style: CameraStyle) {
    match style {
        CameraStyle::Bubble => draw_bubble(canvas, frame, rect),
        CameraStyle::Panel => draw_covered(canvas, frame, rect, &Clip::rounded(rect, CORNER_RADIUS)),
        CameraStyle::Framed => draw_contained(canvas, frame, rect, CORNER_RADIUS),
        CameraStyle::FullBleed => draw_covered(canvas, frame, rect, &Clip::None),
    }
}

/// Composite one output frame.
///
/// The background always covers the whole canvas; missing frames simply
/// skip their draw call.
pub fn render_layout(
    canvas: &mut RgbaImage,
    layout: LayoutId,
    screen: Option<&RgbaImage>,
    camera: Option<&RgbaImage>,
    background: &ResolvedBackground,
) {
    let definition = layout_definition(layout);
    let placement = (definition.place)(&LayoutGeometry::of(canvas));

    draw_background(canvas, background);

    if let (Some(frame), Some(rect)) = (screen, placement.screen) {
        draw_contained(canvas, frame, rect, CORNER_RADIUS);
    }
    if let (Some(frame), Some((rect, style))) = (camera, placement.camera) {
        draw_camera(canvas, frame, rect, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HD: LayoutGeometry = LayoutGeometry {
        width: 1920.0,
        height: 1080.0,
    };

    #[test]
    fn test_catalogue_matches_layout_ids() {
        for (definition, id) in LAYOUTS.iter().zip(LayoutId::ALL) {
            assert_eq!(definition.id, id);
            assert_eq!(definition.label, id.label());
        }
    }

    #[test]
    fn test_pip_bottom_right_geometry() {
        let placement = place_pip_bottom_right(&FULL_HD);
        let (bubble, style) = placement.camera.unwrap();
        assert_eq!(style, CameraStyle::Bubble);
        assert_eq!(bubble.w, 270.0);
        assert_eq!(bubble.x, 1920.0 - 56.0 - 270.0);
        assert_eq!(bubble.y, 1080.0 - 56.0 - 270.0);
        assert_eq!(placement.screen.unwrap(), Rect::new(24.0, 24.0, 1872.0, 1032.0));
    }

    #[test]
    fn test_side_by_side_columns_do_not_overlap() {
        let placement = place_camera_right(&FULL_HD);
        let screen = placement.screen.unwrap();
        let (camera, _) = placement.camera.unwrap();
        assert!((camera.w - 1872.0 * 0.3).abs() < 1e-9);
        assert!((camera.x - (screen.right() + GAP)).abs() < 1e-9);
        assert!((camera.right() - (1920.0 - PADDING)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_sources_draw_background_only() {
        let mut canvas = RgbaImage::new(64, 36);
        render_layout(
            &mut canvas,
            LayoutId::ScreenCameraBr,
            None,
            None,
            &ResolvedBackground::none(),
        );
        assert!(canvas.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_screen_only_ignores_camera() {
        let camera = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255]));
        let mut canvas = RgbaImage::new(64, 36);
        render_layout(
            &mut canvas,
            LayoutId::ScreenOnly,
            None,
            Some(&camera),
            &ResolvedBackground::none(),
        );
        assert!(canvas.pixels().all(|p| *p == BLACK));
    }
}
