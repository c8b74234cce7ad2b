//! Live preview composite.
//!
//! Drawn every tick while recording: the screen contain-fit onto the whole
//! canvas, then the camera at the user-controlled [`WebcamConfig`].

use clipcast_media_model::{WebcamConfig, WebcamShape};
use image::{Rgba, RgbaImage};

use crate::geometry::{contain_rect, Rect};
use crate::layout::{draw_covered, CORNER_RADIUS, PIP_BORDER_WIDTH};
use crate::raster::{
    circle_shadow, draw_image, fill, fill_rect, stroke_circle, stroke_rounded_rect, Clip, BLACK,
    WHITE,
};

const SHADOW_BLUR: f64 = 15.0;
const SHADOW_OFFSET_Y: f64 = 4.0;
const SHADOW_COLOR: Rgba<u8> = Rgba([0, 0, 0, 128]);
/// Dim backing drawn under the camera so letterboxed pixels are not bare.
const BACKING_COLOR: Rgba<u8> = Rgba([0, 0, 0, 77]);

/// Compose one live frame.
pub fn compose_live(
    canvas: &mut RgbaImage,
    screen: Option<&RgbaImage>,
    camera: Option<&RgbaImage>,
    webcam: &WebcamConfig,
) {
    fill(canvas, BLACK);

    if let Some(frame) = screen {
        let full = Rect::from_size(canvas.width() as f64, canvas.height() as f64);
        let dst = contain_rect(frame.width() as f64, frame.height() as f64, full);
        draw_image(
            canvas,
            frame,
            Rect::from_size(frame.width() as f64, frame.height() as f64),
            dst,
            &Clip::None,
        );
    }

    let Some(frame) = camera else {
        return;
    };

    match webcam.shape {
        WebcamShape::Circle => {
            let size = webcam.width.min(webcam.height);
            let rect = Rect::new(webcam.x, webcam.y, size, size);
            let clip = Clip::circle_in(rect);
            let Clip::Circle { cx, cy, radius } = clip else {
                return;
            };
            circle_shadow(
                canvas,
                cx,
                cy + SHADOW_OFFSET_Y,
                radius,
                SHADOW_BLUR,
                SHADOW_COLOR,
            );
            fill_rect(canvas, rect, BACKING_COLOR, &clip);
            draw_covered(canvas, frame, rect, &clip);
            stroke_circle(canvas, cx, cy, radius, PIP_BORDER_WIDTH, WHITE);
        }
        WebcamShape::RoundedRect => {
            let rect = Rect::new(webcam.x, webcam.y, webcam.width, webcam.height);
            let shadow = Rect::new(rect.x, rect.y + SHADOW_OFFSET_Y, rect.w, rect.h);
            fill_rect(
                canvas,
                shadow,
                SHADOW_COLOR,
                &Clip::rounded(shadow, CORNER_RADIUS),
            );
            let clip = Clip::rounded(rect, CORNER_RADIUS);
            fill_rect(canvas, rect, BACKING_COLOR, &clip);
            draw_covered(canvas, frame, rect, &clip);
            stroke_rounded_rect(canvas, rect, CORNER_RADIUS, PIP_BORDER_WIDTH, WHITE);
        }
    }
}
