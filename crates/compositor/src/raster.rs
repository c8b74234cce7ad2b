//! Software raster primitives over `image::RgbaImage`.
//!
//! Scaling goes through `image::imageops`; disc and rectangle coverage come
//! from `imageproc`. Every draw call composites through a coverage mask
//! sampled at pixel centers, so a clip applies the same way to fills,
//! images and strokes.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect as PixelRect;

use crate::geometry::Rect;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

const COVERED: Luma<u8> = Luma([255]);
const UNCOVERED: Luma<u8> = Luma([0]);

/// A clip region applied to a draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clip {
    None,
    RoundedRect { rect: Rect, radius: f64 },
    Circle { cx: f64, cy: f64, radius: f64 },
}

impl Clip {
    pub fn rounded(rect: Rect, radius: f64) -> Self {
        Clip::RoundedRect { rect, radius }
    }

    /// Circle with diameter `min(w, h)` anchored at the rect's top-left.
    pub fn circle_in(rect: Rect) -> Self {
        let radius = rect.w.min(rect.h).max(0.0) / 2.0;
        Clip::Circle {
            cx: rect.x + radius,
            cy: rect.y + radius,
            radius,
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        match *self {
            Clip::None => true,
            Clip::Circle { cx, cy, radius } => {
                let dx = px - cx;
                let dy = py - cy;
                dx * dx + dy * dy <= radius * radius
            }
            Clip::RoundedRect { rect, radius } => {
                if !rect.contains(px, py) {
                    return false;
                }
                let r = radius.clamp(0.0, rect.w.min(rect.h) / 2.0);
                let nx = px.clamp(rect.x + r, rect.right() - r);
                let ny = py.clamp(rect.y + r, rect.bottom() - r);
                let dx = px - nx;
                let dy = py - ny;
                dx * dx + dy * dy <= r * r
            }
        }
    }

    /// Coverage of the clip over `window`, 255 where a pixel is inside.
    fn mask(&self, window: &Window) -> GrayImage {
        match *self {
            Clip::None => GrayImage::from_pixel(window.w, window.h, COVERED),
            Clip::Circle { cx, cy, radius } => {
                let mut mask = GrayImage::new(window.w, window.h);
                fill_disc(
                    &mut mask,
                    cx - window.x as f64,
                    cy - window.y as f64,
                    radius,
                    COVERED,
                );
                mask
            }
            Clip::RoundedRect { .. } => GrayImage::from_fn(window.w, window.h, |x, y| {
                let px = (window.x + x) as f64 + 0.5;
                let py = (window.y + y) as f64 + 0.5;
                if self.contains(px, py) {
                    COVERED
                } else {
                    UNCOVERED
                }
            }),
        }
    }
}

/// Pixels `[x, x + w) x [y, y + h)` of the canvas touched by a draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Integer bounds `(x0, y0, x1, y1)` of the pixels whose centers lie in
/// `rect`. May reach past the canvas.
fn pixel_bounds(rect: Rect) -> (i64, i64, i64, i64) {
    (
        (rect.x - 0.5).ceil() as i64,
        (rect.y - 0.5).ceil() as i64,
        (rect.right() - 0.5).ceil() as i64,
        (rect.bottom() - 0.5).ceil() as i64,
    )
}

/// The part of `rect` that lands on the canvas.
fn window(canvas: &RgbaImage, rect: Rect) -> Option<Window> {
    if rect.is_empty() {
        return None;
    }
    let (w, h) = canvas.dimensions();
    let (x0, y0, x1, y1) = pixel_bounds(rect);
    let (x0, y0) = (x0.max(0), y0.max(0));
    let (x1, y1) = (x1.min(w as i64), y1.min(h as i64));
    (x0 < x1 && y0 < y1).then(|| Window {
        x: x0 as u32,
        y: y0 as u32,
        w: (x1 - x0) as u32,
        h: (y1 - y0) as u32,
    })
}

/// Set every pixel of `mask` within `radius` of `(cx, cy)` to `value`.
///
/// `(cx, cy)` is in continuous coordinates, pixel `i` spans `[i, i + 1)`.
fn fill_disc(mask: &mut GrayImage, cx: f64, cy: f64, radius: f64, value: Luma<u8>) {
    if radius <= 0.0 {
        return;
    }
    let center = ((cx - 0.5).round() as i32, (cy - 0.5).round() as i32);
    draw_filled_circle_mut(mask, center, radius.round() as i32, value);
}

/// Blend `source(x, y)` into the canvas wherever `mask` is covered.
/// Coordinates handed to `source` are relative to `window`.
fn paint_masked<F>(canvas: &mut RgbaImage, window: &Window, mask: &GrayImage, source: F)
where
    F: Fn(u32, u32) -> Rgba<u8>,
{
    for (x, y, coverage) in mask.enumerate_pixels() {
        if coverage[0] > 0 {
            blend(
                canvas.get_pixel_mut(window.x + x, window.y + y),
                source(x, y),
                1.0,
            );
        }
    }
}

/// Source-over blend of `src` onto `dst` at the given extra opacity.
pub fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f32) {
    let sa = (src[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        *dst = Rgba([src[0], src[1], src[2], 255]);
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let value = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Overwrite every pixel with `color`.
pub fn fill(canvas: &mut RgbaImage, color: Rgba<u8>) {
    for pixel in canvas.pixels_mut() {
        *pixel = color;
    }
}

/// Fill `rect` (intersected with `clip`) with `color`.
pub fn fill_rect(canvas: &mut RgbaImage, rect: Rect, color: Rgba<u8>, clip: &Clip) {
    let Some(window) = window(canvas, rect) else {
        return;
    };
    if *clip == Clip::None && color[3] == 255 {
        let target = PixelRect::at(window.x as i32, window.y as i32).of_size(window.w, window.h);
        draw_filled_rect_mut(canvas, target, color);
        return;
    }
    let mask = clip.mask(&window);
    paint_masked(canvas, &window, &mask, |_, _| color);
}

/// Draw the `src_rect` region of `src` scaled into `dst_rect`.
///
/// Nearest-neighbour sampling; pixels outside `clip` are left untouched.
pub fn draw_image(
    canvas: &mut RgbaImage,
    src: &RgbaImage,
    src_rect: Rect,
    dst_rect: Rect,
    clip: &Clip,
) {
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 || src_rect.is_empty() {
        return;
    }
    let Some(window) = window(canvas, dst_rect) else {
        return;
    };
    let (dx0, dy0, dx1, dy1) = pixel_bounds(dst_rect);

    let sx0 = (src_rect.x.floor().max(0.0) as u32).min(src_w - 1);
    let sy0 = (src_rect.y.floor().max(0.0) as u32).min(src_h - 1);
    let sx1 = (src_rect.right().ceil().max(0.0) as u32).clamp(sx0 + 1, src_w);
    let sy1 = (src_rect.bottom().ceil().max(0.0) as u32).clamp(sy0 + 1, src_h);
    let crop = imageops::crop_imm(src, sx0, sy0, sx1 - sx0, sy1 - sy0).to_image();
    let scaled = imageops::resize(
        &crop,
        (dx1 - dx0) as u32,
        (dy1 - dy0) as u32,
        FilterType::Nearest,
    );

    // Offset of the visible window inside the scaled image.
    let ox = (window.x as i64 - dx0) as u32;
    let oy = (window.y as i64 - dy0) as u32;
    let mask = clip.mask(&window);
    paint_masked(canvas, &window, &mask, |x, y| *scaled.get_pixel(ox + x, oy + y));
}

/// Two-stop linear gradient running from the top-left corner to the
/// bottom-right corner.
pub fn diagonal_gradient(canvas: &mut RgbaImage, from: Rgba<u8>, to: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    let (fw, fh) = (w as f64, h as f64);
    let norm = fw * fw + fh * fh;
    if norm <= 0.0 {
        return;
    }
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let t = (((x as f64 + 0.5) * fw + (y as f64 + 0.5) * fh) / norm).clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        *pixel = Rgba([
            lerp(from[0], to[0]),
            lerp(from[1], to[1]),
            lerp(from[2], to[2]),
            255,
        ]);
    }
}

/// Soft shadow under a circle: full strength inside, fading linearly
/// across a band of width `blur` centered on the edge.
pub fn circle_shadow(
    canvas: &mut RgbaImage,
    cx: f64,
    cy: f64,
    radius: f64,
    blur: f64,
    color: Rgba<u8>,
) {
    let blur = blur.max(1.0);
    let extent = radius + blur / 2.0;
    let bounds = Rect::new(cx - extent, cy - extent, extent * 2.0, extent * 2.0);
    let Some(window) = window(canvas, bounds) else {
        return;
    };
    for y in window.y..window.y + window.h {
        for x in window.x..window.x + window.w {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let edge = (dx * dx + dy * dy).sqrt() - radius;
            let coverage = (0.5 - edge / blur).clamp(0.0, 1.0);
            if coverage > 0.0 {
                blend(canvas.get_pixel_mut(x, y), color, coverage as f32);
            }
        }
    }
}

/// Stroke a circle outline of the given line width, centered on the radius.
pub fn stroke_circle(
    canvas: &mut RgbaImage,
    cx: f64,
    cy: f64,
    radius: f64,
    line_width: f64,
    color: Rgba<u8>,
) {
    let half = line_width / 2.0;
    // One spare pixel for rounding of the disc radius.
    let extent = radius + half + 1.0;
    let bounds = Rect::new(cx - extent, cy - extent, extent * 2.0, extent * 2.0);
    let Some(window) = window(canvas, bounds) else {
        return;
    };
    let (lx, ly) = (cx - window.x as f64, cy - window.y as f64);
    let mut ring = GrayImage::new(window.w, window.h);
    fill_disc(&mut ring, lx, ly, radius + half, COVERED);
    fill_disc(&mut ring, lx, ly, radius - half, UNCOVERED);
    paint_masked(canvas, &window, &ring, |_, _| color);
}

/// Stroke the outline of a rounded rectangle, centered on its edge.
pub fn stroke_rounded_rect(
    canvas: &mut RgbaImage,
    rect: Rect,
    radius: f64,
    line_width: f64,
    color: Rgba<u8>,
) {
    let half = line_width / 2.0;
    let outer_rect = rect.inset(-half);
    let outer = Clip::rounded(outer_rect, radius + half);
    let inner = Clip::rounded(rect.inset(half), (radius - half).max(0.0));
    let Some(window) = window(canvas, outer_rect) else {
        return;
    };
    let mut band = outer.mask(&window);
    for (x, y, coverage) in band.enumerate_pixels_mut() {
        let px = (window.x + x) as f64 + 0.5;
        let py = (window.y + y) as f64 + 0.5;
        if inner.contains(px, py) {
            *coverage = UNCOVERED;
        }
    }
    paint_masked(canvas, &window, &band, |_, _| color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_half_transparent_over_opaque() {
        let mut dst = Rgba([0, 0, 0, 255]);
        blend(&mut dst, Rgba([255, 255, 255, 128]), 1.0);
        assert_eq!(dst[3], 255);
        assert!((dst[0] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn test_rounded_clip_excludes_corner() {
        let clip = Clip::rounded(Rect::from_size(100.0, 100.0), 16.0);
        assert!(!clip.contains(0.5, 0.5));
        assert!(clip.contains(16.0, 0.5));
        assert!(clip.contains(50.0, 50.0));
        assert!(!clip.contains(100.5, 50.0));
    }

    #[test]
    fn test_circle_clip_uses_min_side() {
        let clip = Clip::circle_in(Rect::new(10.0, 10.0, 40.0, 80.0));
        assert_eq!(
            clip,
            Clip::Circle {
                cx: 30.0,
                cy: 30.0,
                radius: 20.0
            }
        );
    }

    #[test]
    fn test_draw_image_respects_clip() {
        let mut canvas = RgbaImage::from_pixel(10, 10, BLACK);
        let src = RgbaImage::from_pixel(2, 2, WHITE);
        let clip = Clip::circle_in(Rect::from_size(10.0, 10.0));
        draw_image(
            &mut canvas,
            &src,
            Rect::from_size(2.0, 2.0),
            Rect::from_size(10.0, 10.0),
            &clip,
        );
        assert_eq!(*canvas.get_pixel(5, 5), WHITE);
        assert_eq!(*canvas.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn test_gradient_endpoints() {
        let mut canvas = RgbaImage::new(100, 50);
        diagonal_gradient(&mut canvas, Rgba([255, 0, 0, 255]), Rgba([0, 0, 255, 255]));
        let top_left = canvas.get_pixel(0, 0);
        let bottom_right = canvas.get_pixel(99, 49);
        assert!(top_left[0] > 250 && top_left[2] < 5);
        assert!(bottom_right[2] > 250 && bottom_right[0] < 5);
    }

    #[test]
    fn test_stroke_circle_leaves_center() {
        let mut canvas = RgbaImage::from_pixel(40, 40, BLACK);
        stroke_circle(&mut canvas, 20.0, 20.0, 15.0, 4.0, WHITE);
        assert_eq!(*canvas.get_pixel(20, 20), BLACK);
        assert_eq!(*canvas.get_pixel(35, 20), WHITE);
    }

    #[test]
    fn test_draw_outside_canvas_is_noop() {
        let mut canvas = RgbaImage::from_pixel(4, 4, BLACK);
        fill_rect(&mut canvas, Rect::new(10.0, 10.0, 5.0, 5.0), WHITE, &Clip::None);
        assert!(canvas.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_draw_image_scales_crop() {
        // Left half red, right half blue.
        let src = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let mut canvas = RgbaImage::from_pixel(20, 10, BLACK);
        draw_image(
            &mut canvas,
            &src,
            Rect::new(2.0, 0.0, 2.0, 2.0),
            Rect::new(5.0, 0.0, 10.0, 10.0),
            &Clip::None,
        );
        assert_eq!(*canvas.get_pixel(4, 5), BLACK);
        assert_eq!(*canvas.get_pixel(5, 5), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.get_pixel(14, 9), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.get_pixel(15, 5), BLACK);
    }

    #[test]
    fn test_draw_image_partly_off_canvas() {
        let mut canvas = RgbaImage::from_pixel(10, 10, BLACK);
        let src = RgbaImage::from_pixel(3, 3, WHITE);
        draw_image(
            &mut canvas,
            &src,
            Rect::from_size(3.0, 3.0),
            Rect::new(-5.0, -5.0, 10.0, 10.0),
            &Clip::None,
        );
        assert_eq!(*canvas.get_pixel(0, 0), WHITE);
        assert_eq!(*canvas.get_pixel(4, 4), WHITE);
        assert_eq!(*canvas.get_pixel(5, 5), BLACK);
    }

    #[test]
    fn test_translucent_fill_blends_inside_clip() {
        let mut canvas = RgbaImage::from_pixel(20, 20, WHITE);
        let clip = Clip::circle_in(Rect::from_size(20.0, 20.0));
        fill_rect(
            &mut canvas,
            Rect::from_size(20.0, 20.0),
            Rgba([0, 0, 0, 128]),
            &clip,
        );
        let center = canvas.get_pixel(10, 10);
        assert!((center[0] as i32 - 127).abs() <= 1);
        assert_eq!(*canvas.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_stroke_rounded_rect_is_hollow() {
        let mut canvas = RgbaImage::from_pixel(40, 30, BLACK);
        stroke_rounded_rect(&mut canvas, Rect::new(5.0, 5.0, 30.0, 20.0), 6.0, 2.0, WHITE);
        assert_eq!(*canvas.get_pixel(20, 5), WHITE);
        assert_eq!(*canvas.get_pixel(20, 15), BLACK);
        assert_eq!(*canvas.get_pixel(4, 4), BLACK);
    }
}
