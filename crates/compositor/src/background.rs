//! Background resolution and fills.

use std::sync::{Arc, OnceLock};

use clipcast_media_model::{BackgroundKind, BackgroundOption};
use image::{Rgba, RgbaImage};
use regex::Regex;

use crate::geometry::{cover_crop, Rect};
use crate::raster::{diagonal_gradient, draw_image, fill, Clip, BLACK};

const FALLBACK_FROM: Rgba<u8> = Rgba([0x33, 0x33, 0x33, 255]);
const FALLBACK_TO: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 255]);

/// A background ready to draw: images are already decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedBackground {
    Solid(Rgba<u8>),
    Gradient { from: Rgba<u8>, to: Rgba<u8> },
    Image(Arc<RgbaImage>),
}

impl ResolvedBackground {
    /// The `none` background: opaque black.
    pub fn none() -> Self {
        ResolvedBackground::Solid(BLACK)
    }
}

impl Default for ResolvedBackground {
    fn default() -> Self {
        Self::none()
    }
}

fn color_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"#[0-9a-fA-F]{6}").ok())
        .as_ref()
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    let digits = hex.strip_prefix('#')?;
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// First two `#rrggbb` colors found in a gradient description.
///
/// Falls back to `#333333 -> #000000` when fewer than two colors parse.
pub fn gradient_colors(value: &str) -> (Rgba<u8>, Rgba<u8>) {
    let colors: Vec<Rgba<u8>> = color_pattern()
        .map(|re| {
            re.find_iter(value)
                .filter_map(|m| parse_hex(m.as_str()))
                .take(2)
                .collect()
        })
        .unwrap_or_default();

    match colors.as_slice() {
        [from, to, ..] => (*from, *to),
        _ => (FALLBACK_FROM, FALLBACK_TO),
    }
}

/// Turn a background option into something drawable.
///
/// Image backgrounds are decoded here, before any frame is rendered. An
/// image that cannot be read or decoded resolves to the `none` fill.
pub fn resolve_background(option: &BackgroundOption) -> ResolvedBackground {
    match option.kind {
        BackgroundKind::None => ResolvedBackground::none(),
        BackgroundKind::Gradient => {
            let (from, to) = gradient_colors(&option.value);
            ResolvedBackground::Gradient { from, to }
        }
        BackgroundKind::Image => match image::open(&option.value) {
            Ok(decoded) => {
                tracing::debug!(path = %option.value, "Decoded background image");
                ResolvedBackground::Image(Arc::new(decoded.into_rgba8()))
            }
            Err(e) => {
                tracing::warn!(
                    path = %option.value,
                    error = %e,
                    "Background image could not be decoded, using none"
                );
                ResolvedBackground::none()
            }
        },
    }
}

/// Paint the whole canvas with the background.
pub fn draw_background(canvas: &mut RgbaImage, background: &ResolvedBackground) {
    match background {
        ResolvedBackground::Solid(color) => fill(canvas, *color),
        ResolvedBackground::Gradient { from, to } => diagonal_gradient(canvas, *from, *to),
        ResolvedBackground::Image(img) => {
            fill(canvas, BLACK);
            let (w, h) = canvas.dimensions();
            let dst = Rect::from_size(w as f64, h as f64);
            let crop = cover_crop(img.width() as f64, img.height() as f64, dst);
            draw_image(canvas, img, crop, dst, &Clip::None);
        }
    }
}
