//! Rectangles and aspect-ratio fitting.

/// An axis-aligned rectangle in canvas (or source) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(w: f64, h: f64) -> Self {
        Self::new(0.0, 0.0, w, h)
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    /// Half-open containment: left/top edges inclusive, right/bottom exclusive.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Shrink by `d` on every side.
    pub fn inset(&self, d: f64) -> Rect {
        Rect::new(
            self.x + d,
            self.y + d,
            (self.w - 2.0 * d).max(0.0),
            (self.h - 2.0 * d).max(0.0),
        )
    }
}

/// Where a source of `src_w`x`src_h` lands when fitted inside `dst` without
/// cropping. The result is centered in `dst` and keeps the source aspect.
pub fn contain_rect(src_w: f64, src_h: f64, dst: Rect) -> Rect {
    if src_w <= 0.0 || src_h <= 0.0 || dst.is_empty() {
        return Rect::new(dst.x, dst.y, 0.0, 0.0);
    }
    let source_aspect = src_w / src_h;
    let dest_aspect = dst.w / dst.h;

    if source_aspect > dest_aspect {
        let draw_h = dst.w / source_aspect;
        Rect::new(dst.x, dst.y + (dst.h - draw_h) / 2.0, dst.w, draw_h)
    } else {
        let draw_w = dst.h * source_aspect;
        Rect::new(dst.x + (dst.w - draw_w) / 2.0, dst.y, draw_w, dst.h)
    }
}

/// The centered region of the source that, scaled, exactly covers `dst`.
///
/// Returned in source pixels.
pub fn cover_crop(src_w: f64, src_h: f64, dst: Rect) -> Rect {
    if src_w <= 0.0 || src_h <= 0.0 || dst.is_empty() {
        return Rect::from_size(src_w.max(0.0), src_h.max(0.0));
    }
    let source_aspect = src_w / src_h;
    let dest_aspect = dst.w / dst.h;

    if source_aspect > dest_aspect {
        let crop_w = src_h * dest_aspect;
        Rect::new((src_w - crop_w) / 2.0, 0.0, crop_w, src_h)
    } else {
        let crop_h = src_w / dest_aspect;
        Rect::new(0.0, (src_h - crop_h) / 2.0, src_w, crop_h)
    }
}
