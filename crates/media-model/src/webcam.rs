//! Webcam overlay placement for the live composite.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Clip shape of the webcam overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebcamShape {
    #[default]
    Circle,
    RoundedRect,
}

/// Webcam overlay rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WebcamConfig {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub shape: WebcamShape,
}

impl WebcamConfig {
    /// A square overlay of edge `size` anchored `padding` from the
    /// bottom-right canvas corner.
    pub fn bottom_right(canvas_width: u32, canvas_height: u32, size: u32, padding: u32) -> Self {
        let size = size as f64;
        let padding = padding as f64;
        Self {
            x: (canvas_width as f64 - size - padding).max(0.0),
            y: (canvas_height as f64 - size - padding).max(0.0),
            width: size,
            height: size,
            shape: WebcamShape::Circle,
        }
    }

    /// Apply a partial update; unset fields keep their value.
    pub fn apply(&mut self, update: &WebcamConfigUpdate) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(width) = update.width {
            self.width = width.max(1.0);
        }
        if let Some(height) = update.height {
            self.height = height.max(1.0);
        }
        if let Some(shape) = update.shape {
            self.shape = shape;
        }
    }
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self::bottom_right(1920, 1080, 320, 20)
    }
}

/// A partial update to a [`WebcamConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WebcamConfigUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub shape: Option<WebcamShape>,
}

/// Shared handle to the current webcam placement.
///
/// The UI writes through [`update`](Self::update); the live compositor takes
/// a [`snapshot`](Self::snapshot) each frame.
#[derive(Debug, Clone, Default)]
pub struct WebcamConfigHandle {
    inner: Arc<RwLock<WebcamConfig>>,
}

impl WebcamConfigHandle {
    pub fn new(config: WebcamConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> WebcamConfig {
        *self.inner.read()
    }

    pub fn update(&self, update: WebcamConfigUpdate) -> WebcamConfig {
        let mut config = self.inner.write();
        config.apply(&update);
        *config
    }

    pub fn replace(&self, config: WebcamConfig) {
        *self.inner.write() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_right_default() {
        let config = WebcamConfig::default();
        assert_eq!(config.x, 1580.0);
        assert_eq!(config.y, 740.0);
        assert_eq!(config.shape, WebcamShape::Circle);
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let handle = WebcamConfigHandle::default();
        let before = handle.snapshot();
        let after = handle.update(WebcamConfigUpdate {
            x: Some(10.0),
            shape: Some(WebcamShape::RoundedRect),
            ..Default::default()
        });

        assert_eq!(after.x, 10.0);
        assert_eq!(after.y, before.y);
        assert_eq!(after.width, before.width);
        assert_eq!(after.shape, WebcamShape::RoundedRect);
        assert_eq!(handle.snapshot(), after);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let handle = WebcamConfigHandle::default();
        let snapshot = handle.snapshot();
        handle.update(WebcamConfigUpdate {
            width: Some(100.0),
            ..Default::default()
        });
        assert_eq!(snapshot.width, 320.0);
    }
}
