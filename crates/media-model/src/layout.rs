//! Layout identifiers.

use serde::{Deserialize, Serialize};

/// Identifier of a registered export layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutId {
    /// Screen with a circular camera bubble in the bottom-right corner.
    #[default]
    ScreenCameraBr,
    /// Screen with a circular camera bubble in the bottom-left corner.
    ScreenCameraBl,
    /// Camera column on the left, screen on the right.
    ScreenCameraLeft,
    /// Screen on the left, camera column on the right.
    ScreenCameraRight,
    CameraOnlyCenter,
    CameraOnlyFull,
    ScreenOnly,
}

impl LayoutId {
    /// Every layout, in catalogue order.
    pub const ALL: [LayoutId; 7] = [
        LayoutId::ScreenCameraBr,
        LayoutId::ScreenCameraBl,
        LayoutId::ScreenCameraLeft,
        LayoutId::ScreenCameraRight,
        LayoutId::CameraOnlyCenter,
        LayoutId::CameraOnlyFull,
        LayoutId::ScreenOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutId::ScreenCameraBr => "screen-camera-br",
            LayoutId::ScreenCameraBl => "screen-camera-bl",
            LayoutId::ScreenCameraLeft => "screen-camera-left",
            LayoutId::ScreenCameraRight => "screen-camera-right",
            LayoutId::CameraOnlyCenter => "camera-only-center",
            LayoutId::CameraOnlyFull => "camera-only-full",
            LayoutId::ScreenOnly => "screen-only",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LayoutId::ScreenCameraBr => "Bottom Right",
            LayoutId::ScreenCameraBl => "Bottom Left",
            LayoutId::ScreenCameraLeft => "Camera Left",
            LayoutId::ScreenCameraRight => "Camera Right",
            LayoutId::CameraOnlyCenter => "Centered",
            LayoutId::CameraOnlyFull => "Full Screen",
            LayoutId::ScreenOnly => "Screen Only",
        }
    }

    /// Look up a layout by id. Unknown ids resolve to the default layout.
    pub fn from_id_or_default(id: &str) -> Self {
        id.parse().unwrap_or_else(|_| {
            tracing::warn!(id, "Unknown layout id, using default layout");
            LayoutId::default()
        })
    }

    /// Whether the layout draws the screen source at all.
    pub fn uses_screen(self) -> bool {
        !matches!(self, LayoutId::CameraOnlyCenter | LayoutId::CameraOnlyFull)
    }

    /// Whether the layout draws the camera source at all.
    pub fn uses_camera(self) -> bool {
        !matches!(self, LayoutId::ScreenOnly)
    }
}

impl std::fmt::Display for LayoutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown layout id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown layout id: {0}")]
pub struct UnknownLayout(pub String);

impl std::str::FromStr for LayoutId {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutId::ALL
            .into_iter()
            .find(|layout| layout.as_str() == s)
            .ok_or_else(|| UnknownLayout(s.to_string()))
    }
}
