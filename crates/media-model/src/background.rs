//! Background options for exported clips.

use serde::{Deserialize, Serialize};

/// Kind of background fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    /// Opaque black.
    None,
    /// `value` is a path to an image file.
    Image,
    /// `value` is a gradient description containing `#rrggbb` colors.
    Gradient,
}

/// A selectable background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundOption {
    pub id: String,
    pub label: String,
    pub kind: BackgroundKind,
    pub value: String,
}

impl BackgroundOption {
    pub fn none() -> Self {
        Self {
            id: "none".to_string(),
            label: "None".to_string(),
            kind: BackgroundKind::None,
            value: "#000000".to_string(),
        }
    }

    /// A background image loaded from a local file.
    pub fn image(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: format!("image:{path}"),
            label: "Custom Image".to_string(),
            kind: BackgroundKind::Image,
            value: path,
        }
    }

    pub fn gradient(id: &str, label: &str, value: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind: BackgroundKind::Gradient,
            value: value.to_string(),
        }
    }

    /// Look up a background by id.
    ///
    /// Catalogue ids resolve to their entry; `image:<path>` resolves to an
    /// image background; anything else is `None`.
    pub fn lookup(id: &str) -> Option<Self> {
        if let Some(path) = id.strip_prefix("image:") {
            return Some(Self::image(path));
        }
        background_catalogue().into_iter().find(|bg| bg.id == id)
    }

    /// Like [`lookup`](Self::lookup), falling back to the `none` background.
    pub fn from_id_or_none(id: &str) -> Self {
        Self::lookup(id).unwrap_or_else(|| {
            tracing::warn!(id, "Unknown background id, using none");
            Self::none()
        })
    }
}

impl Default for BackgroundOption {
    fn default() -> Self {
        Self::none()
    }
}

/// Built-in backgrounds: `none` followed by the named gradients.
pub fn background_catalogue() -> Vec<BackgroundOption> {
    const GRADIENTS: [(&str, &str, &str); 10] = [
        ("gradient-sunset", "Sunset", "linear-gradient(135deg, #f6d365 0%, #fda085 100%)"),
        ("gradient-ocean", "Ocean", "linear-gradient(135deg, #4facfe 0%, #00f2fe 100%)"),
        ("gradient-purple", "Purple Haze", "linear-gradient(135deg, #667eea 0%, #764ba2 100%)"),
        ("gradient-green", "Emerald", "linear-gradient(135deg, #0ba360 0%, #3cba92 100%)"),
        ("gradient-dark", "Midnight", "linear-gradient(135deg, #232526 0%, #414345 100%)"),
        ("gradient-warm", "Warmth", "linear-gradient(135deg, #ff9a9e 0%, #fecfef 99%, #fecfef 100%)"),
        ("gradient-cool", "Cool Breeze", "linear-gradient(120deg, #84fab0 0%, #8fd3f4 100%)"),
        ("gradient-neon", "Neon Life", "linear-gradient(to right, #43e97b 0%, #38f9d7 100%)"),
        ("gradient-love", "Passion", "linear-gradient(to top, #f43b47 0%, #453a94 100%)"),
        ("gradient-space", "Deep Space", "linear-gradient(to top, #30cfd0 0%, #330867 100%)"),
    ];

    std::iter::once(BackgroundOption::none())
        .chain(
            GRADIENTS
                .iter()
                .map(|(id, label, value)| BackgroundOption::gradient(id, label, value)),
        )
        .collect()
}
