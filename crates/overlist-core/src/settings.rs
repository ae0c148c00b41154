use serde::{Deserialize, Serialize};

/// Viewport corner used for anchoring when no explicit dragged position
/// exists. Wire values are kebab-case ("top-right", ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CornerPosition {
    TopRight,
    BottomRight,
    BottomLeft,
    TopLeft,
}

/// Shared overlay settings. `enabled = false` unmounts every overlay-class
/// surface; the full page keeps running but still honors `position`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub enabled: bool,
    pub position: CornerPosition,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            position: CornerPosition::TopRight,
        }
    }
}

/// Field-level change to Settings. The store only supports whole-value
/// replace, so patches are merged over the current value before writing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<CornerPosition>,
}

impl Settings {
    pub fn merged(self, patch: SettingsPatch) -> Settings {
        Settings {
            enabled: patch.enabled.unwrap_or(self.enabled),
            position: patch.position.unwrap_or(self.position),
        }
    }
}
