//! Page-level visual settings.
//!
//! Settings split into two groups. Text-like values (`display_name`, `bio`,
//! `accent_color`) can be patched into a live surface in place. Everything
//! that changes layout (mode, fonts, spacing, animation, free-form extras)
//! needs the surface rebuilt and therefore feeds the fingerprint.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Stack,
    Grid,
    Carousel,
}

impl LayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Stack => "stack",
            LayoutMode::Grid => "grid",
            LayoutMode::Carousel => "carousel",
        }
    }
}

/// Pixel spacing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spacing {
    pub item_gap: u32,
    pub page_padding: u32,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            item_gap: 12,
            page_padding: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationDescriptor {
    pub name: String,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub display_name: String,
    pub bio: String,
    pub accent_color: String,

    pub layout: LayoutMode,
    pub font_family: String,
    pub heading_font: Option<String>,
    pub spacing: Spacing,
    pub animation: Option<AnimationDescriptor>,

    /// Free-form layout knobs; iteration order carries no meaning
    pub extra: HashMap<String, String>,
}

impl UserSettings {
    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_font(mut self, font_family: impl Into<String>) -> Self {
        self.font_family = font_family.into();
        self
    }
}
