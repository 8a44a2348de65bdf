//! # Cross-Context Messages
//!
//! Wire schema shared by the editor and isolated render surfaces. Messages
//! are either a bare string tag or an object with a `type` field:
//!
//! ```text
//! "refresh"                                   → full reconstruction
//! "update_user"                               → settings changed
//! "update_links"                              → items changed
//! { "type": "update_dimensions",
//!   "frameWidth": 390, "frameHeight": 844 }   → frame resized
//! ```
//!
//! Anything else is ignored, never an error.

use crate::broker::ChangeKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const REFRESH: &str = "refresh";
pub const UPDATE_USER: &str = "update_user";
pub const UPDATE_LINKS: &str = "update_links";
pub const UPDATE_DIMENSIONS: &str = "update_dimensions";

/// Rendered footprint of a surface, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSize {
    pub frame_width: f64,
    pub frame_height: f64,
}

impl FrameSize {
    pub fn new(frame_width: f64, frame_height: f64) -> Self {
        Self {
            frame_width,
            frame_height,
        }
    }

    /// True when either axis moved by at least `threshold` pixels
    pub fn differs_from(&self, other: &FrameSize, threshold: f64) -> bool {
        (self.frame_width - other.frame_width).abs() >= threshold
            || (self.frame_height - other.frame_height).abs() >= threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceMessage {
    Refresh,
    UpdateUser,
    UpdateLinks,
    UpdateDimensions(FrameSize),
}

impl SurfaceMessage {
    /// Parse an untyped message; unrecognized shapes yield `None`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(tag) => match tag.as_str() {
                REFRESH => Some(SurfaceMessage::Refresh),
                UPDATE_USER => Some(SurfaceMessage::UpdateUser),
                UPDATE_LINKS => Some(SurfaceMessage::UpdateLinks),
                _ => None,
            },
            Value::Object(fields) => {
                if fields.get("type").and_then(Value::as_str) != Some(UPDATE_DIMENSIONS) {
                    return None;
                }
                let width = fields.get("frameWidth").and_then(Value::as_f64)?;
                let height = fields.get("frameHeight").and_then(Value::as_f64)?;
                if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
                    return None;
                }
                Some(SurfaceMessage::UpdateDimensions(FrameSize::new(width, height)))
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            SurfaceMessage::Refresh => Value::String(REFRESH.to_string()),
            SurfaceMessage::UpdateUser => Value::String(UPDATE_USER.to_string()),
            SurfaceMessage::UpdateLinks => Value::String(UPDATE_LINKS.to_string()),
            SurfaceMessage::UpdateDimensions(size) => json!({
                "type": UPDATE_DIMENSIONS,
                "frameWidth": size.frame_width,
                "frameHeight": size.frame_height,
            }),
        }
    }

    /// The change notification this message stands for
    pub fn change_kind(&self) -> ChangeKind {
        match self {
            SurfaceMessage::Refresh => ChangeKind::ExternalRefreshRequested,
            SurfaceMessage::UpdateUser => ChangeKind::UserSettingsChanged,
            SurfaceMessage::UpdateLinks => ChangeKind::ItemsChanged,
            SurfaceMessage::UpdateDimensions(size) => ChangeKind::DimensionsChanged(*size),
        }
    }
}
