//! Public entry point of a render surface.
//!
//! A rebuilt surface fetches its own copy of the page through this URL; the
//! engine only ever hands it the reference, never the state itself.

use crate::message::FrameSize;
use pagesync_model::LayoutMode;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceEntryPoint {
    base_url: Url,
    handle: String,
    layout: Option<LayoutMode>,
    frame: Option<FrameSize>,
}

impl SurfaceEntryPoint {
    pub fn new(base_url: &str, handle: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            handle: handle.into(),
            layout: None,
            frame: None,
        })
    }

    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_frame(mut self, frame: FrameSize) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// e.g. `https://pages.example/alice?preview=true&layout=grid&frameWidth=390&frameHeight=844`
    pub fn url(&self) -> Url {
        let mut url = self.base_url.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.handle);
        }

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("preview", "true");
            if let Some(layout) = self.layout {
                query.append_pair("layout", layout.as_str());
            }
            if let Some(frame) = self.frame {
                query.append_pair("frameWidth", &(frame.frame_width.round() as u32).to_string());
                query.append_pair("frameHeight", &(frame.frame_height.round() as u32).to_string());
            }
        }

        url
    }
}

/// Query parameters accepted on the public read path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryQuery {
    pub preview: bool,
    pub layout: Option<LayoutMode>,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
}
