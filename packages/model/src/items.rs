//! # Content Items
//!
//! The three kinds of content a page is built from. Links and text blocks live
//! in separate storages and carry their own `order`; the gallery is a single
//! block whose position in the flow is stored on the page (see
//! [`GalleryPlacement`](crate::GalleryPlacement)).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque stable identifier, unique within its variant's storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which storage an item comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Link,
    Text,
    Gallery,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Link => f.write_str("link"),
            ItemKind::Text => f.write_str("text"),
            ItemKind::Gallery => f.write_str("gallery"),
        }
    }
}

/// Identity of an entry in a rendered sequence.
///
/// Ids are only unique per storage, so drag gestures address items by
/// `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: ItemKind,
    pub id: ItemId,
}

impl ItemKey {
    pub fn link(id: impl Into<ItemId>) -> Self {
        Self { kind: ItemKind::Link, id: id.into() }
    }

    pub fn text(id: impl Into<ItemId>) -> Self {
        Self { kind: ItemKind::Text, id: id.into() }
    }

    /// Key of the gallery placeholder (there is only ever one)
    pub fn gallery() -> Self {
        Self {
            kind: ItemKind::Gallery,
            id: ItemId::new(GALLERY_PLACEHOLDER_ID),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.id)
    }
}

pub const GALLERY_PLACEHOLDER_ID: &str = "gallery";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: ItemId,
    pub title: String,
    pub url: String,
    pub order: u32,
    #[serde(default)]
    pub is_social: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl Link {
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>, url: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            order,
            is_social: false,
            archived: false,
            hidden: false,
        }
    }

    /// Same link, placed in the social icon row instead of the main flow
    pub fn social(mut self) -> Self {
        self.is_social = true;
        self
    }

    pub fn is_visible(&self) -> bool {
        !self.archived && !self.hidden
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub id: ItemId,
    pub content: String,
    pub order: u32,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl TextBlock {
    pub fn new(id: impl Into<ItemId>, content: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            order,
            archived: false,
            hidden: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.archived && !self.hidden
    }
}

/// One media entry inside the gallery block. Its `order` is internal to the
/// gallery and never mixes with the page flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: ItemId,
    pub media_url: String,
    pub order: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gallery {
    pub items: Vec<GalleryItem>,
}

impl Gallery {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// An entry of the merged, rendered flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentItem {
    Link(Link),
    TextBlock(TextBlock),
    GalleryPlaceholder,
}

impl ContentItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            ContentItem::Link(_) => ItemKind::Link,
            ContentItem::TextBlock(_) => ItemKind::Text,
            ContentItem::GalleryPlaceholder => ItemKind::Gallery,
        }
    }

    pub fn key(&self) -> ItemKey {
        match self {
            ContentItem::Link(link) => ItemKey::link(link.id.clone()),
            ContentItem::TextBlock(text) => ItemKey::text(text.id.clone()),
            ContentItem::GalleryPlaceholder => ItemKey::gallery(),
        }
    }

    /// Stored order, `None` for the placeholder (its position lives on the page)
    pub fn order(&self) -> Option<u32> {
        match self {
            ContentItem::Link(link) => Some(link.order),
            ContentItem::TextBlock(text) => Some(text.order),
            ContentItem::GalleryPlaceholder => None,
        }
    }

    pub fn set_order(&mut self, order: u32) {
        match self {
            ContentItem::Link(link) => link.order = order,
            ContentItem::TextBlock(text) => text.order = order,
            ContentItem::GalleryPlaceholder => {}
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ContentItem::GalleryPlaceholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_do_not_collide_across_storages() {
        let link = ContentItem::Link(Link::new("1", "Blog", "https://blog.example", 0));
        let text = ContentItem::TextBlock(TextBlock::new("1", "Hello", 1));

        assert_ne!(link.key(), text.key());
        assert_eq!(link.key().to_string(), "link-1");
        assert_eq!(text.key().to_string(), "text-1");
    }

    #[test]
    fn test_placeholder_has_no_order() {
        let mut placeholder = ContentItem::GalleryPlaceholder;
        placeholder.set_order(4);

        assert_eq!(placeholder.order(), None);
        assert_eq!(placeholder.key(), ItemKey::gallery());
    }

    #[test]
    fn test_item_serialization_is_tagged() {
        let item = ContentItem::TextBlock(TextBlock::new("t1", "About me", 2));
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["type"], "textBlock");
        assert_eq!(json["order"], 2);
    }
}
