//! # Merged Sequence
//!
//! Builds the single rendered flow out of independently stored collections:
//!
//! ```text
//! links (non-social) ─┐
//!                     ├─ filter visible → sort by order → splice gallery
//! texts ──────────────┘                                  at placement
//! ```
//!
//! Merging never fails. Duplicate `order` values (left behind by a failed
//! partial write) break ties by kind then id and heal on the next reorder.

use crate::items::{ContentItem, Gallery, ItemKey, Link, TextBlock};
use serde::Serialize;

/// Position of the gallery block in the page flow.
///
/// `None` hides the gallery from the flow. A value is an
/// "insert before index" position and is clamped on read.
pub type GalleryPlacement = Option<i64>;

/// Clamp a stored placement into `[0, len]`
pub fn clamp_placement(placement: i64, len: usize) -> usize {
    if placement <= 0 {
        0
    } else {
        usize::try_from(placement).map_or(len, |p| p.min(len))
    }
}

/// Read-only ordered view of the page flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MergedSequence {
    items: Vec<ContentItem>,
}

impl MergedSequence {
    /// Wrap an already-ordered list (used after a reorder)
    pub fn from_items(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ContentItem> {
        self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> Vec<ItemKey> {
        self.items.iter().map(ContentItem::key).collect()
    }

    pub fn position(&self, key: &ItemKey) -> Option<usize> {
        self.items.iter().position(|item| &item.key() == key)
    }

    pub fn placeholder_index(&self) -> Option<usize> {
        self.items.iter().position(ContentItem::is_placeholder)
    }

    /// Number of entries excluding the gallery placeholder
    pub fn content_len(&self) -> usize {
        self.items.iter().filter(|item| !item.is_placeholder()).count()
    }
}

fn flow_sort_key(item: &ContentItem) -> (Option<u32>, ItemKey) {
    (item.order(), item.key())
}

/// Merge links, text blocks and the gallery placeholder into the rendered flow.
pub fn merge(
    links: &[Link],
    texts: &[TextBlock],
    gallery: &Gallery,
    placement: GalleryPlacement,
) -> MergedSequence {
    let mut items: Vec<ContentItem> = links
        .iter()
        .filter(|link| !link.is_social && link.is_visible())
        .cloned()
        .map(ContentItem::Link)
        .chain(
            texts
                .iter()
                .filter(|text| text.is_visible())
                .cloned()
                .map(ContentItem::TextBlock),
        )
        .collect();

    items.sort_by_key(flow_sort_key);

    // An empty gallery never reserves a slot
    if let Some(placement) = placement {
        if !gallery.is_empty() {
            let index = clamp_placement(placement, items.len());
            items.insert(index, ContentItem::GalleryPlaceholder);
        }
    }

    MergedSequence { items }
}

/// Visible social links in icon-row order. This sequence is independent of
/// the main flow and keeps its own dense ordering.
pub fn social_sequence(links: &[Link]) -> Vec<Link> {
    let mut social: Vec<Link> = links
        .iter()
        .filter(|link| link.is_social && link.is_visible())
        .cloned()
        .collect();

    social.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    social
}
