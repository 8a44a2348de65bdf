//! The full editable state of one public page.

use crate::items::{Gallery, GalleryItem, ItemId, ItemKey, ItemKind, Link, TextBlock};
use crate::merge::{merge, social_sequence, GalleryPlacement, MergedSequence};
use crate::settings::UserSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown item: {0}")]
    UnknownItem(ItemKey),

    #[error("The gallery placeholder has no stored order")]
    PlaceholderHasNoOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    /// Public handle the page is served under
    pub handle: String,
    pub links: Vec<Link>,
    pub texts: Vec<TextBlock>,
    pub gallery: Gallery,
    pub gallery_placement: GalleryPlacement,
    pub settings: UserSettings,
}

impl PageState {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ..Default::default()
        }
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_text(mut self, text: TextBlock) -> Self {
        self.texts.push(text);
        self
    }

    pub fn with_gallery_item(mut self, id: impl Into<ItemId>, media_url: impl Into<String>) -> Self {
        let order = self.gallery.items.len() as u32;
        self.gallery.items.push(GalleryItem {
            id: id.into(),
            media_url: media_url.into(),
            order,
        });
        self
    }

    pub fn with_placement(mut self, placement: GalleryPlacement) -> Self {
        self.gallery_placement = placement;
        self
    }

    pub fn with_settings(mut self, settings: UserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The rendered main flow
    pub fn merged(&self) -> MergedSequence {
        merge(&self.links, &self.texts, &self.gallery, self.gallery_placement)
    }

    /// The social icon row
    pub fn social(&self) -> Vec<Link> {
        social_sequence(&self.links)
    }

    pub fn link(&self, id: &ItemId) -> Option<&Link> {
        self.links.iter().find(|link| &link.id == id)
    }

    pub fn text(&self, id: &ItemId) -> Option<&TextBlock> {
        self.texts.iter().find(|text| &text.id == id)
    }

    /// Stored `order` of a link or text block
    pub fn order_of(&self, key: &ItemKey) -> Option<u32> {
        match key.kind {
            ItemKind::Link => self.link(&key.id).map(|link| link.order),
            ItemKind::Text => self.text(&key.id).map(|text| text.order),
            ItemKind::Gallery => None,
        }
    }

    /// Main-flow items that are stored but not rendered (hidden or archived),
    /// in stored order
    pub fn stowed_main(&self) -> Vec<ItemKey> {
        let links = self
            .links
            .iter()
            .filter(|link| !link.is_social && !link.is_visible())
            .map(|link| (link.order, ItemKey::link(link.id.clone())));
        let texts = self
            .texts
            .iter()
            .filter(|text| !text.is_visible())
            .map(|text| (text.order, ItemKey::text(text.id.clone())));

        let mut stowed: Vec<(u32, ItemKey)> = links.chain(texts).collect();
        stowed.sort();
        stowed.into_iter().map(|(_, key)| key).collect()
    }

    /// Social links that are stored but not rendered, in stored order
    pub fn stowed_social(&self) -> Vec<ItemKey> {
        let mut stowed: Vec<(u32, ItemKey)> = self
            .links
            .iter()
            .filter(|link| link.is_social && !link.is_visible())
            .map(|link| (link.order, ItemKey::link(link.id.clone())))
            .collect();
        stowed.sort();
        stowed.into_iter().map(|(_, key)| key).collect()
    }

    /// Write a new `order` for an item of the main flow
    pub fn set_order(&mut self, key: &ItemKey, order: u32) -> Result<(), ModelError> {
        let slot = match key.kind {
            ItemKind::Link => self
                .links
                .iter_mut()
                .find(|link| link.id == key.id)
                .map(|link| &mut link.order),
            ItemKind::Text => self
                .texts
                .iter_mut()
                .find(|text| text.id == key.id)
                .map(|text| &mut text.order),
            ItemKind::Gallery => return Err(ModelError::PlaceholderHasNoOrder),
        };

        let slot = slot.ok_or_else(|| ModelError::UnknownItem(key.clone()))?;
        *slot = order;
        Ok(())
    }

    /// Write a new `order` for a social link
    pub fn set_social_order(&mut self, id: &ItemId, order: u32) -> Result<(), ModelError> {
        let link = self
            .links
            .iter_mut()
            .find(|link| link.is_social && &link.id == id)
            .ok_or_else(|| ModelError::UnknownItem(ItemKey::link(id.clone())))?;
        link.order = order;
        Ok(())
    }
}
