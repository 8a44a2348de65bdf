//! # Fingerprint Tracker
//!
//! Summarizes the part of the page state that a surface cannot patch in
//! place: which items are shown in which order, where the gallery sits, and
//! the layout-affecting settings. Two semantically equal pages always produce
//! byte-equal fingerprints, regardless of storage order or map iteration
//! order.

use pagesync_model::{
    AnimationDescriptor, ContentItem, ItemKind, LayoutMode, Link, MergedSequence, PageState, Spacing,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

const FINGERPRINT_LEN: usize = 16;

/// Short deterministic summary of non-patchable page state
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical form that gets hashed. Field order is fixed by the struct,
/// collections are sorted before serializing.
#[derive(Serialize)]
struct Canonical<'a> {
    flow: Vec<(ItemKind, &'a str, Option<u32>)>,
    social: Vec<(&'a str, u32)>,
    gallery_index: Option<usize>,
    layout: LayoutMode,
    font_family: &'a str,
    heading_font: Option<&'a str>,
    spacing: Spacing,
    animation: Option<&'a AnimationDescriptor>,
    extra: BTreeMap<&'a str, &'a str>,
}

impl<'a> Canonical<'a> {
    fn of(page: &'a PageState, merged: &'a MergedSequence, social: &'a [Link]) -> Self {
        let mut flow: Vec<_> = merged
            .iter()
            .filter_map(|item| match item {
                ContentItem::Link(link) => {
                    Some((ItemKind::Link, link.id.as_str(), Some(link.order)))
                }
                ContentItem::TextBlock(text) => {
                    Some((ItemKind::Text, text.id.as_str(), Some(text.order)))
                }
                ContentItem::GalleryPlaceholder => None,
            })
            .collect();
        flow.sort();

        let mut social: Vec<_> = social.iter().map(|link| (link.id.as_str(), link.order)).collect();
        social.sort();

        let settings = &page.settings;
        Self {
            flow,
            social,
            gallery_index: merged.placeholder_index(),
            layout: settings.layout,
            font_family: &settings.font_family,
            heading_font: settings.heading_font.as_deref(),
            spacing: settings.spacing,
            animation: settings.animation.as_ref(),
            extra: settings
                .extra
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect(),
        }
    }
}

/// Compute the fingerprint of a page
pub fn compute(page: &PageState) -> Fingerprint {
    let merged = page.merged();
    let social = page.social();
    let canonical = Canonical::of(page, &merged, &social);

    let mut hasher = blake3::Hasher::new();
    if let Err(error) = serde_json::to_writer(&mut hasher, &canonical) {
        // Plain data with string keys; serialization has no failure path in practice
        tracing::warn!(%error, "fingerprint serialization failed");
    }

    let hex = hasher.finalize().to_hex();
    Fingerprint(hex.as_str()[..FINGERPRINT_LEN].to_string())
}

/// Remembers the last computed fingerprint
#[derive(Debug, Default)]
pub struct FingerprintTracker {
    current: Option<Fingerprint>,
}

impl FingerprintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute; returns the fingerprint and whether it moved
    pub fn update(&mut self, page: &PageState) -> (Fingerprint, bool) {
        let next = compute(page);
        let changed = self.current.as_ref() != Some(&next);
        self.current = Some(next.clone());
        (next, changed)
    }

    pub fn current(&self) -> Option<&Fingerprint> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesync_model::{Link, TextBlock, UserSettings};

    fn page() -> PageState {
        PageState::new("alice")
            .with_link(Link::new("a", "A", "https://a.example", 0))
            .with_text(TextBlock::new("t", "Hello", 1))
            .with_link(Link::new("gh", "GitHub", "https://github.com/a", 0).social())
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let fingerprint = compute(&page());

        assert_eq!(fingerprint.as_str().len(), FINGERPRINT_LEN);
        assert!(fingerprint.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_storage_order_does_not_matter() {
        let forward = page();
        let mut backward = page();
        backward.links.reverse();

        assert_eq!(compute(&forward), compute(&backward));
    }

    #[test]
    fn test_extra_settings_key_order_does_not_matter() {
        let mut first = UserSettings::default();
        first.extra.insert("buttonShape".into(), "pill".into());
        first.extra.insert("shadow".into(), "soft".into());
        first.extra.insert("columns".into(), "2".into());

        let mut second = UserSettings::default();
        second.extra.insert("columns".into(), "2".into());
        second.extra.insert("shadow".into(), "soft".into());
        second.extra.insert("buttonShape".into(), "pill".into());

        assert_eq!(
            compute(&page().with_settings(first)),
            compute(&page().with_settings(second))
        );
    }

    #[test]
    fn test_patchable_settings_are_ignored() {
        let mut settings = UserSettings::default();
        settings.display_name = "Alice".into();
        settings.bio = "Hi".into();
        settings.accent_color = "#ff0000".into();

        assert_eq!(compute(&page()), compute(&page().with_settings(settings)));
    }

    #[test]
    fn test_order_and_layout_changes_move_the_fingerprint() {
        let base = compute(&page());

        let mut reordered = page();
        reordered.texts[0].order = 0;
        reordered.links[0].order = 1;
        assert_ne!(base, compute(&reordered));

        let relaid = page().with_settings(UserSettings::default().with_font("Inter"));
        assert_ne!(base, compute(&relaid));
    }

    #[test]
    fn test_tracker_reports_changes() {
        let mut tracker = FingerprintTracker::new();

        let (_, changed) = tracker.update(&page());
        assert!(changed);

        let (_, changed) = tracker.update(&page());
        assert!(!changed);
        assert!(tracker.current().is_some());
    }
}
