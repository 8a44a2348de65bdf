//! Merged sequence behavior across the whole placement range

use pagesync_model::{ItemKey, Link, PageState, TextBlock};

fn page() -> PageState {
    PageState::new("alice")
        .with_link(Link::new("a", "A", "https://a.example", 0))
        .with_text(TextBlock::new("b", "B", 1))
        .with_link(Link::new("c", "C", "https://c.example", 2))
        .with_gallery_item("g1", "https://cdn.example/1.jpg")
}

#[test]
fn test_any_placement_lands_in_range() {
    for placement in [-100, -1, 0, 1, 2, 3, 4, 1_000, i64::MAX] {
        let merged = page().with_placement(Some(placement)).merged();

        assert_eq!(merged.len(), 4, "placement {}", placement);
        let index = merged.placeholder_index().expect("placeholder present");
        assert!(index <= 3, "placement {} gave index {}", placement, index);
        assert_eq!(merged.content_len(), 3);
    }
}

#[test]
fn test_no_placement_hides_gallery() {
    let merged = page().with_placement(None).merged();

    assert_eq!(merged.placeholder_index(), None);
    assert_eq!(
        merged.keys(),
        vec![ItemKey::link("a"), ItemKey::text("b"), ItemKey::link("c")]
    );
}

#[test]
fn test_mixed_storages_interleave_by_order() {
    let page = PageState::new("bob")
        .with_text(TextBlock::new("t0", "Intro", 0))
        .with_link(Link::new("l2", "Shop", "https://shop.example", 2))
        .with_text(TextBlock::new("t1", "Bio", 1));

    assert_eq!(
        page.merged().keys(),
        vec![ItemKey::text("t0"), ItemKey::text("t1"), ItemKey::link("l2")]
    );
}
