//! Demo content for `--seed-demo`.

use pagesync_model::{AnimationDescriptor, Link, PageState, TextBlock, UserSettings};

pub const DEMO_HANDLE: &str = "demo";

pub fn demo_page() -> PageState {
    let settings = UserSettings {
        display_name: "Demo Creator".to_string(),
        bio: "Links, notes and a few photos".to_string(),
        accent_color: "#3366ff".to_string(),
        animation: Some(AnimationDescriptor {
            name: "fade-in".to_string(),
            duration_ms: 240,
        }),
        ..UserSettings::default()
    }
    .with_font("Inter");

    PageState::new(DEMO_HANDLE)
        .with_link(Link::new("blog", "Blog", "https://blog.example", 0))
        .with_text(TextBlock::new("about", "Hi! I write about small tools.", 1))
        .with_link(Link::new("shop", "Shop", "https://shop.example", 2))
        .with_link(Link::new("newsletter", "Newsletter", "https://letters.example", 3))
        .with_link(Link::new("mastodon", "Mastodon", "https://mastodon.example/@demo", 0).social())
        .with_link(Link::new("github", "GitHub", "https://github.example/demo", 1).social())
        .with_gallery_item("sunrise", "https://media.example/sunrise.jpg")
        .with_gallery_item("harbor", "https://media.example/harbor.jpg")
        .with_placement(Some(2))
        .with_settings(settings)
}
