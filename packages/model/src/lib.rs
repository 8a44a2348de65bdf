//! # Pagesync Model
//!
//! Ordered content model for a single public page.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: items + settings → merged sequence   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: drag gestures → reorder + persist   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ preview: fingerprint → broker → surfaces    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! 1. Non-social links and text blocks share one dense `0..N-1` ordering
//! 2. Social links keep their own dense `0..M-1` ordering
//! 3. The gallery position is stored apart from item orders and clamped on read
//! 4. Merging is total: bad data degrades, it never panics

mod items;
mod merge;
mod page;
mod settings;

pub use items::{
    ContentItem, Gallery, GalleryItem, ItemId, ItemKey, ItemKind, Link, TextBlock,
    GALLERY_PLACEHOLDER_ID,
};
pub use merge::{clamp_placement, merge, social_sequence, GalleryPlacement, MergedSequence};
pub use page::{ModelError, PageState};
pub use settings::{AnimationDescriptor, LayoutMode, Spacing, UserSettings};
