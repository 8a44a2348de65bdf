//! # Pagesync Editor
//!
//! Drag-to-reorder and edit sessions for a single page.
//!
//! ## Architecture
//!
//! ```text
//! drag end (active, over)
//!        ↓
//! ┌─────────────────────────────────────────────┐
//! │ ReorderController (main | social)           │
//! │  - plan a list-move, re-derive dense orders │
//! │  - apply optimistically, snapshot old state │
//! └─────────────────────────────────────────────┘
//!        ↓ publish + notify(ItemsChanged)
//! ┌─────────────────────────────────────────────┐
//! │ EditSession → ReorderStore (async persist)  │
//! │  - ok: commit                               │
//! │  - err: main keeps, social rolls back       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagesync_editor::{EditSession, MemoryStore, ReorderReport};
//! use pagesync_model::ItemKey;
//!
//! let mut session = EditSession::new("client-1", page, Arc::new(MemoryStore::new()));
//! session.attach_broker(broker);
//!
//! match session.reorder_main(&ItemKey::link("c"), &ItemKey::link("a")).await? {
//!     ReorderReport::Failed { .. } => show(session.take_notices()),
//!     _ => {}
//! }
//! ```

mod errors;
mod persistence;
mod reorder;
mod session;

pub use errors::EditorError;
pub use persistence::{MemoryStore, PersistenceError, ReorderStore, StoredWrite};
pub use reorder::{
    move_item, plan_move, DragOutcome, MainReorder, OrderUpdate, ReorderController, ReorderError, ReorderPayload,
    ReorderPlan, SequenceKind, Settlement, SocialOrderUpdate, SocialReorder,
};
pub use session::{EditSession, EditStart, Notice, PendingReorder, PendingWrite, ReorderReport};
