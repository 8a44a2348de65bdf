//! # Pagesync Preview
//!
//! Keeps embedded render surfaces in step with the page being edited.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  watch<PageState>  ┌──────────────────────────────┐
//! │ edit session │ ─────────────────→ │ SyncBroker (one tokio task)  │
//! │              │ ── notify(kind) ─→ │  classify → debounce → pass  │
//! └──────────────┘                    └──────────────────────────────┘
//!                                        │ send / soft_patch / reconstruct
//!                                        ↓
//!                  ┌─────────────────────┴──────────────────┐
//!                  │ InlineSurface (direct)  FrameSurface   │
//!                  │                         (opaque, keyed)│
//!                  └────────────────────────────────────────┘
//!                                        │ size reports (debounced)
//!                                        └──→ back into the broker
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagesync_preview::{ChangeKind, FrameSurface, SurfaceEntryPoint, SyncBroker, SyncConfig};
//!
//! let (publisher, page) = tokio::sync::watch::channel(page_state);
//! let config = SyncConfig::default();
//! let broker = SyncBroker::spawn(config.clone(), page);
//!
//! let entry = SurfaceEntryPoint::new("https://pages.example/", "alice")?;
//! let (frame, events) = FrameSurface::new(entry, config.size_debounce());
//! let id = broker.mount(Arc::new(frame)).await?;
//!
//! publisher.send_replace(edited);
//! broker.notify(ChangeKind::ItemsChanged)?;
//! ```

mod broker;
mod clicks;
mod config;
mod entry;
mod fingerprint;
mod frame;
mod inline;
mod message;
mod surface;
mod timer;

pub use broker::{
    classify, BrokerError, BrokerHandle, BrokerState, ChangeKind, Propagation, RenderSurfaceState, SurfaceId,
    SyncBroker,
};
pub use clicks::{ClickGuard, Clock, ManualClock, SystemClock};
pub use config::{ConfigError, SyncConfig};
pub use entry::{EntryQuery, SurfaceEntryPoint};
pub use fingerprint::{compute as compute_fingerprint, Fingerprint, FingerprintTracker};
pub use frame::{FrameEvent, FrameSurface};
pub use inline::InlineSurface;
pub use message::{FrameSize, SurfaceMessage, REFRESH, UPDATE_DIMENSIONS, UPDATE_LINKS, UPDATE_USER};
pub use surface::{RenderSurface, SizeCallback, SizeListener, SizeObserver, SurfaceControl, SurfaceError, SurfaceKey};
