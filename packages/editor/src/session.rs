//! # Edit Session Management
//!
//! One editor's view of a page: the authoritative local `PageState`, the two
//! drag controllers, and the wiring that tells the preview about every change.
//!
//! Reorders are optimistic. The page is updated and published before the
//! store is asked to persist; the store's answer then either confirms the
//! change or, for the social row only, rolls it back.
//!
//! An edit runs in three steps so that a shared session does not have to be
//! held while the store works:
//!
//! ```text
//! start_reorder / start_gallery_placement   apply + publish   (&mut session)
//! PendingWrite::persist                     store round trip  (no session)
//! finish                                    settle + notices  (&mut session)
//! ```
//!
//! A second drag on the same sequence between the first and last step is
//! refused with [`ReorderError::InFlight`].

use crate::errors::EditorError;
use crate::persistence::{PersistenceError, ReorderStore};
use crate::reorder::{
    DragOutcome, MainReorder, OrderUpdate, ReorderController, ReorderError, ReorderPayload, ReorderPlan,
    SequenceKind, Settlement,
};
use chrono::{DateTime, Utc};
use pagesync_model::{clamp_placement, GalleryPlacement, ItemKey, PageState, UserSettings};
use pagesync_preview::{BrokerHandle, ChangeKind};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Reorder waiting for the store's answer
#[derive(Debug, Clone)]
pub struct PendingReorder {
    pub id: String,
    pub kind: SequenceKind,
    pub payload: ReorderPayload,
    pub timestamp: DateTime<Utc>,
}

/// User-visible message about a failed save
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: SequenceKind,
    pub message: String,
    pub rolled_back: bool,
    pub at: DateTime<Utc>,
}

/// Result of one reorder request
#[derive(Debug, Clone, PartialEq)]
pub enum ReorderReport {
    Unchanged,
    Aborted(ReorderError),
    Committed(ReorderPlan),
    Failed {
        error: PersistenceError,
        rolled_back: bool,
    },
}

/// An applied edit whose save is still outstanding. Carries its own store
/// handle, so the round trip does not borrow the session.
pub struct PendingWrite {
    id: String,
    kind: SequenceKind,
    handle: String,
    plan: ReorderPlan,
    store: Arc<dyn ReorderStore>,
}

impl PendingWrite {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    pub fn plan(&self) -> &ReorderPlan {
        &self.plan
    }

    pub async fn persist(&self) -> Result<(), PersistenceError> {
        match &self.plan.payload {
            ReorderPayload::Main(payload) => self.store.persist_main(&self.handle, payload).await,
            ReorderPayload::Social(payload) => self.store.persist_social(&self.handle, payload).await,
        }
    }
}

/// First step of an edit
pub enum EditStart {
    /// Nothing to save
    Done(ReorderReport),
    /// Applied and published; persist it, then hand it to [`EditSession::finish`]
    Persist(PendingWrite),
}

pub struct EditSession {
    /// Unique session identifier
    pub id: String,
    page: PageState,
    store: Arc<dyn ReorderStore>,
    main: ReorderController,
    social: ReorderController,
    publisher: watch::Sender<PageState>,
    broker: Option<BrokerHandle>,
    pending: Vec<PendingReorder>,
    notices: Vec<Notice>,
    issued: u64,
}

impl EditSession {
    pub fn new(id: impl Into<String>, page: PageState, store: Arc<dyn ReorderStore>) -> Self {
        let (publisher, _) = watch::channel(page.clone());
        Self {
            id: id.into(),
            page,
            store,
            main: ReorderController::new(SequenceKind::Main),
            social: ReorderController::new(SequenceKind::Social),
            publisher,
            broker: None,
            pending: Vec::new(),
            notices: Vec::new(),
            issued: 0,
        }
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    /// Follow the page as published to the preview
    pub fn subscribe(&self) -> watch::Receiver<PageState> {
        self.publisher.subscribe()
    }

    /// Route change notifications to a running broker
    pub fn attach_broker(&mut self, broker: BrokerHandle) {
        self.broker = Some(broker);
    }

    pub fn broker(&self) -> Option<&BrokerHandle> {
        self.broker.as_ref()
    }

    pub fn pending(&self) -> &[PendingReorder] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drain notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub async fn reorder_main(&mut self, active: &ItemKey, over: &ItemKey) -> Result<ReorderReport, EditorError> {
        let start = self.start_reorder(SequenceKind::Main, active, over);
        self.complete(start).await
    }

    pub async fn reorder_social(&mut self, active: &ItemKey, over: &ItemKey) -> Result<ReorderReport, EditorError> {
        let start = self.start_reorder(SequenceKind::Social, active, over);
        self.complete(start).await
    }

    /// Move the gallery within the main flow. Saved like a main reorder, so a
    /// failed save keeps the new position.
    pub async fn set_gallery_placement(&mut self, placement: GalleryPlacement) -> Result<ReorderReport, EditorError> {
        let start = self.start_gallery_placement(placement);
        self.complete(start).await
    }

    async fn complete(&mut self, start: EditStart) -> Result<ReorderReport, EditorError> {
        match start {
            EditStart::Done(report) => Ok(report),
            EditStart::Persist(write) => {
                let result = write.persist().await;
                self.finish(write, result)
            }
        }
    }

    /// Apply a drag optimistically and publish it
    pub fn start_reorder(&mut self, kind: SequenceKind, active: &ItemKey, over: &ItemKey) -> EditStart {
        let controller = match kind {
            SequenceKind::Main => &mut self.main,
            SequenceKind::Social => &mut self.social,
        };

        let plan = match controller.on_drag_end(active, over, &mut self.page) {
            DragOutcome::Unchanged => return EditStart::Done(ReorderReport::Unchanged),
            DragOutcome::Aborted(error) => return EditStart::Done(ReorderReport::Aborted(error)),
            DragOutcome::Applied(plan) => plan,
        };

        self.publish(ChangeKind::ItemsChanged);
        EditStart::Persist(self.issue(kind, plan))
    }

    /// Place the gallery at `placement`, clamped into the current flow
    pub fn start_gallery_placement(&mut self, placement: GalleryPlacement) -> EditStart {
        if self.main.is_in_flight() {
            return EditStart::Done(ReorderReport::Aborted(ReorderError::InFlight));
        }

        let len = self.page.merged().content_len();
        let placement = placement.map(|placement| clamp_placement(placement, len) as i64);
        if self.page.gallery_placement == placement {
            return EditStart::Done(ReorderReport::Unchanged);
        }
        if let Err(error) = self.main.hold(&self.page) {
            return EditStart::Done(ReorderReport::Aborted(error));
        }

        self.page.gallery_placement = placement;
        let sequence = self.page.merged();
        let payload = ReorderPayload::Main(MainReorder {
            items: sequence
                .iter()
                .filter_map(|item| {
                    item.order().map(|order| OrderUpdate {
                        id: item.key().id,
                        kind: item.kind(),
                        order,
                    })
                })
                .collect(),
            gallery_placement: placement,
        });
        self.publish(ChangeKind::ItemsChanged);

        let plan = ReorderPlan {
            kind: SequenceKind::Main,
            sequence,
            payload,
        };
        EditStart::Persist(self.issue(SequenceKind::Main, plan))
    }

    /// Settle a write with the store's answer
    pub fn finish(
        &mut self,
        write: PendingWrite,
        result: Result<(), PersistenceError>,
    ) -> Result<ReorderReport, EditorError> {
        self.pending.retain(|pending| pending.id != write.id);

        let controller = match write.kind {
            SequenceKind::Main => &mut self.main,
            SequenceKind::Social => &mut self.social,
        };
        let settlement = controller.settle(result, &mut self.page)?;

        Ok(match settlement {
            Settlement::Committed => ReorderReport::Committed(write.plan),
            Settlement::Kept(error) => {
                self.raise(write.kind, &error, false);
                ReorderReport::Failed {
                    error,
                    rolled_back: false,
                }
            }
            Settlement::RolledBack(error) => {
                self.publish(ChangeKind::ItemsChanged);
                self.raise(write.kind, &error, true);
                ReorderReport::Failed {
                    error,
                    rolled_back: true,
                }
            }
        })
    }

    pub fn update_settings(&mut self, settings: UserSettings) {
        self.page.settings = settings;
        self.publish(ChangeKind::UserSettingsChanged);
    }

    /// Adopt state changed elsewhere (another tab, a storage push) and force
    /// the preview to rebuild from it
    pub fn acknowledge_external_change(&mut self, page: PageState) {
        tracing::info!(session = %self.id, handle = %page.handle, "external change acknowledged");
        self.page = page;
        self.publish(ChangeKind::ExternalRefreshRequested);
    }

    fn issue(&mut self, kind: SequenceKind, plan: ReorderPlan) -> PendingWrite {
        let id = format!("{}-{}", self.id, self.issued);
        self.issued += 1;
        self.pending.push(PendingReorder {
            id: id.clone(),
            kind,
            payload: plan.payload.clone(),
            timestamp: Utc::now(),
        });

        PendingWrite {
            id,
            kind,
            handle: self.page.handle.clone(),
            plan,
            store: self.store.clone(),
        }
    }

    fn publish(&mut self, kind: ChangeKind) {
        self.publisher.send_replace(self.page.clone());

        let closed = self
            .broker
            .as_ref()
            .map(|broker| broker.notify(kind).is_err())
            .unwrap_or(false);
        if closed {
            tracing::warn!(session = %self.id, "preview broker has shut down, detaching");
            self.broker = None;
        }
    }

    fn raise(&mut self, kind: SequenceKind, error: &PersistenceError, rolled_back: bool) {
        self.notices.push(Notice {
            kind,
            message: error.to_string(),
            rolled_back,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, StoredWrite};
    use pagesync_model::{LayoutMode, Link};

    fn session(store: Arc<MemoryStore>) -> EditSession {
        let page = PageState::new("alice")
            .with_link(Link::new("a", "A", "https://a.example", 0))
            .with_link(Link::new("b", "B", "https://b.example", 1));
        EditSession::new("client-1", page, store)
    }

    #[test]
    fn test_session_creation() {
        let session = session(Arc::new(MemoryStore::new()));

        assert_eq!(session.id, "client-1");
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.subscribe().borrow().handle, "alice");
    }

    #[test]
    fn test_settings_are_published() {
        let mut session = session(Arc::new(MemoryStore::new()));
        let receiver = session.subscribe();

        session.update_settings(UserSettings::default().with_layout(LayoutMode::Grid));

        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow().settings.layout, LayoutMode::Grid);
    }

    #[tokio::test]
    async fn test_committed_reorder_clears_pending() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone());

        let report = session
            .reorder_main(&ItemKey::link("b"), &ItemKey::link("a"))
            .await
            .unwrap();

        assert!(matches!(report, ReorderReport::Committed(_)));
        assert_eq!(session.pending_count(), 0);
        assert_eq!(store.writes("alice").len(), 1);
        assert!(session.take_notices().is_empty());
    }

    #[tokio::test]
    async fn test_failed_placement_keeps_new_position() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone());
        store.fail_next(1);

        let report = session.set_gallery_placement(Some(1)).await.unwrap();

        assert!(matches!(report, ReorderReport::Failed { rolled_back: false, .. }));
        assert_eq!(session.page().gallery_placement, Some(1));
        assert_eq!(session.take_notices().len(), 1);
        let next = session.start_reorder(SequenceKind::Main, &ItemKey::link("b"), &ItemKey::link("a"));
        assert!(matches!(next, EditStart::Persist(_)));
    }

    #[tokio::test]
    async fn test_gallery_placement_is_clamped_before_saving() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone());

        session.set_gallery_placement(Some(99)).await.unwrap();
        session.set_gallery_placement(Some(-5)).await.unwrap();

        let placements: Vec<GalleryPlacement> = store
            .writes("alice")
            .iter()
            .map(|write| match write {
                StoredWrite::Main(payload) => payload.gallery_placement,
                StoredWrite::Social(_) => panic!("unexpected social write"),
            })
            .collect();
        assert_eq!(placements, vec![Some(2), Some(0)]);
        assert_eq!(session.page().gallery_placement, Some(0));
    }

    #[tokio::test]
    async fn test_drag_during_outstanding_write_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone());

        let EditStart::Persist(write) = session.start_reorder(SequenceKind::Main, &ItemKey::link("b"), &ItemKey::link("a"))
        else {
            panic!("expected a write to persist");
        };
        assert_eq!(session.pending_count(), 1);

        let second = session.start_reorder(SequenceKind::Main, &ItemKey::link("a"), &ItemKey::link("b"));
        assert!(matches!(second, EditStart::Done(ReorderReport::Aborted(ReorderError::InFlight))));
        let placement = session.start_gallery_placement(Some(0));
        assert!(matches!(placement, EditStart::Done(ReorderReport::Aborted(ReorderError::InFlight))));

        let result = write.persist().await;
        let report = session.finish(write, result).unwrap();

        assert!(matches!(report, ReorderReport::Committed(_)));
        assert_eq!(session.pending_count(), 0);
        assert_eq!(store.writes("alice").len(), 1);
    }
}
