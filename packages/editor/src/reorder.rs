//! # Reorder Controller
//!
//! Turns the outcome of a drag gesture into a new ordering, applies it to the
//! local page optimistically and describes what has to be persisted.
//!
//! ## Move semantics
//!
//! - Standard list move: remove at the active index, insert at the over index
//! - Orders are re-derived from position, so a successful move always leaves
//!   a dense `0..N-1` ordering behind. Hidden and archived items of the same
//!   sequence are renumbered after the visible ones, keeping their relative
//!   order, so stored orders stay unique
//! - Dragging the gallery placeholder only changes the gallery placement
//! - Unknown keys abort the move before anything is touched
//!
//! ## Failure policy
//!
//! The main flow keeps its optimistic state when persistence fails; the
//! social icon row snaps back to its pre-drag arrangement. See
//! [`SequenceKind::rolls_back_on_failure`].

use crate::persistence::PersistenceError;
use pagesync_model::{
    ContentItem, GalleryPlacement, ItemId, ItemKey, ItemKind, MergedSequence, ModelError, PageState,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which drag surface a controller serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    Main,
    Social,
}

impl SequenceKind {
    /// Whether a failed persist restores the pre-drag arrangement.
    ///
    /// Only the social row rolls back. The main flow keeping its optimistic
    /// state is the observed behavior and is pinned by tests until a decision
    /// is made to unify the two.
    pub fn rolls_back_on_failure(self) -> bool {
        matches!(self, SequenceKind::Social)
    }

    /// Stored items of this sequence that are not rendered
    pub fn stowed_of(self, page: &PageState) -> Vec<ItemKey> {
        match self {
            SequenceKind::Main => page.stowed_main(),
            SequenceKind::Social => page.stowed_social(),
        }
    }

    /// The sequence this controller reorders, as currently rendered
    pub fn sequence_of(self, page: &PageState) -> MergedSequence {
        match self {
            SequenceKind::Main => page.merged(),
            SequenceKind::Social => {
                MergedSequence::from_items(page.social().into_iter().map(ContentItem::Link).collect())
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemKey),

    #[error("Another reorder is still waiting for persistence")]
    InFlight,

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// One row of the main persistence payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub order: u32,
}

/// Payload for the main flow: `{ items: [{ id, type, order }], galleryPlacement }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainReorder {
    pub items: Vec<OrderUpdate>,
    pub gallery_placement: GalleryPlacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialOrderUpdate {
    pub id: ItemId,
    pub order: u32,
}

/// Payload for the social row: `{ items: [{ id, order }] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialReorder {
    pub items: Vec<SocialOrderUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReorderPayload {
    Main(MainReorder),
    Social(SocialReorder),
}

/// Result of planning a move: the sequence to render and what to persist
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderPlan {
    pub kind: SequenceKind,
    pub sequence: MergedSequence,
    pub payload: ReorderPayload,
}

impl ReorderPlan {
    /// Number the `stowed` items after the visible ones
    pub fn with_stowed(mut self, stowed: &[ItemKey]) -> Self {
        match &mut self.payload {
            ReorderPayload::Main(main) => {
                let first = main.items.len() as u32;
                main.items.extend(stowed.iter().zip(first..).map(|(key, order)| OrderUpdate {
                    id: key.id.clone(),
                    kind: key.kind,
                    order,
                }));
            }
            ReorderPayload::Social(social) => {
                let first = social.items.len() as u32;
                social
                    .items
                    .extend(stowed.iter().zip(first..).map(|(key, order)| SocialOrderUpdate {
                        id: key.id.clone(),
                        order,
                    }));
            }
        }
        self
    }

    /// Write the planned orders into the page
    pub fn apply(&self, page: &mut PageState) -> Result<(), ModelError> {
        match &self.payload {
            ReorderPayload::Main(main) => {
                for update in &main.items {
                    let key = ItemKey {
                        kind: update.kind,
                        id: update.id.clone(),
                    };
                    page.set_order(&key, update.order)?;
                }
                page.gallery_placement = main.gallery_placement;
            }
            ReorderPayload::Social(social) => {
                for update in &social.items {
                    page.set_social_order(&update.id, update.order)?;
                }
            }
        }
        Ok(())
    }
}

/// Move the element at `from` so it ends up at `to`
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
}

/// Plan a drag of `active` onto `over` within `sequence`.
///
/// Returns `Ok(None)` when the gesture ends where it started.
pub fn plan_move(
    kind: SequenceKind,
    active: &ItemKey,
    over: &ItemKey,
    sequence: &MergedSequence,
    current_placement: GalleryPlacement,
) -> Result<Option<ReorderPlan>, ReorderError> {
    if active == over {
        return Ok(None);
    }

    let from = sequence
        .position(active)
        .ok_or_else(|| ReorderError::ItemNotFound(active.clone()))?;
    let to = sequence
        .position(over)
        .ok_or_else(|| ReorderError::ItemNotFound(over.clone()))?;

    let mut items = sequence.items().to_vec();
    move_item(&mut items, from, to);

    // Placeholders take a slot in the flow but not in the ordering
    let mut next_order = 0u32;
    let mut placeholder_at = None;
    for (index, item) in items.iter_mut().enumerate() {
        if item.is_placeholder() {
            placeholder_at = Some(index as i64);
        } else {
            item.set_order(next_order);
            next_order += 1;
        }
    }

    let payload = match kind {
        SequenceKind::Main => ReorderPayload::Main(MainReorder {
            items: items
                .iter()
                .filter_map(|item| {
                    item.order().map(|order| OrderUpdate {
                        id: item.key().id,
                        kind: item.kind(),
                        order,
                    })
                })
                .collect(),
            gallery_placement: placeholder_at.or(current_placement),
        }),
        SequenceKind::Social => ReorderPayload::Social(SocialReorder {
            items: items
                .iter()
                .filter_map(|item| {
                    item.order().map(|order| SocialOrderUpdate {
                        id: item.key().id,
                        order,
                    })
                })
                .collect(),
        }),
    };

    Ok(Some(ReorderPlan {
        kind,
        sequence: MergedSequence::from_items(items),
        payload,
    }))
}

/// What a drag did to local state
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Dropped onto itself
    Unchanged,

    /// Stale or unknown keys; nothing was touched
    Aborted(ReorderError),

    /// Applied optimistically; persistence pending
    Applied(ReorderPlan),
}

/// How an in-flight reorder ended
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Committed,

    /// Persistence failed, optimistic state kept
    Kept(PersistenceError),

    /// Persistence failed, pre-drag arrangement restored
    RolledBack(PersistenceError),
}

/// Pre-drag arrangement, enough to restore it
#[derive(Debug, Clone)]
struct Snapshot {
    orders: Vec<(ItemKey, u32)>,
    gallery_placement: GalleryPlacement,
}

impl Snapshot {
    fn capture(kind: SequenceKind, page: &PageState) -> Self {
        let stowed = kind
            .stowed_of(page)
            .into_iter()
            .filter_map(|key| page.order_of(&key).map(|order| (key, order)));
        let orders = kind
            .sequence_of(page)
            .iter()
            .filter_map(|item| item.order().map(|order| (item.key(), order)))
            .chain(stowed)
            .collect();

        Self {
            orders,
            gallery_placement: page.gallery_placement,
        }
    }

    fn restore(&self, kind: SequenceKind, page: &mut PageState) -> Result<(), ModelError> {
        for (key, order) in &self.orders {
            match kind {
                SequenceKind::Main => page.set_order(key, *order)?,
                SequenceKind::Social => page.set_social_order(&key.id, *order)?,
            }
        }
        page.gallery_placement = self.gallery_placement;
        Ok(())
    }
}

/// Drag controller for one sequence. Main and social each get their own
/// instance; they share nothing.
#[derive(Debug)]
pub struct ReorderController {
    kind: SequenceKind,
    in_flight: Option<Snapshot>,
}

impl ReorderController {
    pub fn new(kind: SequenceKind) -> Self {
        Self {
            kind,
            in_flight: None,
        }
    }

    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Mark an edit made outside a drag (moving the gallery) as in flight,
    /// so it settles like a reorder
    pub fn hold(&mut self, page: &PageState) -> Result<(), ReorderError> {
        if self.in_flight.is_some() {
            return Err(ReorderError::InFlight);
        }
        self.in_flight = Some(Snapshot::capture(self.kind, page));
        Ok(())
    }

    /// Handle the end of a drag gesture.
    ///
    /// On success the plan is already applied to `page` when this returns.
    pub fn on_drag_end(&mut self, active: &ItemKey, over: &ItemKey, page: &mut PageState) -> DragOutcome {
        if self.in_flight.is_some() {
            tracing::warn!(kind = ?self.kind, %active, "drag ignored while a reorder is in flight");
            return DragOutcome::Aborted(ReorderError::InFlight);
        }

        let sequence = self.kind.sequence_of(page);
        let plan = match plan_move(self.kind, active, over, &sequence, page.gallery_placement) {
            Ok(Some(plan)) => plan.with_stowed(&self.kind.stowed_of(page)),
            Ok(None) => return DragOutcome::Unchanged,
            Err(error) => {
                tracing::warn!(kind = ?self.kind, %active, %over, %error, "drag aborted");
                return DragOutcome::Aborted(error);
            }
        };

        let snapshot = Snapshot::capture(self.kind, page);
        if let Err(error) = plan.apply(page) {
            // Keys came from the page itself, so this only trips on a corrupt model
            tracing::warn!(kind = ?self.kind, %error, "reorder could not be applied");
            if let Err(restore_error) = snapshot.restore(self.kind, page) {
                tracing::warn!(kind = ?self.kind, %restore_error, "pre-drag state could not be restored");
            }
            return DragOutcome::Aborted(error.into());
        }

        tracing::debug!(kind = ?self.kind, %active, %over, "reorder applied optimistically");
        self.in_flight = Some(snapshot);
        DragOutcome::Applied(plan)
    }

    /// Resolve the in-flight reorder with the persistence result
    pub fn settle(
        &mut self,
        result: Result<(), PersistenceError>,
        page: &mut PageState,
    ) -> Result<Settlement, ReorderError> {
        let snapshot = self.in_flight.take();

        let error = match result {
            Ok(()) => return Ok(Settlement::Committed),
            Err(error) => error,
        };

        tracing::warn!(kind = ?self.kind, %error, "reorder persistence failed");

        match snapshot {
            Some(snapshot) if self.kind.rolls_back_on_failure() => {
                snapshot.restore(self.kind, page)?;
                Ok(Settlement::RolledBack(error))
            }
            _ => Ok(Settlement::Kept(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesync_model::{Link, TextBlock};
    use std::collections::BTreeSet;

    fn abc() -> PageState {
        PageState::new("alice")
            .with_link(Link::new("a", "A", "https://a.example", 0))
            .with_link(Link::new("b", "B", "https://b.example", 1))
            .with_link(Link::new("c", "C", "https://c.example", 2))
    }

    fn orders(sequence: &MergedSequence) -> Vec<(ItemKey, Option<u32>)> {
        sequence.iter().map(|item| (item.key(), item.order())).collect()
    }

    #[test]
    fn test_drag_last_onto_first() {
        let page = abc();
        let plan = plan_move(
            SequenceKind::Main,
            &ItemKey::link("c"),
            &ItemKey::link("a"),
            &page.merged(),
            None,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            orders(&plan.sequence),
            vec![
                (ItemKey::link("c"), Some(0)),
                (ItemKey::link("a"), Some(1)),
                (ItemKey::link("b"), Some(2)),
            ]
        );
    }

    #[test]
    fn test_move_is_not_a_swap() {
        let page = abc();
        let plan = plan_move(
            SequenceKind::Main,
            &ItemKey::link("a"),
            &ItemKey::link("c"),
            &page.merged(),
            None,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            plan.sequence.keys(),
            vec![ItemKey::link("b"), ItemKey::link("c"), ItemKey::link("a")]
        );
    }

    #[test]
    fn test_same_item_is_a_noop() {
        let page = abc();
        let plan = plan_move(
            SequenceKind::Main,
            &ItemKey::link("b"),
            &ItemKey::link("b"),
            &page.merged(),
            None,
        )
        .unwrap();

        assert!(plan.is_none());
    }

    #[test]
    fn test_unknown_key_is_item_not_found() {
        let page = abc();
        let result = plan_move(
            SequenceKind::Main,
            &ItemKey::link("gone"),
            &ItemKey::link("a"),
            &page.merged(),
            None,
        );

        assert_eq!(result, Err(ReorderError::ItemNotFound(ItemKey::link("gone"))));
    }

    #[test]
    fn test_orders_stay_dense_for_every_move() {
        let page = abc()
            .with_text(TextBlock::new("t", "T", 7))
            .with_gallery_item("g", "https://cdn.example/g.jpg")
            .with_placement(Some(1));
        let sequence = page.merged();
        let keys = sequence.keys();

        for active in &keys {
            for over in &keys {
                let Some(plan) =
                    plan_move(SequenceKind::Main, active, over, &sequence, page.gallery_placement).unwrap()
                else {
                    continue;
                };

                let ReorderPayload::Main(payload) = &plan.payload else {
                    panic!("main plan produced a social payload");
                };
                let seen: BTreeSet<u32> = payload.items.iter().map(|u| u.order).collect();
                let expected: BTreeSet<u32> = (0..4).collect();
                assert_eq!(seen, expected, "{} onto {}", active, over);
                assert_eq!(payload.items.len(), 4);
            }
        }
    }

    #[test]
    fn test_dragging_placeholder_only_moves_placement() {
        let page = abc()
            .with_gallery_item("g", "https://cdn.example/g.jpg")
            .with_placement(Some(0));

        let plan = plan_move(
            SequenceKind::Main,
            &ItemKey::gallery(),
            &ItemKey::link("c"),
            &page.merged(),
            page.gallery_placement,
        )
        .unwrap()
        .unwrap();

        let ReorderPayload::Main(payload) = plan.payload else {
            panic!("expected main payload");
        };
        assert_eq!(payload.gallery_placement, Some(3));
        let ids: Vec<(&str, u32)> = payload.items.iter().map(|u| (u.id.as_str(), u.order)).collect();
        assert_eq!(ids, vec![("a", 0), ("b", 1), ("c", 2)]);
    }

    #[test]
    fn test_placement_unchanged_without_placeholder() {
        let page = abc().with_placement(Some(2));

        let plan = plan_move(
            SequenceKind::Main,
            &ItemKey::link("a"),
            &ItemKey::link("b"),
            &page.merged(),
            page.gallery_placement,
        )
        .unwrap()
        .unwrap();

        let ReorderPayload::Main(payload) = plan.payload else {
            panic!("expected main payload");
        };
        assert_eq!(payload.gallery_placement, Some(2));
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = MainReorder {
            items: vec![OrderUpdate {
                id: ItemId::from("t1"),
                kind: ItemKind::Text,
                order: 0,
            }],
            gallery_placement: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "items": [{ "id": "t1", "type": "text", "order": 0 }],
                "galleryPlacement": null
            })
        );
    }

    #[test]
    fn test_controller_aborts_without_touching_state() {
        let mut page = abc();
        let before = page.clone();
        let mut controller = ReorderController::new(SequenceKind::Main);

        let outcome = controller.on_drag_end(&ItemKey::text("nope"), &ItemKey::link("a"), &mut page);

        assert!(matches!(outcome, DragOutcome::Aborted(ReorderError::ItemNotFound(_))));
        assert_eq!(page, before);
        assert!(!controller.is_in_flight());
    }

    #[test]
    fn test_main_failure_keeps_optimistic_state() {
        let mut page = abc();
        let mut controller = ReorderController::new(SequenceKind::Main);

        let outcome = controller.on_drag_end(&ItemKey::link("c"), &ItemKey::link("a"), &mut page);
        assert!(matches!(outcome, DragOutcome::Applied(_)));
        let optimistic = page.clone();

        let settlement = controller
            .settle(Err(PersistenceError::Unavailable("offline".into())), &mut page)
            .unwrap();

        assert!(matches!(settlement, Settlement::Kept(_)));
        assert_eq!(page, optimistic);
        assert!(!controller.is_in_flight());
    }

    #[test]
    fn test_social_failure_rolls_back() {
        let mut page = PageState::new("alice")
            .with_link(Link::new("gh", "GitHub", "https://github.com/a", 0).social())
            .with_link(Link::new("tw", "Twitter", "https://twitter.com/a", 1).social());
        let before = page.clone();
        let mut controller = ReorderController::new(SequenceKind::Social);

        let outcome = controller.on_drag_end(&ItemKey::link("tw"), &ItemKey::link("gh"), &mut page);
        assert!(matches!(outcome, DragOutcome::Applied(_)));
        assert_ne!(page, before);

        let settlement = controller
            .settle(Err(PersistenceError::Rejected("conflict".into())), &mut page)
            .unwrap();

        assert!(matches!(settlement, Settlement::RolledBack(_)));
        assert_eq!(page, before);
    }

    #[test]
    fn test_hidden_items_keep_orders_unique() {
        let mut page = PageState::new("alice")
            .with_link(Link::new("a", "A", "https://a.example", 0))
            .with_link(Link {
                hidden: true,
                ..Link::new("h", "H", "https://h.example", 1)
            })
            .with_link(Link::new("b", "B", "https://b.example", 2));
        let mut controller = ReorderController::new(SequenceKind::Main);

        let outcome = controller.on_drag_end(&ItemKey::link("b"), &ItemKey::link("a"), &mut page);
        assert!(matches!(outcome, DragOutcome::Applied(_)));

        let orders: Vec<(&str, u32)> = page.links.iter().map(|link| (link.id.as_str(), link.order)).collect();
        assert_eq!(orders, vec![("a", 1), ("h", 2), ("b", 0)]);
        assert_eq!(page.merged().keys(), vec![ItemKey::link("b"), ItemKey::link("a")]);
    }

    #[test]
    fn test_social_rollback_restores_hidden_orders() {
        let mut page = PageState::new("alice")
            .with_link(Link {
                hidden: true,
                ..Link::new("rss", "RSS", "https://rss.example", 0).social()
            })
            .with_link(Link::new("gh", "GitHub", "https://github.com/a", 1).social())
            .with_link(Link::new("tw", "Twitter", "https://twitter.com/a", 2).social());
        let before = page.clone();
        let mut controller = ReorderController::new(SequenceKind::Social);

        controller.on_drag_end(&ItemKey::link("tw"), &ItemKey::link("gh"), &mut page);
        assert_eq!(page.link(&ItemId::from("rss")).unwrap().order, 2);

        controller
            .settle(Err(PersistenceError::Unavailable("offline".into())), &mut page)
            .unwrap();
        assert_eq!(page, before);
    }

    #[test]
    fn test_hold_blocks_drags_until_settled() {
        let mut page = abc();
        let mut controller = ReorderController::new(SequenceKind::Main);

        controller.hold(&page).unwrap();
        assert_eq!(controller.hold(&page), Err(ReorderError::InFlight));
        let outcome = controller.on_drag_end(&ItemKey::link("c"), &ItemKey::link("a"), &mut page);
        assert_eq!(outcome, DragOutcome::Aborted(ReorderError::InFlight));

        controller.settle(Ok(()), &mut page).unwrap();
        assert!(!controller.is_in_flight());
    }

    #[test]
    fn test_controllers_do_not_see_each_others_items() {
        let mut page = abc().with_link(Link::new("gh", "GitHub", "https://github.com/a", 0).social());
        let mut main = ReorderController::new(SequenceKind::Main);
        let mut social = ReorderController::new(SequenceKind::Social);

        let outcome = main.on_drag_end(&ItemKey::link("gh"), &ItemKey::link("a"), &mut page);
        assert!(matches!(outcome, DragOutcome::Aborted(ReorderError::ItemNotFound(_))));

        let outcome = social.on_drag_end(&ItemKey::link("a"), &ItemKey::link("gh"), &mut page);
        assert!(matches!(outcome, DragOutcome::Aborted(ReorderError::ItemNotFound(_))));
    }
}
