//! # Sync Broker
//!
//! Owns the mounted render surfaces and decides, per change, the cheapest
//! propagation that keeps them in sync with the editor.
//!
//! ## Strategies
//!
//! ```text
//! DimensionsChanged < threshold  → ignored
//! DimensionsChanged ≥ threshold  → update_dimensions to every surface,
//!                                  then a blind rebuild after the fallback
//!                                  delay unless a content change corroborates
//! ItemsChanged / UserSettings    → fingerprint unchanged: nothing
//!                                  (direct surfaces still get settings)
//!                                  direct surface: soft patch
//!                                  opaque surface: rebuild (generation + 1)
//! ExternalRefreshRequested       → rebuild everything
//! ```
//!
//! Notifications inside the debounce window collapse into one pass keyed by
//! the last classification, except that a pending rebuild is never
//! downgraded. Direct surfaces receive the current page when they are
//! mounted and again after every rebuild. The broker runs as a single task;
//! all surface bookkeeping ([`RenderSurfaceState`]) lives inside it and is
//! never shared.

use crate::config::SyncConfig;
use crate::fingerprint::{Fingerprint, FingerprintTracker};
use crate::message::{FrameSize, SurfaceMessage};
use crate::surface::{RenderSurface, SurfaceControl};
use crate::timer::sleep_until_opt;
use pagesync_model::PageState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeKind {
    ItemsChanged,
    UserSettingsChanged,
    DimensionsChanged(FrameSize),
    ExternalRefreshRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrokerState {
    Idle,
    Propagating,
    AwaitingFallback,
}

/// Strategy chosen for a propagation pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Propagation {
    DimensionPatch(FrameSize),
    Content,
    Reconstruct,
}

/// Classify a notification; `None` means it is noise
pub fn classify(kind: &ChangeKind, last_size: Option<FrameSize>, threshold_px: f64) -> Option<Propagation> {
    match kind {
        ChangeKind::DimensionsChanged(size) => match last_size {
            Some(last) if !size.differs_from(&last, threshold_px) => None,
            _ => Some(Propagation::DimensionPatch(*size)),
        },
        ChangeKind::ItemsChanged | ChangeKind::UserSettingsChanged => Some(Propagation::Content),
        ChangeKind::ExternalRefreshRequested => Some(Propagation::Reconstruct),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broker-side bookkeeping for one mounted surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderSurfaceState {
    /// Bumped on every full reconstruction
    pub generation: u64,
    /// Last fingerprint propagated to the surface
    pub fingerprint: Fingerprint,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Sync broker has shut down")]
    Closed,
}

enum Command {
    Notify(ChangeKind),
    Mount {
        surface: Arc<dyn RenderSurface>,
        reply: oneshot::Sender<SurfaceId>,
    },
    Unmount(SurfaceId),
    Inspect {
        id: SurfaceId,
        reply: oneshot::Sender<Option<RenderSurfaceState>>,
    },
    Shutdown,
}

/// Cheap, clonable access to a running broker
#[derive(Clone)]
pub struct BrokerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<BrokerState>,
}

impl BrokerHandle {
    pub fn notify(&self, kind: ChangeKind) -> Result<(), BrokerError> {
        self.commands
            .send(Command::Notify(kind))
            .map_err(|_| BrokerError::Closed)
    }

    /// Feed an untyped cross-context message. Returns `false` for shapes that
    /// are not part of the protocol; those are ignored.
    pub fn handle_message(&self, value: &serde_json::Value) -> Result<bool, BrokerError> {
        match SurfaceMessage::from_value(value) {
            Some(message) => {
                self.notify(message.change_kind())?;
                Ok(true)
            }
            None => {
                tracing::debug!(%value, "ignoring unrecognized message");
                Ok(false)
            }
        }
    }

    pub async fn mount(&self, surface: Arc<dyn RenderSurface>) -> Result<SurfaceId, BrokerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Mount { surface, reply })
            .map_err(|_| BrokerError::Closed)?;
        response.await.map_err(|_| BrokerError::Closed)
    }

    pub fn unmount(&self, id: SurfaceId) -> Result<(), BrokerError> {
        self.commands
            .send(Command::Unmount(id))
            .map_err(|_| BrokerError::Closed)
    }

    pub async fn surface_state(&self, id: SurfaceId) -> Result<Option<RenderSurfaceState>, BrokerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Inspect { id, reply })
            .map_err(|_| BrokerError::Closed)?;
        response.await.map_err(|_| BrokerError::Closed)
    }

    pub fn state(&self) -> BrokerState {
        *self.state.borrow()
    }

    /// Tear the broker down. Pending passes and fallbacks are dropped.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

struct MountedSurface {
    surface: Arc<dyn RenderSurface>,
    state: RenderSurfaceState,
}

struct PendingPass {
    propagation: Propagation,
    /// A settings change is part of this pass
    settings: bool,
    deadline: Instant,
}

pub struct SyncBroker {
    config: SyncConfig,
    page: watch::Receiver<PageState>,
    tracker: FingerprintTracker,
    surfaces: BTreeMap<SurfaceId, MountedSurface>,
    next_id: u64,
    last_size: Option<FrameSize>,
    pending: Option<PendingPass>,
    fallback_at: Option<Instant>,
    state: watch::Sender<BrokerState>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl SyncBroker {
    /// Start a broker task reading page state from `page`
    pub fn spawn(config: SyncConfig, page: watch::Receiver<PageState>) -> BrokerHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state, state_receiver) = watch::channel(BrokerState::Idle);

        let broker = SyncBroker {
            config,
            page,
            tracker: FingerprintTracker::new(),
            surfaces: BTreeMap::new(),
            next_id: 0,
            last_size: None,
            pending: None,
            fallback_at: None,
            state,
            commands: commands.downgrade(),
        };
        tokio::spawn(broker.run(receiver));

        BrokerHandle {
            commands,
            state: state_receiver,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let debounce_at = self.pending.as_ref().map(|pass| pass.deadline);
            let fallback_at = self.fallback_at;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = sleep_until_opt(debounce_at) => self.flush(),
                _ = sleep_until_opt(fallback_at) => self.fire_fallback(),
            }
        }

        self.teardown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Notify(kind) => self.notify(kind),
            Command::Mount { surface, reply } => {
                let id = self.mount(surface);
                let _ = reply.send(id);
            }
            Command::Unmount(id) => self.unmount(id),
            Command::Inspect { id, reply } => {
                let _ = reply.send(self.surfaces.get(&id).map(|mounted| mounted.state.clone()));
            }
            Command::Shutdown => {}
        }
    }

    fn notify(&mut self, kind: ChangeKind) {
        let Some(propagation) = classify(&kind, self.last_size, self.config.dimension_threshold_px) else {
            tracing::trace!(?kind, "change below threshold, ignored");
            return;
        };

        if let ChangeKind::DimensionsChanged(size) = kind {
            self.last_size = Some(size);
        }

        if propagation == Propagation::Content && self.fallback_at.take().is_some() {
            tracing::debug!(?kind, "content change corroborates dimension patch, fallback cancelled");
            self.set_state(BrokerState::Idle);
        }

        let mut settings = kind == ChangeKind::UserSettingsChanged;
        let mut propagation = propagation;
        if let Some(previous) = &self.pending {
            tracing::trace!(previous = ?previous.propagation, next = ?propagation, "coalescing notification");
            settings |= previous.settings;
            if previous.propagation == Propagation::Reconstruct {
                propagation = Propagation::Reconstruct;
            }
        }
        self.pending = Some(PendingPass {
            propagation,
            settings,
            deadline: Instant::now() + self.config.debounce_window(),
        });
    }

    fn mount(&mut self, surface: Arc<dyn RenderSurface>) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;

        let page = self.page.borrow().clone();
        let (fingerprint, _) = self.tracker.update(&page);

        if surface.control() == SurfaceControl::Direct {
            if let Err(error) = surface.soft_patch(&page) {
                tracing::warn!(surface = %id, %error, "initial patch failed");
            }
        }

        let commands = self.commands.clone();
        surface.on_size_change(Box::new(move |size| {
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Notify(ChangeKind::DimensionsChanged(size)));
            }
        }));

        tracing::info!(surface = %id, key = %surface.key(), control = ?surface.control(), "surface mounted");
        self.surfaces.insert(
            id,
            MountedSurface {
                surface,
                state: RenderSurfaceState {
                    generation: 0,
                    fingerprint,
                },
            },
        );
        id
    }

    fn unmount(&mut self, id: SurfaceId) {
        if self.surfaces.remove(&id).is_some() {
            tracing::info!(surface = %id, "surface unmounted");
        }
        if self.surfaces.is_empty() && self.fallback_at.take().is_some() {
            tracing::debug!("last surface gone, fallback cancelled");
            self.set_state(BrokerState::Idle);
        }
    }

    fn flush(&mut self) {
        let Some(pass) = self.pending.take() else {
            return;
        };

        tracing::debug!(propagation = ?pass.propagation, surfaces = self.surfaces.len(), "propagating");
        self.set_state(BrokerState::Propagating);

        match pass.propagation {
            Propagation::DimensionPatch(size) => self.patch_dimensions(size),
            Propagation::Content => self.propagate_content(pass.settings),
            Propagation::Reconstruct => self.reconstruct_all("external refresh"),
        }

        let settled = if self.fallback_at.is_some() {
            BrokerState::AwaitingFallback
        } else {
            BrokerState::Idle
        };
        self.set_state(settled);
    }

    fn patch_dimensions(&mut self, size: FrameSize) {
        for mounted in self.surfaces.values() {
            mounted.surface.send(SurfaceMessage::UpdateDimensions(size));
        }
        // There is no acknowledgement channel, so the safety net always arms
        self.fallback_at = Some(Instant::now() + self.config.fallback_delay());
    }

    /// `settings` forces a patch of direct surfaces even when the fingerprint
    /// holds, since patchable settings are not part of it
    fn propagate_content(&mut self, settings: bool) {
        let page = self.page.borrow().clone();
        let (fingerprint, _) = self.tracker.update(&page);

        for (id, mounted) in self.surfaces.iter_mut() {
            let unchanged = mounted.state.fingerprint == fingerprint;

            match mounted.surface.control() {
                SurfaceControl::Direct if unchanged && !settings => {
                    tracing::trace!(surface = %id, "fingerprint unchanged");
                }
                SurfaceControl::Direct => match mounted.surface.soft_patch(&page) {
                    Ok(()) => {
                        tracing::debug!(surface = %id, %fingerprint, "soft patch applied");
                        mounted.state.fingerprint = fingerprint.clone();
                    }
                    Err(error) => {
                        tracing::warn!(surface = %id, %error, "soft patch failed, rebuilding");
                        rebuild(*id, mounted, &page, &fingerprint);
                    }
                },
                SurfaceControl::Opaque if unchanged => {
                    tracing::trace!(surface = %id, "fingerprint unchanged");
                }
                SurfaceControl::Opaque => rebuild(*id, mounted, &page, &fingerprint),
            }
        }
    }

    fn reconstruct_all(&mut self, reason: &str) {
        // A rebuild supersedes any pending blind rebuild
        self.fallback_at = None;

        let page = self.page.borrow().clone();
        let (fingerprint, _) = self.tracker.update(&page);

        tracing::info!(reason, surfaces = self.surfaces.len(), "reconstructing all surfaces");
        for (id, mounted) in self.surfaces.iter_mut() {
            rebuild(*id, mounted, &page, &fingerprint);
        }
    }

    fn fire_fallback(&mut self) {
        if self.fallback_at.take().is_none() {
            return;
        }

        self.set_state(BrokerState::Propagating);
        self.reconstruct_all("dimension fallback");
        self.set_state(BrokerState::Idle);
    }

    fn teardown(&mut self) {
        self.pending = None;
        self.fallback_at = None;
        self.surfaces.clear();
        self.set_state(BrokerState::Idle);
        tracing::debug!("sync broker stopped");
    }

    fn set_state(&self, state: BrokerState) {
        self.state.send_replace(state);
    }
}

/// Rebuild one surface. A direct surface comes back empty, so it is handed
/// the page straight away; an opaque one fetches its own.
fn rebuild(id: SurfaceId, mounted: &mut MountedSurface, page: &PageState, fingerprint: &Fingerprint) {
    mounted.state.generation += 1;
    mounted.state.fingerprint = fingerprint.clone();
    mounted.surface.reconstruct();
    if mounted.surface.control() == SurfaceControl::Direct {
        if let Err(error) = mounted.surface.soft_patch(page) {
            tracing::warn!(surface = %id, %error, "rebuilt surface refused the page");
        }
    }
    tracing::debug!(surface = %id, generation = mounted.state.generation, "surface reconstructed");
}
