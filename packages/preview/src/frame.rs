//! Fully isolated surface (an embedded frame).
//!
//! The adapter talks to its host through a channel of [`FrameEvent`]s. It
//! cannot push state into the frame; a rebuild hands the host a new identity
//! key plus the public entry point URL, and the recreated frame fetches its
//! own copy of the page from there.

use crate::entry::SurfaceEntryPoint;
use crate::message::{FrameSize, SurfaceMessage};
use crate::surface::{RenderSurface, SizeCallback, SizeListener, SurfaceKey};
use serde_json::{json, Value};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Deliver a message to the live frame with this key
    Message { key: SurfaceKey, message: SurfaceMessage },
    /// Tear down the current frame and create one with this key from `url`
    Recreate { key: SurfaceKey, url: Url },
}

impl FrameEvent {
    pub fn to_json(&self) -> Value {
        match self {
            FrameEvent::Message { key, message } => json!({
                "kind": "message",
                "key": key.value(),
                "message": message.to_value(),
            }),
            FrameEvent::Recreate { key, url } => json!({
                "kind": "recreate",
                "key": key.value(),
                "url": url.as_str(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Live,
    /// A recreate was scheduled and the host has not reported it live yet
    Rebuilding,
}

#[derive(Debug)]
struct FrameInner {
    key: SurfaceKey,
    phase: FramePhase,
    /// A rebuild was asked for while the previous one was still loading
    stale: bool,
    rebuilds: u64,
}

impl FrameInner {
    fn schedule(&mut self) -> SurfaceKey {
        self.key = self.key.next();
        self.phase = FramePhase::Rebuilding;
        self.stale = false;
        self.rebuilds += 1;
        self.key
    }
}

pub struct FrameSurface {
    entry: SurfaceEntryPoint,
    inner: Mutex<FrameInner>,
    events: mpsc::UnboundedSender<FrameEvent>,
    size: SizeListener,
}

impl FrameSurface {
    /// Create the adapter and the event stream its host consumes
    pub fn new(entry: SurfaceEntryPoint, size_debounce: Duration) -> (Self, mpsc::UnboundedReceiver<FrameEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();

        let surface = Self {
            entry,
            inner: Mutex::new(FrameInner {
                key: SurfaceKey::default(),
                phase: FramePhase::Live,
                stale: false,
                rebuilds: 0,
            }),
            events,
            size: SizeListener::new(size_debounce),
        };

        (surface, receiver)
    }

    pub fn entry(&self) -> &SurfaceEntryPoint {
        &self.entry
    }

    /// Host callback: the frame created for `key` is ready. Stale keys are
    /// ignored. Returns whether the frame is now live.
    ///
    /// If a rebuild was requested while this frame was loading, the state it
    /// fetched may already be outdated; exactly one more recreate follows
    /// and the frame stays in the rebuilding phase.
    pub fn mark_live(&self, key: SurfaceKey) -> bool {
        let mut inner = self.lock();
        if inner.key != key {
            tracing::debug!(%key, current = %inner.key, "stale frame ready signal");
            return false;
        }
        if inner.stale {
            let key = inner.schedule();
            tracing::debug!(%key, "frame outdated on arrival, recreating");
            let _ = self.events.send(FrameEvent::Recreate { key, url: self.entry.url() });
            return false;
        }
        inner.phase = FramePhase::Live;
        true
    }

    pub fn is_live(&self) -> bool {
        self.lock().phase == FramePhase::Live
    }

    /// Number of rebuilds actually scheduled
    pub fn rebuilds(&self) -> u64 {
        self.lock().rebuilds
    }

    /// Raw size report from the platform observer
    pub fn report_size(&self, size: FrameSize) {
        self.size.report(size);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrameInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RenderSurface for FrameSurface {
    fn key(&self) -> SurfaceKey {
        self.lock().key
    }

    fn send(&self, message: SurfaceMessage) {
        let inner = self.lock();
        if inner.phase != FramePhase::Live {
            // The old frame is being torn down; it has no listener any more
            tracing::trace!(key = %inner.key, ?message, "dropping message for rebuilding frame");
            return;
        }
        let _ = self.events.send(FrameEvent::Message {
            key: inner.key,
            message,
        });
    }

    fn reconstruct(&self) {
        let mut inner = self.lock();
        if inner.phase == FramePhase::Rebuilding {
            tracing::trace!(key = %inner.key, "rebuild already scheduled");
            inner.stale = true;
            return;
        }

        let key = inner.schedule();
        let _ = self.events.send(FrameEvent::Recreate { key, url: self.entry.url() });
    }

    fn on_size_change(&self, callback: SizeCallback) {
        self.size.subscribe(callback);
    }
}
