//! Directly-controlled surface living in the editor's own context.
//!
//! Unlike a frame it accepts the page state itself, so content changes land
//! as soft patches instead of rebuilds.

use crate::message::{FrameSize, SurfaceMessage};
use crate::surface::{RenderSurface, SizeCallback, SizeListener, SurfaceControl, SurfaceError, SurfaceKey};
use pagesync_model::PageState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

pub struct InlineSurface {
    key: Mutex<SurfaceKey>,
    page: watch::Sender<Option<PageState>>,
    received: Mutex<Vec<SurfaceMessage>>,
    size: SizeListener,
    detached: AtomicBool,
}

impl InlineSurface {
    pub fn new(size_debounce: Duration) -> Self {
        let (page, _) = watch::channel(None);
        Self {
            key: Mutex::new(SurfaceKey::default()),
            page,
            received: Mutex::new(Vec::new()),
            size: SizeListener::new(size_debounce),
            detached: AtomicBool::new(false),
        }
    }

    /// Follow the page as the surface renders it
    pub fn subscribe(&self) -> watch::Receiver<Option<PageState>> {
        self.page.subscribe()
    }

    /// Last patched page, `None` until the first patch
    pub fn current(&self) -> Option<PageState> {
        self.page.borrow().clone()
    }

    /// Messages delivered so far
    pub fn received(&self) -> Vec<SurfaceMessage> {
        self.received.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn report_size(&self, size: FrameSize) {
        self.size.report(size);
    }

    /// The host view went away; later patches fail until a rebuild
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

impl RenderSurface for InlineSurface {
    fn key(&self) -> SurfaceKey {
        *self.key.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, message: SurfaceMessage) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    fn reconstruct(&self) {
        // Same context: the rebuild is immediate, so there is nothing to coalesce
        let mut key = self.key.lock().unwrap_or_else(PoisonError::into_inner);
        *key = key.next();
        self.detached.store(false, Ordering::SeqCst);
    }

    fn on_size_change(&self, callback: SizeCallback) {
        self.size.subscribe(callback);
    }

    fn control(&self) -> SurfaceControl {
        SurfaceControl::Direct
    }

    fn soft_patch(&self, page: &PageState) -> Result<(), SurfaceError> {
        if self.detached.load(Ordering::SeqCst) {
            return Err(SurfaceError::Detached);
        }
        self.page.send_replace(Some(page.clone()));
        Ok(())
    }
}
