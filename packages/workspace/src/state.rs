//! In-memory registry of hosted pages.
//!
//! Each page gets its own edit session and its own sync broker, wired
//! together at registration. Frame surfaces opened by preview clients are
//! tracked per page so the host can forward their ready and size signals.

use pagesync_editor::{EditSession, EditorError, ReorderStore};
use pagesync_model::{ItemId, PageState};
use pagesync_preview::{
    BrokerError, BrokerHandle, ClickGuard, FrameEvent, FrameSurface, SurfaceEntryPoint, SurfaceId, SyncBroker,
    SyncConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Unknown page: {0}")]
    UnknownPage(String),

    #[error("Page already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Unknown frame {surface} on page {handle}")]
    UnknownFrame { handle: String, surface: SurfaceId },

    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),
}

impl From<BrokerError> for StateError {
    fn from(error: BrokerError) -> Self {
        StateError::Editor(error.into())
    }
}

/// One hosted page
pub struct PageEntry {
    pub handle: String,
    pub session: tokio::sync::Mutex<EditSession>,
    pub broker: BrokerHandle,
    clicks: ClickGuard,
    click_totals: Mutex<HashMap<ItemId, u64>>,
    frames: Mutex<HashMap<SurfaceId, Arc<FrameSurface>>>,
}

impl PageEntry {
    /// Count a click unless it repeats one inside the click window.
    /// Returns whether it counted and the running total.
    pub fn register_click(&self, id: &ItemId) -> (bool, u64) {
        let counted = self.clicks.register(id);
        let mut totals = self.click_totals.lock().unwrap_or_else(PoisonError::into_inner);
        let total = totals.entry(id.clone()).or_insert(0);
        if counted {
            *total += 1;
        }
        (counted, *total)
    }

    pub fn frame(&self, surface: SurfaceId) -> Result<Arc<FrameSurface>, StateError> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&surface)
            .cloned()
            .ok_or_else(|| StateError::UnknownFrame {
                handle: self.handle.clone(),
                surface,
            })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Mount a new frame surface for a preview client
    pub async fn open_frame(
        &self,
        entry: SurfaceEntryPoint,
        config: &SyncConfig,
    ) -> Result<(SurfaceId, Arc<FrameSurface>, mpsc::UnboundedReceiver<FrameEvent>), StateError> {
        let (frame, events) = FrameSurface::new(entry, config.size_debounce());
        let frame = Arc::new(frame);
        let id = self.broker.mount(frame.clone()).await?;

        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, frame.clone());
        Ok((id, frame, events))
    }

    pub fn close_frame(&self, surface: SurfaceId) {
        let removed = self
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&surface);
        if removed.is_some() {
            // A closed broker has nothing left to unmount
            let _ = self.broker.unmount(surface);
        }
    }
}

/// All pages served by this host
pub struct PageRegistry {
    config: SyncConfig,
    store: Arc<dyn ReorderStore>,
    pages: RwLock<HashMap<String, Arc<PageEntry>>>,
}

impl PageRegistry {
    pub fn new(config: SyncConfig, store: Arc<dyn ReorderStore>) -> Self {
        Self {
            config,
            store,
            pages: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start hosting a page. Must run inside a tokio runtime.
    pub fn register(&self, page: PageState) -> Result<Arc<PageEntry>, StateError> {
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        if pages.contains_key(&page.handle) {
            return Err(StateError::AlreadyRegistered(page.handle));
        }

        let handle = page.handle.clone();
        let mut session = EditSession::new(format!("host-{}", handle), page, self.store.clone());
        let broker = SyncBroker::spawn(self.config.clone(), session.subscribe());
        session.attach_broker(broker.clone());

        let entry = Arc::new(PageEntry {
            handle: handle.clone(),
            session: tokio::sync::Mutex::new(session),
            broker,
            clicks: ClickGuard::new(self.config.click_window()),
            click_totals: Mutex::new(HashMap::new()),
            frames: Mutex::new(HashMap::new()),
        });

        tracing::info!(%handle, "page registered");
        pages.insert(handle, entry.clone());
        Ok(entry)
    }

    pub fn get(&self, handle: &str) -> Result<Arc<PageEntry>, StateError> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
            .ok_or_else(|| StateError::UnknownPage(handle.to_string()))
    }

    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self
            .pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        handles.sort();
        handles
    }

    /// Stop hosting a page and shut its broker down
    pub fn remove(&self, handle: &str) -> Result<(), StateError> {
        let entry = self
            .pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle)
            .ok_or_else(|| StateError::UnknownPage(handle.to_string()))?;
        entry.broker.shutdown();
        tracing::info!(%handle, "page removed");
        Ok(())
    }
}
