//! # Render Surface Adapter
//!
//! Boundary to one embedded render surface. The broker never sees a surface's
//! internals; it can only send it fire-and-forget messages, ask for it to be
//! rebuilt, patch it in place when the surface allows that, and listen for
//! size changes.

use crate::message::{FrameSize, SurfaceMessage};
use crate::timer::sleep_until_opt;
use pagesync_model::PageState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Identity key of a surface instance. The hosting environment treats a new
/// key as "tear down and recreate from the declarative source".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceKey(u64);

impl SurfaceKey {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SurfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// How much of a surface the broker can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceControl {
    /// Visible state can be patched in place
    Direct,
    /// Only reachable through the message channel
    Opaque,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Surface does not accept in-place patches")]
    PatchUnsupported,

    #[error("Surface is detached from its host")]
    Detached,
}

pub type SizeCallback = Box<dyn Fn(FrameSize) + Send + Sync>;

pub trait RenderSurface: Send + Sync {
    /// Current identity key
    fn key(&self) -> SurfaceKey;

    /// Fire-and-forget, at most once. Dropped silently when nobody listens.
    fn send(&self, message: SurfaceMessage);

    /// Schedule a teardown and recreate. Returns immediately; the new
    /// instance goes live later. Safe to call repeatedly.
    fn reconstruct(&self);

    /// Register the listener for rendered size changes
    fn on_size_change(&self, callback: SizeCallback);

    fn control(&self) -> SurfaceControl {
        SurfaceControl::Opaque
    }

    /// Apply page state in place
    fn soft_patch(&self, _page: &PageState) -> Result<(), SurfaceError> {
        Err(SurfaceError::PatchUnsupported)
    }
}

/// Trailing debounce over raw size reports.
///
/// A resize settles into one callback after `delay` of quiet, and a settled
/// size equal to the previous one is not reported again. This keeps a
/// resize → relayout → resize loop from feeding itself.
pub struct SizeObserver {
    sizes: mpsc::UnboundedSender<FrameSize>,
    task: JoinHandle<()>,
}

impl SizeObserver {
    pub fn spawn(delay: Duration, callback: SizeCallback) -> Self {
        let (sizes, mut receiver) = mpsc::unbounded_channel::<FrameSize>();

        let task = tokio::spawn(async move {
            let mut reported: Option<FrameSize> = None;
            let mut pending: Option<(FrameSize, Instant)> = None;

            loop {
                let deadline = pending.map(|(_, at)| at);
                tokio::select! {
                    received = receiver.recv() => match received {
                        Some(size) => pending = Some((size, Instant::now() + delay)),
                        None => break,
                    },
                    _ = sleep_until_opt(deadline) => {
                        if let Some((size, _)) = pending.take() {
                            if reported != Some(size) {
                                reported = Some(size);
                                callback(size);
                            }
                        }
                    }
                }
            }
        });

        Self { sizes, task }
    }

    pub fn observe(&self, size: FrameSize) {
        let _ = self.sizes.send(size);
    }
}

impl Drop for SizeObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Holds the size observer of a surface; one listener at a time
pub struct SizeListener {
    delay: Duration,
    observer: Mutex<Option<SizeObserver>>,
}

impl SizeListener {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            observer: Mutex::new(None),
        }
    }

    /// Replace the listener. Must run inside a tokio runtime.
    pub fn subscribe(&self, callback: SizeCallback) {
        let observer = SizeObserver::spawn(self.delay, callback);
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    /// Feed a raw size report from the platform
    pub fn report(&self, size: FrameSize) {
        if let Some(observer) = self.observer.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            observer.observe(size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_size_observer_debounces_bursts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = SizeObserver::spawn(
            Duration::from_millis(100),
            Box::new(move |size| sink.lock().unwrap().push(size)),
        );

        observer.observe(FrameSize::new(390.0, 800.0));
        tokio::time::sleep(Duration::from_millis(20)).await;
        observer.observe(FrameSize::new(390.0, 820.0));
        tokio::time::sleep(Duration::from_millis(20)).await;
        observer.observe(FrameSize::new(390.0, 844.0));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(*seen.lock().unwrap(), vec![FrameSize::new(390.0, 844.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_observer_skips_repeated_size() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = SizeListener::new(Duration::from_millis(50));
        listener.subscribe(Box::new(move |size| sink.lock().unwrap().push(size)));

        listener.report(FrameSize::new(390.0, 844.0));
        tokio::time::sleep(Duration::from_millis(100)).await;
        listener.report(FrameSize::new(390.0, 844.0));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_surface_keys_advance() {
        let key = SurfaceKey::default();

        assert_eq!(key.next().value(), 1);
        assert_eq!(key.next().to_string(), "surface-1");
    }
}
