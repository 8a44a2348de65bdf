//! # Persistence Collaborator
//!
//! The engine does not own storage. It hands reorder payloads to a
//! [`ReorderStore`] and only learns whether the whole write succeeded; there
//! is no partial success.

use crate::reorder::{MainReorder, SocialReorder};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Storage for reorder results. Every call is a suspension point.
#[async_trait]
pub trait ReorderStore: Send + Sync {
    async fn persist_main(&self, handle: &str, payload: &MainReorder) -> Result<(), PersistenceError>;

    async fn persist_social(&self, handle: &str, payload: &SocialReorder) -> Result<(), PersistenceError>;
}

/// One accepted write, as recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoredWrite {
    Main(MainReorder),
    Social(SocialReorder),
}

/// In-process store with failure injection
#[derive(Debug, Default)]
pub struct MemoryStore {
    writes: Mutex<HashMap<String, Vec<StoredWrite>>>,
    failures_remaining: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every write, to exercise optimistic rendering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` writes fail
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Accepted writes for a handle, oldest first
    pub fn writes(&self, handle: &str) -> Vec<StoredWrite> {
        self.writes
            .lock()
            .map(|writes| writes.get(handle).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    async fn record(&self, handle: &str, write: StoredWrite) -> Result<(), PersistenceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PersistenceError::Unavailable("injected failure".to_string()));
        }

        let mut writes = self
            .writes
            .lock()
            .map_err(|_| PersistenceError::Unavailable("store lock poisoned".to_string()))?;
        writes.entry(handle.to_string()).or_default().push(write);
        Ok(())
    }
}

#[async_trait]
impl ReorderStore for MemoryStore {
    async fn persist_main(&self, handle: &str, payload: &MainReorder) -> Result<(), PersistenceError> {
        self.record(handle, StoredWrite::Main(payload.clone())).await
    }

    async fn persist_social(&self, handle: &str, payload: &SocialReorder) -> Result<(), PersistenceError> {
        self.record(handle, StoredWrite::Social(payload.clone())).await
    }
}
