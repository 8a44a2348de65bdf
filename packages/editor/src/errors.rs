//! Error types for the editor

use crate::persistence::PersistenceError;
use crate::reorder::ReorderError;
use pagesync_model::ModelError;
use pagesync_preview::BrokerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("Reorder error: {0}")]
    Reorder(#[from] ReorderError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Preview error: {0}")]
    Broker(#[from] BrokerError),
}
