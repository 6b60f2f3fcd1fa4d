//! Boundary traits for the external collaborators of the conversion core:
//! the task-result store, the work queue, blob storage, the artifact cache
//! and the save-preparation step.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::conversion::{ConversionKey, InputCommand, QueuedWorkItem, TaskRecord};
use crate::domain::types::QueuePriority;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key")]
    InvalidKey,
    #[error("object not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Durable task-result store keyed by [`ConversionKey`].
///
/// `create_if_absent` is the sole arbiter of "first submitter": among
/// concurrent calls for the same key exactly one observes `true`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert the record unless a row with its key already exists.
    /// Returns `true` iff this call created the row.
    async fn create_if_absent(&self, record: &TaskRecord) -> Result<bool, RepoError>;

    /// Fetch the current record for a key, if any.
    async fn select(&self, key: &ConversionKey) -> Result<Option<TaskRecord>, RepoError>;
}

/// Work queue consumed by the external worker fleet. Enqueue is
/// fire-and-forget: delivery and retries are the queue's concern.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, item: QueuedWorkItem, priority: QueuePriority) -> Result<(), RepoError>;
}

/// Blob storage plus signed-URL issuance for conversion inputs and outputs.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put_object(&self, object_key: &str, data: Bytes) -> Result<(), StorageError>;

    async fn get_object(&self, object_key: &str) -> Result<Bytes, StorageError>;

    /// Time-limited download URL for a stored object, rooted at `base_url`.
    async fn signed_url(&self, base_url: &str, object_key: &str) -> Result<String, StorageError>;

    /// Remove every object under `prefix`. Missing prefixes are not errors.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;
}

/// Invalidation hook for cached conversion artifacts. Best-effort: callers
/// ignore failures.
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    async fn invalidate(&self, key: &ConversionKey) -> Result<(), StorageError>;
}

/// Format-specific preparation step that must complete before a
/// save-from-changes command is submitted.
#[async_trait]
pub trait SavePreparer: Send + Sync {
    async fn prepare_save(&self, cmd: &InputCommand) -> Result<(), StorageError>;
}
