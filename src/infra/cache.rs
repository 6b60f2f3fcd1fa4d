//! Best-effort invalidation of cached conversion artifacts.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::repos::{ArtifactCache, StorageError};
use crate::domain::conversion::ConversionKey;

/// Filesystem cache of per-key conversion artifacts. Invalidation removes
/// the key's whole directory; a key with no cached artifacts is a no-op.
#[derive(Debug)]
pub struct ConversionArtifactCache {
    root: PathBuf,
}

impl ConversionArtifactCache {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

#[async_trait]
impl ArtifactCache for ConversionArtifactCache {
    async fn invalidate(&self, key: &ConversionKey) -> Result<(), StorageError> {
        let path = self.root.join(key.as_str());
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!(key = %key, "invalidated cached conversion artifacts");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}
