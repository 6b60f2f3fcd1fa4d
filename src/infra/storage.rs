//! Filesystem-backed blob storage with expiring signed download URLs, plus
//! the prepare-save step that materialises pending change sets.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tokio::fs;

use crate::application::repos::{BlobStorage, SavePreparer, StorageError};
use crate::domain::conversion::InputCommand;

/// Filesystem blob store. Object keys are slash-separated relative paths
/// beneath the storage root; signed URLs carry an expiry timestamp and a
/// keyed SHA-256 signature over the object key and expiry.
#[derive(Debug)]
pub struct FsBlobStorage {
    root: PathBuf,
    secret: Vec<u8>,
    url_ttl: Duration,
}

impl FsBlobStorage {
    /// Initialise storage rooted at the provided directory, creating it if
    /// necessary.
    pub fn new(root: PathBuf, secret: &str, url_ttl: Duration) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            secret: secret.as_bytes().to_vec(),
            url_ttl,
        })
    }

    /// Check an `expires`/`signature` pair presented against an object key.
    /// Comparison is constant-time; an elapsed expiry always fails.
    pub fn verify(&self, object_key: &str, expires: i64, signature: &str) -> bool {
        if OffsetDateTime::now_utc().unix_timestamp() > expires {
            return false;
        }
        let expected = self.sign(object_key, expires);
        bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
    }

    fn sign(&self, object_key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(b"\n");
        hasher.update(object_key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Resolve an object key to an absolute path, rejecting anything that
    /// would escape the storage root.
    fn resolve(&self, object_key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(object_key);
        if object_key.is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for FsBlobStorage {
    async fn put_object(&self, object_key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.resolve(object_key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        Ok(())
    }

    async fn get_object(&self, object_key: &str) -> Result<Bytes, StorageError> {
        let path = self.resolve(object_key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn signed_url(&self, base_url: &str, object_key: &str) -> Result<String, StorageError> {
        // Validate the key even though no filesystem access happens here.
        self.resolve(object_key)?;
        let expires = (OffsetDateTime::now_utc() + self.url_ttl).unix_timestamp();
        let signature = self.sign(object_key, expires);
        Ok(format!(
            "{}/download/{object_key}?expires={expires}&signature={signature}",
            base_url.trim_end_matches('/')
        ))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let path = self.resolve(prefix)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChangesManifest<'a> {
    #[serde(with = "time::serde::rfc3339::option")]
    last_save: Option<OffsetDateTime>,
    userdata: Option<&'a str>,
}

/// Prepare-save step backed by blob storage: persists the pending-changes
/// manifest where the worker picks it up alongside the queued job.
pub struct StoredChangesPreparer {
    storage: std::sync::Arc<dyn BlobStorage>,
}

impl StoredChangesPreparer {
    pub fn new(storage: std::sync::Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SavePreparer for StoredChangesPreparer {
    async fn prepare_save(&self, cmd: &InputCommand) -> Result<(), StorageError> {
        let manifest = ChangesManifest {
            last_save: cmd.last_save,
            userdata: cmd.userdata.as_deref(),
        };
        let body = serde_json::to_vec(&manifest)
            .map_err(|err| StorageError::Io(std::io::Error::other(err)))?;
        self.storage
            .put_object(
                &format!("{}/changes/manifest.json", cmd.doc_id),
                Bytes::from(body),
            )
            .await
    }
}
