//! The conversion-request lifecycle: idempotent submission, status
//! resolution, the synchronous poll loop, the health probe and the
//! save-from-changes path.

mod changes;
mod health;
mod poll;
mod status;
mod submit;

pub use health::PROBE_FAILURE_METRIC;
pub use submit::ENQUEUED_METRIC;

use std::{path::PathBuf, sync::Arc, time::Duration};

use metrics::histogram;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::debug;

use crate::application::repos::{
    ArtifactCache, BlobStorage, RepoError, SavePreparer, StorageError, TaskStore, WorkQueue,
};
use crate::domain::conversion::{ConversionKey, ConvertOutcome, InputCommand};

pub const CONVERT_DURATION_METRIC: &str = "vellum_convert_duration_seconds";

/// Tunables injected into the service instead of read from ambient state.
#[derive(Debug, Clone)]
pub struct ConvertSettings {
    /// Upper bound for both the synchronous wait and record staleness,
    /// derived from the queue's visibility timeout and retention period.
    pub convert_timeout: Duration,
    /// Fixed delay between poll-loop iterations.
    pub poll_interval: Duration,
    /// Known-good fixture file driven through a full conversion by the
    /// health probe.
    pub healthcheck_file: PathBuf,
}

/// Whether the caller blocks until a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertMode {
    Sync,
    Async,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Facade over the conversion lifecycle. All collaborators are reached
/// through their boundary traits; the only shared mutable state lives
/// behind the store and the queue.
#[derive(Clone)]
pub struct ConvertService {
    pub(super) tasks: Arc<dyn TaskStore>,
    pub(super) queue: Arc<dyn WorkQueue>,
    pub(super) storage: Arc<dyn BlobStorage>,
    pub(super) cache: Arc<dyn ArtifactCache>,
    pub(super) preparer: Arc<dyn SavePreparer>,
    pub(super) settings: ConvertSettings,
}

impl ConvertService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        queue: Arc<dyn WorkQueue>,
        storage: Arc<dyn BlobStorage>,
        cache: Arc<dyn ArtifactCache>,
        preparer: Arc<dyn SavePreparer>,
        settings: ConvertSettings,
    ) -> Self {
        Self {
            tasks,
            queue,
            storage,
            cache,
            preparer,
            settings,
        }
    }

    /// Submit a conversion command and resolve its outcome. In
    /// [`ConvertMode::Sync`] the call blocks until a terminal outcome or
    /// the configured timeout.
    pub async fn convert(
        &self,
        cmd: InputCommand,
        mode: ConvertMode,
        base_url: &str,
    ) -> Result<ConvertOutcome, ConvertError> {
        self.convert_by_cmd(cmd, mode, base_url, false).await
    }

    /// Save-from-changes path: prepares the pending change set, then
    /// submits an `sfcm` command. Always asynchronous at the queue layer.
    pub async fn convert_from_changes(
        &self,
        doc_id: ConversionKey,
        base_url: &str,
        last_save: Option<OffsetDateTime>,
        userdata: Option<String>,
    ) -> Result<ConvertOutcome, ConvertError> {
        changes::convert_from_changes(self, doc_id, base_url, last_save, userdata).await
    }

    /// Synthetic end-to-end conversion used as a liveness probe. Never
    /// fails: every error is reported as `false`.
    pub async fn health_probe(&self, base_url: &str) -> bool {
        health::probe(self, base_url).await
    }

    pub(super) async fn convert_by_cmd(
        &self,
        cmd: InputCommand,
        mode: ConvertMode,
        base_url: &str,
        bypass: bool,
    ) -> Result<ConvertOutcome, ConvertError> {
        let started = Instant::now();
        debug!(doc_id = %cmd.doc_id, kind = cmd.kind.as_str(), "start convert request");

        let outcome = match submit::submit(self, &cmd, bypass).await? {
            submit::SubmitOutcome::Enqueued => ConvertOutcome::pending(),
            submit::SubmitOutcome::AlreadyExists(record) => {
                status::resolve_status(self, &cmd, record.as_ref(), base_url).await?
            }
        };

        let outcome = match mode {
            ConvertMode::Sync => poll::await_completion(self, &cmd, outcome, base_url).await?,
            ConvertMode::Async => outcome,
        };

        debug!(
            doc_id = %cmd.doc_id,
            url = outcome.url.as_deref().unwrap_or(""),
            error = outcome.error.code(),
            "end convert request"
        );
        histogram!(CONVERT_DURATION_METRIC).record(started.elapsed().as_secs_f64());

        Ok(outcome)
    }
}
