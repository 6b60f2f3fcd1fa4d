//! Idempotent task submission.

use metrics::counter;
use tracing::debug;

use crate::domain::conversion::{InputCommand, QueuedWorkItem, TaskRecord};
use crate::domain::types::QueuePriority;

use super::{ConvertError, ConvertService};

pub const ENQUEUED_METRIC: &str = "vellum_convert_enqueued_total";

/// Result of one submission attempt for a conversion key.
pub(super) enum SubmitOutcome {
    /// This call created the record (or bypassed the check) and pushed a
    /// work item; the conversion is now pending.
    Enqueued,
    /// A record already existed; carries the freshly selected row so the
    /// caller can resolve its status.
    AlreadyExists(Option<TaskRecord>),
}

/// Create-or-attach for a conversion key. The store's conditional insert
/// is the sole arbiter: among concurrent duplicates, exactly one caller
/// observes "created" and enqueues, so at most one work item exists per
/// round of conversion.
pub(super) async fn submit(
    svc: &ConvertService,
    cmd: &InputCommand,
    bypass: bool,
) -> Result<SubmitOutcome, ConvertError> {
    let record = TaskRecord::queued(
        cmd.doc_id.clone(),
        cmd.format.clone().unwrap_or_default(),
        cmd.title.clone(),
    );

    let created = svc.tasks.create_if_absent(&record).await?;
    if created || bypass {
        let item = QueuedWorkItem::from_command(cmd.clone(), bypass);
        svc.queue.enqueue(item, QueuePriority::Low).await?;
        counter!(ENQUEUED_METRIC).increment(1);
        debug!(doc_id = %cmd.doc_id, created, bypass, "enqueued conversion work item");
        return Ok(SubmitOutcome::Enqueued);
    }

    let current = svc.tasks.select(&cmd.doc_id).await?;
    Ok(SubmitOutcome::AlreadyExists(current))
}
