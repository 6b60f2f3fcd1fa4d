//! Interpretation of a persisted task record into a caller-facing outcome.

use time::OffsetDateTime;
use tracing::warn;

use crate::domain::conversion::{ConvertOutcome, InputCommand, TaskRecord};
use crate::domain::types::{ErrorCode, FileStatus};

use super::{ConvertError, ConvertService};

/// Map the record's status into an outcome, then apply the staleness
/// override. A missing record means the conversion is still pending.
pub(super) async fn resolve_status(
    svc: &ConvertService,
    cmd: &InputCommand,
    record: Option<&TaskRecord>,
    base_url: &str,
) -> Result<ConvertOutcome, ConvertError> {
    let mut outcome = ConvertOutcome::pending();
    let Some(record) = record else {
        return Ok(outcome);
    };

    match record.status {
        FileStatus::Ok => {
            let object_key = format!("{}/{}", record.key, cmd.title);
            outcome = ConvertOutcome::completed(svc.storage.signed_url(base_url, &object_key).await?);
        }
        FileStatus::Err => {
            outcome = ConvertOutcome::failed(ErrorCode::Worker(record.status_info));
        }
        FileStatus::ErrToReload => {
            outcome = ConvertOutcome::failed(ErrorCode::Worker(record.status_info));
            // This failure mode poisons any cached artifacts for the key.
            // Invalidation is best-effort and never changes the outcome.
            if let Err(err) = svc.cache.invalidate(&record.key).await {
                warn!(key = %record.key, error = %err, "artifact cache invalidation failed");
            }
        }
        FileStatus::NeedParams | FileStatus::SaveVersion | FileStatus::UpdateVersion => {
            outcome = ConvertOutcome::failed(ErrorCode::Unknown);
        }
        FileStatus::WaitQueue => {}
    }

    // Status alone cannot detect a worker that died mid-task; only elapsed
    // wall-clock time can. Runs unconditionally, overriding even success.
    let age = OffsetDateTime::now_utc() - record.last_open_date;
    if age.is_positive() && age.unsigned_abs() > svc.settings.convert_timeout {
        outcome.force_timeout();
    }

    Ok(outcome)
}
