//! Submission path for "save pending edits" conversions.

use time::OffsetDateTime;

use crate::domain::conversion::{ConversionKey, ConvertOutcome, InputCommand};

use super::{ConvertError, ConvertMode, ConvertService};

/// Build the `sfcm` command, run the format-specific prepare-save step,
/// then submit through the common path. Asynchronous at the queue layer:
/// the caller gets whatever the initial resolve produced, typically
/// "pending".
pub(super) async fn convert_from_changes(
    svc: &ConvertService,
    doc_id: ConversionKey,
    base_url: &str,
    last_save: Option<OffsetDateTime>,
    userdata: Option<String>,
) -> Result<ConvertOutcome, ConvertError> {
    let cmd = InputCommand::sfcm(doc_id, last_save, userdata);

    // The change set must be materialised before the worker can see it.
    svc.preparer.prepare_save(&cmd).await?;

    svc.convert_by_cmd(cmd, ConvertMode::Async, base_url, false)
        .await
}
