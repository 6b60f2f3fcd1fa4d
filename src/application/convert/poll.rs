//! Synchronous wait loop for callers that need a request/response contract
//! over the eventually-consistent store/queue pair.

use std::time::Duration;

use tokio::time::sleep;

use crate::domain::conversion::{ConvertOutcome, InputCommand};

use super::{ConvertError, ConvertService, status};

/// Re-resolve the outcome on a fixed interval until it is terminal or the
/// accumulated wait exceeds the convert timeout. Every iteration sleeps
/// before re-checking, so the loop never busy-spins. Giving up does not
/// cancel the queued work.
pub(super) async fn await_completion(
    svc: &ConvertService,
    cmd: &InputCommand,
    initial: ConvertOutcome,
    base_url: &str,
) -> Result<ConvertOutcome, ConvertError> {
    let mut outcome = initial;
    let mut waited = Duration::ZERO;

    loop {
        if outcome.is_terminal() {
            return Ok(outcome);
        }

        sleep(svc.settings.poll_interval).await;
        waited += svc.settings.poll_interval;

        let record = svc.tasks.select(&cmd.doc_id).await?;
        outcome = status::resolve_status(svc, cmd, record.as_ref(), base_url).await?;

        if waited > svc.settings.convert_timeout {
            outcome.force_timeout();
            return Ok(outcome);
        }
    }
}
