//! Synthetic end-to-end conversion used as a liveness probe.

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, error, warn};

use crate::domain::conversion::{ConversionKey, InputCommand};
use crate::domain::types::{ErrorCode, OutputFormat};

use super::{ConvertError, ConvertMode, ConvertService};

pub const PROBE_FAILURE_METRIC: &str = "vellum_healthcheck_failures_total";

const FIXTURE_FORMAT: &str = "docx";
const FIXTURE_TITLE: &str = "Editor.bin";

/// Drive a known-good fixture through the full submit-and-poll path under
/// a fresh random key with the enqueue bypass set. Reports a boolean only:
/// every failure is swallowed, and cleanup runs whether or not the probe
/// succeeded.
pub(super) async fn probe(svc: &ConvertService, base_url: &str) -> bool {
    debug!("start health probe");
    let key = ConversionKey::random("healthcheck");

    let result = run_probe(svc, &key, base_url).await;

    if let Err(err) = svc.cache.invalidate(&key).await {
        warn!(key = %key, error = %err, "health probe cache cleanup failed");
    }
    if let Err(err) = svc.storage.delete_prefix(key.as_str()).await {
        warn!(key = %key, error = %err, "health probe storage cleanup failed");
    }

    let healthy = match result {
        Ok(healthy) => healthy,
        Err(err) => {
            error!(key = %key, error = %err, "health probe failed");
            false
        }
    };
    if !healthy {
        counter!(PROBE_FAILURE_METRIC).increment(1);
    }
    debug!(healthy, "end health probe");
    healthy
}

async fn run_probe(
    svc: &ConvertService,
    key: &ConversionKey,
    base_url: &str,
) -> Result<bool, ConvertError> {
    let fixture = tokio::fs::read(&svc.settings.healthcheck_file).await?;
    svc.storage
        .put_object(&format!("{key}/origin"), Bytes::from(fixture))
        .await?;

    let mut cmd = InputCommand::conv(key.clone(), FIXTURE_TITLE, OutputFormat::Canvas);
    cmd.format = Some(FIXTURE_FORMAT.to_string());

    let outcome = svc
        .convert_by_cmd(cmd, ConvertMode::Sync, base_url, true)
        .await?;
    Ok(outcome.error == ErrorCode::NoError)
}
