//! Wire types shared between the Vellum server and API clients.
//!
//! The converter endpoint always answers with a [`ConvertResponse`]: either a
//! signed download URL with `error == 0`, or a non-zero error code and no URL.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Well-known error codes carried in [`ConvertResponse::error`].
///
/// Worker-reported failures use positive codes that pass through verbatim;
/// the orchestrator itself only ever emits the values below.
pub mod error_codes {
    /// Success, or "still pending" when no URL is present yet.
    pub const NO_ERROR: i32 = 0;
    /// Unclassified failure or unsupported request.
    pub const UNKNOWN: i32 = -1;
    /// The conversion did not finish within the configured wait bound.
    pub const CONVERT_TIMEOUT: i32 = -2;
}

/// Query parameters accepted by `GET /converter`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertQuery {
    /// Source document URL the worker will fetch.
    pub url: Option<String>,
    /// Caller-supplied document key; combined with `outputtype` to form the
    /// conversion key.
    pub key: Option<String>,
    /// Optional access/validation key forwarded to the worker.
    pub vkey: Option<String>,
    /// Source format tag (extension) of the document at `url`.
    pub filetype: Option<String>,
    /// Requested output extension, e.g. `pdf` or `docx`.
    pub outputtype: Option<String>,
    /// Character encoding name for plain-text sources.
    #[serde(rename = "codePage")]
    pub code_page: Option<String>,
    /// CSV delimiter code for spreadsheet text sources.
    pub delimiter: Option<u8>,
    /// Opaque document-type parameters forwarded to the worker.
    pub doctparams: Option<i32>,
    /// When `"true"`, return immediately instead of waiting for completion.
    #[serde(rename = "async")]
    pub is_async: Option<String>,
}

/// Body returned by `GET /converter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResponse {
    /// Signed download URL for the converted document; present only when
    /// `error` equals [`error_codes::NO_ERROR`] and the conversion finished.
    #[serde(rename = "fileUrl", skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Error code per [`error_codes`], or a worker-reported code.
    pub error: i32,
}

impl ConvertResponse {
    pub fn from_error(error: i32) -> Self {
        Self {
            file_url: None,
            error,
        }
    }
}

/// Body accepted by `POST /internal/changes/{doc_id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangesRequest {
    /// Timestamp of the last saved change set.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub lastsave: Option<OffsetDateTime>,
    /// Opaque caller data echoed back by the worker callback.
    pub userdata: Option<String>,
}
