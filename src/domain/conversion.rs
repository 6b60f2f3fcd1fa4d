//! Conversion request entities: keys, persisted task records, commands and
//! the outcome values ultimately returned to callers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{CommandKind, CsvDelimiter, ErrorCode, FileStatus, OutputFormat};

/// Default UTF-8 codepage applied when the caller supplies none.
pub const CODEPAGE_UTF8: i32 = 65001;

/// Identifier of one logical conversion; primary key of [`TaskRecord`].
///
/// Derived deterministically for plain conversions so that duplicate
/// requests for the same document and output format collide on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionKey(String);

impl ConversionKey {
    /// Wrap a caller-supplied identifier. Returns `None` for empty input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self(raw))
    }

    /// Key for a plain conversion: `conv_{document key}_{output extension}`.
    pub fn derive(doc_key: &str, output_ext: &str) -> Option<Self> {
        if doc_key.trim().is_empty() || output_ext.trim().is_empty() {
            return None;
        }
        Some(Self(format!("conv_{doc_key}_{output_ext}")))
    }

    /// Fresh random key, used by the health probe to avoid colliding with
    /// real conversions.
    pub fn random(prefix: &str) -> Self {
        Self(format!("{prefix}_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted task-result row. Created by the submitter on first sight of a
/// key; mutated afterwards only by the worker that processes the job.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub key: ConversionKey,
    pub format: String,
    pub status: FileStatus,
    pub status_info: i32,
    pub title: String,
    pub last_open_date: OffsetDateTime,
}

impl TaskRecord {
    /// Fresh record in the queued state, stamped with the current time.
    pub fn queued(key: ConversionKey, format: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key,
            format: format.into(),
            status: FileStatus::WaitQueue,
            status_info: ErrorCode::NoError.code(),
            title: title.into(),
            last_open_date: OffsetDateTime::now_utc(),
        }
    }
}

/// Caller-constructed description of one conversion request.
///
/// Immutable once built; travels by value into the submitter and, wrapped
/// in a [`QueuedWorkItem`], into the queue payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    pub kind: CommandKind,
    pub doc_id: ConversionKey,
    pub url: Option<String>,
    pub vkey: Option<String>,
    /// Source format tag (extension) of the input document.
    pub format: Option<String>,
    /// Display filename of the conversion output.
    pub title: String,
    pub output_format: OutputFormat,
    pub codepage: i32,
    pub delimiter: CsvDelimiter,
    pub embedded_fonts: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_save: Option<OffsetDateTime>,
    pub userdata: Option<String>,
    pub doct_params: Option<i32>,
}

impl InputCommand {
    /// Plain `conv` command with the defaults shared by all builders.
    pub fn conv(doc_id: ConversionKey, title: impl Into<String>, output_format: OutputFormat) -> Self {
        Self {
            kind: CommandKind::Conv,
            doc_id,
            url: None,
            vkey: None,
            format: None,
            title: title.into(),
            output_format,
            codepage: CODEPAGE_UTF8,
            delimiter: CsvDelimiter::Comma,
            embedded_fonts: false,
            last_save: None,
            userdata: None,
            doct_params: None,
        }
    }

    /// Save-from-changes command: internal output format, UTF-8, comma
    /// delimiter, no embedded fonts.
    pub fn sfcm(
        doc_id: ConversionKey,
        last_save: Option<OffsetDateTime>,
        userdata: Option<String>,
    ) -> Self {
        Self {
            kind: CommandKind::Sfcm,
            doc_id,
            url: None,
            vkey: None,
            format: None,
            title: "Editor.bin".to_string(),
            output_format: OutputFormat::Inner,
            codepage: CODEPAGE_UTF8,
            delimiter: CsvDelimiter::Comma,
            embedded_fonts: false,
            last_save,
            userdata,
            doct_params: None,
        }
    }
}

/// Unit of work handed to the queue; opaque to this service beyond
/// construction and priority tagging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWorkItem {
    pub cmd: InputCommand,
    /// Target filename the worker writes the result to.
    pub to_file: String,
    /// Health-check bypass: instructs the worker to read the source from
    /// the `{key}/origin` slot instead of fetching `cmd.url`.
    pub from_origin: bool,
}

impl QueuedWorkItem {
    pub fn from_command(cmd: InputCommand, from_origin: bool) -> Self {
        let to_file = cmd.title.clone();
        Self {
            cmd,
            to_file,
            from_origin,
        }
    }
}

/// Final value returned to callers: a signed URL, an error code, or
/// "still pending" (no URL, `NoError`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOutcome {
    pub url: Option<String>,
    pub error: ErrorCode,
}

impl ConvertOutcome {
    pub fn pending() -> Self {
        Self {
            url: None,
            error: ErrorCode::NoError,
        }
    }

    pub fn completed(url: String) -> Self {
        Self {
            url: Some(url),
            error: ErrorCode::NoError,
        }
    }

    pub fn failed(error: ErrorCode) -> Self {
        Self { url: None, error }
    }

    /// Terminal means no further polling can change the answer.
    pub fn is_terminal(&self) -> bool {
        self.url.is_some() || self.error.is_error()
    }

    /// Override the outcome with a timeout, dropping any URL so the
    /// `url.is_some() implies NoError` invariant holds.
    pub fn force_timeout(&mut self) {
        self.url = None;
        self.error = ErrorCode::ConvertTimeout;
    }
}
