//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a conversion task, as written by the worker fleet.
///
/// Mirrors the Postgres enum `task_status`. Only `WaitQueue` is
/// non-terminal for the orchestration flow; `NeedParams`, `SaveVersion`
/// and `UpdateVersion` belong to other flows and surface here as an
/// opaque unknown outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
pub enum FileStatus {
    WaitQueue,
    Ok,
    Err,
    ErrToReload,
    NeedParams,
    SaveVersion,
    UpdateVersion,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::WaitQueue => "wait_queue",
            FileStatus::Ok => "ok",
            FileStatus::Err => "err",
            FileStatus::ErrToReload => "err_to_reload",
            FileStatus::NeedParams => "need_params",
            FileStatus::SaveVersion => "save_version",
            FileStatus::UpdateVersion => "update_version",
        }
    }
}

/// Caller-facing error classification for a conversion outcome.
///
/// `Worker` carries the numeric code reported by the worker through the
/// task record's `status_info` column, verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoError,
    Unknown,
    ConvertTimeout,
    Worker(i32),
}

impl ErrorCode {
    /// Numeric wire representation used by the HTTP surface.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::NoError => vellum_api_types::error_codes::NO_ERROR,
            ErrorCode::Unknown => vellum_api_types::error_codes::UNKNOWN,
            ErrorCode::ConvertTimeout => vellum_api_types::error_codes::CONVERT_TIMEOUT,
            ErrorCode::Worker(code) => code,
        }
    }

    /// Compares wire codes, not variants: a worker-reported code of 0
    /// counts as no error, so callers keep treating the task as pending.
    pub fn is_error(self) -> bool {
        self.code() != vellum_api_types::error_codes::NO_ERROR
    }
}

/// Kind of conversion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Plain document conversion.
    Conv,
    /// Save-from-changes: materialise pending editor changes.
    Sfcm,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Conv => "conv",
            CommandKind::Sfcm => "sfcm",
        }
    }
}

/// Internal output-format codes understood by the worker fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Docx,
    Odt,
    Rtf,
    Txt,
    Html,
    Pdf,
    Xlsx,
    Ods,
    Csv,
    Pptx,
    Odp,
    Png,
    /// Editor-native canvas representation; used by the health probe.
    Canvas,
    /// Internal interchange format produced by the changes path.
    Inner,
}

impl OutputFormat {
    /// Numeric code carried in the queue payload.
    pub fn code(self) -> i32 {
        match self {
            OutputFormat::Docx => 65,
            OutputFormat::Odt => 66,
            OutputFormat::Rtf => 68,
            OutputFormat::Txt => 69,
            OutputFormat::Html => 70,
            OutputFormat::Pdf => 513,
            OutputFormat::Xlsx => 257,
            OutputFormat::Ods => 258,
            OutputFormat::Csv => 260,
            OutputFormat::Pptx => 129,
            OutputFormat::Odp => 130,
            OutputFormat::Png => 769,
            OutputFormat::Canvas => 8192,
            OutputFormat::Inner => 4097,
        }
    }
}

/// CSV field delimiter codes accepted by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvDelimiter {
    None,
    Tab,
    Semicolon,
    Colon,
    Comma,
    Space,
}

impl CsvDelimiter {
    pub fn code(self) -> u8 {
        match self {
            CsvDelimiter::None => 0,
            CsvDelimiter::Tab => 1,
            CsvDelimiter::Semicolon => 2,
            CsvDelimiter::Colon => 3,
            CsvDelimiter::Comma => 4,
            CsvDelimiter::Space => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CsvDelimiter::None),
            1 => Some(CsvDelimiter::Tab),
            2 => Some(CsvDelimiter::Semicolon),
            3 => Some(CsvDelimiter::Colon),
            4 => Some(CsvDelimiter::Comma),
            5 => Some(CsvDelimiter::Space),
            _ => None,
        }
    }
}

/// Scheduling priority attached to queued work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePriority {
    Low,
    Normal,
    High,
}

impl QueuePriority {
    pub fn as_i32(self) -> i32 {
        match self {
            QueuePriority::Low => -1,
            QueuePriority::Normal => 0,
            QueuePriority::High => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_wire_contract() {
        assert_eq!(ErrorCode::NoError.code(), 0);
        assert_eq!(ErrorCode::Unknown.code(), -1);
        assert_eq!(ErrorCode::ConvertTimeout.code(), -2);
        assert_eq!(ErrorCode::Worker(17).code(), 17);
        assert!(!ErrorCode::NoError.is_error());
        assert!(ErrorCode::Worker(17).is_error());
    }

    #[test]
    fn worker_code_zero_is_not_an_error() {
        assert!(!ErrorCode::Worker(0).is_error());
        assert_eq!(ErrorCode::Worker(0).code(), 0);
    }

    #[test]
    fn delimiter_codes_round_trip() {
        for code in 0..=5u8 {
            let delimiter = CsvDelimiter::from_code(code).expect("known code");
            assert_eq!(delimiter.code(), code);
        }
        assert!(CsvDelimiter::from_code(6).is_none());
    }
}
