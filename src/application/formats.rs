//! Resolution of caller-supplied output types, codepages and delimiters
//! into the internal codes carried by queue payloads.

use crate::domain::conversion::CODEPAGE_UTF8;
use crate::domain::types::{CsvDelimiter, OutputFormat};

/// Map a user-supplied output extension to an internal format code.
/// Unknown extensions surface as an `Unknown` error at the HTTP boundary.
pub fn output_format_from_str(output_type: &str) -> Option<OutputFormat> {
    match output_type.to_ascii_lowercase().as_str() {
        "docx" => Some(OutputFormat::Docx),
        "odt" => Some(OutputFormat::Odt),
        "rtf" => Some(OutputFormat::Rtf),
        "txt" => Some(OutputFormat::Txt),
        "html" => Some(OutputFormat::Html),
        "pdf" => Some(OutputFormat::Pdf),
        "xlsx" => Some(OutputFormat::Xlsx),
        "ods" => Some(OutputFormat::Ods),
        "csv" => Some(OutputFormat::Csv),
        "pptx" => Some(OutputFormat::Pptx),
        "odp" => Some(OutputFormat::Odp),
        "png" => Some(OutputFormat::Png),
        _ => None,
    }
}

/// Map a user-supplied encoding name to a numeric codepage, defaulting to
/// UTF-8 when the name is absent or unrecognised.
pub fn codepage_from_name(name: Option<&str>) -> i32 {
    let Some(name) = name else {
        return CODEPAGE_UTF8;
    };
    match name.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => 65001,
        "utf-16" | "utf16" => 1200,
        "utf-16be" => 1201,
        "windows-1250" => 1250,
        "windows-1251" => 1251,
        "windows-1252" => 1252,
        "koi8-r" => 20866,
        "iso-8859-1" => 28591,
        "iso-8859-5" => 28595,
        _ => CODEPAGE_UTF8,
    }
}

/// Resolve an optional delimiter code, defaulting to comma.
pub fn delimiter_from_code(code: Option<u8>) -> CsvDelimiter {
    code.and_then(CsvDelimiter::from_code)
        .unwrap_or(CsvDelimiter::Comma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(output_format_from_str("pdf"), Some(OutputFormat::Pdf));
        assert_eq!(output_format_from_str("DOCX"), Some(OutputFormat::Docx));
        assert_eq!(output_format_from_str("csv"), Some(OutputFormat::Csv));
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(output_format_from_str("exe"), None);
        assert_eq!(output_format_from_str(""), None);
    }

    #[test]
    fn codepage_defaults_to_utf8() {
        assert_eq!(codepage_from_name(None), CODEPAGE_UTF8);
        assert_eq!(codepage_from_name(Some("klingon")), CODEPAGE_UTF8);
        assert_eq!(codepage_from_name(Some("windows-1251")), 1251);
    }

    #[test]
    fn delimiter_defaults_to_comma() {
        assert_eq!(delimiter_from_code(None), CsvDelimiter::Comma);
        assert_eq!(delimiter_from_code(Some(9)), CsvDelimiter::Comma);
        assert_eq!(delimiter_from_code(Some(1)), CsvDelimiter::Tab);
    }
}
