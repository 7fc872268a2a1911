//! Plain-text extraction from attachment files.
//!
//! Dispatch is by [`ExtractKind`], chosen from the declared MIME type when it
//! is specific, else from the file extension. Formats that cannot be read
//! produce a descriptive "Cannot extract" text instead of an error; only a
//! missing file is an error.

pub mod docx;
pub mod markup;
pub mod pdf;
pub mod rtf;

use std::path::Path;

use tracing::debug;

use crate::error::{MailError, Result};
use crate::parser::encoding::decode_text;
use crate::parser::html::html_to_text;

/// Extraction strategy for one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind {
    Pdf,
    Html,
    Rtf,
    Rtfd,
    PlainText,
    Csv,
    Json,
    Xml,
    WordDocument,
    Unknown,
}

impl ExtractKind {
    /// Pick a strategy from a declared MIME type and the file name.
    ///
    /// Generic declared types (`application/octet-stream`) defer to the
    /// extension.
    pub fn detect(path: &Path, declared: Option<&str>) -> Self {
        let from_mime = declared
            .map(|m| m.trim().to_ascii_lowercase())
            .map(|m| Self::from_mime(&m))
            .unwrap_or(Self::Unknown);
        if from_mime != Self::Unknown {
            return from_mime;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| Self::from_extension(&e.to_ascii_lowercase()))
            .unwrap_or(Self::Unknown)
    }

    fn from_mime(mime: &str) -> Self {
        match mime {
            "application/pdf" => Self::Pdf,
            "text/html" | "application/xhtml+xml" => Self::Html,
            "application/rtf" | "text/rtf" => Self::Rtf,
            "application/x-rtfd" | "com.apple.rtfd" => Self::Rtfd,
            "text/plain" => Self::PlainText,
            "text/csv" => Self::Csv,
            "application/json" => Self::Json,
            "application/xml" | "text/xml" => Self::Xml,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Self::WordDocument
            }
            _ => Self::Unknown,
        }
    }

    fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" => Self::Pdf,
            "htm" | "html" | "xhtml" => Self::Html,
            "rtf" => Self::Rtf,
            "rtfd" => Self::Rtfd,
            "txt" | "text" | "log" | "md" => Self::PlainText,
            "csv" | "tsv" => Self::Csv,
            "json" => Self::Json,
            "xml" => Self::Xml,
            "docx" => Self::WordDocument,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Html => "HTML",
            Self::Rtf => "RTF",
            Self::Rtfd => "RTFD",
            Self::PlainText => "plain text",
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::WordDocument => "Word document",
            Self::Unknown => "unknown",
        }
    }
}

/// Extract plain text from the file at `path`.
///
/// Fails only if `path` does not exist ([`MailError::FileNotFound`]) or
/// cannot be accessed at all.
pub fn extract_text(path: &Path, declared: Option<&str>) -> Result<String> {
    std::fs::metadata(path).map_err(|e| MailError::io(path, e))?;
    let kind = ExtractKind::detect(path, declared);
    debug!(path = %path.display(), kind = kind.label(), "Extracting attachment text");

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let extracted = match kind {
        ExtractKind::Pdf => pdf::extract(path),
        ExtractKind::Html => read_text(path).map(|html| html_to_text(&html)),
        ExtractKind::Rtf => rtf::extract_rtf(path),
        ExtractKind::Rtfd => rtf::extract_rtfd(path),
        ExtractKind::PlainText | ExtractKind::Csv | ExtractKind::Json => read_text(path),
        ExtractKind::Xml => read_text(path).map(|xml| markup::xml_to_text(&xml)),
        ExtractKind::WordDocument => docx::extract(path),
        ExtractKind::Unknown => return Ok(read_unknown(path, &name, declared)),
    };

    match extracted {
        Ok(text) => Ok(text),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Extraction failed");
            Ok(format!(
                "[Cannot extract text from {name} ({}): {e}]",
                kind.label()
            ))
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| MailError::io(path, e))?;
    Ok(decode_text(&bytes, None))
}

/// Accept unknown files only if they are valid UTF-8 without NUL bytes.
fn read_unknown(path: &Path, name: &str, declared: Option<&str>) -> String {
    let type_name = declared.unwrap_or("unknown type");
    match std::fs::read(path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) if !text.contains('\0') => text,
            _ => format!("[Cannot extract text from {name}: unsupported type {type_name}]"),
        },
        Err(e) => format!("[Cannot extract text from {name}: {e}]"),
    }
}
