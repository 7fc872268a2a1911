//! Attachment metadata and attachment search hits.

use std::path::PathBuf;

/// Metadata about an email attachment.
///
/// An attachment without a `path` is still a valid listing entry; it only
/// means no file for it could be found on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    /// Filename, decoded from the headers or the index. Generated if missing.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub mime_type: String,

    /// Decoded size in bytes (0 when unknown).
    pub size: u64,

    /// Part identifier (`"2"`, `"1.3"`); also the directory name Mail uses
    /// below `Attachments/<message id>/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,

    /// Resolved location on disk, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// One attachment whose extracted text matched a content search.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentHit {
    pub message_id: i64,
    pub subject: String,
    pub filename: String,
    /// Text around the first match.
    pub snippet: String,
}

/// Guess a MIME type from a filename extension.
///
/// Used for index rows, which store only the name.
pub fn mime_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "htm" | "html" => "text/html",
        "txt" | "text" | "log" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "rtf" => "application/rtf",
        "rtfd" => "application/x-rtfd",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "ics" => "text/calendar",
        "vcf" => "text/vcard",
        "eml" => "message/rfc822",
        _ => "application/octet-stream",
    }
}
