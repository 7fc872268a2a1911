//! Word-processing (`.docx`) documents: a zip archive whose main part is
//! `word/document.xml`.

use std::io::Read;
use std::path::Path;

use crate::error::{MailError, Result};

use super::markup::word_document_text;

/// Archive member holding the document body.
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

pub fn extract(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| MailError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| MailError::InvalidFormat(format!("not a zip archive: {e}")))?;
    let mut part = archive
        .by_name(MAIN_DOCUMENT_PART)
        .map_err(|e| MailError::InvalidFormat(format!("no {MAIN_DOCUMENT_PART}: {e}")))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| MailError::io(path, e))?;
    Ok(word_document_text(&xml))
}
