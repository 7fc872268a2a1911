//! PDF text extraction.

use std::path::Path;

use crate::error::{MailError, Result};

/// Text of every page, pages separated by a blank line.
///
/// The PDF library panics on some malformed documents; that is reported as
/// an invalid format like any other parse failure.
pub fn extract(path: &Path) -> Result<String> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path))
        .map_err(|_| MailError::InvalidFormat("PDF parser aborted on this document".into()))?
        .map_err(|e| MailError::InvalidFormat(format!("unreadable PDF: {e}")))?;

    Ok(pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n"))
}
