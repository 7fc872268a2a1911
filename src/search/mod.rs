//! Content search over extracted attachment text.
//!
//! The scan itself lives in [`crate::engine::MailEngine::search_attachments`];
//! this module holds the pieces it is built from: an optional external
//! full-text provider and snippet extraction.

use std::path::{Path, PathBuf};

/// External full-text search provider (for example a system-wide file
/// index) that can narrow an attachment scan.
pub trait ContentIndex {
    /// Files under `root` whose content matches `query`.
    ///
    /// `None` means the provider cannot answer (unavailable, not indexed,
    /// timed out) and the caller must scan everything itself. `Some` with an
    /// empty list is a definite "no matches".
    fn matching_files(&self, query: &str, root: &Path) -> Option<Vec<PathBuf>>;
}

/// Character range of the first case-insensitive occurrence of `needle` in
/// `haystack`, as `(start, end)` char indices.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let wanted: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if wanted.is_empty() {
        return None;
    }
    // Lowercasing can expand one char into several; remember the origin.
    let folded: Vec<(char, usize)> = haystack
        .chars()
        .enumerate()
        .flat_map(|(i, c)| c.to_lowercase().map(move |l| (l, i)))
        .collect();
    folded
        .windows(wanted.len())
        .find(|w| w.iter().map(|(c, _)| *c).eq(wanted.iter().copied()))
        .map(|w| (w[0].1, w[w.len() - 1].1 + 1))
}

/// Text around the first match of `needle`, with up to `radius` characters
/// on each side and whitespace collapsed. `None` if there is no match.
pub fn snippet(text: &str, needle: &str, radius: usize) -> Option<String> {
    let (start, end) = find_case_insensitive(text, needle)?;
    let chars: Vec<char> = text.chars().collect();
    let from = start.saturating_sub(radius);
    let to = (end + radius).min(chars.len());

    let body: String = chars[from..to].iter().collect();
    let mut out = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if from > 0 {
        out.insert_str(0, "...");
    }
    if to < chars.len() {
        out.push_str("...");
    }
    Some(out)
}
