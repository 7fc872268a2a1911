//! The engine facade: one object wiring configuration, account identities,
//! the mailbox locator, the index and the extractors together.
//!
//! Everything is synchronous and read-only. The account snapshot is taken
//! once in [`MailEngine::open`] and kept for the engine's lifetime.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::{self, Config, SearchConfig};
use crate::error::{MailError, Result};
use crate::extract::extract_text;
use crate::locate::{find_version_root, MailboxLocator, WalkDirSearch};
use crate::model::attachment::{Attachment, AttachmentHit};
use crate::model::mailbox::Mailbox;
use crate::model::message::Message;
use crate::parser::container::read_container_part;
use crate::search::{snippet, ContentIndex};
use crate::store::{AccountDirectory, MailIndex, MailboxRef, SearchFilter};

/// Index location relative to the version root.
const INDEX_RELATIVE_PATH: [&str; 2] = ["MailData", "Envelope Index"];

/// Longest filename used when writing inline attachments to disk.
const MAX_TEMP_NAME_LEN: usize = 150;

/// Read-only access to one mail store.
pub struct MailEngine {
    index: MailIndex,
    search: SearchConfig,
    content_index: Option<Box<dyn ContentIndex>>,
}

impl MailEngine {
    /// Open the store described by `config`.
    ///
    /// The version root is discovered under the mail root; an explicitly
    /// configured index path works even when no version root exists, but
    /// then only `file://` mailboxes can be resolved on disk.
    pub fn open(config: &Config) -> Result<Self> {
        let mail_root = config::mail_root(config);
        let version_root = match find_version_root(&mail_root) {
            Ok(root) => Some(root),
            Err(e) if config.store.index_path.is_some() => {
                warn!(mail_root = %mail_root.display(), error = %e, "No version root, container lookup limited");
                None
            }
            Err(e) => return Err(e),
        };

        let index_path = match (&config.store.index_path, &version_root) {
            (Some(path), _) => path.clone(),
            (None, Some(root)) => INDEX_RELATIVE_PATH
                .iter()
                .fold(root.clone(), |p, part| p.join(part)),
            (None, None) => return Err(MailError::MailRootNotFound(mail_root)),
        };

        let accounts = AccountDirectory::load(&config::accounts_path(config));
        let locator = MailboxLocator::new(
            version_root,
            Box::new(WalkDirSearch::new(config.search.max_scan_depth)),
        );
        let index = MailIndex::open(&index_path, accounts, locator)?;
        info!(
            index = %index_path.display(),
            accounts = index.accounts().len(),
            "Mail store opened"
        );
        Ok(Self::from_parts(index, config.search.clone()))
    }

    /// Build an engine from an already opened index.
    pub fn from_parts(index: MailIndex, search: SearchConfig) -> Self {
        Self {
            index,
            search,
            content_index: None,
        }
    }

    /// Consult `provider` before scanning attachments.
    pub fn with_content_index(mut self, provider: Box<dyn ContentIndex>) -> Self {
        self.content_index = Some(provider);
        self
    }

    pub fn index(&self) -> &MailIndex {
        &self.index
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub fn list_mailboxes(&self) -> Result<Vec<Mailbox>> {
        self.index.list_mailboxes()
    }

    /// Search messages; the filter's limit is capped at the configured
    /// maximum.
    pub fn search_messages(&self, filter: &SearchFilter) -> Result<Vec<Message>> {
        let filter = SearchFilter {
            limit: filter.limit.min(self.search.max_limit),
            ..filter.clone()
        };
        self.index.search_messages(&filter)
    }

    pub fn list_messages(
        &self,
        mailbox: &MailboxRef,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Message>> {
        self.index
            .list_messages(mailbox, self.search.clamp_limit(limit), offset)
    }

    /// A message with recipients, body and attachments.
    pub fn get_message(&self, id: i64) -> Result<Message> {
        self.index
            .get_message(id)?
            .ok_or(MailError::MessageNotFound(id))
    }

    pub fn list_attachments(&self, message_id: i64) -> Result<Vec<Attachment>> {
        self.index.list_attachments(message_id)
    }

    /// Extracted text of the attachment `filename` of a message.
    ///
    /// Errors with [`MailError::AttachmentNotFound`] when the message has no
    /// such attachment, and with [`MailError::AttachmentFileMissing`] when it
    /// does but neither a file nor inline content can be found.
    pub fn attachment_content(&self, message_id: i64, filename: &str) -> Result<String> {
        let attachments = self.index.list_attachments(message_id)?;
        let attachment = attachments
            .iter()
            .find(|a| a.filename == filename)
            .or_else(|| {
                attachments
                    .iter()
                    .find(|a| a.filename.eq_ignore_ascii_case(filename))
            })
            .ok_or_else(|| MailError::AttachmentNotFound {
                message_id,
                filename: filename.to_string(),
            })?;

        self.attachment_text(message_id, attachment)?
            .ok_or_else(|| MailError::AttachmentFileMissing {
                message_id,
                filename: filename.to_string(),
            })
    }

    /// Search the text of attachments, newest messages first.
    ///
    /// `limit` caps the number of hits. `progress` receives
    /// `(messages scanned, messages total)`.
    pub fn search_attachments(
        &self,
        query: &str,
        limit: Option<usize>,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> Result<Vec<AttachmentHit>> {
        let query = query.trim();
        let limit = self.search.clamp_limit(limit);
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let allowed = self.narrow_candidates(query);
        if allowed.as_ref().is_some_and(HashSet::is_empty) {
            debug!(query, "Content index reported no matching files");
            return Ok(Vec::new());
        }

        let candidates = self.index.attachment_candidates()?;
        let total = candidates.len();
        let mut hits = Vec::new();

        for (i, summary) in candidates.iter().enumerate() {
            if let Some(report) = progress {
                report(i, total);
            }
            let attachments = match self.index.list_attachments(summary.id) {
                Ok(list) => list,
                Err(e) => {
                    debug!(message_id = summary.id, error = %e, "Skipping message in attachment search");
                    continue;
                }
            };
            for attachment in &attachments {
                if let Some(allowed) = &allowed {
                    if !attachment.path.as_ref().is_some_and(|p| allowed.contains(p)) {
                        continue;
                    }
                }
                let text = match self.attachment_text(summary.id, attachment) {
                    Ok(Some(text)) => text,
                    Ok(None) => continue,
                    Err(e) => {
                        debug!(message_id = summary.id, filename = %attachment.filename, error = %e, "Skipping attachment");
                        continue;
                    }
                };
                if let Some(snippet) = snippet(&text, query, self.search.snippet_radius) {
                    hits.push(AttachmentHit {
                        message_id: summary.id,
                        subject: summary.subject.clone(),
                        filename: attachment.filename.clone(),
                        snippet,
                    });
                    if hits.len() >= limit {
                        if let Some(report) = progress {
                            report(total, total);
                        }
                        return Ok(hits);
                    }
                }
            }
        }
        if let Some(report) = progress {
            report(total, total);
        }
        Ok(hits)
    }

    /// Files the external content index says match, if it can answer.
    fn narrow_candidates(&self, query: &str) -> Option<HashSet<PathBuf>> {
        let provider = self.content_index.as_ref()?;
        let root = self.index.locator().data_root()?;
        provider
            .matching_files(query, root)
            .map(|files| files.into_iter().collect())
    }

    /// Text of one attachment: from its file when it has one, else from the
    /// bytes inlined in the container. `Ok(None)` if neither exists.
    fn attachment_text(&self, message_id: i64, attachment: &Attachment) -> Result<Option<String>> {
        if let Some(path) = attachment.path.as_deref().filter(|p| p.exists()) {
            return extract_text(path, Some(attachment.mime_type.as_str())).map(Some);
        }

        let Some(part_id) = attachment.attachment_id.as_deref() else {
            return Ok(None);
        };
        let Some(container) = self.index.container_path(message_id)? else {
            return Ok(None);
        };
        let bytes = match read_container_part(&container, part_id) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(message_id, path = %container.display(), error = %e, "Could not read inline attachment");
                return Ok(None);
            }
        };
        extract_inline(&attachment.filename, &attachment.mime_type, &bytes).map(Some)
    }
}

impl std::fmt::Debug for MailEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailEngine")
            .field("index", &self.index)
            .field("search", &self.search)
            .field("content_index", &self.content_index.is_some())
            .finish()
    }
}

/// Write inline attachment bytes to a scratch directory and extract them.
/// The directory is removed when this returns, on success or failure.
fn extract_inline(filename: &str, mime_type: &str, bytes: &[u8]) -> Result<String> {
    let scratch = tempfile::TempDir::new().map_err(|e| MailError::io(std::env::temp_dir(), e))?;
    let path = scratch.path().join(temp_file_name(filename));
    std::fs::write(&path, bytes).map_err(|e| MailError::io(&path, e))?;
    extract_text(&path, Some(mime_type))
}

/// Filename safe to create inside a scratch directory.
fn temp_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TEMP_NAME_LEN)
        .collect();
    let trimmed = sanitized.trim_start_matches('.').trim();
    if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_temp_file_name() {
        assert_eq!(temp_file_name("report.pdf"), "report.pdf");
        assert_eq!(temp_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(temp_file_name("..."), "attachment");
        assert_eq!(temp_file_name("a/b\\c.txt"), "a_b_c.txt");
    }

    #[test]
    fn test_extract_inline_cleans_up() {
        let text = extract_inline("notes.txt", "text/plain", b"inline words").unwrap();
        assert_eq!(text, "inline words");
    }

    #[test]
    fn test_index_path_is_relative_to_version_root() {
        let path = INDEX_RELATIVE_PATH
            .iter()
            .fold(Path::new("/m/V10").to_path_buf(), |p, part| p.join(part));
        assert_eq!(path, Path::new("/m/V10/MailData/Envelope Index"));
    }
}
