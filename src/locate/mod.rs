//! Mapping mailbox references to files on disk.
//!
//! Three layouts coexist under the version root (`~/Library/Mail/V<N>`):
//!
//! - `file://` references point straight at an `.mbox` directory whose
//!   `Messages/` holds the containers.
//! - `imap://<account>/<a>/<b>` lives under `<root>/<account>/a.mbox/b.mbox/`,
//!   with an unpredictable subtree (`<uuid>/Data/<n>/Messages/`) beneath.
//! - `local://` ("On My Mac") mailboxes live under `<root>/Mailboxes/`.
//!
//! Every lookup is best-effort and answers `None` when nothing matches.

pub mod search;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MailError, Result};
use crate::model::mailbox::{is_version_dir, MailboxUrl, Scheme};

pub use search::{is_bundle, FileSearch, WalkDirSearch};

/// Extension of message container files.
pub const CONTAINER_EXT: &str = "emlx";

/// Directory under the version root holding "On My Mac" mailboxes.
pub const LOCAL_MAILBOXES_DIR: &str = "Mailboxes";

/// Resolves container and attachment files for messages.
pub struct MailboxLocator {
    data_root: Option<PathBuf>,
    search: Box<dyn FileSearch>,
}

impl MailboxLocator {
    /// `data_root` is the version root; without one only `file://`
    /// references can be resolved.
    pub fn new(data_root: Option<PathBuf>, search: Box<dyn FileSearch>) -> Self {
        Self { data_root, search }
    }

    pub fn data_root(&self) -> Option<&Path> {
        self.data_root.as_deref()
    }

    /// Path of the container file for `message_id` in the mailbox `url`.
    pub fn find_container_path(&self, url: &str, message_id: i64) -> Option<PathBuf> {
        let parsed = MailboxUrl::parse(url);
        let full = format!("{message_id}.{CONTAINER_EXT}");
        let partial = format!("{message_id}.partial.{CONTAINER_EXT}");

        if let Some(mbox) = parsed.file_path() {
            let messages = mbox.join("Messages");
            for name in [&full, &partial] {
                let candidate = messages.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        let accept = |p: &Path| {
            p.file_name()
                .is_some_and(|n| n == OsStr::new(&full) || n == OsStr::new(&partial))
        };
        let found = self
            .mailbox_dirs(&parsed)
            .iter()
            .find_map(|dir| self.search.find(dir, &accept));
        if found.is_none() {
            debug!(url, message_id, "No container file found");
        }
        found
    }

    /// Path of an attachment file stored as
    /// `.../Attachments/<message_id>/<attachment_id>/<filename>`.
    ///
    /// Without an `attachment_id` any part directory is accepted.
    pub fn find_attachment_path(
        &self,
        url: &str,
        message_id: i64,
        attachment_id: Option<&str>,
        filename: &str,
    ) -> Option<PathBuf> {
        let parsed = MailboxUrl::parse(url);

        if let (Some(mbox), Some(aid)) = (parsed.file_path(), attachment_id) {
            let candidate = mbox
                .join("Attachments")
                .join(message_id.to_string())
                .join(aid)
                .join(filename);
            if is_attachment_entry(&candidate) {
                return Some(candidate);
            }
        }

        let message_dir = message_id.to_string();
        let accept = |p: &Path| attachment_suffix_matches(p, &message_dir, attachment_id, filename);
        self.mailbox_dirs(&parsed)
            .iter()
            .find_map(|dir| self.search.find(dir, &accept))
    }

    /// Directories to scan for a mailbox, most specific first.
    fn mailbox_dirs(&self, url: &MailboxUrl) -> Vec<PathBuf> {
        let mbox_path = |base: PathBuf| {
            url.segments
                .iter()
                .fold(base, |dir, seg| dir.join(format!("{seg}.mbox")))
        };
        match (&url.scheme, self.data_root.as_deref()) {
            (Scheme::File, _) => url.file_path().into_iter().collect(),
            (Scheme::Imap, Some(root)) if !url.host.is_empty() => {
                vec![mbox_path(root.join(&url.host))]
            }
            (Scheme::Local, Some(root)) => {
                let mut dirs = vec![mbox_path(root.join(LOCAL_MAILBOXES_DIR))];
                if !url.host.is_empty() {
                    dirs.push(mbox_path(root.join(&url.host)));
                }
                dirs
            }
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for MailboxLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxLocator")
            .field("data_root", &self.data_root)
            .finish_non_exhaustive()
    }
}

/// A regular file, or an RTFD bundle directory.
fn is_attachment_entry(path: &Path) -> bool {
    path.is_file() || (path.is_dir() && is_bundle(path))
}

/// Size of an attachment entry; a bundle counts the files inside it.
pub fn entry_size(path: &Path) -> u64 {
    if !path.is_dir() {
        return std::fs::metadata(path).map_or(0, |m| m.len());
    }
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn attachment_suffix_matches(
    path: &Path,
    message_dir: &str,
    attachment_id: Option<&str>,
    filename: &str,
) -> bool {
    let tail: Vec<&OsStr> = path
        .components()
        .rev()
        .take(4)
        .map(|c| c.as_os_str())
        .collect();
    tail.len() == 4
        && tail[0] == filename
        && attachment_id.map_or(true, |aid| tail[1] == aid)
        && tail[2] == message_dir
        && tail[3] == "Attachments"
}

/// The highest-numbered `V<digits>` directory under `mail_root`.
pub fn find_version_root(mail_root: &Path) -> Result<PathBuf> {
    if !mail_root.is_dir() {
        return Err(MailError::MailRootNotFound(mail_root.to_path_buf()));
    }
    let entries = std::fs::read_dir(mail_root).map_err(|e| MailError::io(mail_root, e))?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if !is_version_dir(&name) {
                return None;
            }
            let n: u64 = name[1..].parse().ok()?;
            Some((n, e.path()))
        })
        .max_by_key(|(n, _)| *n)
        .map(|(_, path)| path)
        .ok_or_else(|| MailError::MailRootNotFound(mail_root.to_path_buf()))
}
