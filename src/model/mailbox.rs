//! Mailboxes and their URL-like location references.
//!
//! The index stores each mailbox as a single URL string such as
//! `imap://6A1F.../INBOX`, `local://6A1F.../Archive` or
//! `file:///Users/me/Library/Mail/V10/6A1F.../Work.mbox`. Name and owning
//! account are never stored; they are derived from that string every time.

use std::path::PathBuf;

use crate::store::accounts::AccountDirectory;

/// Name used when an IMAP/local reference has no path segments.
pub const DEFAULT_MAILBOX_NAME: &str = "Inbox";

/// A mailbox row from the index with its derived names.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Mailbox {
    /// Index row identifier.
    pub id: i64,
    /// Derived display name.
    pub name: String,
    /// Raw location reference, as stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Derived owning account name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl Mailbox {
    /// Build a mailbox record, deriving `name` and `account` from `url`.
    pub fn from_row(id: i64, url: Option<String>, accounts: &AccountDirectory) -> Self {
        let (name, account) = match url.as_deref() {
            Some(raw) => {
                let parsed = MailboxUrl::parse(raw);
                (parsed.mailbox_name(), parsed.account_name(accounts))
            }
            None => (format!("Mailbox {id}"), None),
        };
        Self {
            id,
            name,
            url,
            account,
        }
    }
}

/// Storage kind of a mailbox reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
    /// Remote-backed mailbox, account identifier in the host part.
    Imap,
    /// "On My Mac" mailbox, account identifier in the host part.
    Local,
    /// Direct filesystem path to an `.mbox` directory.
    File,
    /// Anything else (Exchange, unknown, or no scheme at all).
    Other(String),
}

/// A parsed mailbox reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxUrl {
    pub scheme: Scheme,
    /// Host part (account identifier for `imap`/`local`), percent-decoded.
    pub host: String,
    /// Non-empty, percent-decoded path segments.
    pub segments: Vec<String>,
}

impl MailboxUrl {
    /// Split a raw reference into scheme, host and path segments.
    ///
    /// Never fails: a string without `://` is treated as a bare path with
    /// an unknown scheme.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (scheme, rest) = match raw.split_once("://") {
            Some((s, rest)) => (s.to_ascii_lowercase(), rest),
            None => (String::new(), raw),
        };
        let scheme = match scheme.as_str() {
            "imap" => Scheme::Imap,
            "local" => Scheme::Local,
            "file" => Scheme::File,
            _ => Scheme::Other(scheme),
        };

        let (host, path) = if matches!(scheme, Scheme::Other(ref s) if s.is_empty()) {
            ("", rest)
        } else {
            rest.split_once('/').unwrap_or((rest, ""))
        };

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(percent_decode)
            .collect();

        Self {
            scheme,
            host: percent_decode(host),
            segments,
        }
    }

    /// Derived mailbox display name.
    pub fn mailbox_name(&self) -> String {
        match self.scheme {
            Scheme::Imap | Scheme::Local => self
                .segments
                .last()
                .cloned()
                .unwrap_or_else(|| DEFAULT_MAILBOX_NAME.to_string()),
            Scheme::File | Scheme::Other(_) => self
                .segments
                .last()
                .map(|s| strip_mbox_suffix(s).to_string())
                .unwrap_or_else(|| DEFAULT_MAILBOX_NAME.to_string()),
        }
    }

    /// Derived owning account name.
    ///
    /// For `imap`/`local` the host is an account identifier, resolved through
    /// `accounts` with a short-identifier fallback. For `file` the segment
    /// after the `V<digits>` directory names the account.
    pub fn account_name(&self, accounts: &AccountDirectory) -> Option<String> {
        match self.scheme {
            Scheme::Imap | Scheme::Local => {
                if self.host.is_empty() {
                    None
                } else {
                    Some(accounts.name_for(&self.host))
                }
            }
            Scheme::File => {
                let version = self.segments.iter().position(|s| is_version_dir(s))?;
                let account = self.segments.get(version + 1)?;
                Some(
                    accounts
                        .display_name(account)
                        .map(str::to_string)
                        .unwrap_or_else(|| account.clone()),
                )
            }
            Scheme::Other(_) => None,
        }
    }

    /// Filesystem path for a `file` reference (`None` for other schemes).
    pub fn file_path(&self) -> Option<PathBuf> {
        if self.scheme != Scheme::File {
            return None;
        }
        let mut path = PathBuf::from("/");
        if !self.host.is_empty() && self.host != "localhost" {
            path.push(&self.host);
        }
        path.extend(&self.segments);
        Some(path)
    }
}

/// `true` for directory names of the form `V` followed by digits.
pub fn is_version_dir(name: &str) -> bool {
    name.strip_prefix('V')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn strip_mbox_suffix(name: &str) -> &str {
    name.strip_suffix(".mbox").unwrap_or(name)
}

fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
