//! Centralized error types for maildig.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the maildig library.
#[derive(Error, Debug)]
pub enum MailError {
    /// The mail index database does not exist.
    #[error("Mail index not found: {0}")]
    IndexNotFound(PathBuf),

    /// The mail data root (or its versioned subdirectory) does not exist.
    #[error("Mail data directory not found: {0}")]
    MailRootNotFound(PathBuf),

    /// A file the operation needs does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The file exists but the process may not read it.
    #[error("Access denied reading '{0}'")]
    AccessDenied(PathBuf),

    /// The index rejected or failed a query.
    #[error("Index query failed ({context}): {source}")]
    QueryFailed {
        context: String,
        source: rusqlite::Error,
    },

    /// No message row has this identifier.
    #[error("Message {0} not found")]
    MessageNotFound(i64),

    /// The message exists but has no attachment with this filename.
    #[error("Attachment '{filename}' not found in message {message_id}")]
    AttachmentNotFound { message_id: i64, filename: String },

    /// The attachment is listed, but neither a file on disk nor inline
    /// content could be found for it.
    #[error("Attachment '{filename}' of message {message_id} has no file on disk")]
    AttachmentFileMissing { message_id: i64, filename: String },

    /// The bytes do not have the expected container/message shape.
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Coarse classification of a [`MailError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    QueryFailed,
    EntityNotFound,
    FileMissing,
    InvalidFormat,
    Io,
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an error from a path and an `io::Error`.
    ///
    /// `NotFound` and `PermissionDenied` are mapped to their dedicated
    /// variants; everything else becomes `Io`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied(path),
            _ => Self::Io { path, source },
        }
    }

    /// Wrap a `rusqlite` error with a short description of what was running.
    pub fn query(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::QueryFailed {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IndexNotFound(_) | Self::MailRootNotFound(_) | Self::FileNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::QueryFailed { .. } => ErrorKind::QueryFailed,
            Self::MessageNotFound(_) | Self::AttachmentNotFound { .. } => {
                ErrorKind::EntityNotFound
            }
            Self::AttachmentFileMissing { .. } => ErrorKind::FileMissing,
            Self::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// A human-readable hint on how to fix the problem, if there is one.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::AccessDenied(_) => Some(
                "Grant this program Full Disk Access (System Settings > Privacy & Security) \
                 and try again",
            ),
            Self::IndexNotFound(_) | Self::MailRootNotFound(_) => Some(
                "Open the Mail app at least once, or set `store.mail_root` / `store.index_path` \
                 in the configuration file",
            ),
            Self::QueryFailed { .. } => {
                Some("The mail index may be from an unsupported Mail version or locked; retry later")
            }
            _ => None,
        }
    }
}
