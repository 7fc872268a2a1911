//! Message records and decoded container content.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::Attachment;

/// A message as reported by the index, optionally enriched with the
/// content of its on-disk container.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Index row identifier; also the container's filename stem.
    pub id: i64,

    pub subject: String,

    pub sender: EmailAddress,

    /// Empty unless explicitly loaded (see `MailIndex::get_message`).
    pub recipients: Vec<Recipient>,

    pub date_sent: Option<DateTime<Utc>>,
    pub date_received: Option<DateTime<Utc>>,

    pub mailbox_id: i64,
    pub mailbox_name: String,

    /// Raw reference of the owning mailbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox_url: Option<String>,

    /// The `Message-ID` header value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Plain-text body (HTML converted when that is all there is).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Raw HTML body, if the message had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

/// Role of a recipient on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
    Other(i64),
}

impl RecipientKind {
    /// Decode the index's numeric type discriminant.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::To,
            1 => Self::Cc,
            2 => Self::Bcc,
            n => Self::Other(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Recipient {
    pub kind: RecipientKind,
    #[serde(flatten)]
    pub address: EmailAddress,
}

/// Everything recovered from one message container.
///
/// Built by [`crate::parser::container::parse_container`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContent {
    /// Final body: HTML converted to text when an HTML part exists,
    /// otherwise the plain-text part.
    pub body: Option<String>,

    /// First `text/plain` part, as decoded.
    pub plain_text: Option<String>,

    /// First `text/html` part, raw.
    pub html: Option<String>,

    /// Attachment descriptors in part order. Paths are unresolved.
    pub attachments: Vec<Attachment>,

    /// Top-level `Message-ID`.
    pub message_id: Option<String>,

    /// Top-level `Subject`, encoded words decoded.
    pub subject: Option<String>,

    /// Top-level `From`.
    pub from: Option<EmailAddress>,

    /// Top-level `Date`, when it parses.
    pub date: Option<DateTime<Utc>>,
}
