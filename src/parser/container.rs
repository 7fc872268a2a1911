//! Message container files (`.emlx` / `.partial.emlx`).
//!
//! A container is a decimal byte count on the first line, followed by
//! exactly that many bytes of RFC 822 message, followed by trailing
//! metadata (an XML property list) that is ignored here.

use std::path::Path;

use chrono::{DateTime, Utc};
use mail_parser::Message;
use tracing::debug;

use crate::error::{MailError, Result};
use crate::model::address::EmailAddress;
use crate::model::message::MessageContent;

use super::header::parse_date;
use super::html::html_to_text;
use super::mime::{collect_content, parse_entity, part_bytes};

/// Return the embedded message bytes of a container.
///
/// A count larger than the available data is tolerated: everything after
/// the count line is used.
pub fn embedded_message(data: &[u8]) -> Result<&[u8]> {
    let newline = data
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| MailError::InvalidFormat("missing byte-count line".into()))?;
    let count_line = std::str::from_utf8(&data[..newline])
        .map_err(|_| MailError::InvalidFormat("byte-count line is not text".into()))?
        .trim();
    let count: usize = count_line.parse().map_err(|_| {
        MailError::InvalidFormat(format!("byte count {count_line:?} is not a decimal number"))
    })?;

    let message = &data[newline + 1..];
    if count > message.len() {
        debug!(
            declared = count,
            available = message.len(),
            "Container shorter than its byte count"
        );
        return Ok(message);
    }
    Ok(&message[..count])
}

/// Parse container bytes into bodies, attachment descriptors and a few
/// top-level headers.
pub fn parse_container(data: &[u8]) -> Result<MessageContent> {
    let message = embedded_message(data)?;
    parse_message(message)
}

/// Parse a bare RFC 822 message (no byte-count line).
pub fn parse_message(message: &[u8]) -> Result<MessageContent> {
    let msg = parse_headed(message)?;
    let parts = collect_content(&msg);

    let body_text = match &parts.html {
        Some(html) => {
            let text = html_to_text(html);
            if text.is_empty() {
                parts.plain.clone()
            } else {
                Some(text)
            }
        }
        None => parts.plain.clone(),
    };

    Ok(MessageContent {
        body: body_text,
        plain_text: parts.plain,
        html: parts.html,
        attachments: parts.attachments,
        message_id: msg
            .message_id()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| format!("<{id}>")),
        subject: msg.subject().map(str::to_string),
        from: msg.from().and_then(|f| f.first()).map(|addr| {
            EmailAddress::from_parts(
                addr.address().unwrap_or_default(),
                addr.name().map(str::to_string),
            )
        }),
        date: message_date(&msg),
    })
}

/// Header block terminated by a blank line, then handed to `mail-parser`.
fn parse_headed(message: &[u8]) -> Result<Message<'_>> {
    if !has_header_terminator(message) {
        return Err(MailError::InvalidFormat("no blank line after headers".into()));
    }
    parse_entity(message)
        .ok_or_else(|| MailError::InvalidFormat("message could not be parsed".into()))
}

/// Both `\r\n\r\n` and bare `\n\n` end a header block.
fn has_header_terminator(message: &[u8]) -> bool {
    message.starts_with(b"\n")
        || message.starts_with(b"\r\n")
        || message.windows(2).any(|w| w == b"\n\n")
        || message.windows(3).any(|w| w == b"\n\r\n")
}

fn message_date(msg: &Message<'_>) -> Option<DateTime<Utc>> {
    msg.date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .or_else(|| msg.header_raw("Date").and_then(parse_date))
}

/// Read and parse a container file.
pub fn read_container(path: &Path) -> Result<MessageContent> {
    let data = std::fs::read(path).map_err(|e| MailError::io(path, e))?;
    parse_container(&data)
}

/// Decoded bytes of one part (by part id, e.g. `"2"` or `"1.3"`) of a
/// container file. `Ok(None)` if there is no such leaf.
pub fn read_container_part(path: &Path, part_id: &str) -> Result<Option<Vec<u8>>> {
    let data = std::fs::read(path).map_err(|e| MailError::io(path, e))?;
    let msg = parse_headed(embedded_message(&data)?)?;
    Ok(part_bytes(&msg, part_id))
}
