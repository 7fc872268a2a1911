//! MIME part tree: bodies and attachment descriptors from a message parsed
//! by `mail-parser`.

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::model::attachment::Attachment;

use super::encoding::decode_text;

/// Maximum multipart nesting depth (protects against adversarial input).
pub const MAX_DEPTH: usize = 10;

/// Content collected from one MIME entity and everything below it.
///
/// Results of sibling parts are combined with [`PartContent::merge`]:
/// the first body of each kind wins, attachments concatenate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartContent {
    pub plain: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl PartContent {
    pub fn merge(mut self, later: PartContent) -> Self {
        self.plain = self.plain.or(later.plain);
        self.html = self.html.or(later.html);
        self.attachments.extend(later.attachments);
        self
    }
}

/// Parse a bare RFC 822 message.
pub fn parse_entity(message: &[u8]) -> Option<Message<'_>> {
    MessageParser::default().parse(message)
}

/// Collect bodies and attachment descriptors from a parsed message.
///
/// A leaf is an attachment when its `Content-Disposition` is `attachment`
/// or when a `filename`/`name` parameter is present. Otherwise the first
/// `text/plain` leaf becomes the plain body and the first `text/html` leaf
/// the HTML body. Attachment paths are left unresolved.
pub fn collect_content(msg: &Message<'_>) -> PartContent {
    leaves(msg)
        .into_iter()
        .fold(PartContent::default(), |content, (id, part)| {
            content.merge(leaf_content(msg, part, &id))
        })
}

/// Decoded bytes of the leaf with the given part id, if any.
pub fn part_bytes(msg: &Message<'_>, wanted: &str) -> Option<Vec<u8>> {
    leaves(msg)
        .into_iter()
        .find(|(id, _)| id == wanted)
        .map(|(_, part)| leaf_bytes(msg, part).to_vec())
}

/// Leaf parts in document order with their dotted part ids (`"1"`, `"2"`,
/// `"1.3"`). A message that is not multipart is the single leaf `"1"`.
fn leaves<'a, 'x>(msg: &'a Message<'x>) -> Vec<(String, &'a MessagePart<'x>)> {
    let mut out = Vec::new();
    visit(msg, 0, &mut Vec::new(), 0, &mut out);
    out
}

fn visit<'a, 'x>(
    msg: &'a Message<'x>,
    index: usize,
    path: &mut Vec<usize>,
    depth: usize,
    out: &mut Vec<(String, &'a MessagePart<'x>)>,
) {
    let Some(part) = msg.parts.get(index) else {
        return;
    };
    match &part.body {
        PartType::Multipart(children) => {
            if depth >= MAX_DEPTH {
                debug!(depth, "Multipart nesting too deep, skipping");
                return;
            }
            for (n, &child) in children.iter().enumerate() {
                path.push(n + 1);
                visit(msg, child, path, depth + 1, out);
                path.pop();
            }
        }
        _ => out.push((part_id(path), part)),
    }
}

fn part_id(path: &[usize]) -> String {
    if path.is_empty() {
        return "1".to_string();
    }
    path.iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn leaf_content(msg: &Message<'_>, part: &MessagePart<'_>, id: &str) -> PartContent {
    let mime_type = mime_type(part);

    if is_attachment(part) {
        let filename = part
            .attachment_name()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map_or_else(|| format!("attachment_{id}"), str::to_string);
        return PartContent {
            attachments: vec![Attachment {
                filename,
                mime_type,
                size: leaf_bytes(msg, part).len() as u64,
                attachment_id: Some(id.to_string()),
                path: None,
            }],
            ..PartContent::default()
        };
    }

    match mime_type.as_str() {
        "text/plain" => PartContent {
            plain: Some(leaf_text(msg, part)),
            ..PartContent::default()
        },
        "text/html" => PartContent {
            html: Some(leaf_text(msg, part)),
            ..PartContent::default()
        },
        _ => PartContent::default(),
    }
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|d| d.is_attachment())
        || part.attachment_name().is_some()
}

/// Lowercased `type/subtype`; `text/plain` when the header is missing.
fn mime_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{sub}", ct.ctype()),
            None => ct.ctype().to_string(),
        })
        .filter(|ct| !ct.is_empty())
        .map_or_else(|| "text/plain".to_string(), |ct| ct.to_ascii_lowercase())
}

/// Bytes of a leaf. A payload `mail-parser` could not decode (corrupt
/// base64, stray `=` in quoted-printable) is returned as it appears in the
/// message.
fn leaf_bytes<'a>(msg: &'a Message<'_>, part: &'a MessagePart<'_>) -> &'a [u8] {
    if part.is_encoding_problem {
        return raw_body(msg, part);
    }
    part.contents()
}

fn raw_body<'a>(msg: &'a Message<'_>, part: &MessagePart<'_>) -> &'a [u8] {
    msg.raw_message()
        .get(part.offset_body..part.offset_end)
        .unwrap_or_default()
}

/// Text of a body leaf.
///
/// `mail-parser` replaces invalid UTF-8 when no charset is declared; in
/// that case the body is decoded again from the raw bytes so Latin-1 mail
/// keeps its accents.
fn leaf_text(msg: &Message<'_>, part: &MessagePart<'_>) -> String {
    match part.text_contents() {
        Some(text) if !text.contains(char::REPLACEMENT_CHARACTER) => text.to_string(),
        _ => {
            let charset = part.content_type().and_then(|ct| ct.attribute("charset"));
            decode_text(&transfer_decoded(msg, part), charset)
        }
    }
}

fn transfer_decoded(msg: &Message<'_>, part: &MessagePart<'_>) -> Vec<u8> {
    let raw = raw_body(msg, part);
    if part.is_encoding_problem {
        return raw.to_vec();
    }
    let decoded = match part.encoding {
        Encoding::Base64 => base64_decode(raw),
        Encoding::QuotedPrintable => quoted_printable_decode(raw),
        Encoding::None => None,
    };
    decoded.unwrap_or_else(|| raw.to_vec())
}
