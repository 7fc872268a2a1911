//! Charset decoding of body and attachment bytes.

/// Turn decoded bytes into text.
///
/// A known `charset` is honoured; otherwise the bytes are read as UTF-8,
/// falling back to Windows-1252 (a superset of Latin-1 that accepts every
/// byte) when they are not valid UTF-8.
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> String {
    if let Some(encoding) = charset
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .and_then(|c| encoding_rs::Encoding::for_label(c.as_bytes()))
    {
        if encoding != encoding_rs::UTF_8 {
            return encoding.decode(bytes).0.into_owned();
        }
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
    }
}
