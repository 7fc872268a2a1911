//! HTML-to-text conversion for message bodies and HTML attachments.

/// Tags that start a new line in the text rendering.
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6", "table", "ul", "ol",
    "blockquote", "pre", "hr", "section", "article", "header", "footer",
];

/// Tags whose whole content is dropped.
const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "title"];

/// Convert HTML to readable plain text. Block elements become line breaks.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(pos) = rest.find(|c: char| c == '<' || c == '&') {
        push_text(&mut out, &rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with('&') {
            let (decoded, used) = decode_entity(rest);
            push_text(&mut out, &decoded);
            rest = &rest[used..];
            continue;
        }

        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }

        let Some(end) = rest.find('>') else {
            // Unterminated tag: drop the remainder.
            rest = "";
            break;
        };
        let name = tag_name(&rest[1..end]);
        rest = &rest[end + 1..];

        if SKIPPED_TAGS.contains(&name.as_str()) {
            let close = format!("</{name}");
            rest = match find_ignore_ascii_case(rest, &close) {
                Some(pos) => rest[pos..].find('>').map_or("", |e| &rest[pos + e + 1..]),
                None => "",
            };
        } else if name == "br" || (BLOCK_TAGS.contains(&name.as_str()) && !out.ends_with('\n')) {
            out.push('\n');
        }
    }
    push_text(&mut out, rest);

    tidy_lines(&out)
}

fn push_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() && ch != '\u{a0}' {
            if !out.ends_with(' ') && !out.ends_with('\n') && !out.is_empty() {
                out.push(' ');
            }
        } else if ch == '\u{a0}' {
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
}

/// `/P class="x"` gives `p`.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

/// Decode the entity `s` starts with; returns the text and bytes consumed.
pub(crate) fn decode_entity(s: &str) -> (String, usize) {
    let Some(semi) = s[1..].find(';').filter(|&i| i > 0 && i <= 10) else {
        return ("&".to_string(), 1);
    };
    let name = &s[1..=semi];
    let used = semi + 2;

    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => name.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };

    match decoded {
        Some(ch) => (ch.to_string(), used),
        None => ("&".to_string(), 1),
    }
}

fn tidy_lines(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut prev_blank = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_blank && !cleaned.is_empty() {
                cleaned.push('\n');
            }
            prev_blank = true;
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_blank = false;
        }
    }
    cleaned.trim().to_string()
}
