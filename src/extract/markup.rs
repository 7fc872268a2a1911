//! Tag stripping for XML and the text runs of word-processing documents.

use crate::parser::html::decode_entity;

/// Replace character and entity references.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let (decoded, used) = decode_entity(&rest[amp..]);
        out.push_str(&decoded);
        rest = &rest[amp + used..];
    }
    out.push_str(rest);
    out
}

/// Text content of an XML document with all whitespace runs collapsed to a
/// single space. Comments, processing instructions and declarations are
/// dropped; CDATA content is kept.
pub fn xml_to_text(xml: &str) -> String {
    let mut raw = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(lt) = rest.find('<') {
        raw.push_str(&decode_entities(&rest[..lt]));
        raw.push(' ');
        let tail = &rest[lt..];
        if let Some(cdata) = tail.strip_prefix("<![CDATA[") {
            let end = cdata.find("]]>").unwrap_or(cdata.len());
            raw.push_str(&cdata[..end]);
            rest = cdata.get(end + 3..).unwrap_or("");
        } else if let Some(comment) = tail.strip_prefix("<!--") {
            rest = comment
                .find("-->")
                .map_or("", |end| &comment[end + 3..]);
        } else {
            rest = tail.find('>').map_or("", |gt| &tail[gt + 1..]);
        }
    }
    raw.push_str(&decode_entities(rest));
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of a WordprocessingML main document part.
///
/// Only `<w:t>` runs carry text; paragraph ends and `<w:br/>`/`<w:cr/>`
/// become newlines and `<w:tab/>` a tab.
pub fn word_document_text(xml: &str) -> String {
    let mut out = String::new();
    let mut in_run = false;
    let mut rest = xml;
    while let Some(lt) = rest.find('<') {
        if in_run {
            out.push_str(&decode_entities(&rest[..lt]));
        }
        let tail = &rest[lt + 1..];
        let Some(gt) = tail.find('>') else {
            break;
        };
        let tag = &tail[..gt];
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();
        match name {
            "w:t" => in_run = !self_closing,
            "/w:t" => in_run = false,
            "w:tab" => out.push('\t'),
            "w:br" | "w:cr" => out.push('\n'),
            "/w:p" => out.push('\n'),
            _ => {}
        }
        rest = &tail[gt + 1..];
    }
    out.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
