//! Rich text (RTF) and RTFD bundle conversion to plain text.
//!
//! RTF is a stream of groups (`{...}`), control words (`\par`, `\b0`),
//! control symbols (`\'e9`, `\{`) and literal text. Destinations such as
//! the font table or embedded pictures are skipped wholesale.

use std::path::Path;

use crate::error::{MailError, Result};

/// Main text file inside an RTFD bundle directory.
pub const RTFD_TEXT_FILE: &str = "TXT.rtf";

/// Destinations whose content is never text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "footer",
    "footerl",
    "footerr",
    "footnote",
    "themedata",
    "colorschememapping",
    "datastore",
    "latentstyles",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "mmathPr",
    "filetbl",
    "expandedcolortbl",
    "NeXTGraphic",
];

/// Convert an RTF file. If the file is not RTF (or is a bundle directory)
/// the RTFD layout is tried instead.
pub fn extract_rtf(path: &Path) -> Result<String> {
    if path.is_file() {
        let data = std::fs::read(path).map_err(|e| MailError::io(path, e))?;
        if is_rtf(&data) {
            return Ok(rtf_to_text(&data));
        }
    }
    extract_rtfd(path)
}

/// Convert an RTFD bundle (a directory holding `TXT.rtf` and resources).
/// A flattened bundle, as written out from a container, is read as RTF.
pub fn extract_rtfd(path: &Path) -> Result<String> {
    let text_file = if path.is_dir() {
        path.join(RTFD_TEXT_FILE)
    } else {
        path.to_path_buf()
    };
    if !text_file.is_file() {
        return Err(MailError::InvalidFormat(format!(
            "{} is neither RTF nor an RTFD bundle",
            path.display()
        )));
    }
    let data = std::fs::read(&text_file).map_err(|e| MailError::io(&text_file, e))?;
    if !is_rtf(&data) {
        return Err(MailError::InvalidFormat(format!(
            "{} does not start with an RTF header",
            text_file.display()
        )));
    }
    Ok(rtf_to_text(&data))
}

fn is_rtf(data: &[u8]) -> bool {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    data[start..].starts_with(b"{\\rtf")
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    skip: bool,
    /// Fallback characters following each `\u` escape.
    uc: usize,
}

/// Strip RTF markup, keeping paragraph structure.
pub fn rtf_to_text(data: &[u8]) -> String {
    let mut out = String::new();
    let mut stack: Vec<GroupState> = Vec::new();
    let mut state = GroupState { skip: false, uc: 1 };
    let mut fallback = 0usize;
    let mut i = 0;

    let emit = |out: &mut String, fallback: &mut usize, skip: bool, ch: char| {
        if *fallback > 0 {
            *fallback -= 1;
        } else if !skip {
            out.push(ch);
        }
    };

    while i < data.len() {
        let b = data[i];
        match b {
            b'{' => {
                stack.push(state);
                fallback = 0;
                i += 1;
            }
            b'}' => {
                state = stack.pop().unwrap_or(state);
                fallback = 0;
                i += 1;
            }
            b'\r' | b'\n' => i += 1,
            b'\\' => {
                let Some(&next) = data.get(i + 1) else {
                    break;
                };
                match next {
                    b'\\' | b'{' | b'}' => {
                        emit(&mut out, &mut fallback, state.skip, next as char);
                        i += 2;
                    }
                    b'\'' => {
                        let byte = data
                            .get(i + 2..i + 4)
                            .and_then(|hex| std::str::from_utf8(hex).ok())
                            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                        if let Some(byte) = byte {
                            emit(&mut out, &mut fallback, state.skip, cp1252_char(byte));
                        }
                        i += 4;
                    }
                    b'*' => {
                        state.skip = true;
                        i += 2;
                    }
                    b'~' => {
                        emit(&mut out, &mut fallback, state.skip, '\u{a0}');
                        i += 2;
                    }
                    b'_' => {
                        emit(&mut out, &mut fallback, state.skip, '-');
                        i += 2;
                    }
                    b'\n' | b'\r' => {
                        emit(&mut out, &mut fallback, state.skip, '\n');
                        i += 2;
                    }
                    c if c.is_ascii_alphabetic() => {
                        let (word, param, used) = control_word(&data[i + 1..]);
                        i += 1 + used;
                        if SKIPPED_DESTINATIONS.contains(&word) {
                            state.skip = true;
                            continue;
                        }
                        match word {
                            "par" | "line" | "sect" | "page" | "row" => {
                                emit(&mut out, &mut fallback, state.skip, '\n')
                            }
                            "tab" | "cell" => emit(&mut out, &mut fallback, state.skip, '\t'),
                            "emdash" => emit(&mut out, &mut fallback, state.skip, '\u{2014}'),
                            "endash" => emit(&mut out, &mut fallback, state.skip, '\u{2013}'),
                            "bullet" => emit(&mut out, &mut fallback, state.skip, '\u{2022}'),
                            "lquote" | "rquote" => emit(&mut out, &mut fallback, state.skip, '\''),
                            "ldblquote" | "rdblquote" => {
                                emit(&mut out, &mut fallback, state.skip, '"')
                            }
                            "uc" => state.uc = param.and_then(|p| usize::try_from(p).ok()).unwrap_or(1),
                            "u" => {
                                if let Some(code) = param {
                                    let code = if code < 0 { code + 65_536 } else { code };
                                    let ch = u32::try_from(code)
                                        .ok()
                                        .and_then(char::from_u32)
                                        .unwrap_or('\u{fffd}');
                                    emit(&mut out, &mut fallback, state.skip, ch);
                                    fallback = state.uc;
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => i += 2,
                }
            }
            _ => {
                emit(&mut out, &mut fallback, state.skip, cp1252_char(b));
                i += 1;
            }
        }
    }

    tidy(&out)
}

/// Parse a control word starting at `data[0]` (just after the backslash).
/// Returns the word, its numeric parameter and the bytes consumed, including
/// one delimiting space.
fn control_word(data: &[u8]) -> (&str, Option<i64>, usize) {
    let word_len = data
        .iter()
        .position(|b| !b.is_ascii_alphabetic())
        .unwrap_or(data.len());
    let word = std::str::from_utf8(&data[..word_len]).unwrap_or_default();
    let mut used = word_len;

    let negative = data.get(used) == Some(&b'-');
    let digits_start = if negative { used + 1 } else { used };
    let digits_len = data[digits_start.min(data.len())..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(data.len().saturating_sub(digits_start));
    let param = if digits_len > 0 {
        used = digits_start + digits_len;
        std::str::from_utf8(&data[digits_start..used])
            .ok()
            .and_then(|d| d.parse::<i64>().ok())
            .map(|n| if negative { -n } else { n })
    } else {
        None
    };

    if data.get(used) == Some(&b' ') {
        used += 1;
    }
    (word, param, used)
}

fn cp1252_char(byte: u8) -> char {
    if byte.is_ascii() {
        byte as char
    } else {
        encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(&[byte])
            .0
            .chars()
            .next()
            .unwrap_or('\u{fffd}')
    }
}

fn tidy(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    lines.dedup_by(|a, b| a.is_empty() && b.is_empty());
    lines.join("\n").trim().to_string()
}
