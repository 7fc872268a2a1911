//! Message parsing: container framing, the MIME part tree (built with
//! `mail-parser`), charset fallback and HTML-to-text conversion.

pub mod container;
pub mod encoding;
pub mod header;
pub mod html;
pub mod mime;
