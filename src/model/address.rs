//! Email addresses as stored in the index or found in container headers.

/// A single email address with an optional human-readable name.
///
/// The index keeps the bare address and the display name ("comment")
/// in separate columns; container headers carry both in one string,
/// e.g. `"Ana Gómez <ana@example.com>"`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// The bare email address (`user@domain`).
    pub address: String,
    /// Human-readable display name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl EmailAddress {
    /// Build an address from the index's `address` and `comment` columns.
    ///
    /// Blank comments are treated as absent.
    pub fn from_parts(address: impl Into<String>, comment: Option<String>) -> Self {
        let display_name = comment
            .map(|c| strip_quotes(&c))
            .filter(|c| !c.is_empty());
        Self {
            address: address.into().trim().to_string(),
            display_name,
        }
    }

    /// Parse a header value such as `Name <a@b.com>`, `<a@b.com>` or `a@b.com`.
    ///
    /// Anything that does not look like an address is kept verbatim in
    /// `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                let name = strip_quotes(&trimmed[..open]);
                return Self {
                    address: trimmed[open + 1..close].trim().to_string(),
                    display_name: (!name.is_empty()).then_some(name),
                };
            }
        }
        Self {
            address: trimmed.to_string(),
            display_name: None,
        }
    }

    /// Format for display: `"Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{name} <{}>", self.address),
            None => self.address.clone(),
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}
