//! Account identity records.

/// What the account store knows about one account.
///
/// Remote accounts often have a child record (the mail-specific one) with
/// no description or username of its own; those are copied from the parent
/// during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccountInfo {
    /// User-facing account description, e.g. `"Work"`.
    pub description: Option<String>,
    /// Login name, usually the email address.
    pub username: Option<String>,
    /// Identifier of the parent account, if any.
    pub parent_id: Option<String>,
}

impl AccountInfo {
    /// `true` if neither a username nor a description is present.
    pub fn is_anonymous(&self) -> bool {
        is_blank(&self.username) && is_blank(&self.description)
    }

    /// Best human-readable name: username first, then description.
    pub fn display_name(&self) -> Option<&str> {
        [&self.username, &self.description]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
