//! Account identity resolution from the system account store.
//!
//! The store is a Core Data SQLite file with one `ZACCOUNT` row per
//! account. The mapping is loaded once when the engine starts and never
//! refreshed; accounts only change through out-of-band user action.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::error::{MailError, Result};
use crate::model::account::AccountInfo;

use super::schema::{value_as_i64, value_as_text, TableColumns};

/// Characters of the identifier shown when an account cannot be resolved.
pub const SHORT_ID_LEN: usize = 8;

/// One raw row of the account store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRow {
    pub pk: i64,
    pub identifier: String,
    pub description: Option<String>,
    pub username: Option<String>,
    pub parent_pk: Option<i64>,
}

/// Read-only snapshot of account identities keyed by account identifier.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: HashMap<String, AccountInfo>,
}

impl AccountDirectory {
    /// Load the account store at `path`.
    ///
    /// Any failure (missing file, permissions, unexpected schema) is logged
    /// and yields an empty directory: account names then fall back to
    /// shortened identifiers.
    pub fn load(path: &Path) -> Self {
        match read_rows(path) {
            Ok(rows) => {
                let dir = Self::from_rows(rows);
                debug!(path = %path.display(), accounts = dir.len(), "Loaded account store");
                dir
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Account store unavailable, using identifier fallback");
                Self::default()
            }
        }
    }

    /// Build the directory from raw rows.
    ///
    /// Accounts without a username and description inherit both from their
    /// parent, one level deep. A parent that is itself anonymous leaves the
    /// child anonymous; parent links are never followed further, so cycles
    /// cannot loop.
    pub fn from_rows(rows: Vec<AccountRow>) -> Self {
        let id_by_pk: HashMap<i64, String> = rows
            .iter()
            .map(|r| (r.pk, r.identifier.clone()))
            .collect();

        let snapshot: HashMap<String, AccountInfo> = rows
            .into_iter()
            .map(|r| {
                let info = AccountInfo {
                    description: r.description,
                    username: r.username,
                    parent_id: r.parent_pk.and_then(|pk| id_by_pk.get(&pk).cloned()),
                };
                (r.identifier, info)
            })
            .collect();

        let accounts = snapshot
            .iter()
            .map(|(id, info)| {
                let mut resolved = info.clone();
                if info.is_anonymous() {
                    if let Some(parent) = info.parent_id.as_ref().and_then(|p| snapshot.get(p)) {
                        if !parent.is_anonymous() {
                            resolved.username = parent.username.clone();
                            resolved.description = parent.description.clone();
                        }
                    }
                }
                (id.clone(), resolved)
            })
            .collect();

        Self { accounts }
    }

    pub fn get(&self, identifier: &str) -> Option<&AccountInfo> {
        self.accounts.get(identifier)
    }

    /// Resolved human-readable name, if the account is known and named.
    pub fn display_name(&self, identifier: &str) -> Option<&str> {
        self.get(identifier).and_then(AccountInfo::display_name)
    }

    /// Human-readable name, falling back to the first characters of the
    /// identifier.
    pub fn name_for(&self, identifier: &str) -> String {
        match self.display_name(identifier) {
            Some(name) => name.to_string(),
            None => identifier.chars().take(SHORT_ID_LEN).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

fn read_rows(path: &Path) -> Result<Vec<AccountRow>> {
    std::fs::metadata(path).map_err(|e| MailError::io(path, e))?;
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| MailError::query("open account store", e))?;

    let cols = TableColumns::load(&conn, "ZACCOUNT")?;
    if !cols.has("ZIDENTIFIER") {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {}, ZIDENTIFIER, {}, {}, {} FROM ZACCOUNT",
        cols.select("ZACCOUNT", "Z_PK"),
        cols.select("ZACCOUNT", "ZACCOUNTDESCRIPTION"),
        cols.select("ZACCOUNT", "ZUSERNAME"),
        cols.select("ZACCOUNT", "ZPARENTACCOUNT"),
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| MailError::query("read accounts", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AccountRow {
                pk: value_as_i64(row.get_ref(0)?).unwrap_or(-1),
                identifier: value_as_text(row.get_ref(1)?).unwrap_or_default(),
                description: value_as_text(row.get_ref(2)?),
                username: value_as_text(row.get_ref(3)?),
                parent_pk: value_as_i64(row.get_ref(4)?),
            })
        })
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| MailError::query("read accounts", e))?;

    Ok(rows.into_iter().filter(|r| !r.identifier.is_empty()).collect())
}
