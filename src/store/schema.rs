//! Schema introspection helpers.
//!
//! The index belongs to another application and changes between versions,
//! so queries are assembled from the columns that actually exist, and raw
//! values are read loosely instead of through strict typed getters.

use std::collections::HashSet;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::{MailError, Result};

/// Column names of one table (lowercased).
#[derive(Debug, Clone, Default)]
pub struct TableColumns {
    table: String,
    names: HashSet<String>,
}

impl TableColumns {
    /// Read the columns of `table`. A missing table yields an empty set.
    pub fn load(conn: &Connection, table: &str) -> Result<Self> {
        let sql = format!("PRAGMA table_info(\"{}\")", table.replace('"', ""));
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| MailError::query(format!("inspect table {table}"), e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .and_then(|rows| rows.collect::<rusqlite::Result<HashSet<String>>>())
            .map_err(|e| MailError::query(format!("inspect table {table}"), e))?
            .into_iter()
            .map(|n| n.to_ascii_lowercase())
            .collect();
        Ok(Self {
            table: table.to_string(),
            names,
        })
    }

    /// `true` if the table exists (has at least one column).
    pub fn exists(&self) -> bool {
        !self.names.is_empty()
    }

    pub fn has(&self, column: &str) -> bool {
        self.names.contains(&column.to_ascii_lowercase())
    }

    /// `alias.column` if the column exists, otherwise `NULL`.
    pub fn select(&self, alias: &str, column: &str) -> String {
        if self.has(column) {
            format!("{alias}.{column}")
        } else {
            tracing::debug!(table = %self.table, column, "Column missing, selecting NULL");
            "NULL".to_string()
        }
    }
}

/// Read a value as `f64` if it is numeric (or numeric text).
pub fn value_as_f64(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(r) => Some(r),
        ValueRef::Text(t) => std::str::from_utf8(t).ok()?.trim().parse().ok(),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

/// Read a value as `i64` if it is integral.
pub fn value_as_i64(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(r) if r.fract() == 0.0 => Some(r as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok()?.trim().parse().ok(),
        _ => None,
    }
}

/// Read a value as non-empty text. Integers are *not* converted.
pub fn value_as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(t) => {
            let s = String::from_utf8_lossy(t).trim().to_string();
            (!s.is_empty()).then_some(s)
        }
        _ => None,
    }
}

/// Like [`value_as_text`], but also renders numbers as text.
pub fn value_as_label(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r) => Some(r.to_string()),
        other => value_as_text(other),
    }
}
