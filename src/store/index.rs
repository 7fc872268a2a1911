//! Read-only repository over the `Envelope Index` database.
//!
//! Messages reference their subject, sender and mailbox through foreign
//! keys into the `subjects`, `addresses` and `mailboxes` tables. Column sets
//! vary between Mail versions, so every optional column is checked once at
//! open time and replaced by `NULL` when missing.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Row, ToSql};
use tracing::{debug, warn};

use crate::error::{MailError, Result};
use crate::locate::{entry_size, MailboxLocator};
use crate::model::address::EmailAddress;
use crate::model::attachment::{mime_type_for, Attachment};
use crate::model::mailbox::Mailbox;
use crate::model::message::{Message, Recipient, RecipientKind};
use crate::parser::container::read_container;

use super::accounts::AccountDirectory;
use super::schema::{value_as_f64, value_as_i64, value_as_label, value_as_text, TableColumns};
use super::timestamp::{decode_timestamp, to_unix_seconds, unix_seconds_sql};

/// Optional predicates for [`MailIndex::search_messages`]. All present
/// predicates must hold.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Substring of the subject (case-insensitive).
    pub subject: Option<String>,
    /// Substring of the sender address (case-insensitive).
    pub sender: Option<String>,
    /// Substring of the mailbox reference.
    pub mailbox: Option<String>,
    pub received_after: Option<chrono::DateTime<chrono::Utc>>,
    pub received_before: Option<chrono::DateTime<chrono::Utc>>,
    /// Maximum number of results.
    pub limit: usize,
}

/// How a caller names a mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxRef {
    /// Index row identifier.
    Id(i64),
    /// Raw reference; a trailing slash is ignored.
    Url(String),
    /// Derived display name (case-insensitive); may match several mailboxes.
    Name(String),
}

impl MailboxRef {
    /// Interpret user input: digits are an id, anything with `://` a URL,
    /// the rest a name.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Ok(id) = input.parse() {
            Self::Id(id)
        } else if input.contains("://") {
            Self::Url(input.to_string())
        } else {
            Self::Name(input.to_string())
        }
    }
}

/// Message id and subject of an attachment search candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: i64,
    pub subject: String,
}

/// Query fragments derived from the live schema.
#[derive(Debug, Clone)]
struct Fragments {
    /// `SELECT ... FROM messages m JOIN ...`, yielding the message row layout.
    message_select: String,
    /// `SELECT id, url FROM mailboxes`, absent when there is no such table.
    mailbox_select: Option<String>,
    /// Mailbox foreign key of a message row.
    mailbox: String,
    /// Mailbox reference of a message row.
    mailbox_url: String,
    /// Extra `WHERE` term hiding deleted rows, if the column exists.
    live: Option<&'static str>,
    date_received: String,
    subject: String,
    sender_address: String,
    address_comment: String,
    has_recipients: bool,
    recipient_type: String,
    recipient_order: String,
    has_attachments: bool,
    attachment_id: String,
    attachment_name: String,
}

impl Fragments {
    fn build(conn: &Connection) -> Result<Self> {
        let messages = TableColumns::load(conn, "messages")?;
        let subjects = TableColumns::load(conn, "subjects")?;
        let addresses = TableColumns::load(conn, "addresses")?;
        let global = TableColumns::load(conn, "message_global_data")?;
        let mailboxes = TableColumns::load(conn, "mailboxes")?;
        let recipients = TableColumns::load(conn, "recipients")?;
        let attachments = TableColumns::load(conn, "attachments")?;

        let mut joins = String::new();
        let mailbox = messages.select("m", "mailbox");
        let mailbox_url = if messages.has("mailbox") && mailboxes.exists() {
            joins.push_str(" LEFT JOIN mailboxes mb ON mb.ROWID = m.mailbox");
            mailboxes.select("mb", "url")
        } else {
            "NULL".to_string()
        };
        let subject = if subjects.has("subject") && messages.has("subject") {
            joins.push_str(" LEFT JOIN subjects s ON s.ROWID = m.subject");
            "s.subject".to_string()
        } else {
            "NULL".to_string()
        };
        let (address, comment) = if addresses.exists() && messages.has("sender") {
            joins.push_str(" LEFT JOIN addresses a ON a.ROWID = m.sender");
            (addresses.select("a", "address"), addresses.select("a", "comment"))
        } else {
            ("NULL".to_string(), "NULL".to_string())
        };
        let global_id = if global.has("message_id_header") && messages.has("global_message_id") {
            joins.push_str(" LEFT JOIN message_global_data g ON g.ROWID = m.global_message_id");
            "g.message_id_header".to_string()
        } else {
            "NULL".to_string()
        };

        let date_received = messages.select("m", "date_received");
        let message_select = format!(
            "SELECT m.ROWID, {mailbox}, {mailbox_url}, {prefix}, {subject}, {address}, {comment}, \
             {sent}, {date_received}, {global_id}, {message_id} \
             FROM messages m{joins}",
            prefix = messages.select("m", "subject_prefix"),
            sent = messages.select("m", "date_sent"),
            message_id = messages.select("m", "message_id"),
        );

        let mailbox_select = mailboxes.exists().then(|| {
            format!(
                "SELECT mb.ROWID, {} FROM mailboxes mb ORDER BY mb.ROWID",
                mailboxes.select("mb", "url")
            )
        });

        Ok(Self {
            message_select,
            mailbox_select,
            mailbox,
            mailbox_url,
            subject,
            sender_address: address,
            address_comment: addresses.select("a", "comment"),
            live: messages
                .has("deleted")
                .then_some("COALESCE(m.deleted, 0) = 0"),
            date_received,
            has_recipients: recipients.has("message")
                && recipients.has("address")
                && addresses.has("address"),
            recipient_type: recipients.select("r", "type"),
            recipient_order: if recipients.has("position") {
                "r.position, r.ROWID".to_string()
            } else {
                "r.ROWID".to_string()
            },
            has_attachments: attachments.has("message"),
            attachment_id: attachments.select("t", "attachment_id"),
            attachment_name: attachments.select("t", "name"),
        })
    }
}

/// Read-only view of the mail index.
///
/// Holds one open connection plus the account snapshot and the locator it
/// uses to reach container files. Dropping the index closes the connection.
pub struct MailIndex {
    conn: Connection,
    path: PathBuf,
    accounts: AccountDirectory,
    locator: MailboxLocator,
    fragments: Fragments,
}

impl MailIndex {
    /// Open the index at `path` read-only.
    pub fn open(path: &Path, accounts: AccountDirectory, locator: MailboxLocator) -> Result<Self> {
        match std::fs::File::open(path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MailError::IndexNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(MailError::io(path, e)),
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| MailError::query("open index", e))?;
        let fragments = Fragments::build(&conn)?;
        debug!(path = %path.display(), "Opened mail index");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            accounts,
            locator,
            fragments,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn accounts(&self) -> &AccountDirectory {
        &self.accounts
    }

    pub fn locator(&self) -> &MailboxLocator {
        &self.locator
    }

    /// All mailboxes, in index order.
    pub fn list_mailboxes(&self) -> Result<Vec<Mailbox>> {
        let Some(sql) = &self.fragments.mailbox_select else {
            debug!("Index has no mailboxes table");
            return Ok(Vec::new());
        };
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| MailError::query("list mailboxes", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, value_as_text(row.get_ref(1)?)))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| MailError::query("list mailboxes", e))?;
        Ok(rows
            .into_iter()
            .map(|(id, url)| Mailbox::from_row(id, url, &self.accounts))
            .collect())
    }

    /// Messages matching every predicate of `filter`, newest first.
    pub fn search_messages(&self, filter: &SearchFilter) -> Result<Vec<Message>> {
        if filter.limit == 0 {
            return Ok(Vec::new());
        }
        let received = unix_seconds_sql(&self.fragments.date_received);
        let mut terms: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(subject) = non_empty(&filter.subject) {
            terms.push(format!("{} LIKE ? ESCAPE '\\'", self.fragments.subject));
            params.push(Box::new(like_pattern(subject)));
        }
        if let Some(sender) = non_empty(&filter.sender) {
            terms.push(format!("{} LIKE ? ESCAPE '\\'", self.fragments.sender_address));
            params.push(Box::new(like_pattern(sender)));
        }
        if let Some(mailbox) = non_empty(&filter.mailbox) {
            terms.push(format!("{} LIKE ? ESCAPE '\\'", self.fragments.mailbox_url));
            params.push(Box::new(like_pattern(mailbox)));
        }
        if let Some(after) = &filter.received_after {
            terms.push(format!("{received} >= ?"));
            params.push(Box::new(to_unix_seconds(after)));
        }
        if let Some(before) = &filter.received_before {
            terms.push(format!("{received} < ?"));
            params.push(Box::new(to_unix_seconds(before)));
        }
        params.push(Box::new(limit_param(filter.limit)));

        let sql = format!(
            "{}{} ORDER BY {received} DESC, m.ROWID DESC LIMIT ?",
            self.fragments.message_select,
            self.where_clause(terms),
        );
        self.query_messages(&sql, &params, "search messages")
    }

    /// One page of a mailbox's messages, newest first.
    pub fn list_messages(
        &self,
        mailbox: &MailboxRef,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        let term = match mailbox {
            MailboxRef::Id(id) => {
                params.push(Box::new(*id));
                format!("{} = ?", self.fragments.mailbox)
            }
            MailboxRef::Url(url) => {
                params.push(Box::new(url.trim_end_matches('/').to_string()));
                format!("RTRIM({}, '/') = ?", self.fragments.mailbox_url)
            }
            MailboxRef::Name(name) => {
                let ids: Vec<i64> = self
                    .list_mailboxes()?
                    .into_iter()
                    .filter(|m| m.name.eq_ignore_ascii_case(name))
                    .map(|m| m.id)
                    .collect();
                if ids.is_empty() {
                    debug!(name = %name, "No mailbox with this name");
                    return Ok(Vec::new());
                }
                let placeholders = vec!["?"; ids.len()].join(",");
                params.extend(ids.into_iter().map(|id| Box::new(id) as Box<dyn ToSql>));
                format!("{} IN ({placeholders})", self.fragments.mailbox)
            }
        };
        params.push(Box::new(limit_param(limit)));
        params.push(Box::new(limit_param(offset)));

        let received = unix_seconds_sql(&self.fragments.date_received);
        let sql = format!(
            "{}{} ORDER BY {received} DESC, m.ROWID DESC LIMIT ? OFFSET ?",
            self.fragments.message_select,
            self.where_clause(vec![term]),
        );
        self.query_messages(&sql, &params, "list messages")
    }

    /// One message with its recipients and, when the container file can be
    /// found and parsed, its body and attachments.
    ///
    /// Container problems are logged and leave those fields empty.
    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let Some(mut message) = self.message_row(id)? else {
            return Ok(None);
        };
        message.recipients = self.recipients(id)?;
        self.enrich_from_container(&mut message);
        Ok(Some(message))
    }

    /// Attachments of a message: index rows first, the container as fallback.
    pub fn list_attachments(&self, message_id: i64) -> Result<Vec<Attachment>> {
        let message = self
            .message_row(message_id)?
            .ok_or(MailError::MessageNotFound(message_id))?;
        let url = message.mailbox_url.as_deref().unwrap_or_default();

        let indexed = self.attachment_rows(message_id)?;
        if !indexed.is_empty() {
            return Ok(indexed
                .into_iter()
                .map(|(aid, name)| self.resolve_indexed_attachment(url, message_id, aid, name))
                .collect());
        }

        let Some(path) = self.locator.find_container_path(url, message_id) else {
            return Ok(Vec::new());
        };
        match read_container(&path) {
            Ok(content) => Ok(self.resolve_paths(url, message_id, content.attachments)),
            Err(e) => {
                warn!(message_id, path = %path.display(), error = %e, "Could not parse container");
                Ok(Vec::new())
            }
        }
    }

    /// Container file of a message, if it can be found.
    pub fn container_path(&self, message_id: i64) -> Result<Option<PathBuf>> {
        let message = self
            .message_row(message_id)?
            .ok_or(MailError::MessageNotFound(message_id))?;
        Ok(message
            .mailbox_url
            .as_deref()
            .and_then(|url| self.locator.find_container_path(url, message_id)))
    }

    /// Messages whose attachments are worth scanning, newest first.
    ///
    /// The `attachments` table does not record every part Mail keeps inline,
    /// so messages without rows are included as well;
    /// [`Self::list_attachments`] reads their containers instead.
    pub fn attachment_candidates(&self) -> Result<Vec<MessageSummary>> {
        let received = unix_seconds_sql(&self.fragments.date_received);
        let sql = format!(
            "{}{} ORDER BY {received} DESC, m.ROWID DESC",
            self.fragments.message_select,
            self.where_clause(Vec::new()),
        );
        Ok(self
            .query_messages(&sql, &[], "list attachment candidates")?
            .into_iter()
            .map(|m| MessageSummary {
                id: m.id,
                subject: m.subject,
            })
            .collect())
    }

    fn where_clause(&self, mut terms: Vec<String>) -> String {
        if let Some(live) = self.fragments.live {
            terms.push(live.to_string());
        }
        if terms.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", terms.join(" AND "))
        }
    }

    fn query_messages(
        &self,
        sql: &str,
        params: &[Box<dyn ToSql>],
        context: &str,
    ) -> Result<Vec<Message>> {
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| MailError::query(context, e))?;
        stmt.query_map(param_refs.as_slice(), |row| self.message_from_row(row))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| MailError::query(context, e))
    }

    fn message_row(&self, id: i64) -> Result<Option<Message>> {
        let sql = format!(
            "{}{}",
            self.fragments.message_select,
            self.where_clause(vec!["m.ROWID = ?".to_string()]),
        );
        let params: Vec<Box<dyn ToSql>> = vec![Box::new(id)];
        Ok(self
            .query_messages(&sql, &params, "get message")?
            .into_iter()
            .next())
    }

    fn message_from_row(&self, row: &Row<'_>) -> rusqlite::Result<Message> {
        let id: i64 = row.get(0)?;
        let mailbox_id = value_as_i64(row.get_ref(1)?).unwrap_or_default();
        let mailbox_url = value_as_text(row.get_ref(2)?);
        let prefix = value_as_text(row.get_ref(3)?).unwrap_or_default();
        let subject = value_as_text(row.get_ref(4)?).unwrap_or_default();
        let address = value_as_text(row.get_ref(5)?).unwrap_or_default();
        let comment = value_as_text(row.get_ref(6)?);
        let date_sent = value_as_f64(row.get_ref(7)?).and_then(decode_timestamp);
        let date_received = value_as_f64(row.get_ref(8)?).and_then(decode_timestamp);
        let message_id = value_as_text(row.get_ref(9)?).or(value_as_text(row.get_ref(10)?));

        let mailbox = Mailbox::from_row(mailbox_id, mailbox_url.clone(), &self.accounts);
        Ok(Message {
            id,
            subject: join_subject(&prefix, &subject),
            sender: EmailAddress::from_parts(address, comment),
            recipients: Vec::new(),
            date_sent,
            date_received,
            mailbox_id,
            mailbox_name: mailbox.name,
            mailbox_url,
            message_id,
            body: None,
            html_body: None,
            attachments: None,
        })
    }

    fn recipients(&self, message_id: i64) -> Result<Vec<Recipient>> {
        if !self.fragments.has_recipients {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT a.address, {}, {} FROM recipients r \
             JOIN addresses a ON a.ROWID = r.address \
             WHERE r.message = ? ORDER BY {}",
            self.fragments.address_comment,
            self.fragments.recipient_type,
            self.fragments.recipient_order,
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| MailError::query("load recipients", e))?;
        stmt.query_map([message_id], |row| {
            let address = value_as_text(row.get_ref(0)?).unwrap_or_default();
            let comment = value_as_text(row.get_ref(1)?);
            let kind = value_as_i64(row.get_ref(2)?).unwrap_or(0);
            Ok(Recipient {
                kind: RecipientKind::from_code(kind),
                address: EmailAddress::from_parts(address, comment),
            })
        })
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| MailError::query("load recipients", e))
    }

    fn attachment_rows(&self, message_id: i64) -> Result<Vec<(Option<String>, Option<String>)>> {
        if !self.fragments.has_attachments {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {}, {} FROM attachments t WHERE t.message = ? ORDER BY t.ROWID",
            self.fragments.attachment_id, self.fragments.attachment_name,
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| MailError::query("list attachments", e))?;
        stmt.query_map([message_id], |row| {
            Ok((
                value_as_label(row.get_ref(0)?),
                value_as_text(row.get_ref(1)?),
            ))
        })
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| MailError::query("list attachments", e))
    }

    fn resolve_indexed_attachment(
        &self,
        url: &str,
        message_id: i64,
        attachment_id: Option<String>,
        name: Option<String>,
    ) -> Attachment {
        let filename = name.unwrap_or_else(|| {
            format!("attachment_{}", attachment_id.as_deref().unwrap_or("0"))
        });
        let path =
            self.locator
                .find_attachment_path(url, message_id, attachment_id.as_deref(), &filename);
        let size = path.as_deref().map_or(0, entry_size);
        Attachment {
            mime_type: mime_type_for(&filename).to_string(),
            filename,
            size,
            attachment_id,
            path,
        }
    }

    fn resolve_paths(
        &self,
        url: &str,
        message_id: i64,
        attachments: Vec<Attachment>,
    ) -> Vec<Attachment> {
        attachments
            .into_iter()
            .map(|mut att| {
                att.path = self.locator.find_attachment_path(
                    url,
                    message_id,
                    att.attachment_id.as_deref(),
                    &att.filename,
                );
                att
            })
            .collect()
    }

    fn enrich_from_container(&self, message: &mut Message) {
        let Some(url) = message.mailbox_url.clone() else {
            debug!(message_id = message.id, "Message has no mailbox reference");
            return;
        };
        let Some(path) = self.locator.find_container_path(&url, message.id) else {
            return;
        };
        let content = match read_container(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    message_id = message.id,
                    path = %path.display(),
                    error = %e,
                    "Could not parse container, returning index data only"
                );
                return;
            }
        };

        message.body = content.body;
        message.html_body = content.html;
        message.attachments = Some(self.resolve_paths(&url, message.id, content.attachments));
        if message.message_id.is_none() {
            message.message_id = content.message_id;
        }
        if message.subject.is_empty() {
            if let Some(subject) = content.subject {
                message.subject = subject;
            }
        }
        if message.sender.address.is_empty() {
            if let Some(from) = content.from {
                message.sender = from;
            }
        }
        if message.date_sent.is_none() {
            message.date_sent = content.date;
        }
    }
}

impl std::fmt::Debug for MailIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailIndex")
            .field("path", &self.path)
            .field("accounts", &self.accounts.len())
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `%needle%` with LIKE wildcards in `needle` escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn limit_param(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn join_subject(prefix: &str, subject: &str) -> String {
    if prefix.is_empty() {
        subject.to_string()
    } else if prefix.ends_with(' ') || subject.is_empty() {
        format!("{prefix}{subject}")
    } else {
        format!("{prefix} {subject}")
    }
}
