//! Integration tests against a synthetic mail store: an index database, an
//! account store and container files laid out the way the Mail app does.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use tempfile::TempDir;

use maildig::config::Config;
use maildig::error::ErrorKind;
use maildig::model::message::RecipientKind;
use maildig::search::ContentIndex;
use maildig::store::{MailboxRef, SearchFilter};
use maildig::MailEngine;

const WORK_ACCOUNT: &str = "ACCT-WORK-0001";

struct Fixture {
    _tmp: TempDir,
    config: Config,
    version_root: PathBuf,
}

impl Fixture {
    fn engine(&self) -> MailEngine {
        MailEngine::open(&self.config).expect("open engine")
    }
}

fn container(message: &str) -> Vec<u8> {
    let mut data = format!("{}\n", message.len()).into_bytes();
    data.extend_from_slice(message.as_bytes());
    data.extend_from_slice(
        b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\"><dict><key>flags</key><integer>8590195713</integer></dict></plist>\n",
    );
    data
}

fn write_file(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_accounts(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE ZACCOUNT (Z_PK INTEGER PRIMARY KEY, ZIDENTIFIER VARCHAR, \
         ZACCOUNTDESCRIPTION VARCHAR, ZUSERNAME VARCHAR, ZPARENTACCOUNT INTEGER);
         INSERT INTO ZACCOUNT VALUES (1, 'PARENT-0001', 'Work', 'ana@work.com', NULL);
         INSERT INTO ZACCOUNT VALUES (2, 'ACCT-WORK-0001', NULL, NULL, 1);",
    )
    .unwrap();
}

/// Messages (id: received, stored as):
///   2: 2025-01-31  reference-epoch 760000000   INBOX
///   1: 2023-11-14  unix 1700000000             INBOX
///   3: 2024-03-09  unix 1710000000             INBOX, deleted
///   4: 2023-10-26  reference-epoch 720000000   Archive (unknown account)
///   5: 2023-07-22  unix 1690000000             local "Notes Box"
fn write_index(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE mailboxes (ROWID INTEGER PRIMARY KEY, url TEXT);
         CREATE TABLE subjects (ROWID INTEGER PRIMARY KEY, subject TEXT);
         CREATE TABLE addresses (ROWID INTEGER PRIMARY KEY, address TEXT, comment TEXT);
         CREATE TABLE message_global_data (ROWID INTEGER PRIMARY KEY, message_id_header TEXT);
         CREATE TABLE messages (ROWID INTEGER PRIMARY KEY, message_id INTEGER,
             global_message_id INTEGER, sender INTEGER, subject_prefix TEXT, subject INTEGER,
             date_sent INTEGER, date_received INTEGER, mailbox INTEGER, deleted INTEGER);
         CREATE TABLE recipients (ROWID INTEGER PRIMARY KEY, message INTEGER, address INTEGER,
             type INTEGER, position INTEGER);
         CREATE TABLE attachments (ROWID INTEGER PRIMARY KEY, message INTEGER,
             attachment_id TEXT, name TEXT);

         INSERT INTO mailboxes VALUES (1, 'imap://ACCT-WORK-0001/INBOX');
         INSERT INTO mailboxes VALUES (2, 'imap://ACCT-1/Archive');
         INSERT INTO mailboxes VALUES (3, 'local://LOCALID/Notes%20Box');

         INSERT INTO subjects VALUES (1, 'Hello');
         INSERT INTO subjects VALUES (2, 'Meeting at 2pm');
         INSERT INTO subjects VALUES (3, 'Old news');
         INSERT INTO subjects VALUES (4, 'Quarterly report');
         INSERT INTO subjects VALUES (5, 'budget_2024');

         INSERT INTO addresses VALUES (1, 'ana@work.com', 'Ana');
         INSERT INTO addresses VALUES (2, 'bob@example.com', NULL);
         INSERT INTO addresses VALUES (3, 'carol@example.com', 'Carol');

         INSERT INTO message_global_data VALUES (1, '<m1@example.com>');

         INSERT INTO messages VALUES (1, 11, 1, 2, 'Re:', 1, 721692800, 1700000000, 1, 0);
         INSERT INTO messages VALUES (2, 12, NULL, 1, '', 2, NULL, 760000000, 1, 0);
         INSERT INTO messages VALUES (3, 13, NULL, 1, NULL, 3, NULL, 1710000000, 1, 1);
         INSERT INTO messages VALUES (4, 14, NULL, 3, NULL, 4, NULL, 720000000, 2, 0);
         INSERT INTO messages VALUES (5, 15, NULL, 2, NULL, 5, NULL, 1690000000, 3, NULL);

         INSERT INTO recipients VALUES (1, 1, 3, 1, 1);
         INSERT INTO recipients VALUES (2, 1, 1, 0, 0);

         INSERT INTO attachments VALUES (1, 1, '2', 'notes.txt');
         INSERT INTO attachments VALUES (2, 4, '3', 'report.txt');
         INSERT INTO attachments VALUES (3, 4, '4', 'missing.pdf');",
    )
    .unwrap();
}

fn build_store() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let mail_root = tmp.path().join("Mail");
    let version_root = mail_root.join("V10");
    let mail_data = version_root.join("MailData");
    fs::create_dir_all(&mail_data).unwrap();
    // An older version directory that must be ignored.
    fs::create_dir_all(mail_root.join("V9")).unwrap();

    write_index(&mail_data.join("Envelope Index"));
    let accounts_path = tmp.path().join("Accounts4.sqlite");
    write_accounts(&accounts_path);

    let inbox = version_root
        .join(WORK_ACCOUNT)
        .join("INBOX.mbox")
        .join("6A1F0C2E-0000-4A8B-9C1D-2E3F4A5B6C7D")
        .join("Data");
    let message_one = "From: Bob <bob@example.com>\r\n\
        To: Ana <ana@work.com>\r\n\
        Subject: Re: Hello\r\n\
        Message-ID: <container-1@example.com>\r\n\
        MIME-Version: 1.0\r\n\
        Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
        \r\n\
        --b1\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        Hello from Bob\r\n\
        --b1\r\n\
        Content-Type: text/plain; name=\"notes.txt\"\r\n\
        Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
        Content-Transfer-Encoding: base64\r\n\
        \r\n\
        aW5saW5lIGF0dGFjaG1lbnQgd29yZHM=\r\n\
        --b1--\r\n";
    write_file(
        &inbox.join("1").join("Messages").join("1.emlx"),
        &container(message_one),
    );

    let archive = version_root
        .join("ACCT-1")
        .join("Archive.mbox")
        .join("0B9E4D1A-0000-4C2B-8D3E-5F6A7B8C9D0E")
        .join("Data");
    write_file(
        &archive.join("Attachments").join("4").join("3").join("report.txt"),
        b"Revenue grew by twelve percent in the third quarter.",
    );

    let notes = version_root.join("Mailboxes").join("Notes Box.mbox");
    let message_five = "From: bob@example.com\r\n\
        Subject: budget_2024\r\n\
        Content-Type: text/html; charset=utf-8\r\n\
        \r\n\
        <p>Budget <b>draft</b></p>\r\n";
    write_file(
        &notes.join("Messages").join("5.partial.emlx"),
        &container(message_five),
    );

    let mut config = Config::default();
    config.store.mail_root = Some(mail_root);
    config.store.accounts_path = Some(accounts_path);

    Fixture {
        _tmp: tmp,
        config,
        version_root,
    }
}

fn filter() -> SearchFilter {
    SearchFilter {
        limit: 50,
        ..SearchFilter::default()
    }
}

fn ids(messages: &[maildig::model::message::Message]) -> Vec<i64> {
    messages.iter().map(|m| m.id).collect()
}

// ─── Test 1: Store discovery and mailbox naming ─────────────────────

#[test]
fn test_open_picks_highest_version_and_lists_mailboxes() {
    let fx = build_store();
    let engine = fx.engine();
    assert_eq!(
        engine.index().path(),
        fx.version_root.join("MailData").join("Envelope Index")
    );

    let mailboxes = engine.list_mailboxes().unwrap();
    assert_eq!(mailboxes.len(), 3);

    assert_eq!(mailboxes[0].name, "INBOX");
    // Child account inherits the parent's username.
    assert_eq!(mailboxes[0].account.as_deref(), Some("ana@work.com"));

    assert_eq!(mailboxes[1].name, "Archive");
    assert_eq!(mailboxes[1].account.as_deref(), Some("ACCT-1"));

    assert_eq!(mailboxes[2].name, "Notes Box");
}

// ─── Test 2: Ordering across both timestamp epochs ──────────────────

#[test]
fn test_search_orders_mixed_epochs_newest_first() {
    let fx = build_store();
    let engine = fx.engine();
    let results = engine.search_messages(&filter()).unwrap();
    assert_eq!(ids(&results), vec![2, 1, 4, 5], "deleted message 3 must be hidden");

    assert_eq!(
        results[0].date_received,
        Some(Utc.timestamp_opt(1_738_307_200, 0).unwrap())
    );
    assert_eq!(
        results[1].date_received,
        Some(Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap())
    );
}

// ─── Test 3: Predicates ─────────────────────────────────────────────

#[test]
fn test_search_predicates() {
    let fx = build_store();
    let engine = fx.engine();

    let by_subject = engine
        .search_messages(&SearchFilter {
            subject: Some("hello".into()),
            ..filter()
        })
        .unwrap();
    assert_eq!(ids(&by_subject), vec![1]);
    assert_eq!(by_subject[0].subject, "Re: Hello");
    assert_eq!(by_subject[0].sender.address, "bob@example.com");

    let by_sender = engine
        .search_messages(&SearchFilter {
            sender: Some("ANA@".into()),
            ..filter()
        })
        .unwrap();
    assert_eq!(ids(&by_sender), vec![2]);
    assert_eq!(by_sender[0].sender.display_name.as_deref(), Some("Ana"));

    let by_mailbox = engine
        .search_messages(&SearchFilter {
            mailbox: Some("ACCT-1".into()),
            ..filter()
        })
        .unwrap();
    assert_eq!(ids(&by_mailbox), vec![4]);

    // `_` is matched literally, not as a wildcard ("at 2pm" must not match).
    let literal = engine
        .search_messages(&SearchFilter {
            subject: Some("t_2".into()),
            ..filter()
        })
        .unwrap();
    assert_eq!(ids(&literal), vec![5]);

    let blank = engine
        .search_messages(&SearchFilter {
            subject: Some("   ".into()),
            ..filter()
        })
        .unwrap();
    assert_eq!(blank.len(), 4, "blank predicates are ignored");
}

// ─── Test 4: Date range and limit ───────────────────────────────────

#[test]
fn test_search_date_range_and_limit() {
    let fx = build_store();
    let engine = fx.engine();
    let cutoff = Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap();

    let after = engine
        .search_messages(&SearchFilter {
            received_after: Some(cutoff),
            ..filter()
        })
        .unwrap();
    assert_eq!(ids(&after), vec![2, 1]);

    let before = engine
        .search_messages(&SearchFilter {
            received_before: Some(cutoff),
            ..filter()
        })
        .unwrap();
    assert_eq!(ids(&before), vec![4, 5]);

    let limited = engine
        .search_messages(&SearchFilter {
            limit: 2,
            ..filter()
        })
        .unwrap();
    assert_eq!(ids(&limited), vec![2, 1]);

    let none = engine
        .search_messages(&SearchFilter {
            limit: 0,
            ..filter()
        })
        .unwrap();
    assert!(none.is_empty());
}

// ─── Test 5: Listing a mailbox by id, URL and name ──────────────────

#[test]
fn test_list_messages_by_reference() {
    let fx = build_store();
    let engine = fx.engine();

    let by_id = engine.list_messages(&MailboxRef::parse("1"), None, 0).unwrap();
    assert_eq!(ids(&by_id), vec![2, 1]);

    let by_url = engine
        .list_messages(&MailboxRef::parse("imap://ACCT-WORK-0001/INBOX/"), None, 0)
        .unwrap();
    assert_eq!(ids(&by_url), vec![2, 1]);

    let by_name = engine.list_messages(&MailboxRef::parse("inbox"), None, 0).unwrap();
    assert_eq!(ids(&by_name), vec![2, 1]);

    let page = engine.list_messages(&MailboxRef::Id(1), Some(1), 1).unwrap();
    assert_eq!(ids(&page), vec![1]);

    let unknown = engine
        .list_messages(&MailboxRef::parse("Nonexistent"), None, 0)
        .unwrap();
    assert!(unknown.is_empty());
}

// ─── Test 6: Full message with container content ────────────────────

#[test]
fn test_get_message_reads_container() {
    let fx = build_store();
    let engine = fx.engine();
    let message = engine.get_message(1).unwrap();

    assert_eq!(message.subject, "Re: Hello");
    assert_eq!(message.mailbox_name, "INBOX");
    // The index value wins over the container header.
    assert_eq!(message.message_id.as_deref(), Some("<m1@example.com>"));
    assert_eq!(message.body.as_deref().map(str::trim), Some("Hello from Bob"));
    assert_eq!(
        message.date_sent,
        Some(Utc.timestamp_opt(978_307_200 + 721_692_800, 0).unwrap())
    );

    assert_eq!(message.recipients.len(), 2);
    assert_eq!(message.recipients[0].kind, RecipientKind::To);
    assert_eq!(message.recipients[0].address.address, "ana@work.com");
    assert_eq!(message.recipients[1].kind, RecipientKind::Cc);
    assert_eq!(message.recipients[1].address.display_name.as_deref(), Some("Carol"));

    let attachments = message.attachments.expect("container attachments");
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename, "notes.txt");
    assert_eq!(attachments[0].attachment_id.as_deref(), Some("2"));
    assert!(attachments[0].path.is_none());
}

#[test]
fn test_get_message_partial_container_and_missing_container() {
    let fx = build_store();
    let engine = fx.engine();

    let local = engine.get_message(5).unwrap();
    assert_eq!(local.body.as_deref().map(str::trim), Some("Budget draft"));
    assert!(local.html_body.is_some());

    let without_file = engine.get_message(2).unwrap();
    assert_eq!(without_file.subject, "Meeting at 2pm");
    assert!(without_file.body.is_none());
    assert!(without_file.attachments.is_none());
}

#[test]
fn test_get_message_not_found() {
    let fx = build_store();
    let engine = fx.engine();
    let err = engine.get_message(999).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EntityNotFound);
    // Deleted rows are invisible.
    assert_eq!(engine.get_message(3).unwrap_err().kind(), ErrorKind::EntityNotFound);
}

// ─── Test 7: Attachments and their content ──────────────────────────

#[test]
fn test_list_attachments_resolves_files() {
    let fx = build_store();
    let engine = fx.engine();
    let attachments = engine.list_attachments(4).unwrap();
    assert_eq!(attachments.len(), 2);

    let report = &attachments[0];
    assert_eq!(report.filename, "report.txt");
    assert_eq!(report.mime_type, "text/plain");
    assert!(report.path.as_ref().is_some_and(|p| p.ends_with("Attachments/4/3/report.txt")));
    assert_eq!(report.size, 52);

    let missing = &attachments[1];
    assert!(missing.path.is_none());
    assert_eq!(missing.size, 0);

    assert_eq!(
        engine.list_attachments(999).unwrap_err().kind(),
        ErrorKind::EntityNotFound
    );
}

#[test]
fn test_attachment_content_kinds() {
    let fx = build_store();
    let engine = fx.engine();

    let text = engine.attachment_content(4, "report.txt").unwrap();
    assert!(text.contains("twelve percent"));

    // Inline content comes out of the container; lookup ignores case.
    let inline = engine.attachment_content(1, "NOTES.TXT").unwrap();
    assert_eq!(inline, "inline attachment words");

    let missing = engine.attachment_content(4, "missing.pdf").unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::FileMissing);

    let unknown = engine.attachment_content(4, "nope.doc").unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::EntityNotFound);

    let no_message = engine.attachment_content(999, "report.txt").unwrap_err();
    assert_eq!(no_message.kind(), ErrorKind::EntityNotFound);
}

// ─── Test 8: Attachment content search ──────────────────────────────

#[test]
fn test_search_attachments_reports_progress() {
    let fx = build_store();
    let engine = fx.engine();
    let last = Cell::new((0usize, 0usize));
    let hits = engine
        .search_attachments(
            "Twelve Percent",
            None,
            Some(&|current: usize, total: usize| last.set((current, total))),
        )
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message_id, 4);
    assert_eq!(hits[0].filename, "report.txt");
    assert_eq!(hits[0].subject, "Quarterly report");
    assert!(hits[0].snippet.contains("twelve percent"));
    // Every live message is scanned, with or without attachment rows.
    assert_eq!(last.get(), (4, 4));

    let inline = engine.search_attachments("attachment words", None, None).unwrap();
    assert_eq!(inline.len(), 1);
    assert_eq!(inline[0].message_id, 1);

    assert!(engine.search_attachments("  ", None, None).unwrap().is_empty());
    assert!(engine.search_attachments("revenue", Some(0), None).unwrap().is_empty());
}

// ─── Test 9: Older schema without optional tables and columns ───────

#[test]
fn test_minimal_schema_degrades() {
    let tmp = TempDir::new().unwrap();
    let index = tmp.path().join("Envelope Index");
    let conn = Connection::open(&index).unwrap();
    conn.execute_batch(
        "CREATE TABLE mailboxes (ROWID INTEGER PRIMARY KEY, url TEXT);
         CREATE TABLE messages (ROWID INTEGER PRIMARY KEY, mailbox INTEGER, date_received REAL);
         INSERT INTO mailboxes VALUES (1, 'imap://X/INBOX');
         INSERT INTO messages VALUES (1, 1, 1700000000.0);
         INSERT INTO messages VALUES (2, 1, 700000000.0);",
    )
    .unwrap();
    drop(conn);

    let mut config = Config::default();
    config.store.mail_root = Some(tmp.path().join("no-such-root"));
    config.store.index_path = Some(index);
    config.store.accounts_path = Some(tmp.path().join("no-accounts.sqlite"));
    let engine = MailEngine::open(&config).unwrap();

    let results = engine.search_messages(&filter()).unwrap();
    assert_eq!(ids(&results), vec![1, 2]);
    assert_eq!(results[0].subject, "");
    assert_eq!(results[0].mailbox_name, "INBOX");

    let by_subject = engine
        .search_messages(&SearchFilter {
            subject: Some("x".into()),
            ..filter()
        })
        .unwrap();
    assert!(by_subject.is_empty());

    let message = engine.get_message(2).unwrap();
    assert!(message.recipients.is_empty());
    assert!(engine.list_attachments(2).unwrap().is_empty());
    assert!(engine.search_attachments("anything", None, None).unwrap().is_empty());
}

// ─── Test 10: Missing store ─────────────────────────────────────────

#[test]
fn test_missing_index_and_root() {
    let tmp = TempDir::new().unwrap();

    let mut config = Config::default();
    config.store.mail_root = Some(tmp.path().join("Mail"));
    config.store.accounts_path = Some(tmp.path().join("Accounts4.sqlite"));
    let err = MailEngine::open(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.remediation().is_some());

    config.store.index_path = Some(tmp.path().join("Envelope Index"));
    let err = MailEngine::open(&config).unwrap_err();
    assert!(matches!(err, maildig::MailError::IndexNotFound(_)));

    // A version root without an index.
    fs::create_dir_all(tmp.path().join("Mail").join("V10")).unwrap();
    config.store.index_path = None;
    let err = MailEngine::open(&config).unwrap_err();
    assert!(matches!(err, maildig::MailError::IndexNotFound(_)));
}

// ─── Test 11: Schemas without mailbox URLs ──────────────────────────

fn open_index_only(tmp: &TempDir, schema: &str) -> MailEngine {
    let index = tmp.path().join("Envelope Index");
    Connection::open(&index).unwrap().execute_batch(schema).unwrap();

    let mut config = Config::default();
    config.store.mail_root = Some(tmp.path().join("no-such-root"));
    config.store.index_path = Some(index);
    config.store.accounts_path = Some(tmp.path().join("no-accounts.sqlite"));
    MailEngine::open(&config).unwrap()
}

#[test]
fn test_mailboxes_without_url_or_link() {
    let tmp = TempDir::new().unwrap();
    let engine = open_index_only(
        &tmp,
        "CREATE TABLE mailboxes (ROWID INTEGER PRIMARY KEY, name TEXT);
         CREATE TABLE messages (ROWID INTEGER PRIMARY KEY, date_received INTEGER);
         INSERT INTO mailboxes VALUES (1, 'INBOX');
         INSERT INTO messages VALUES (1, 1700000000);
         INSERT INTO messages VALUES (2, 1600000000);",
    );

    let results = engine.search_messages(&filter()).unwrap();
    assert_eq!(ids(&results), vec![1, 2]);
    assert!(results[0].mailbox_url.is_none());

    let mailboxes = engine.list_mailboxes().unwrap();
    assert_eq!(mailboxes.len(), 1);
    assert_eq!(mailboxes[0].id, 1);
    assert!(mailboxes[0].url.is_none());

    let by_mailbox = engine
        .search_messages(&SearchFilter {
            mailbox: Some("INBOX".into()),
            ..filter()
        })
        .unwrap();
    assert!(by_mailbox.is_empty());
    assert!(engine.list_messages(&MailboxRef::Id(1), None, 0).unwrap().is_empty());
    assert!(engine
        .list_messages(&MailboxRef::parse("imap://X/INBOX"), None, 0)
        .unwrap()
        .is_empty());
    assert!(engine.get_message(1).unwrap().body.is_none());
}

#[test]
fn test_messages_without_mailboxes_table() {
    let tmp = TempDir::new().unwrap();
    let engine = open_index_only(
        &tmp,
        "CREATE TABLE messages (ROWID INTEGER PRIMARY KEY, mailbox INTEGER, date_received INTEGER);
         INSERT INTO messages VALUES (1, 7, 1700000000);",
    );

    assert!(engine.list_mailboxes().unwrap().is_empty());
    let results = engine.search_messages(&filter()).unwrap();
    assert_eq!(ids(&results), vec![1]);
    assert_eq!(results[0].mailbox_id, 7);
    assert!(results[0].mailbox_url.is_none());

    let by_id = engine.list_messages(&MailboxRef::Id(7), None, 0).unwrap();
    assert_eq!(ids(&by_id), vec![1]);
    assert!(engine.list_messages(&MailboxRef::parse("Inbox"), None, 0).unwrap().is_empty());
}

// ─── Test 12: `file://` mailbox content ─────────────────────────────

/// An index whose only mailbox is a `file://` reference to `Local.mbox`.
/// Message 1 keeps `a.txt` inline in its container; message 2 has an
/// `.rtfd` bundle on disk. `attachments` holds `attachment_rows`.
fn file_mailbox_store(attachment_rows: &str) -> (TempDir, MailEngine) {
    let tmp = TempDir::new().unwrap();
    let mbox = tmp.path().join("Local.mbox");

    let message_one = "From: bob@example.com\r\n\
        Subject: Inline notes\r\n\
        MIME-Version: 1.0\r\n\
        Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
        \r\n\
        --b1\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        See the attached file.\r\n\
        --b1\r\n\
        Content-Type: text/plain; name=\"a.txt\"\r\n\
        Content-Disposition: inline; filename=\"a.txt\"\r\n\
        \r\n\
        secretword inside\r\n\
        --b1--\r\n";
    write_file(&mbox.join("Messages").join("1.emlx"), &container(message_one));

    let bundle = mbox.join("Attachments").join("2").join("2").join("notes.rtfd");
    write_file(&bundle.join("TXT.rtf"), b"{\\rtf1\\ansi Bundle {\\b meeting} notes}");

    let index = tmp.path().join("Envelope Index");
    Connection::open(&index)
        .unwrap()
        .execute_batch(&format!(
            "CREATE TABLE mailboxes (ROWID INTEGER PRIMARY KEY, url TEXT);
             CREATE TABLE subjects (ROWID INTEGER PRIMARY KEY, subject TEXT);
             CREATE TABLE messages (ROWID INTEGER PRIMARY KEY, subject INTEGER,
                 date_received INTEGER, mailbox INTEGER, deleted INTEGER);
             CREATE TABLE attachments (ROWID INTEGER PRIMARY KEY, message INTEGER,
                 attachment_id TEXT, name TEXT);
             INSERT INTO mailboxes VALUES (1, 'file://{}');
             INSERT INTO subjects VALUES (1, 'Inline notes');
             INSERT INTO subjects VALUES (2, 'Bundle');
             INSERT INTO messages VALUES (1, 1, 1700000000, 1, 0);
             INSERT INTO messages VALUES (2, 2, 1600000000, 1, 0);
             {attachment_rows}",
            mbox.display()
        ))
        .unwrap();

    let mut config = Config::default();
    config.store.mail_root = Some(tmp.path().join("no-such-root"));
    config.store.index_path = Some(index);
    config.store.accounts_path = Some(tmp.path().join("no-accounts.sqlite"));
    let engine = MailEngine::open(&config).unwrap();
    (tmp, engine)
}

#[test]
fn test_search_attachments_reads_containers_without_rows() {
    let (_tmp, engine) = file_mailbox_store("");

    let attachments = engine.list_attachments(1).unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename, "a.txt");
    assert!(attachments[0].path.is_none());

    let progress = Cell::new((0usize, 0usize));
    let hits = engine
        .search_attachments(
            "secretword",
            None,
            Some(&|current: usize, total: usize| progress.set((current, total))),
        )
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message_id, 1);
    assert_eq!(hits[0].filename, "a.txt");
    assert_eq!(hits[0].subject, "Inline notes");
    assert!(hits[0].snippet.contains("secretword inside"));
    assert_eq!(progress.get(), (2, 2));
}

#[test]
fn test_rtfd_bundle_attachment_content() {
    let (_tmp, engine) =
        file_mailbox_store("INSERT INTO attachments VALUES (1, 2, '2', 'notes.rtfd');");

    let attachments = engine.list_attachments(2).unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].mime_type, "application/x-rtfd");
    assert!(attachments[0].path.as_ref().is_some_and(|p| p.is_dir()));
    assert!(attachments[0].size > 0);

    let text = engine.attachment_content(2, "notes.rtfd").unwrap();
    assert!(text.contains("Bundle meeting notes"), "{text}");

    let hits = engine.search_attachments("meeting", None, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message_id, 2);
}

// ─── Test 13: External content index narrowing ──────────────────────

/// Fixed answer plus a record of the roots it was asked about.
struct FixedIndex {
    answer: Option<Vec<PathBuf>>,
    roots: Rc<RefCell<Vec<PathBuf>>>,
}

impl ContentIndex for FixedIndex {
    fn matching_files(&self, _query: &str, root: &Path) -> Option<Vec<PathBuf>> {
        self.roots.borrow_mut().push(root.to_path_buf());
        self.answer.clone()
    }
}

fn narrowed_engine(
    fx: &Fixture,
    answer: Option<Vec<PathBuf>>,
) -> (MailEngine, Rc<RefCell<Vec<PathBuf>>>) {
    let roots = Rc::new(RefCell::new(Vec::new()));
    let engine = fx.engine().with_content_index(Box::new(FixedIndex {
        answer,
        roots: Rc::clone(&roots),
    }));
    (engine, roots)
}

/// Runs a search and returns the hits with every progress report.
fn search_with_progress(
    engine: &MailEngine,
    query: &str,
) -> (Vec<maildig::model::attachment::AttachmentHit>, Vec<(usize, usize)>) {
    let reports = RefCell::new(Vec::new());
    let hits = engine
        .search_attachments(
            query,
            None,
            Some(&|current: usize, total: usize| reports.borrow_mut().push((current, total))),
        )
        .unwrap();
    (hits, reports.into_inner())
}

#[test]
fn test_content_index_without_answer_scans_everything() {
    let fx = build_store();
    let (engine, roots) = narrowed_engine(&fx, None);

    let (hits, reports) = search_with_progress(&engine, "attachment words");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message_id, 1);
    assert_eq!(reports.first(), Some(&(0, 4)));
    assert_eq!(reports.last(), Some(&(4, 4)));
    assert_eq!(reports.len(), 5);
    assert_eq!(roots.borrow().as_slice(), [fx.version_root.clone()]);
}

#[test]
fn test_content_index_with_no_matches_skips_scan() {
    let fx = build_store();
    let (engine, roots) = narrowed_engine(&fx, Some(Vec::new()));

    let (hits, reports) = search_with_progress(&engine, "twelve percent");
    assert!(hits.is_empty());
    assert!(reports.is_empty(), "no message is scanned");
    assert_eq!(roots.borrow().len(), 1);
}

#[test]
fn test_content_index_limits_to_listed_files() {
    let fx = build_store();
    let report = fx
        .version_root
        .join("ACCT-1")
        .join("Archive.mbox")
        .join("0B9E4D1A-0000-4C2B-8D3E-5F6A7B8C9D0E")
        .join("Data")
        .join("Attachments")
        .join("4")
        .join("3")
        .join("report.txt");
    let (engine, _roots) = narrowed_engine(&fx, Some(vec![report]));

    let (hits, reports) = search_with_progress(&engine, "twelve percent");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].filename, "report.txt");
    assert_eq!(reports.last(), Some(&(4, 4)));

    // Inline attachments have no file, so a narrowed search skips them.
    let (inline, reports) = search_with_progress(&engine, "attachment words");
    assert!(inline.is_empty());
    assert_eq!(reports.len(), 5);
}
