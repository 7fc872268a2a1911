//! Core data model types: accounts, mailboxes, messages, addresses, attachments.

pub mod account;
pub mod address;
pub mod attachment;
pub mod mailbox;
pub mod message;
