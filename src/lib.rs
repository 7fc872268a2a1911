//! `maildig`: read-only access to the macOS Mail store.
//!
//! The crate reads the `Envelope Index` database and the `.emlx` message
//! containers next to it, reconstructing messages, bodies and attachments
//! without ever writing to the store. [`engine::MailEngine`] is the entry
//! point; the other modules are its building blocks.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod locate;
pub mod model;
pub mod parser;
pub mod search;
pub mod store;

pub use engine::MailEngine;
pub use error::{MailError, Result};
