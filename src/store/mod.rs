//! Access to the on-disk mail store databases.
//!
//! - [`index`]: the `Envelope Index` repository
//! - [`accounts`]: account identity snapshot
//! - [`schema`]: column introspection and loose value readers
//! - [`timestamp`]: dual-epoch timestamp decoding

pub mod accounts;
pub mod index;
pub mod schema;
pub mod timestamp;

pub use accounts::AccountDirectory;
pub use index::{MailIndex, MailboxRef, MessageSummary, SearchFilter};
