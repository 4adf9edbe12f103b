//! Sync Module - Mailbox snapshot refresh
//!
//! Pulls messages from a `MessageSource` into the local snapshot database.
//! Messages already in the snapshot are kept as first fetched.

pub mod fetch;

// Re-export commonly used types
pub use fetch::{fetch_and_store, FetchStats, SyncError};
