//! Fetch-and-store of mailbox messages

use crate::db::{Database, DbError};
use crate::mail::{MailError, MessageSource};

/// Snapshot refresh errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Outcome of one refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub listed: usize,
    pub stored: usize,
    pub already_known: usize,
}

/// Copy up to `limit` messages of `folder` into the snapshot.
///
/// Ids already present are not fetched again; insert-if-absent keeps the
/// first stored copy either way.
pub async fn fetch_and_store<S>(
    source: &S,
    db: &Database,
    folder: &str,
    limit: u32,
) -> Result<FetchStats, SyncError>
where
    S: MessageSource + ?Sized,
{
    let ids = source.list_message_ids(folder, limit).await?;
    let mut stats = FetchStats {
        listed: ids.len(),
        ..Default::default()
    };

    for id in ids {
        if db.has_message(&id)? {
            stats.already_known += 1;
            continue;
        }

        let message = source.get_message(&id).await?;
        if db.insert_message(&message)? {
            stats.stored += 1;
        } else {
            stats.already_known += 1;
        }
    }

    log::info!(
        "Fetched {} message(s) from {}: {} new, {} already known",
        stats.listed,
        folder,
        stats.stored,
        stats.already_known
    );

    Ok(stats)
}
