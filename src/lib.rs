//! # Inbox Rules
//!
//! Applies user-defined filtering rules to a local snapshot of a Gmail
//! mailbox: label changes, read/unread marking, and moves.

pub mod config;
pub mod db;
pub mod filters;
pub mod mail;
pub mod oauth;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use config::AppConfig;
use db::{Database, DbError};
use filters::{JsonRuleFile, RuleEngine, RuleError, RuleSource, RunSummary};
use mail::{GmailClient, MailError};
use oauth::OAuthError;
use sync::SyncError;

/// Top-level error for one run
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ============================================================================
// Application Entry Point
// ============================================================================

/// Refresh the snapshot from Gmail, then apply the rule file to it
pub async fn run(config: &AppConfig) -> Result<RunSummary, AppError> {
    config
        .validate()
        .map_err(|errors| AppError::Config(errors.join("; ")))?;

    log::info!("Database path: {:?}", config.db_path);
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create data directory {:?}: {}", parent, e))
        })?;
    }
    let db = Database::new(config.db_path.clone())?;

    let access_token = oauth::authorize(&config.oauth, &config.token_path).await?;
    let gmail = GmailClient::new(access_token)?;

    sync::fetch_and_store(&gmail, &db, &config.folder, config.fetch_limit).await?;

    let rules = JsonRuleFile::new(&config.rules_path).load_rules()?;
    let messages = db.get_messages()?;

    let summary = RuleEngine::new(&gmail).run(&messages, &rules).await?;
    Ok(summary)
}
