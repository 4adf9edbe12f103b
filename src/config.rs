//! Application configuration
//!
//! Read from the environment (a `.env` file is loaded first by `main`).

use crate::oauth::{gmail_config, OAuthConfig};
use std::path::PathBuf;

pub const DEFAULT_FOLDER: &str = "INBOX";
pub const DEFAULT_FETCH_LIMIT: u32 = 50;
pub const DEFAULT_RULES_FILE: &str = "rules.json";
pub const DEFAULT_OAUTH_PORT: u16 = 8080;

/// Full run configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub rules_path: PathBuf,
    pub token_path: PathBuf,
    /// Label id listed when refreshing the snapshot
    pub folder: String,
    pub fetch_limit: u32,
    pub oauth: OAuthConfig,
}

impl AppConfig {
    /// Build from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let data_dir = default_data_dir();

        let fetch_limit = match get("INBOX_RULES_FETCH_LIMIT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("Invalid INBOX_RULES_FETCH_LIMIT '{}', using {}", raw, DEFAULT_FETCH_LIMIT);
                DEFAULT_FETCH_LIMIT
            }),
            None => DEFAULT_FETCH_LIMIT,
        };

        let callback_port = match get("INBOX_RULES_OAUTH_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("Invalid INBOX_RULES_OAUTH_PORT '{}', using {}", raw, DEFAULT_OAUTH_PORT);
                DEFAULT_OAUTH_PORT
            }),
            None => DEFAULT_OAUTH_PORT,
        };

        Self {
            db_path: get("INBOX_RULES_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("emails.db")),
            rules_path: get("INBOX_RULES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_FILE)),
            token_path: get("INBOX_RULES_TOKEN")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("token.json")),
            folder: get("INBOX_RULES_FOLDER").unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            fetch_limit,
            oauth: gmail_config(
                get("GOOGLE_CLIENT_ID").unwrap_or_default(),
                get("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
                callback_port,
            ),
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.oauth.client_id.is_empty() {
            errors.push("GOOGLE_CLIENT_ID is required".to_string());
        }
        if self.oauth.client_secret.is_empty() {
            errors.push("GOOGLE_CLIENT_SECRET is required".to_string());
        }
        if self.fetch_limit == 0 {
            errors.push("INBOX_RULES_FETCH_LIMIT must be at least 1".to_string());
        }
        if self.folder.is_empty() {
            errors.push("INBOX_RULES_FOLDER must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Per-user data directory, or the working directory when none exists
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "inbox-rules", "inbox-rules")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
