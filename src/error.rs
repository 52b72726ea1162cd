use crate::browser::BrowserError;

/// Crate-wide error type returned by the top-level operations
#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Not authenticated: {0}. Run `auth` to log in first")]
    AuthenticationRequired(String),

    #[error("Saved session expired (captured {0}). Run `auth --force` to log in again")]
    SessionExpired(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
