//! Error types for Clipbot.

use thiserror::Error;

/// Maximum length of an error message shown to a chat user.
pub const USER_MESSAGE_LIMIT: usize = 200;

/// Library-level error type for Clipbot operations.
#[derive(Error, Debug)]
pub enum ClipperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Video processing failed: {0}")]
    ToolFailed(String),

    #[error("No clips were created. {0}")]
    NoClips(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClipperError {
    /// Error text suitable for a chat reply, bounded to [`USER_MESSAGE_LIMIT`] characters.
    pub fn user_message(&self) -> String {
        truncate_message(&self.to_string(), USER_MESSAGE_LIMIT)
    }
}

/// Truncate `text` to at most `limit` characters, appending `...` when cut.
pub fn truncate_message(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Result type alias for Clipbot operations.
pub type Result<T> = std::result::Result<T, ClipperError>;
