//! Error types for Discord Scout.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from fetching messages out of an upstream channel.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Bot token rejected by the API")]
    Unauthorized,

    #[error("Bot lacks access to channel {channel_id}")]
    AccessDenied { channel_id: String },

    #[error("Channel {channel_id} not found")]
    NotFound { channel_id: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}
