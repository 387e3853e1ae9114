//! Error types for the application.

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discord error: {0}")]
    Discord(#[from] DiscordError),

    #[error("IRC error: {0}")]
    Irc(#[from] IrcError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Discord-related errors.
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
}

/// IRC-related errors.
#[derive(Debug, Error)]
pub enum IrcError {
    #[error("SASL authentication failed: {reason}")]
    SaslFailed { reason: String },

    #[error("IRC client error: {0}")]
    Client(#[from] irc::error::Error),
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for Discord operations.
pub type DiscordResult<T> = std::result::Result<T, DiscordError>;

/// Result type alias for IRC operations.
pub type IrcResult<T> = std::result::Result<T, IrcError>;
