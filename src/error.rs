//! Error types for mail-notify.

use std::path::PathBuf;

/// Error type for a notification run once the message is parsed and routed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Team rule {pattern:?} refers to unknown webhook {name:?}")]
    UnknownWebhook { pattern: String, name: String },
}

/// Raw message parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed MIME message: {0}")]
    Mime(#[from] mailparse::MailParseError),
}

/// Strict charset / transfer decoding errors (header fields only; bodies
/// always decode lossily).
#[derive(Debug, thiserror::Error)]
pub enum CharsetError {
    #[error("Malformed {charset} byte sequence")]
    Malformed { charset: String },

    #[error("Invalid base64 in encoded word: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid quoted-printable escape in encoded word: {0:?}")]
    QuotedPrintable(String),
}

/// Recipient routing errors. `address` is the full decoded `To` header.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("team not found: {address}")]
    TeamNotFound { address: String },

    #[error("channel not found: {address}")]
    ChannelNotFound { address: String },
}

/// Delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for mail-notify.
pub type Result<T> = std::result::Result<T, Error>;
