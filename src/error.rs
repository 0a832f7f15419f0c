//! Error types shared across the relay.

/// Unified error type for the relay library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be read or deserialized.
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration was read but holds an unusable value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Transport-level failure talking to the webhook (connect, timeout, body).
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook answered with something other than 200.
    #[error("webhook returned status {0}")]
    WebhookStatus(u16),

    /// Failure reported by the messaging session adapter.
    #[error("session error: {0}")]
    Session(String),

    /// A JID with no usable user part.
    #[error("invalid account identifier: {0:?}")]
    InvalidJid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
