//! Error types for the orchestration core.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that abort an operation instead of folding into a `false` result.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not complete the round trip (connect, DNS, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },

    /// A read endpoint answered with a non-2xx status.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build an `InvalidUrl` error from anything displayable.
    pub fn invalid_url(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for non-2xx responses, which callers may downgrade to `false`.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { .. })
    }
}
