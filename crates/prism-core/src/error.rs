//! Error types for the Prism orchestration engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the Prism engine.
///
/// This provides typed, structured error variants with constructor helpers.
/// Note that an explicit stop is never represented here: cancellation is a
/// normal lifecycle outcome (`Stopped`), not an error. Likewise, gated
/// operations (creating a fusion without enough ready rays or without a
/// selected factory/model) no-op and report through their return values
/// instead of producing an error.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum PrismError {
    /// An underlying generation job failed. The provider's message is
    /// retained verbatim for display on the affected ray or fusion.
    #[error("Generation failed: {message}")]
    Generation { message: String },

    /// A fusion referenced a merge strategy id that is not registered.
    #[error("Unknown fusion factory: '{id}'")]
    FactoryNotFound { id: String },

    /// Configuration error (invalid limits, unparsable config file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An adapter event stream ended without reporting a terminal event.
    #[error("Generation stream closed unexpectedly: {0}")]
    ChannelClosed(String),

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PrismError {
    /// Creates a Generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Creates a FactoryNotFound error.
    pub fn factory_not_found(id: impl Into<String>) -> Self {
        Self::FactoryNotFound { id: id.into() }
    }

    /// Creates a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a ChannelClosed error.
    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::ChannelClosed(message.into())
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error originated in a generation job.
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }

    /// Returns true if this error is a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Convenience result alias for Prism operations.
pub type Result<T> = std::result::Result<T, PrismError>;

impl From<toml::de::Error> for PrismError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_keeps_provider_message() {
        let err = PrismError::generation("rate limit exceeded");
        assert!(err.is_generation());
        assert_eq!(err.to_string(), "Generation failed: rate limit exceeded");
    }

    #[test]
    fn test_error_round_trips_through_serde() {
        let err = PrismError::factory_not_found("best-of");
        let json = serde_json::to_string(&err).unwrap();
        let back: PrismError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), err.to_string());
    }
}
