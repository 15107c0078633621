// src/error.rs

//! Unified error handling for the broadcast pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A source could not be reached (network, timeout)
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// A single listing fragment was malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The persistent store is missing or failed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Sending a message failed
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite statement failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a fragment parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a store-unavailable error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::StoreUnavailable(message.to_string())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Failure to hand a message to the messaging platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The platform asked us to slow down
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Network fault, server error or rejected attachment; worth retrying
    #[error("transient failure: {0}")]
    Transient(String),

    /// The target can never receive this message (blocked, unknown chat)
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    /// Whether a retry with a reduced payload may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_classification() {
        assert!(DeliveryError::RateLimited { retry_after_secs: 3 }.is_transient());
        assert!(DeliveryError::Transient("timeout".into()).is_transient());
        assert!(!DeliveryError::Permanent("blocked".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::fetch("https://example.com", "timed out");
        assert_eq!(err.to_string(), "Fetch error for https://example.com: timed out");

        let err: AppError = DeliveryError::Permanent("chat not found".into()).into();
        assert_eq!(
            err.to_string(),
            "Delivery error: permanent failure: chat not found"
        );
    }
}
