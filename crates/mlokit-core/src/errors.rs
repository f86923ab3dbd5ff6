//! Unified error system for MLOKit
//!
//! A single error type is surfaced to the caller. "Not found" is deliberately
//! absent: resolution steps report missing metadata as `Ok(None)` or an empty
//! list, and only transport, status, parse and configuration failures become
//! errors.

use serde::{Deserialize, Serialize};

/// Unified error type for all MLOKit operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MlokitError {
    /// Credential string did not match the platform's expected shape
    #[error("Invalid {platform} credential: {message}")]
    Credential {
        /// Platform whose credential shape was violated
        platform: String,
        /// Description of the mismatch
        message: String,
    },

    /// Remote returned an unexpected HTTP status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Numeric status code, surfaced verbatim
        status: u16,
        /// Request URL with any query string removed
        url: String,
    },

    /// Request exceeded the configured timeout
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout {
        /// Request URL with any query string removed
        url: String,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Connection, TLS or IO failure below the HTTP layer
    #[error("Transport error: {message}")]
    Transport {
        /// Error message describing the transport failure
        message: String,
    },

    /// Response body could not be decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the decoding failure
        message: String,
    },

    /// Configuration file or environment override is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Caller-supplied argument is invalid
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },
}

impl MlokitError {
    /// Create a credential shape error
    pub fn credential(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credential {
            platform: platform.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error. The query string is stripped from `url`
    /// so inline SAS tokens never reach error output.
    pub fn status(status: u16, url: &str) -> Self {
        Self::Status {
            status,
            url: redact_query(url).to_string(),
        }
    }

    /// Create a timeout error
    pub fn timeout(url: &str, timeout_ms: u64) -> Self {
        Self::Timeout {
            url: redact_query(url).to_string(),
            timeout_ms,
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Standard Result type for MLOKit operations
pub type Result<T> = std::result::Result<T, MlokitError>;

/// Strip the query string (and fragment) from a URL for logs and errors.
pub fn redact_query(url: &str) -> &str {
    match url.find(|c| c == '?' || c == '#') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

impl From<serde_json::Error> for MlokitError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for MlokitError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}
