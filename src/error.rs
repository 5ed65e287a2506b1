//! Error types for the cluster detector

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the cluster detector
#[derive(Error, Debug)]
pub enum Error {
    // Request errors
    #[error("{0}")]
    InvalidRequest(String),

    // Store errors
    #[error("Failed to fetch {what}: {reason}")]
    DataFetch { what: &'static str, reason: String },

    #[error("Failed to persist clusters: {0}")]
    Persistence(String),

    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP timeout after {0}ms")]
    HttpTimeout(u64),

    #[error("RPC error: {0}")]
    Rpc(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),

    // Serialization errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Shorthand for a failed read from one of the input stores
    pub fn fetch(what: &'static str, reason: impl ToString) -> Self {
        Error::DataFetch {
            what,
            reason: reason.to_string(),
        }
    }

    /// Check if this error was caused by the caller (maps to HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRequest(_) | Error::InvalidWallet(_))
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Deserialization(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(Error::InvalidRequest("token_id is required".into()).is_client_error());
        assert!(!Error::Persistence("insert failed".into()).is_client_error());
        assert!(!Error::fetch("transactions", "timeout").is_client_error());
    }

    #[test]
    fn test_invalid_request_message_is_verbatim() {
        let e = Error::InvalidRequest("token_id is required".into());
        assert_eq!(e.to_string(), "token_id is required");
    }

    #[test]
    fn test_fetch_message() {
        let e = Error::fetch("wallet analytics", "connection refused");
        assert_eq!(
            e.to_string(),
            "Failed to fetch wallet analytics: connection refused"
        );
    }
}
