//! Error types for Excerpo operations.
//!
//! This module defines the main error type [`ExcerpoError`] which represents
//! all possible errors that can occur during content extraction, Markdown
//! conversion, and knowledge-base export operations.
//!
//! # Example
//!
//! ```rust
//! use excerpo_core::{ExcerpoError, Result};
//!
//! fn clip(html: &str) -> Result<String> {
//!     if html.is_empty() {
//!         return Err(ExcerpoError::ExtractionEmpty);
//!     }
//!     // ... extraction logic
//!     # Ok(String::new())
//! }
//! ```

use thiserror::Error;

use sxd_xpath::ExecutionError;

/// Main error type for clipping and export operations.
///
/// The API client variants carry a deliberate distinction: `Unauthorized`
/// means the stored credential was rejected (and has been cleared), so
/// callers can reopen the pairing flow instead of showing a generic
/// failure message.
#[derive(Error, Debug)]
pub enum ExcerpoError {
    /// The service rejected the bearer token.
    ///
    /// The credential store has already been cleared by the time this is
    /// returned; the caller should re-run pairing.
    #[error("Not authorized: the stored pairing is no longer valid, pair again")]
    Unauthorized,

    /// The service answered with a non-2xx status.
    ///
    /// `message` carries the server-provided message field when the error
    /// body was parseable, otherwise the raw body text.
    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// A 2xx response was missing an expected field.
    ///
    /// Returned when e.g. a pairing challenge response carries neither of
    /// its known id fields, or a key exchange response has no token.
    #[error("Unexpected response from the service: {0}")]
    Protocol(String),

    /// Transport-level failure reaching the local service.
    #[error("Could not reach the knowledge-base service ({0}); check that the application is running")]
    Network(#[from] reqwest::Error),

    /// Request timeout.
    ///
    /// Returned when a page fetch exceeds the configured timeout duration.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Extraction produced no usable content.
    ///
    /// This is a distinct outcome, not a transformer failure: the page
    /// parsed fine but none of the configured selectors matched anything
    /// with content.
    #[error("No content could be extracted from the page")]
    ExtractionEmpty,

    /// Required user input is missing or malformed.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Another operation of the same class is already in flight.
    ///
    /// The single-flight guard rejects concurrent triggers deterministically
    /// instead of queuing them.
    #[error("A {0} operation is already in progress")]
    Busy(&'static str),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing errors.
    ///
    /// Returned when HTML cannot be parsed, often due to an invalid CSS
    /// selector.
    #[error("Failed to parse HTML: {0}")]
    HtmlParse(String),

    /// XPath evaluation errors from the selector tables.
    #[error("Selector error: {0}")]
    Selector(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(std::path::PathBuf),

    /// Durable storage I/O errors.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<ExecutionError> for ExcerpoError {
    fn from(err: ExecutionError) -> Self {
        ExcerpoError::Selector(err.to_string())
    }
}

/// Result type alias for ExcerpoError.
pub type Result<T> = std::result::Result<T, ExcerpoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExcerpoError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_request_failed_carries_status() {
        let err = ExcerpoError::RequestFailed { status: 500, message: "boom".into() };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_unauthorized_mentions_pairing() {
        let err = ExcerpoError::Unauthorized;
        assert!(err.to_string().contains("pair"));
    }

    #[test]
    fn test_busy_names_operation() {
        let err = ExcerpoError::Busy("export");
        assert!(err.to_string().contains("export"));
    }

    #[test]
    fn test_timeout_error() {
        let err = ExcerpoError::Timeout { timeout: 30 };
        assert!(err.to_string().contains("30"));
    }
}
