//! Error types for the Jiten library.
//!
//! All fallible operations return [`JitenError`]. The variants follow the way
//! failures are meant to be handled:
//!
//! - [`JitenError::Format`] - a file or region is not a valid dictionary
//!   structure (bad magic, newer version, malformed counts). Never recoverable.
//! - [`JitenError::InvalidOperation`] - a programmer error such as searching
//!   before build/load, an empty normalized key or an unencodable character.
//! - [`JitenError::Query`] - the end user supplied a query that cannot be run.
//! - [`JitenError::Io`] / [`JitenError::Storage`] - the underlying file or
//!   storage backend failed; these are propagated unchanged.
//! - [`JitenError::Anyhow`] - any of the above with context attached by the
//!   command-line front end.
//!
//! # Examples
//!
//! ```
//! use jiten::error::{JitenError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(JitenError::query("query must contain at least one positive term"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Jiten operations.
#[derive(Error, Debug)]
pub enum JitenError {
    /// I/O errors from the underlying file or stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Structural errors in a dictionary file or binary region.
    #[error("Format error: {0}")]
    Format(String),

    /// Precondition violations (use before build/load, bad keys, overflow).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Query-related errors reported back to the user.
    #[error("Query error: {0}")]
    Query(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error wrapped with caller context, shown with its whole chain.
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with JitenError.
pub type Result<T> = std::result::Result<T, JitenError>;

impl JitenError {
    /// Create a new format error.
    pub fn format<S: Into<String>>(msg: S) -> Self {
        JitenError::Format(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        JitenError::InvalidOperation(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        JitenError::Query(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        JitenError::Storage(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        JitenError::InvalidOperation(format!("Invalid argument: {}", msg.into()))
    }

    /// Whether this error indicates a corrupt or foreign file.
    pub fn is_format_error(&self) -> bool {
        matches!(self, JitenError::Format(_))
    }
}
