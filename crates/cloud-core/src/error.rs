//! Error types for the cloud file layer

use thiserror::Error;

/// Result type alias using the cloud Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cloud storage operations
///
/// The taxonomy is deliberately small: `NotFound` is recoverable by the
/// caller (e.g. create-on-first-write), `Io` aborts the current file or
/// operation, and `InvalidArgument` is fatal at startup. Retry policy
/// lives entirely in the backend; none of these variants carries a
/// retry hint.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Error::Io {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true if this error means the object or bucket is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if this error indicates a fatal setup problem
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound {
                what: e.to_string(),
            }
        } else {
            Error::Io {
                message: e.to_string(),
            }
        }
    }
}
