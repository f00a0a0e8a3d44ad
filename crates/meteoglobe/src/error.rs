//! Error types for the meteoglobe crate.

use std::fmt;

/// Result type for meteoglobe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the globe's external services.
#[derive(Debug)]
pub enum Error {
    /// HTTP request failed.
    Http {
        /// The URL that failed.
        url: String,
        /// The error message.
        message: String,
    },
    /// HTTP response had a non-success status code.
    HttpStatus {
        /// The URL that returned the error.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
    /// Image bytes could not be decoded.
    Decode {
        /// Context for where the error occurred.
        context: &'static str,
        /// The error message.
        message: String,
    },
    /// Boundary geometry was missing or malformed.
    Geometry {
        /// Description of what was invalid.
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http { url, message } => {
                write!(f, "http request to {url} failed: {message}")
            }
            Error::HttpStatus { url, status } => {
                write!(f, "http request to {url} returned status {status}")
            }
            Error::Decode { context, message } => {
                write!(f, "failed to decode {context}: {message}")
            }
            Error::Geometry { detail } => {
                write!(f, "invalid boundary geometry: {detail}")
            }
        }
    }
}

impl std::error::Error for Error {}
