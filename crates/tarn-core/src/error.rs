//! Error types for tarn connections

use thiserror::Error;

/// Error raised by a raw connection or one of its statements
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement error: {0}")]
    Statement(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Closed: {0}")]
    Closed(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Pool error: {0}")]
    Pool(String),
}

impl Error {
    /// Whether this error reports an operation against a closed connection or statement
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed(_))
    }
}

/// Result type alias for tarn connection operations
pub type Result<T> = std::result::Result<T, Error>;
