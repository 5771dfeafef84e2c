//! Error types for pool operations

use std::fmt;
use std::time::Duration;

use tarn_core::{Error, SessionSetting, SettingFailure};
use thiserror::Error;

/// Error raised by `Pool` and `PooledConnection`
#[derive(Error, Debug)]
pub enum PoolError {
    /// Opening or inspecting one of the pool's connections failed during construction
    #[error("Failed to initialize connection {index} of the pool: {source}")]
    Initialization {
        index: usize,
        #[source]
        source: Error,
    },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Timed out waiting for a connection (timeout: {0:?})")]
    AcquisitionTimeout(Duration),

    #[error("Wait for a connection was cancelled")]
    InterruptedWait,

    /// The handle was returned to the pool, but not all of its state could be reset
    #[error(
        "Connection {handle} returned to the pool with unrestored state: {}",
        join(.failures)
    )]
    SessionReset {
        handle: usize,
        failures: Vec<ResetFailure>,
    },

    #[error("Failed to close {} pool connection(s): {}", .failures.len(), join(.failures))]
    Teardown { failures: Vec<TeardownFailure> },

    #[error("Pool is closed")]
    Closed,
}

impl PoolError {
    /// Whether the caller can reasonably retry the operation on the same pool
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::AcquisitionTimeout(_))
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Closed => Error::Closed(err.to_string()),
            PoolError::AcquisitionTimeout(_) => Error::Timeout(err.to_string()),
            PoolError::SessionReset { .. } => Error::Session(err.to_string()),
            other => Error::Pool(other.to_string()),
        }
    }
}

/// Part of a handle's state that release could not put back
#[derive(Debug)]
pub enum ResetFailure {
    /// A session setting could not be restored to its snapshot value
    Setting(SettingFailure),
    /// A statement opened during the borrow could not be closed
    Statement { sql: String, error: Error },
}

impl ResetFailure {
    pub fn setting(&self) -> Option<SessionSetting> {
        match self {
            ResetFailure::Setting(failure) => Some(failure.setting),
            ResetFailure::Statement { .. } => None,
        }
    }
}

impl fmt::Display for ResetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetFailure::Setting(failure) => write!(f, "{}", failure),
            ResetFailure::Statement { sql, error } => write!(f, "statement `{}`: {}", sql, error),
        }
    }
}

/// A registry connection that failed to close during shutdown
#[derive(Debug)]
pub struct TeardownFailure {
    /// Position of the connection in the pool's registry
    pub index: usize,
    pub error: Error,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {}: {}", self.index, self.error)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
