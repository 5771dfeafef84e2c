//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls how many connections the pool opens and how long `get` waits
/// for one to become available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of connections opened at construction and kept for the pool's lifetime
    capacity: usize,
    /// Timeout in milliseconds used by `Pool::get`
    acquire_timeout_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0,
            "capacity must be greater than 0, got {}",
            capacity
        );

        Self {
            capacity,
            acquire_timeout_ms: 60_000, // 1 minute default
        }
    }

    /// Set the default acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the default acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    /// Defaults:
    /// - capacity: 10
    /// - acquire_timeout: 1 minute
    fn default() -> Self {
        Self::new(10)
    }
}
