//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Point-in-time view of a pool's handles
///
/// `available` and `borrowed` are read under the same lock, so they always
/// sum to `capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    capacity: usize,
    available: usize,
    borrowed: usize,
    /// Number of callers currently waiting in `acquire`
    waiting: usize,
}

impl PoolStats {
    pub fn new(capacity: usize, available: usize, borrowed: usize, waiting: usize) -> Self {
        Self {
            capacity,
            available,
            borrowed,
            waiting,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of handles ready to be acquired
    pub fn available(&self) -> usize {
        self.available
    }

    /// Get the number of handles currently held by callers
    pub fn borrowed(&self) -> usize {
        self.borrowed
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Check if every handle is borrowed
    pub fn is_exhausted(&self) -> bool {
        self.available == 0 && self.capacity > 0
    }
}
