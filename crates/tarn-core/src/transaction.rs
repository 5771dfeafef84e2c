//! Savepoints within a connection's current transaction

use serde::{Deserialize, Serialize};

/// A savepoint within a transaction.
///
/// Savepoints are named markers that allow rolling back part of a
/// transaction without aborting all of it. They are only meaningful on the
/// connection that created them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    /// Create a new savepoint with the given name.
    ///
    /// Savepoint names should follow database-specific naming rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Savepoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
