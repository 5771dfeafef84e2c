//! Session-scoped connection settings
//!
//! A connection carries state that outlives individual statements: whether
//! it auto-commits, which catalog and schema unqualified names resolve
//! against, and so on. `SessionSnapshot` records these once so they can be
//! put back after a caller has changed them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Connection, Error, Result};

/// Transaction isolation level of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Transactions are not supported
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling of the level, as used in `SET TRANSACTION ISOLATION LEVEL`
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::None => "NONE",
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "NONE" => Ok(IsolationLevel::None),
            "READ UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(Error::Session(format!("unknown isolation level: {}", s))),
        }
    }
}

/// What happens to open cursors when a transaction commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holdability {
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

/// Mapping from backend user-defined type names to client-side type names
pub type TypeMap = BTreeMap<String, String>;

/// One of the settings recorded in a `SessionSnapshot`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSetting {
    AutoCommit,
    TypeMap,
    Catalog,
    Schema,
    Holdability,
    ReadOnly,
    Isolation,
}

impl fmt::Display for SessionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionSetting::AutoCommit => "autocommit",
            SessionSetting::TypeMap => "type map",
            SessionSetting::Catalog => "catalog",
            SessionSetting::Schema => "schema",
            SessionSetting::Holdability => "holdability",
            SessionSetting::ReadOnly => "read-only",
            SessionSetting::Isolation => "isolation level",
        };
        f.write_str(name)
    }
}

/// A setting that could not be written back during `SessionSnapshot::restore`
#[derive(Debug)]
pub struct SettingFailure {
    pub setting: SessionSetting,
    pub error: Error,
}

impl fmt::Display for SettingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.setting, self.error)
    }
}

/// Session settings read from a connection at a single point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub auto_commit: bool,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub holdability: Holdability,
    pub read_only: bool,
    pub isolation_level: IsolationLevel,
    pub type_map: TypeMap,
}

impl SessionSnapshot {
    /// Read every session setting from `conn`
    ///
    /// Fails on the first setting the connection cannot report.
    pub async fn capture(conn: &dyn Connection) -> Result<Self> {
        Ok(Self {
            auto_commit: conn.auto_commit().await?,
            catalog: conn.catalog().await?,
            schema: conn.schema().await?,
            holdability: conn.holdability().await?,
            read_only: conn.is_read_only().await?,
            isolation_level: conn.transaction_isolation().await?,
            type_map: conn.type_map().await?,
        })
    }

    /// Write every recorded setting back onto `conn`
    ///
    /// Each setting is attempted even if an earlier one failed. The returned
    /// list is empty when the connection is fully restored.
    pub async fn restore(&self, conn: &dyn Connection) -> Vec<SettingFailure> {
        let mut failures = Vec::new();
        let mut record = |setting: SessionSetting, result: Result<()>| {
            if let Err(error) = result {
                tracing::debug!(%setting, %error, "failed to restore session setting");
                failures.push(SettingFailure { setting, error });
            }
        };

        record(
            SessionSetting::AutoCommit,
            conn.set_auto_commit(self.auto_commit).await,
        );
        record(
            SessionSetting::TypeMap,
            conn.set_type_map(self.type_map.clone()).await,
        );
        record(
            SessionSetting::Catalog,
            conn.set_catalog(self.catalog.as_deref()).await,
        );
        record(
            SessionSetting::Schema,
            conn.set_schema(self.schema.as_deref()).await,
        );
        record(
            SessionSetting::Holdability,
            conn.set_holdability(self.holdability).await,
        );
        record(
            SessionSetting::ReadOnly,
            conn.set_read_only(self.read_only).await,
        );
        record(
            SessionSetting::Isolation,
            conn.set_transaction_isolation(self.isolation_level).await,
        );

        failures
    }
}
