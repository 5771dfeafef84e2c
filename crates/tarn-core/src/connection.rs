//! Connection and statement traits

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    ConnectionMetadata, Holdability, IsolationLevel, QueryResult, Result, Savepoint, SqlWarning,
    StatementResult, TypeMap, Value,
};

/// A live session with the backend
///
/// This is the full command surface a client library offers for one
/// connection. Session setters take effect for the remainder of the session;
/// the pool relies on the getters and setters being exact inverses.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgres", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Translate `sql` into the backend's native grammar without running it
    async fn native_sql(&self, sql: &str) -> Result<String> {
        Ok(sql.to_string())
    }

    /// Prepare `sql` for repeated execution
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>>;

    /// Prepare a stored procedure call
    async fn prepare_call(&self, sql: &str) -> Result<Arc<dyn Statement>> {
        let _ = sql;
        Err(crate::Error::NotSupported(format!(
            "stored procedure calls are not supported by {}",
            self.driver_name()
        )))
    }

    /// Commit the current transaction
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction
    async fn rollback(&self) -> Result<()>;

    /// Create a savepoint in the current transaction
    ///
    /// Unnamed savepoints get a name chosen by the backend.
    async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint> {
        let _ = name;
        Err(crate::Error::NotSupported(format!(
            "savepoints are not supported by {}",
            self.driver_name()
        )))
    }

    /// Roll back to a savepoint, keeping the transaction open
    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        let _ = savepoint;
        Err(crate::Error::NotSupported(format!(
            "savepoints are not supported by {}",
            self.driver_name()
        )))
    }

    /// Release a savepoint
    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        let _ = savepoint;
        Err(crate::Error::NotSupported(format!(
            "savepoints are not supported by {}",
            self.driver_name()
        )))
    }

    /// Describe the connection and backend
    async fn metadata(&self) -> Result<ConnectionMetadata>;

    /// Warnings reported since the last `clear_warnings`
    async fn warnings(&self) -> Result<Vec<SqlWarning>> {
        Ok(Vec::new())
    }

    async fn clear_warnings(&self) -> Result<()> {
        Ok(())
    }

    /// Check whether the connection can still reach the backend
    async fn is_valid(&self, timeout: Duration) -> Result<bool>;

    async fn client_info(&self) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn set_client_info(&self, name: &str, value: &str) -> Result<()> {
        let _ = (name, value);
        Err(crate::Error::NotSupported(format!(
            "client info is not supported by {}",
            self.driver_name()
        )))
    }

    async fn auto_commit(&self) -> Result<bool>;

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    async fn catalog(&self) -> Result<Option<String>>;

    async fn set_catalog(&self, catalog: Option<&str>) -> Result<()>;

    async fn schema(&self) -> Result<Option<String>>;

    async fn set_schema(&self, schema: Option<&str>) -> Result<()>;

    async fn holdability(&self) -> Result<Holdability>;

    async fn set_holdability(&self, holdability: Holdability) -> Result<()>;

    async fn is_read_only(&self) -> Result<bool>;

    async fn set_read_only(&self, read_only: bool) -> Result<()>;

    async fn transaction_isolation(&self) -> Result<IsolationLevel>;

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<()>;

    async fn type_map(&self) -> Result<TypeMap>;

    async fn set_type_map(&self, type_map: TypeMap) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A statement opened against a connection
///
/// Statements hold server-side resources (prepared plans, open cursors) and
/// must be closed before the connection that created them changes hands.
#[async_trait]
pub trait Statement: Send + Sync {
    /// SQL the statement was prepared with
    fn sql(&self) -> &str;

    /// Execute the statement with parameters
    async fn execute(&self, params: &[Value]) -> Result<StatementResult>;

    /// Query the statement with parameters
    async fn query(&self, params: &[Value]) -> Result<QueryResult>;

    /// Close/deallocate the statement
    ///
    /// Closing an already closed statement is a no-op.
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}
