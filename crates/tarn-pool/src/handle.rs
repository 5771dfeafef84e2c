//! Borrowed connections

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tarn_core::{
    Connection, ConnectionMetadata, Error, Holdability, IsolationLevel, QueryResult, Result,
    Savepoint, SessionSnapshot, SqlWarning, Statement, StatementResult, TypeMap, Value,
};

use crate::error::{PoolError, ResetFailure};
use crate::pool::{PoolShared, Slot};


/// A connection borrowed from a `Pool`
///
/// Behaves exactly like the underlying connection, with two exceptions:
/// `close` returns the connection to the pool instead of closing it, and
/// statements prepared through it are closed when it is returned.
///
/// Returning the connection restores the session settings it had when the
/// pool opened it, so changes such as disabling autocommit or switching
/// schema are never seen by the next borrower.
///
/// Prefer `release` to dropping: dropping schedules the same work on the
/// current tokio runtime but can only log failures. If there is no runtime,
/// or the runtime shuts down before the scheduled reset runs, the connection
/// is returned with whatever session state the borrower left behind. The
/// same applies when a `release` future is dropped part way through.
pub struct PooledConnection {
    slot: Arc<Slot>,
    pool: Weak<PoolShared>,
    released: AtomicBool,
}

impl PooledConnection {
    pub(crate) fn new(slot: Arc<Slot>, pool: Weak<PoolShared>) -> Self {
        Self {
            slot,
            pool,
            released: AtomicBool::new(false),
        }
    }

    /// Stable identity of the pool slot backing this connection
    ///
    /// Acquiring the same slot again yields the same id.
    pub fn id(&self) -> usize {
        self.slot.id
    }

    /// Session settings captured when the pool opened this connection
    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.slot.snapshot
    }

    /// Number of statements opened during this borrow that will be closed on release
    pub fn open_statements(&self) -> usize {
        self.slot.statements.lock().len()
    }

    /// Return the connection to the pool
    ///
    /// The connection goes back to the pool even if some of its state could
    /// not be reset; those failures are reported as `PoolError::SessionReset`.
    pub async fn release(self) -> std::result::Result<(), PoolError> {
        self.release_inner().await
    }

    async fn release_inner(&self) -> std::result::Result<(), PoolError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let pending = PendingReturn::new(self.slot.clone(), self.pool.clone());
        let failures = self.slot.reset().await;
        pending.complete();

        if failures.is_empty() {
            tracing::debug!(handle = self.slot.id, "released pooled connection");
            Ok(())
        } else {
            log_reset_failures(self.slot.id, &failures);
            Err(PoolError::SessionReset {
                handle: self.slot.id,
                failures,
            })
        }
    }

    fn delegate(&self) -> Result<&dyn Connection> {
        if self.released.load(Ordering::Acquire) {
            return Err(Error::Closed(format!(
                "connection {} has been returned to the pool",
                self.slot.id
            )));
        }
        Ok(self.slot.delegate.as_ref())
    }

    fn track(&self, statement: Arc<dyn Statement>) -> Arc<dyn Statement> {
        self.slot.statements.lock().push(statement.clone());
        statement
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending = PendingReturn::new(self.slot.clone(), self.pool.clone());
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let slot = self.slot.clone();
                drop(runtime.spawn(async move {
                    let failures = slot.reset().await;
                    if !failures.is_empty() {
                        log_reset_failures(slot.id, &failures);
                    }
                    tracing::debug!(handle = slot.id, "released dropped pooled connection");
                    pending.complete();
                }));
            }
            Err(_) => {
                tracing::warn!(
                    handle = self.slot.id,
                    "pooled connection dropped outside a tokio runtime"
                );
                drop(pending);
            }
        }
    }
}

/// Puts a slot back on the pool when dropped, unless `complete` got there first
///
/// Held across the session reset. A cancelled release, or a reset task
/// discarded by a shutting-down runtime, returns the slot unreset.
struct PendingReturn {
    slot: Option<Arc<Slot>>,
    pool: Weak<PoolShared>,
}

impl PendingReturn {
    fn new(slot: Arc<Slot>, pool: Weak<PoolShared>) -> Self {
        Self {
            slot: Some(slot),
            pool,
        }
    }

    /// Return the slot after a finished reset
    fn complete(mut self) {
        if let Some(slot) = self.slot.take() {
            return_to_pool(&self.pool, slot);
        }
    }
}

impl Drop for PendingReturn {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::warn!(
                handle = slot.id,
                "returning pooled connection without restoring its session state"
            );
            return_to_pool(&self.pool, slot);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.slot.id)
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}

fn return_to_pool(pool: &Weak<PoolShared>, slot: Arc<Slot>) {
    match pool.upgrade() {
        Some(shared) => shared.requeue(slot),
        None => tracing::debug!(handle = slot.id, "pool dropped before connection was returned"),
    }
}

fn log_reset_failures(handle: usize, failures: &[ResetFailure]) {
    for failure in failures {
        tracing::warn!(handle, %failure, "failed to reset pooled connection");
    }
}

#[async_trait]
impl Connection for PooledConnection {
    fn driver_name(&self) -> &str {
        self.slot.delegate.driver_name()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.delegate()?.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.delegate()?.query(sql, params).await
    }

    async fn native_sql(&self, sql: &str) -> Result<String> {
        self.delegate()?.native_sql(sql).await
    }

    async fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>> {
        let statement = self.delegate()?.prepare(sql).await?;
        Ok(self.track(statement))
    }

    async fn prepare_call(&self, sql: &str) -> Result<Arc<dyn Statement>> {
        let statement = self.delegate()?.prepare_call(sql).await?;
        Ok(self.track(statement))
    }

    async fn commit(&self) -> Result<()> {
        self.delegate()?.commit().await
    }

    async fn rollback(&self) -> Result<()> {
        self.delegate()?.rollback().await
    }

    async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint> {
        self.delegate()?.set_savepoint(name).await
    }

    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.delegate()?.rollback_to_savepoint(savepoint).await
    }

    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        self.delegate()?.release_savepoint(savepoint).await
    }

    async fn metadata(&self) -> Result<ConnectionMetadata> {
        self.delegate()?.metadata().await
    }

    async fn warnings(&self) -> Result<Vec<SqlWarning>> {
        self.delegate()?.warnings().await
    }

    async fn clear_warnings(&self) -> Result<()> {
        self.delegate()?.clear_warnings().await
    }

    async fn is_valid(&self, timeout: Duration) -> Result<bool> {
        self.delegate()?.is_valid(timeout).await
    }

    async fn client_info(&self) -> Result<HashMap<String, String>> {
        self.delegate()?.client_info().await
    }

    async fn set_client_info(&self, name: &str, value: &str) -> Result<()> {
        self.delegate()?.set_client_info(name, value).await
    }

    async fn auto_commit(&self) -> Result<bool> {
        self.delegate()?.auto_commit().await
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.delegate()?.set_auto_commit(auto_commit).await
    }

    async fn catalog(&self) -> Result<Option<String>> {
        self.delegate()?.catalog().await
    }

    async fn set_catalog(&self, catalog: Option<&str>) -> Result<()> {
        self.delegate()?.set_catalog(catalog).await
    }

    async fn schema(&self) -> Result<Option<String>> {
        self.delegate()?.schema().await
    }

    async fn set_schema(&self, schema: Option<&str>) -> Result<()> {
        self.delegate()?.set_schema(schema).await
    }

    async fn holdability(&self) -> Result<Holdability> {
        self.delegate()?.holdability().await
    }

    async fn set_holdability(&self, holdability: Holdability) -> Result<()> {
        self.delegate()?.set_holdability(holdability).await
    }

    async fn is_read_only(&self) -> Result<bool> {
        self.delegate()?.is_read_only().await
    }

    async fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.delegate()?.set_read_only(read_only).await
    }

    async fn transaction_isolation(&self) -> Result<IsolationLevel> {
        self.delegate()?.transaction_isolation().await
    }

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<()> {
        self.delegate()?.set_transaction_isolation(level).await
    }

    async fn type_map(&self) -> Result<TypeMap> {
        self.delegate()?.type_map().await
    }

    async fn set_type_map(&self, type_map: TypeMap) -> Result<()> {
        self.delegate()?.set_type_map(type_map).await
    }

    /// Return the connection to the pool; the underlying connection stays open
    async fn close(&self) -> Result<()> {
        self.release_inner().await.map_err(Error::from)
    }

    /// Whether the underlying connection is closed
    fn is_closed(&self) -> bool {
        self.slot.delegate.is_closed()
    }
}
