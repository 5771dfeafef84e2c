//! In-memory connections for pool tests

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tarn_core::{
    ConnectOptions, Connection, ConnectionMetadata, Driver, Error, Holdability, IsolationLevel,
    QueryResult, Result, Savepoint, SessionSetting, Statement, StatementResult, TypeMap, Value,
};

use crate::ConnectionFactory;

#[derive(Debug, Clone)]
pub(crate) struct MockSession {
    pub auto_commit: bool,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub holdability: Holdability,
    pub read_only: bool,
    pub isolation_level: IsolationLevel,
    pub type_map: TypeMap,
}

impl Default for MockSession {
    fn default() -> Self {
        Self {
            auto_commit: true,
            catalog: Some("app".into()),
            schema: Some("public".into()),
            holdability: Holdability::HoldCursorsOverCommit,
            read_only: false,
            isolation_level: IsolationLevel::ReadCommitted,
            type_map: TypeMap::new(),
        }
    }
}

pub(crate) struct MockStatement {
    sql: String,
    closed: AtomicBool,
    fail_close: bool,
}

impl MockStatement {
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Statement for MockStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&self, _params: &[Value]) -> Result<StatementResult> {
        if self.closed() {
            return Err(Error::Closed("statement is closed".into()));
        }
        Ok(StatementResult::command(1))
    }

    async fn query(&self, _params: &[Value]) -> Result<QueryResult> {
        if self.closed() {
            return Err(Error::Closed("statement is closed".into()));
        }
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        if self.fail_close {
            return Err(Error::Statement("cursor is busy".into()));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed()
    }
}

/// Connection whose session state lives in memory
pub(crate) struct MockConnection {
    pub id: usize,
    session: Mutex<MockSession>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    fail_close: AtomicBool,
    fail_capture: AtomicBool,
    fail_statement_close: AtomicBool,
    failing_settings: Mutex<HashSet<SessionSetting>>,
    setting_delay: Mutex<Option<Duration>>,
    statements: Mutex<Vec<Arc<MockStatement>>>,
    executed: Mutex<Vec<String>>,
    commits: AtomicUsize,
}

impl MockConnection {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            session: Mutex::new(MockSession::default()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
            fail_capture: AtomicBool::new(false),
            fail_statement_close: AtomicBool::new(false),
            failing_settings: Mutex::new(HashSet::new()),
            setting_delay: Mutex::new(None),
            statements: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn session(&self) -> MockSession {
        self.session.lock().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn statements(&self) -> Vec<Arc<MockStatement>> {
        self.statements.lock().clone()
    }

    /// Make every later write of `setting` fail
    pub fn fail_setting(&self, setting: SessionSetting) {
        self.failing_settings.lock().insert(setting);
    }

    /// Make every later session setter sleep for `delay` before applying
    pub fn delay_settings(&self, delay: Duration) {
        *self.setting_delay.lock() = Some(delay);
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn fail_statement_close(&self) {
        self.fail_statement_close.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed(format!("mock connection {} is closed", self.id)));
        }
        Ok(())
    }

    async fn write(
        &self,
        setting: SessionSetting,
        apply: impl FnOnce(&mut MockSession),
    ) -> Result<()> {
        let delay = *self.setting_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_open()?;
        if self.failing_settings.lock().contains(&setting) {
            return Err(Error::Session(format!("cannot change {}", setting)));
        }
        apply(&mut self.session.lock());
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.check_open()?;
        self.executed.lock().push(sql.to_string());
        Ok(StatementResult::command(1))
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.check_open()?;
        self.executed.lock().push(sql.to_string());
        Ok(QueryResult::empty())
    }

    async fn native_sql(&self, sql: &str) -> Result<String> {
        Ok(sql.to_uppercase())
    }

    async fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>> {
        self.check_open()?;
        let statement = Arc::new(MockStatement {
            sql: sql.to_string(),
            closed: AtomicBool::new(false),
            fail_close: self.fail_statement_close.load(Ordering::SeqCst),
        });
        self.statements.lock().push(statement.clone());
        Ok(statement)
    }

    async fn prepare_call(&self, sql: &str) -> Result<Arc<dyn Statement>> {
        self.prepare(sql).await
    }

    async fn commit(&self) -> Result<()> {
        self.check_open()?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.check_open()
    }

    async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint> {
        self.check_open()?;
        Ok(Savepoint::new(name.unwrap_or("sp_1")))
    }

    async fn metadata(&self) -> Result<ConnectionMetadata> {
        Ok(ConnectionMetadata {
            product_name: "MockDB".into(),
            product_version: "1.0".into(),
            driver_name: "mock".into(),
            url: format!("mock://{}", self.id),
            username: None,
            supports_savepoints: true,
        })
    }

    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        Ok(!self.is_closed())
    }

    async fn auto_commit(&self) -> Result<bool> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(Error::Session("autocommit state unavailable".into()));
        }
        Ok(self.session.lock().auto_commit)
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.write(SessionSetting::AutoCommit, |s| s.auto_commit = auto_commit).await
    }

    async fn catalog(&self) -> Result<Option<String>> {
        Ok(self.session.lock().catalog.clone())
    }

    async fn set_catalog(&self, catalog: Option<&str>) -> Result<()> {
        self.write(SessionSetting::Catalog, |s| {
            s.catalog = catalog.map(str::to_string)
        })
        .await
    }

    async fn schema(&self) -> Result<Option<String>> {
        Ok(self.session.lock().schema.clone())
    }

    async fn set_schema(&self, schema: Option<&str>) -> Result<()> {
        self.write(SessionSetting::Schema, |s| {
            s.schema = schema.map(str::to_string)
        })
        .await
    }

    async fn holdability(&self) -> Result<Holdability> {
        Ok(self.session.lock().holdability)
    }

    async fn set_holdability(&self, holdability: Holdability) -> Result<()> {
        self.write(SessionSetting::Holdability, |s| s.holdability = holdability).await
    }

    async fn is_read_only(&self) -> Result<bool> {
        Ok(self.session.lock().read_only)
    }

    async fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.write(SessionSetting::ReadOnly, |s| s.read_only = read_only).await
    }

    async fn transaction_isolation(&self) -> Result<IsolationLevel> {
        Ok(self.session.lock().isolation_level)
    }

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<()> {
        self.write(SessionSetting::Isolation, |s| s.isolation_level = level).await
    }

    async fn type_map(&self) -> Result<TypeMap> {
        Ok(self.session.lock().type_map.clone())
    }

    async fn set_type_map(&self, type_map: TypeMap) -> Result<()> {
        self.write(SessionSetting::TypeMap, |s| s.type_map = type_map).await
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(Error::Connection(format!(
                "mock connection {} refused to close",
                self.id
            )));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Factory that keeps every connection it opens for later inspection
#[derive(Default)]
pub(crate) struct MockConnectionFactory {
    opened: Mutex<Vec<Arc<MockConnection>>>,
    fail_open_at: Option<usize>,
    fail_capture_at: Option<usize>,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the open with this zero-based index
    pub fn failing_open_at(mut self, index: usize) -> Self {
        self.fail_open_at = Some(index);
        self
    }

    /// Open this connection, but fail when its session settings are read
    pub fn failing_capture_at(mut self, index: usize) -> Self {
        self.fail_capture_at = Some(index);
        self
    }

    pub fn opened(&self) -> Vec<Arc<MockConnection>> {
        self.opened.lock().clone()
    }

    pub fn connection(&self, id: usize) -> Arc<MockConnection> {
        self.opened.lock()[id].clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn open(&self) -> Result<Arc<dyn Connection>> {
        let mut opened = self.opened.lock();
        let id = opened.len();
        if self.fail_open_at == Some(id) {
            return Err(Error::Connection("connection refused".into()));
        }
        let connection = Arc::new(MockConnection::new(id));
        if self.fail_capture_at == Some(id) {
            connection.fail_capture.store(true, Ordering::SeqCst);
        }
        opened.push(connection.clone());
        Ok(connection)
    }
}

/// Driver that records the options it was asked to connect with
#[derive(Default)]
pub(crate) struct MockDriver {
    pub connects: Mutex<Vec<ConnectOptions>>,
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Connection>> {
        let mut connects = self.connects.lock();
        let id = connects.len();
        connects.push(options.clone());
        Ok(Arc::new(MockConnection::new(id)))
    }
}

/// Initialize logging for tests if not already initialized
pub(crate) fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tarn_pool=debug")),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
