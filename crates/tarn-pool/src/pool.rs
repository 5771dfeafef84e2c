//! Connection pool implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tarn_core::{ConnectOptions, Connection, Driver, SessionSnapshot, Statement};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::error::{PoolError, ResetFailure, TeardownFailure};
use crate::factory::{ConnectionFactory, DriverFactory};
use crate::handle::PooledConnection;
use crate::stats::PoolStats;

/// One raw connection and the state the pool keeps for it
///
/// A slot lives as long as the pool. Borrowing hands out a
/// `PooledConnection` pointing at the slot; releasing puts the slot back.
pub(crate) struct Slot {
    pub(crate) id: usize,
    pub(crate) delegate: Arc<dyn Connection>,
    pub(crate) snapshot: SessionSnapshot,
    /// Statements opened during the current borrow
    pub(crate) statements: Mutex<Vec<Arc<dyn Statement>>>,
}

impl Slot {
    fn new(id: usize, delegate: Arc<dyn Connection>, snapshot: SessionSnapshot) -> Self {
        Self {
            id,
            delegate,
            snapshot,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Restore the snapshot and close the borrow's statements
    ///
    /// Every step is attempted; failures are collected rather than returned early.
    pub(crate) async fn reset(&self) -> Vec<ResetFailure> {
        let mut failures: Vec<ResetFailure> = self
            .snapshot
            .restore(self.delegate.as_ref())
            .await
            .into_iter()
            .map(ResetFailure::Setting)
            .collect();

        let statements = std::mem::take(&mut *self.statements.lock());
        for statement in statements {
            if statement.is_closed() {
                continue;
            }
            if let Err(error) = statement.close().await {
                failures.push(ResetFailure::Statement {
                    sql: statement.sql().to_string(),
                    error,
                });
            }
        }

        failures
    }
}

/// Available slots, most recently released last
struct Idle {
    stack: Vec<Arc<Slot>>,
    borrowed: usize,
}

pub(crate) struct PoolShared {
    config: PoolConfig,
    idle: Mutex<Idle>,
    /// One permit per slot on the idle stack
    semaphore: Semaphore,
    /// Every raw connection the pool opened, in open order
    registry: Vec<Arc<dyn Connection>>,
    waiting: AtomicUsize,
    closed: AtomicBool,
}

impl PoolShared {
    /// Put a slot back on the idle stack
    ///
    /// Never waits: the slot was counted as borrowed, so the stack has room.
    pub(crate) fn requeue(&self, slot: Arc<Slot>) {
        {
            let mut idle = self.idle.lock();
            idle.borrowed = idle.borrowed.saturating_sub(1);
            idle.stack.push(slot);
        }
        self.semaphore.add_permits(1);
    }
}

/// A fixed-size pool of database connections
///
/// All connections are opened up front by `Pool::new`. Callers borrow one
/// with `acquire` and give it back with `PooledConnection::release`; the most
/// recently released connection is always the next one handed out.
///
/// Connections are not validated before being handed out. A connection whose
/// transport has failed stays in circulation until the pool is shut down.
///
/// `Pool` is a cheap handle; clones share the same connections.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    /// Open `config.capacity()` connections through `factory` and build a pool over them
    ///
    /// Construction is all-or-nothing. If any connection fails to open, or
    /// its session settings cannot be read, every connection opened so far is
    /// closed and `PoolError::Initialization` is returned.
    pub async fn new<F: ConnectionFactory>(factory: F, config: PoolConfig) -> Result<Self, PoolError> {
        let capacity = config.capacity();
        if capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "capacity must be greater than 0".into(),
            ));
        }

        let mut registry: Vec<Arc<dyn Connection>> = Vec::with_capacity(capacity);
        let mut slots = Vec::with_capacity(capacity);

        for index in 0..capacity {
            let connection = match factory.open().await {
                Ok(connection) => connection,
                Err(source) => return Err(abort_initialization(&registry, index, source).await),
            };
            registry.push(connection.clone());

            let snapshot = match SessionSnapshot::capture(connection.as_ref()).await {
                Ok(snapshot) => snapshot,
                Err(source) => return Err(abort_initialization(&registry, index, source).await),
            };
            slots.push(Arc::new(Slot::new(index, connection, snapshot)));
        }

        // Pop from the end, so the first acquire gets slot 0.
        slots.reverse();

        tracing::info!(capacity, "connection pool initialized");

        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                idle: Mutex::new(Idle {
                    stack: slots,
                    borrowed: 0,
                }),
                semaphore: Semaphore::new(capacity),
                registry,
                waiting: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Build a pool of `capacity` connections opened by `driver` against `options`
    pub async fn connect<D: Driver + 'static>(
        driver: Arc<D>,
        options: ConnectOptions,
        capacity: usize,
    ) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "capacity must be greater than 0".into(),
            ));
        }
        Self::new(DriverFactory::new(driver, options), PoolConfig::new(capacity)).await
    }

    /// Borrow a connection, waiting up to the configured acquire timeout
    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        self.acquire(self.shared.config.acquire_timeout()).await
    }

    /// Borrow a connection, waiting up to `timeout` for one to be released
    ///
    /// Returns `PoolError::AcquisitionTimeout` if none became available in
    /// time, and `PoolError::Closed` once the pool has been shut down. Dropping
    /// the returned future abandons the wait without taking a connection.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledConnection, PoolError> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let _waiting = WaitingGuard::new(&shared.waiting);

        let permit = match tokio::time::timeout(timeout, shared.semaphore.acquire()).await {
            Ok(Ok(permit)) => permit,
            // The semaphore is only closed by shutdown.
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                tracing::debug!(?timeout, "timed out waiting for a pooled connection");
                return Err(PoolError::AcquisitionTimeout(timeout));
            }
        };

        if shared.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let slot = {
            let mut idle = shared.idle.lock();
            // Permits track the stack length, so holding one guarantees a slot.
            let Some(slot) = idle.stack.pop() else {
                return Err(PoolError::Closed);
            };
            idle.borrowed += 1;
            permit.forget();
            slot
        };

        tracing::debug!(handle = slot.id, "acquired pooled connection");
        Ok(PooledConnection::new(slot, Arc::downgrade(shared)))
    }

    /// Like `acquire`, but gives up with `PoolError::InterruptedWait` once `cancel` fires
    ///
    /// A connection is never handed out after cancellation has been observed.
    pub async fn acquire_with_cancel(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PooledConnection, PoolError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("wait for a pooled connection was cancelled");
                Err(PoolError::InterruptedWait)
            }
            result = self.acquire(timeout) => result,
        }
    }

    /// Close every connection the pool opened
    ///
    /// Connections are closed whether they are idle or borrowed; using a
    /// borrowed connection after shutdown is not supported. Every close is
    /// attempted and failures are reported together as
    /// `PoolError::Teardown`. Subsequent calls do nothing.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("connection pool already shut down");
            return Ok(());
        }
        shared.semaphore.close();

        let borrowed = shared.idle.lock().borrowed;
        if borrowed > 0 {
            tracing::warn!(borrowed, "shutting down pool with borrowed connections");
        }

        let mut failures = Vec::new();
        for (index, connection) in shared.registry.iter().enumerate() {
            if let Err(error) = connection.close().await {
                tracing::warn!(index, %error, "failed to close pooled connection");
                failures.push(TeardownFailure { index, error });
            }
        }

        tracing::info!(
            capacity = shared.registry.len(),
            failed = failures.len(),
            "connection pool shut down"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Teardown { failures })
        }
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let (available, borrowed) = {
            let idle = self.shared.idle.lock();
            (idle.stack.len(), idle.borrowed)
        };
        PoolStats::new(
            self.capacity(),
            available,
            borrowed,
            self.shared.waiting.load(Ordering::SeqCst),
        )
    }

    pub fn capacity(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Whether `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Close the connections opened by a failed construction attempt
async fn abort_initialization(
    registry: &[Arc<dyn Connection>],
    index: usize,
    source: tarn_core::Error,
) -> PoolError {
    tracing::warn!(index, error = %source, "failed to initialize pooled connection");
    for (opened, connection) in registry.iter().enumerate() {
        if let Err(error) = connection.close().await {
            tracing::warn!(index = opened, %error, "failed to close connection after aborted initialization");
        }
    }
    PoolError::Initialization { index, source }
}

/// Counts a caller as waiting until it leaves `acquire`, however it leaves
struct WaitingGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> WaitingGuard<'a> {
    fn new(waiting: &'a AtomicUsize) -> Self {
        waiting.fetch_add(1, Ordering::SeqCst);
        Self { waiting }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}
