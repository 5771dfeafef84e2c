//! Connection factories used to fill a pool

use std::sync::Arc;

use async_trait::async_trait;
use tarn_core::{ConnectOptions, Connection, Driver, Result};

/// Factory trait for opening the pool's raw connections
///
/// The pool calls `open` exactly `capacity` times while it is being built
/// and never again.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a new connection
    async fn open(&self) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn open(&self) -> Result<Arc<dyn Connection>> {
        (**self).open().await
    }
}

/// Opens connections through a `Driver` with fixed `ConnectOptions`
pub struct DriverFactory<D> {
    driver: Arc<D>,
    options: ConnectOptions,
}

impl<D: Driver + 'static> DriverFactory<D> {
    pub fn new(driver: Arc<D>, options: ConnectOptions) -> Self {
        Self { driver, options }
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }
}

#[async_trait]
impl<D: Driver + 'static> ConnectionFactory for DriverFactory<D> {
    async fn open(&self) -> Result<Arc<dyn Connection>> {
        tracing::trace!(driver = self.driver.name(), url = %self.options.url, "opening connection");
        self.driver.connect(&self.options).await
    }
}
