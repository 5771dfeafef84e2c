//! Tarn Pool - A fixed-size pool of reusable database connections
//!
//! The pool opens all of its connections up front and lends them out one
//! caller at a time. A borrowed `PooledConnection` can be used anywhere a
//! `tarn_core::Connection` is expected; returning it resets the session
//! settings the borrower changed and closes the statements it left open.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tarn_core::{ConnectOptions, Connection};
//! use tarn_pool::Pool;
//!
//! let options = ConnectOptions::new("postgres://localhost:5432/app")
//!     .with_credentials("app", "secret");
//! let pool = Pool::connect(driver, options, 10).await?;
//!
//! let conn = pool.acquire(Duration::from_secs(5)).await?;
//! let statement = conn.prepare("SELECT * FROM employees").await?;
//! let rows = statement.query(&[]).await?;
//! conn.release().await?;
//!
//! pool.shutdown().await?;
//! ```

mod config;
mod error;
mod factory;
mod handle;
mod pool;
mod stats;

#[cfg(test)]
mod mock;

pub use config::PoolConfig;
pub use error::{PoolError, ResetFailure, TeardownFailure};
pub use factory::{ConnectionFactory, DriverFactory};
pub use handle::PooledConnection;
pub use pool::Pool;
pub use stats::PoolStats;
pub use tokio_util::sync::CancellationToken;
