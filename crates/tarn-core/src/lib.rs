//! Tarn Core - Raw connection abstractions for the tarn connection pool
//!
//! This crate defines the surface that a database client library exposes to
//! the pool. It provides:
//!
//! - `Connection` - Trait for a live session with the backend
//! - `Statement` - Trait for sub-resources opened against a connection
//! - `Driver` - Trait for opening connections from `ConnectOptions`
//! - `SessionSnapshot` - Session-scoped settings captured from a connection
//! - Common types like `Value`, `Row`, `QueryResult`, etc.

mod connection;
mod driver;
mod error;
mod session;
mod transaction;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use session::*;
pub use transaction::*;
pub use types::*;
