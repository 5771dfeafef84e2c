//! Value and result types shared by connections and statements

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parameter bound to a statement, or a column value read back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    /// Exact numeric, kept as text
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

/// A row from a query result
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Backend type name
    pub data_type: String,
    pub nullable: bool,
}

/// Query result
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Unique query ID
    pub id: Uuid,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    /// Rows affected (for DML statements)
    pub affected_rows: u64,
    /// Warnings from the database
    pub warnings: Vec<String>,
}

impl QueryResult {
    /// Create a new empty query result
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
            warnings: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Result of executing a single statement
#[derive(Debug, Clone)]
pub struct StatementResult {
    /// Whether this was a query (SELECT) or a command (INSERT/UPDATE/DELETE)
    pub is_query: bool,
    /// Query result (if is_query is true)
    pub result: Option<QueryResult>,
    /// Rows affected (if is_query is false)
    pub affected_rows: u64,
}

impl StatementResult {
    /// Result of a command that touched `affected_rows` rows
    pub fn command(affected_rows: u64) -> Self {
        Self {
            is_query: false,
            result: None,
            affected_rows,
        }
    }
}

/// A warning reported by the backend for a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlWarning {
    /// Vendor or SQLSTATE code, if the backend supplies one
    pub code: Option<String>,
    pub message: String,
}

/// Descriptive metadata about a connection and the backend behind it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    /// Backend product name (e.g., "PostgreSQL")
    pub product_name: String,
    pub product_version: String,
    pub driver_name: String,
    /// Target the connection was opened against
    pub url: String,
    pub username: Option<String>,
    pub supports_savepoints: bool,
}
