//! Database abstraction layer.
//!
//! A small capability set normalized across two SQL dialects:
//!
//! - [`Database`]: the uniform operation set (introspection, CRUD, raw SQL)
//! - [`SqliteDb`] / [`PostgresDb`]: concrete adapters built on sqlx pools
//! - [`connect`]: factory selecting the adapter from the connection-string scheme
//!
//! Adapters are constructed by connecting; after [`Database::close`] every
//! operation fails with [`DbError::NotConnected`]. Cancellation follows the
//! usual async rule: dropping an in-flight future aborts the database call.

mod error;
pub mod postgres;
pub mod sql;
pub mod sqlite;
mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use error::DbError;
pub use postgres::PostgresDb;
pub use sqlite::SqliteDb;
pub use types::{Column, ColumnDef, ExecResult, ForeignKey, ForeignKeyAction, Key, Row, Value};

/// The uniform database capability set, implemented once per dialect.
///
/// Schema metadata is read live on every call and never cached. All DML
/// builders order columns lexicographically, so generated statements are
/// deterministic regardless of payload iteration order.
#[async_trait]
pub trait Database: Send + Sync + std::fmt::Debug {
    /// Close the underlying handle. Idempotent.
    async fn close(&self) -> Result<(), DbError>;

    /// Verify the connection is still alive.
    async fn ping(&self) -> Result<(), DbError>;

    /// All user table names, sorted lexicographically. System tables excluded.
    async fn tables(&self) -> Result<Vec<String>, DbError>;

    /// Column metadata for a table, with primary-key ordinals and foreign keys.
    async fn columns(&self, table: &str) -> Result<Vec<Column>, DbError>;

    /// Create a table. Composite primary keys are emitted as a trailing
    /// table-level constraint.
    async fn create_table(
        &self,
        name: &str,
        columns: &[ColumnDef],
        if_not_exists: bool,
    ) -> Result<(), DbError>;

    /// Add a column to an existing table. Primary-key columns are rejected.
    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError>;

    /// Drop an existing column.
    async fn drop_column(&self, table: &str, column: &str) -> Result<(), DbError>;

    /// Drop an existing table.
    async fn drop_table(&self, table: &str, if_exists: bool) -> Result<(), DbError>;

    /// Fetch rows with pagination. `limit <= 0` means no limit.
    async fn rows(&self, table: &str, limit: i64, offset: i64) -> Result<Vec<Row>, DbError>;

    /// Insert a single row.
    async fn insert(&self, table: &str, row: &Row) -> Result<(), DbError>;

    /// Update rows matching the full primary key. Zero matched rows is
    /// still success.
    async fn update(&self, table: &str, key: &Key, row: &Row) -> Result<(), DbError>;

    /// Delete rows matching the full primary key. Deleting a non-existent
    /// key is a no-op.
    async fn delete(&self, table: &str, key: &Key) -> Result<(), DbError>;

    /// Execute a raw non-query statement.
    async fn exec(&self, query: &str, args: &[Value]) -> Result<ExecResult, DbError>;

    /// Execute a raw query statement and decode the result rows.
    async fn query(&self, query: &str, args: &[Value]) -> Result<Vec<Row>, DbError>;
}

/// Connect to a database, selecting the adapter from the connection-string
/// scheme: `postgres://` / `postgresql://` picks PostgreSQL, anything else
/// is treated as SQLite.
pub async fn connect(
    conn_string: &str,
    connect_timeout: Duration,
) -> Result<Arc<dyn Database>, DbError> {
    if conn_string.starts_with("postgres://") || conn_string.starts_with("postgresql://") {
        Ok(Arc::new(PostgresDb::connect(conn_string, connect_timeout).await?))
    } else {
        Ok(Arc::new(SqliteDb::connect(conn_string, connect_timeout).await?))
    }
}
