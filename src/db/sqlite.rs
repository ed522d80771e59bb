//! SQLite backend adapter using sqlx.
//!
//! The pool is capped at a single connection (SQLite is single writer) and
//! foreign-key enforcement is switched on at connect time. Schema metadata
//! comes from `sqlite_master` and the `table_info` / `foreign_key_list`
//! pragmas.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Connection, Row as _, TypeInfo, ValueRef};

use super::error::DbError;
use super::sql::{self, Dialect};
use super::types::{Column, ColumnDef, ExecResult, ForeignKey, ForeignKeyAction, Key, Row, Value};
use super::Database;

/// SQLite is single writer, keep it conservative.
const MAX_CONNECTIONS: u32 = 1;

/// SQLite adapter over a single-connection sqlx pool.
pub struct SqliteDb {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDb").finish_non_exhaustive()
    }
}

impl SqliteDb {
    /// Open a SQLite database.
    ///
    /// Accepts sqlx-style URLs (`sqlite:data.db`, `sqlite::memory:`) as well
    /// as bare file paths. The database file is created if missing and
    /// foreign-key enforcement is enabled.
    pub async fn connect(conn: &str, connect_timeout: Duration) -> Result<Self, DbError> {
        let options = if conn.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(conn).map_err(DbError::Connection)?
        } else {
            SqliteConnectOptions::new().filename(conn)
        };
        let options = options.create_if_missing(true).foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(connect_timeout)
            .connect_with(options)
            .await
            .map_err(DbError::Connection)?;

        Ok(Self { pool })
    }

    fn ensure_connected(&self) -> Result<(), DbError> {
        if self.pool.is_closed() {
            return Err(DbError::NotConnected);
        }
        Ok(())
    }

    async fn execute(&self, stmt: &str, args: &[Value]) -> Result<(), DbError> {
        bind_args(sqlx::query(stmt), args)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn foreign_keys(
        &self,
        table: &str,
    ) -> Result<HashMap<String, Vec<ForeignKey>>, DbError> {
        let stmt = format!("PRAGMA foreign_key_list({})", sql::quote_ident(table));
        let rows = sqlx::query(&stmt).fetch_all(&self.pool).await?;

        let mut map: HashMap<String, Vec<ForeignKey>> = HashMap::new();
        for row in &rows {
            let from: String = row.try_get("from")?;
            // "to" is NULL when the constraint references the implicit rowid key
            let to: Option<String> = row.try_get("to")?;
            let on_update: String = row.try_get("on_update")?;
            let on_delete: String = row.try_get("on_delete")?;
            let fk = ForeignKey {
                ref_table: row.try_get("table")?,
                from_col: from.clone(),
                to_col: to.unwrap_or_default(),
                on_update: ForeignKeyAction::parse(&on_update),
                on_delete: ForeignKeyAction::parse(&on_delete),
            };
            map.entry(from).or_default().push(fk);
        }
        Ok(map)
    }
}

#[async_trait]
impl Database for SqliteDb {
    async fn close(&self) -> Result<(), DbError> {
        self.pool.close().await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.ensure_connected()?;
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn tables(&self) -> Result<Vec<String>, DbError> {
        self.ensure_connected()?;
        let tables = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>, DbError> {
        self.ensure_connected()?;
        let fk_map = self.foreign_keys(table).await?;

        let stmt = format!("PRAGMA table_info({})", sql::quote_ident(table));
        let rows = sqlx::query(&stmt).fetch_all(&self.pool).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name")?;
            let not_null: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;
            columns.push(Column {
                col_type: row.try_get("type")?,
                not_null: not_null == 1,
                default: row.try_get("dflt_value")?,
                primary_key: pk > 0,
                primary_key_index: pk as i32,
                foreign_keys: fk_map.get(&name).cloned().unwrap_or_default(),
                name,
            });
        }
        Ok(columns)
    }

    async fn create_table(
        &self,
        name: &str,
        columns: &[ColumnDef],
        if_not_exists: bool,
    ) -> Result<(), DbError> {
        self.ensure_connected()?;
        let stmt = sql::build_create_table(name, columns, if_not_exists)?;
        self.execute(&stmt, &[]).await
    }

    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), DbError> {
        self.ensure_connected()?;
        let stmt = sql::build_add_column(table, column)?;
        self.execute(&stmt, &[]).await
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<(), DbError> {
        self.ensure_connected()?;
        let stmt = sql::build_drop_column(table, column)?;
        self.execute(&stmt, &[]).await
    }

    async fn drop_table(&self, table: &str, if_exists: bool) -> Result<(), DbError> {
        self.ensure_connected()?;
        let stmt = sql::build_drop_table(table, if_exists)?;
        self.execute(&stmt, &[]).await
    }

    async fn rows(&self, table: &str, limit: i64, offset: i64) -> Result<Vec<Row>, DbError> {
        let (stmt, args) = sql::build_select(table, limit, offset, Dialect::Sqlite);
        self.query(&stmt, &args).await
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<(), DbError> {
        self.ensure_connected()?;
        let (stmt, args) = sql::build_insert(table, row, Dialect::Sqlite)?;
        self.execute(&stmt, &args).await
    }

    async fn update(&self, table: &str, key: &Key, row: &Row) -> Result<(), DbError> {
        self.ensure_connected()?;
        let (stmt, args) = sql::build_update(table, key, row, Dialect::Sqlite)?;
        self.execute(&stmt, &args).await
    }

    async fn delete(&self, table: &str, key: &Key) -> Result<(), DbError> {
        self.ensure_connected()?;
        let (stmt, args) = sql::build_delete(table, key, Dialect::Sqlite)?;
        self.execute(&stmt, &args).await
    }

    async fn exec(&self, query: &str, args: &[Value]) -> Result<ExecResult, DbError> {
        self.ensure_connected()?;
        let result = bind_args(sqlx::query(query), args)
            .execute(&self.pool)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    async fn query(&self, query: &str, args: &[Value]) -> Result<Vec<Row>, DbError> {
        self.ensure_connected()?;
        let rows = bind_args(sqlx::query(query), args)
            .fetch_all(&self.pool)
            .await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            results.push(row_to_map(row)?);
        }
        Ok(results)
    }
}

fn bind_args<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    args: &[Value],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let mut query = query;
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Real(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

fn row_to_map(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut map = Row::new();
    for (idx, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), decode_value(row, idx)?);
    }
    Ok(map)
}

/// Decode a cell by its runtime storage class. Blobs become text.
fn decode_value(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" => Ok(Value::Int(row.try_get(idx)?)),
        "REAL" => Ok(Value::Real(row.try_get(idx)?)),
        "BOOLEAN" => Ok(Value::Bool(row.try_get(idx)?)),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(idx)?;
            Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
        _ => Ok(Value::Text(row.try_get(idx)?)),
    }
}
