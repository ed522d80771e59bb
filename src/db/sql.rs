//! SQL text builders shared by the backend adapters.
//!
//! Both dialects quote identifiers the same way (double quotes, embedded `"`
//! doubled) and differ only in parameter placeholders and the LIMIT/OFFSET
//! asymmetry, so the statement builders live here and take a [`Dialect`].
//!
//! Column order in generated DML is the sorted order of the row's keys
//! (`Row`/`Key` are BTreeMaps), so statement shapes are deterministic.

use super::error::DbError;
use super::types::{ColumnDef, Key, Row, Value};

/// SQL dialect, selecting placeholder syntax and LIMIT/OFFSET handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Positional `?` placeholders.
    Sqlite,
    /// Numbered `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    /// Placeholder for the `n`-th parameter (1-based).
    fn placeholder(self, n: usize) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${}", n),
        }
    }

    /// Whether OFFSET requires an explicit "no limit" sentinel.
    /// SQLite cannot use OFFSET without a LIMIT clause; `LIMIT -1` means
    /// unbounded. PostgreSQL allows a bare OFFSET.
    fn requires_limit_sentinel(self) -> bool {
        matches!(self, Self::Sqlite)
    }
}

/// Quote an identifier: wrap in double quotes, escape embedded `"` by
/// doubling it. Identifiers are not otherwise validated; callers remain
/// responsible for not feeding adversarial names where that matters.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build a `CREATE TABLE` statement.
///
/// A single primary-key column is marked inline; two or more primary-key
/// columns are expressed as a trailing table-level `PRIMARY KEY (a, b)`
/// constraint.
pub fn build_create_table(
    name: &str,
    columns: &[ColumnDef],
    if_not_exists: bool,
) -> Result<String, DbError> {
    if name.trim().is_empty() {
        return Err(DbError::validation("table name is required"));
    }
    if columns.is_empty() {
        return Err(DbError::validation("at least one column is required"));
    }

    let pk_count = columns.iter().filter(|c| c.primary_key).count();
    let mut defs = Vec::with_capacity(columns.len() + 1);
    let mut pk_cols = Vec::new();
    for col in columns {
        defs.push(build_column_def(col, pk_count == 1 && col.primary_key)?);
        if col.primary_key {
            pk_cols.push(quote_ident(&col.name));
        }
    }
    if pk_cols.len() > 1 {
        defs.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
    }

    let mut stmt = String::from("CREATE TABLE ");
    if if_not_exists {
        stmt.push_str("IF NOT EXISTS ");
    }
    stmt.push_str(&format!("{} ({})", quote_ident(name), defs.join(", ")));
    Ok(stmt)
}

/// Build a single column definition fragment.
///
/// The `default` expression is included verbatim; callers must not pass
/// untrusted input there.
pub fn build_column_def(col: &ColumnDef, allow_inline_pk: bool) -> Result<String, DbError> {
    if col.name.trim().is_empty() || col.col_type.trim().is_empty() {
        return Err(DbError::validation("column name and type are required"));
    }
    let mut parts = vec![quote_ident(&col.name), col.col_type.clone()];
    if col.not_null {
        parts.push("NOT NULL".to_string());
    }
    if let Some(ref default) = col.default {
        parts.push(format!("DEFAULT {}", default));
    }
    if col.primary_key && allow_inline_pk {
        parts.push("PRIMARY KEY".to_string());
    }
    Ok(parts.join(" "))
}

/// Build an `ALTER TABLE ... ADD COLUMN` statement.
///
/// Adding a primary-key column via ALTER is rejected; neither dialect
/// supports it on the simple ALTER path.
pub fn build_add_column(table: &str, col: &ColumnDef) -> Result<String, DbError> {
    if table.trim().is_empty() {
        return Err(DbError::validation("table name is required"));
    }
    if col.primary_key {
        return Err(DbError::validation(
            "adding primary key columns via ALTER TABLE is not supported",
        ));
    }
    let definition = build_column_def(col, false)?;
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        definition
    ))
}

/// Build an `ALTER TABLE ... DROP COLUMN` statement.
pub fn build_drop_column(table: &str, column: &str) -> Result<String, DbError> {
    if table.trim().is_empty() || column.trim().is_empty() {
        return Err(DbError::validation("table and column are required"));
    }
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    ))
}

/// Build a `DROP TABLE` statement.
pub fn build_drop_table(table: &str, if_exists: bool) -> Result<String, DbError> {
    if table.trim().is_empty() {
        return Err(DbError::validation("table name is required"));
    }
    let mut stmt = String::from("DROP TABLE ");
    if if_exists {
        stmt.push_str("IF EXISTS ");
    }
    stmt.push_str(&quote_ident(table));
    Ok(stmt)
}

/// Build a paginated `SELECT *` statement.
///
/// `limit <= 0` means no limit. SQLite needs `LIMIT -1` to use OFFSET
/// without a limit; PostgreSQL takes a bare OFFSET.
pub fn build_select(table: &str, limit: i64, offset: i64, dialect: Dialect) -> (String, Vec<Value>) {
    let mut stmt = format!("SELECT * FROM {}", quote_ident(table));
    let mut args = Vec::new();
    if limit > 0 {
        stmt.push_str(&format!(" LIMIT {}", dialect.placeholder(args.len() + 1)));
        args.push(Value::Int(limit));
    }
    if offset > 0 {
        if limit <= 0 && dialect.requires_limit_sentinel() {
            stmt.push_str(" LIMIT -1");
        }
        stmt.push_str(&format!(" OFFSET {}", dialect.placeholder(args.len() + 1)));
        args.push(Value::Int(offset));
    }
    (stmt, args)
}

/// Build an `INSERT` statement with columns in sorted key order.
pub fn build_insert(table: &str, row: &Row, dialect: Dialect) -> Result<(String, Vec<Value>), DbError> {
    if row.is_empty() {
        return Err(DbError::validation(format!(
            "no data to insert into {}",
            table
        )));
    }
    let mut columns = Vec::with_capacity(row.len());
    let mut placeholders = Vec::with_capacity(row.len());
    let mut args = Vec::with_capacity(row.len());
    for (i, (name, value)) in row.iter().enumerate() {
        columns.push(quote_ident(name));
        placeholders.push(dialect.placeholder(i + 1));
        args.push(value.clone());
    }
    let stmt = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok((stmt, args))
}

/// Build an `UPDATE` statement: SET clause from the row, WHERE clause from
/// the key, both in sorted column order.
pub fn build_update(
    table: &str,
    key: &Key,
    row: &Row,
    dialect: Dialect,
) -> Result<(String, Vec<Value>), DbError> {
    if key.is_empty() {
        return Err(DbError::validation(format!(
            "no primary key provided for {}",
            table
        )));
    }
    if row.is_empty() {
        return Err(DbError::validation(format!(
            "no data to update for {}",
            table
        )));
    }
    let mut set_clauses = Vec::with_capacity(row.len());
    let mut args = Vec::with_capacity(row.len() + key.len());
    for (name, value) in row {
        args.push(value.clone());
        set_clauses.push(format!(
            "{} = {}",
            quote_ident(name),
            dialect.placeholder(args.len())
        ));
    }
    let (where_clause, where_args) = build_where(key, dialect, args.len() + 1);
    args.extend(where_args);
    let stmt = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table),
        set_clauses.join(", "),
        where_clause
    );
    Ok((stmt, args))
}

/// Build a `DELETE` statement keyed by the full primary key.
pub fn build_delete(table: &str, key: &Key, dialect: Dialect) -> Result<(String, Vec<Value>), DbError> {
    if key.is_empty() {
        return Err(DbError::validation(format!(
            "no primary key provided for {}",
            table
        )));
    }
    let (where_clause, args) = build_where(key, dialect, 1);
    Ok((
        format!("DELETE FROM {} WHERE {}", quote_ident(table), where_clause),
        args,
    ))
}

/// AND together `column = <placeholder>` for every key entry, columns in
/// sorted order. `start` is the 1-based index of the first placeholder.
fn build_where(key: &Key, dialect: Dialect, start: usize) -> (String, Vec<Value>) {
    let mut clauses = Vec::with_capacity(key.len());
    let mut args = Vec::with_capacity(key.len());
    for (i, (name, value)) in key.iter().enumerate() {
        clauses.push(format!(
            "{} = {}",
            quote_ident(name),
            dialect.placeholder(start + i)
        ));
        args.push(value.clone());
    }
    (clauses.join(" AND "), args)
}
