//! Core data types for the database abstraction layer.
//!
//! This module defines the shapes shared by every backend adapter:
//!
//! - [`Value`]: dynamically typed scalar used in row payloads and results
//! - [`Row`] / [`Key`]: column-name keyed maps (sorted, so generated SQL is deterministic)
//! - [`Column`] / [`ForeignKey`]: live schema introspection results
//! - [`ColumnDef`]: DDL input for table creation and column addition
//! - [`ExecResult`]: outcome of a raw non-query statement

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A dynamically typed scalar cell value.
///
/// Serialized untagged, so JSON payloads like `{"id": 1, "name": "alice"}`
/// map directly onto rows. Byte-array results are decoded into text by the
/// adapters before they reach this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A row payload or query result: column name to value.
///
/// `BTreeMap` keeps keys in lexicographic order, which fixes the column order
/// of generated INSERT/UPDATE statements.
pub type Row = BTreeMap<String, Value>;

/// A primary-key map used to address a row for update/delete.
///
/// Must contain every column participating in the table's primary key,
/// no more, no fewer. A single-column key is simply a one-entry map.
pub type Key = BTreeMap<String, Value>;

/// Referential action attached to a foreign key constraint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
pub enum ForeignKeyAction {
    #[serde(rename = "NO ACTION")]
    #[strum(serialize = "NO ACTION")]
    NoAction,
    #[serde(rename = "SET NULL")]
    #[strum(serialize = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    #[strum(serialize = "SET DEFAULT")]
    SetDefault,
    #[serde(rename = "RESTRICT")]
    #[strum(serialize = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    #[strum(serialize = "CASCADE")]
    Cascade,
}

impl ForeignKeyAction {
    /// Parse an action reported by the engine, defaulting to `NO ACTION`
    /// for anything unrecognized.
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or(Self::NoAction)
    }
}

/// A foreign key constraint on a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    /// Table the constraint references.
    pub ref_table: String,
    /// Constrained column in this table.
    pub from_col: String,
    /// Referenced column in `ref_table`.
    pub to_col: String,
    pub on_update: ForeignKeyAction,
    pub on_delete: ForeignKeyAction,
}

/// Column metadata from live schema introspection.
///
/// Built fresh on every `columns` call so it always reflects the current
/// database state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Declared type as reported by the engine.
    #[serde(rename = "type")]
    pub col_type: String,
    pub not_null: bool,
    /// Default expression, verbatim from the engine.
    pub default: Option<String>,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
    /// 1-based position within a (possibly composite) primary key,
    /// 0 when the column is not part of the key.
    pub primary_key_index: i32,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

/// Column definition used as DDL input when creating tables or adding columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
    #[serde(default)]
    pub not_null: bool,
    /// Raw SQL fragment appended after DEFAULT, included verbatim.
    /// Callers must not pass untrusted input here.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, col_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            col_type: col_type.into(),
            not_null: false,
            default: None,
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Result of a raw non-query statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Rowid of the last inserted row. Meaningful for SQLite;
    /// PostgreSQL reports 0 (use RETURNING instead).
    pub last_insert_id: i64,
}
