//! Web server module for Tabula.
//!
//! Provides the HTTP JSON API: connection management, schema introspection,
//! row CRUD, and raw SQL execution. Every data route accepts a `db` query
//! parameter naming the registry connection to use; an absent or empty value
//! resolves to the default connection.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::db::{ColumnDef, Database, DbError, Key, Row, Value};
use crate::registry::{self, ConnectionRegistry};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
}

/// API error carrying an HTTP status and a message rendered as
/// `{"error": "..."}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let status = match &err {
            DbError::Validation(_) => StatusCode::BAD_REQUEST,
            DbError::ConnectionMiss(_) => StatusCode::NOT_FOUND,
            DbError::ConnectionExists(_) => StatusCode::CONFLICT,
            DbError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            DbError::Connection(_) | DbError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Query parameters selecting a registry connection.
#[derive(Debug, Deserialize)]
struct DbParams {
    #[serde(default)]
    db: String,
}

/// Query parameters for row listing.
#[derive(Debug, Deserialize)]
struct RowsParams {
    #[serde(default)]
    db: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Query parameters for keyed row updates and deletes. `pk` is a
/// comma-separated list of primary-key column names; defaults to `id`.
#[derive(Debug, Deserialize)]
struct KeyParams {
    #[serde(default)]
    db: String,
    pk: Option<String>,
}

/// Query parameters for dropping a table.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DropTableParams {
    #[serde(default)]
    db: String,
    #[serde(default)]
    if_exists: bool,
}

/// Request body for registering a connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddConnectionRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    conn_string: String,
}

/// Request body for creating a table.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTableRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    columns: Vec<ColumnDef>,
    #[serde(default)]
    if_not_exists: bool,
}

/// Request body for raw SQL routes.
#[derive(Debug, Deserialize)]
struct StatementRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    args: Vec<Value>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/ping", get(ping_handler))
        .route(
            "/api/connections",
            get(list_connections_handler).post(add_connection_handler),
        )
        .route(
            "/api/tables",
            get(list_tables_handler).post(create_table_handler),
        )
        .route("/api/tables/{table}", delete(drop_table_handler))
        .route(
            "/api/tables/{table}/columns",
            get(columns_handler).post(add_column_handler),
        )
        .route(
            "/api/tables/{table}/columns/{column}",
            delete(drop_column_handler),
        )
        .route(
            "/api/tables/{table}/rows",
            get(rows_handler).post(insert_row_handler),
        )
        .route(
            "/api/tables/{table}/rows/{id}",
            put(update_row_handler).delete(delete_row_handler),
        )
        .route("/api/query", post(query_handler))
        .route("/api/exec", post(exec_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Resolve the connection named in the request, empty meaning the default.
async fn use_db(state: &AppState, name: &str) -> Result<Arc<dyn Database>, ApiError> {
    state.registry.get(name).await.map_err(ApiError::from)
}

/// Parse one primary-key path segment: integral values become `Int`,
/// everything else stays `Text`.
fn parse_path_id(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) => Value::Int(n),
        Err(_) => Value::Text(raw.to_string()),
    }
}

/// Primary-key column names from the `pk` query parameter, defaulting
/// to a single `id` column.
fn primary_key_columns(pk: Option<&str>) -> Vec<String> {
    let columns: Vec<String> = pk
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if columns.is_empty() {
        vec!["id".to_string()]
    } else {
        columns
    }
}

/// Build the full primary key from the path segment. Composite keys pair
/// comma-separated path values with the `pk` column list positionally.
fn build_key(columns: &[String], raw_id: &str) -> Result<Key, ApiError> {
    if columns.len() == 1 {
        let mut key = Key::new();
        key.insert(columns[0].clone(), parse_path_id(raw_id));
        return Ok(key);
    }
    let values: Vec<&str> = raw_id.split(',').collect();
    if values.len() != columns.len() {
        return Err(ApiError::bad_request(format!(
            "expected {} primary key values, got {}",
            columns.len(),
            values.len()
        )));
    }
    Ok(columns
        .iter()
        .zip(values)
        .map(|(col, raw)| (col.clone(), parse_path_id(raw.trim())))
        .collect())
}

/// Liveness probe.
async fn ping_handler() -> &'static str {
    "pong"
}

/// List registered connections and the current default.
async fn list_connections_handler(State(state): State<Arc<AppState>>) -> Response {
    let connections = state.registry.list().await;
    let default = state.registry.default_name().await;
    Json(json!({ "connections": connections, "default": default })).into_response()
}

/// Register a new connection. An omitted name is derived from the
/// connection string.
async fn add_connection_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddConnectionRequest>,
) -> Result<Response, ApiError> {
    let conn_string = req.conn_string.trim().to_string();
    if conn_string.is_empty() {
        return Err(ApiError::bad_request("connString is required"));
    }

    let mut name = req.name.trim().to_string();
    if name.is_empty() {
        name = registry::derive_name(&conn_string);
    }
    if name.is_empty() {
        name = format!("db{}", state.registry.list().await.len() + 1);
    }

    state.registry.add(&name, &conn_string).await?;
    let default = state.registry.default_name().await == name;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "connection": {
            "name": name,
            "connString": conn_string,
            "default": default,
        }})),
    )
        .into_response())
}

/// List user tables.
async fn list_tables_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DbParams>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    let tables = db.tables().await?;
    Ok(Json(json!({ "tables": tables })).into_response())
}

/// Create a table from a column definition list.
async fn create_table_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DbParams>,
    Json(req): Json<CreateTableRequest>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    db.create_table(&req.name, &req.columns, req.if_not_exists)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "ok" }))).into_response())
}

/// Drop a table.
async fn drop_table_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<DropTableParams>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    db.drop_table(&table, params.if_exists).await?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

/// Column metadata for a table.
async fn columns_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<DbParams>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    let columns = db.columns(&table).await?;
    Ok(Json(json!({ "columns": columns })).into_response())
}

/// Add a column to an existing table.
async fn add_column_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<DbParams>,
    Json(column): Json<ColumnDef>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    db.add_column(&table, &column).await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "ok" }))).into_response())
}

/// Drop a column from an existing table.
async fn drop_column_handler(
    State(state): State<Arc<AppState>>,
    Path((table, column)): Path<(String, String)>,
    Query(params): Query<DbParams>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    db.drop_column(&table, &column).await?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

/// Paginated row listing.
async fn rows_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<RowsParams>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    let rows = db
        .rows(
            &table,
            params.limit.unwrap_or(0),
            params.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(json!({ "rows": rows })).into_response())
}

/// Insert a single row.
async fn insert_row_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<DbParams>,
    Json(row): Json<Row>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    db.insert(&table, &row).await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "ok" }))).into_response())
}

/// Update the row addressed by the path key.
async fn update_row_handler(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
    Query(params): Query<KeyParams>,
    Json(row): Json<Row>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    let key = build_key(&primary_key_columns(params.pk.as_deref()), &id)?;
    db.update(&table, &key, &row).await?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

/// Delete the row addressed by the path key.
async fn delete_row_handler(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
    Query(params): Query<KeyParams>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    let key = build_key(&primary_key_columns(params.pk.as_deref()), &id)?;
    db.delete(&table, &key).await?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

/// Run a raw query and return the decoded rows. Driver errors surface as
/// 400 so callers can see what was wrong with their SQL.
async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DbParams>,
    Json(req): Json<StatementRequest>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    let rows = db
        .query(&req.query, &req.args)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(json!({ "rows": rows })).into_response())
}

/// Run a raw non-query statement.
async fn exec_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DbParams>,
    Json(req): Json<StatementRequest>,
) -> Result<Response, ApiError> {
    let db = use_db(&state, &params.db).await?;
    let result = db
        .exec(&req.query, &req.args)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(result).into_response())
}
