//! API Integration Tests for Tabula
//!
//! Comprehensive tests covering all HTTP API endpoints against a real
//! server on an ephemeral port, backed by in-memory SQLite.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Value, json};
use tabula::registry::ConnectionRegistry;
use tabula::server::{AppState, create_router};
use tokio::net::TcpListener;

// =============================================================================
// Test Helpers
// =============================================================================

/// Start a test server with an empty registry and return the base URL.
async fn start_test_server() -> String {
    let registry = Arc::new(ConnectionRegistry::new(Duration::from_secs(5)));
    let router = create_router(AppState { registry });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://{}", addr)
}

/// Register an in-memory SQLite connection under `name`.
async fn add_memory_connection(client: &reqwest::Client, base_url: &str, name: &str) {
    let resp = client
        .post(format!("{}/api/connections", base_url))
        .json(&json!({ "name": name, "connString": "sqlite::memory:" }))
        .send()
        .await
        .expect("Failed to add connection");
    assert_eq!(resp.status(), StatusCode::CREATED.as_u16());
}

/// Create a simple `users(id, name)` table on the default connection.
async fn create_users_table(client: &reqwest::Client, base_url: &str) {
    let resp = client
        .post(format!("{}/api/tables", base_url))
        .json(&json!({
            "name": "users",
            "columns": [
                { "name": "id", "type": "INTEGER", "primaryKey": true },
                { "name": "name", "type": "TEXT", "notNull": true },
            ],
        }))
        .send()
        .await
        .expect("Failed to create table");
    assert_eq!(resp.status(), StatusCode::CREATED.as_u16());
}

// =============================================================================
// Health Probe Tests
// =============================================================================

#[tokio::test]
async fn test_ping() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/ping", base_url))
        .send()
        .await
        .expect("Failed to send ping request");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "pong");
}

// =============================================================================
// Connection Management Tests
// =============================================================================

#[tokio::test]
async fn test_connection_management() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    // No connections yet
    let resp = client
        .get(format!("{}/api/connections", base_url))
        .send()
        .await
        .expect("Failed to list connections");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["connections"], json!([]));
    assert_eq!(body["default"], "");

    // First registration becomes the default
    add_memory_connection(&client, &base_url, "main").await;
    add_memory_connection(&client, &base_url, "aux").await;

    let resp = client
        .get(format!("{}/api/connections", base_url))
        .send()
        .await
        .expect("Failed to list connections");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["default"], "main");
    let names: Vec<&str> = body["connections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["aux", "main"]);

    // Duplicate name is a conflict
    let resp = client
        .post(format!("{}/api/connections", base_url))
        .json(&json!({ "name": "main", "connString": "sqlite::memory:" }))
        .send()
        .await
        .expect("Failed to send duplicate request");
    assert_eq!(resp.status(), StatusCode::CONFLICT.as_u16());

    // Missing connString is rejected
    let resp = client
        .post(format!("{}/api/connections", base_url))
        .json(&json!({ "name": "empty" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());
}

#[tokio::test]
async fn test_connection_name_derived_from_conn_string() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/connections", base_url))
        .json(&json!({ "connString": "sqlite::memory:" }))
        .send()
        .await
        .expect("Failed to add connection");
    assert_eq!(resp.status(), StatusCode::CREATED.as_u16());

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["connection"]["name"], ":memory:");
    assert_eq!(body["connection"]["default"], true);
}

#[tokio::test]
async fn test_unknown_connection_returns_not_found() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();
    add_memory_connection(&client, &base_url, "main").await;

    let resp = client
        .get(format!("{}/api/tables?db=nope", base_url))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND.as_u16());

    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

// =============================================================================
// Schema API Tests
// =============================================================================

#[tokio::test]
async fn test_table_lifecycle() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();
    add_memory_connection(&client, &base_url, "main").await;
    create_users_table(&client, &base_url).await;

    let resp = client
        .get(format!("{}/api/tables", base_url))
        .send()
        .await
        .expect("Failed to list tables");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["tables"], json!(["users"]));

    // Column metadata carries primary-key ordinals
    let resp = client
        .get(format!("{}/api/tables/users/columns", base_url))
        .send()
        .await
        .expect("Failed to fetch columns");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let columns = body["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0]["name"], "id");
    assert_eq!(columns[0]["primaryKey"], true);
    assert_eq!(columns[0]["primaryKeyIndex"], 1);
    assert_eq!(columns[1]["name"], "name");
    assert_eq!(columns[1]["notNull"], true);

    // Add and drop a column
    let resp = client
        .post(format!("{}/api/tables/users/columns", base_url))
        .json(&json!({ "name": "email", "type": "TEXT" }))
        .send()
        .await
        .expect("Failed to add column");
    assert_eq!(resp.status(), StatusCode::CREATED.as_u16());

    let resp = client
        .delete(format!("{}/api/tables/users/columns/email", base_url))
        .send()
        .await
        .expect("Failed to drop column");
    assert_eq!(resp.status(), 200);

    // Drop the table
    let resp = client
        .delete(format!("{}/api/tables/users", base_url))
        .send()
        .await
        .expect("Failed to drop table");
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/api/tables", base_url))
        .send()
        .await
        .expect("Failed to list tables");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["tables"], json!([]));

    // Second drop fails without ifExists, succeeds with it
    let resp = client
        .delete(format!("{}/api/tables/users", base_url))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR.as_u16());

    let resp = client
        .delete(format!("{}/api/tables/users?ifExists=true", base_url))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_create_table_validation() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();
    add_memory_connection(&client, &base_url, "main").await;

    let resp = client
        .post(format!("{}/api/tables", base_url))
        .json(&json!({ "name": "", "columns": [{ "name": "id", "type": "INTEGER" }] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());

    let resp = client
        .post(format!("{}/api/tables", base_url))
        .json(&json!({ "name": "t", "columns": [] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());
}

// =============================================================================
// Row CRUD Tests
// =============================================================================

#[tokio::test]
async fn test_row_crud() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();
    add_memory_connection(&client, &base_url, "main").await;
    create_users_table(&client, &base_url).await;

    // Insert a few rows
    for (id, name) in [(1, "ada"), (2, "grace"), (3, "edsger")] {
        let resp = client
            .post(format!("{}/api/tables/users/rows", base_url))
            .json(&json!({ "id": id, "name": name }))
            .send()
            .await
            .expect("Failed to insert row");
        assert_eq!(resp.status(), StatusCode::CREATED.as_u16());
    }

    // Pagination: limit walks the middle of the table
    let resp = client
        .get(format!(
            "{}/api/tables/users/rows?limit=1&offset=1",
            base_url
        ))
        .send()
        .await
        .expect("Failed to fetch rows");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "grace");

    // Offset without limit
    let resp = client
        .get(format!("{}/api/tables/users/rows?offset=2", base_url))
        .send()
        .await
        .expect("Failed to fetch rows");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);

    // Update by primary key
    let resp = client
        .put(format!("{}/api/tables/users/rows/2", base_url))
        .json(&json!({ "name": "hopper" }))
        .send()
        .await
        .expect("Failed to update row");
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!(
            "{}/api/tables/users/rows?limit=1&offset=1",
            base_url
        ))
        .send()
        .await
        .expect("Failed to fetch rows");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["rows"][0]["name"], "hopper");

    // Delete by primary key, deleting again is a no-op
    let resp = client
        .delete(format!("{}/api/tables/users/rows/1", base_url))
        .send()
        .await
        .expect("Failed to delete row");
    assert_eq!(resp.status(), 200);

    let resp = client
        .delete(format!("{}/api/tables/users/rows/1", base_url))
        .send()
        .await
        .expect("Failed to delete row");
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/api/tables/users/rows", base_url))
        .send()
        .await
        .expect("Failed to fetch rows");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["rows"].as_array().unwrap().len(), 2);

    // Empty update payload is rejected
    let resp = client
        .put(format!("{}/api/tables/users/rows/2", base_url))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());
}

#[tokio::test]
async fn test_composite_primary_key_rows() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();
    add_memory_connection(&client, &base_url, "main").await;

    let resp = client
        .post(format!("{}/api/tables", base_url))
        .json(&json!({
            "name": "memberships",
            "columns": [
                { "name": "user_id", "type": "INTEGER", "primaryKey": true },
                { "name": "team_id", "type": "INTEGER", "primaryKey": true },
                { "name": "role", "type": "TEXT", "notNull": true },
            ],
        }))
        .send()
        .await
        .expect("Failed to create table");
    assert_eq!(resp.status(), StatusCode::CREATED.as_u16());

    // Both key columns carry ordinals
    let resp = client
        .get(format!("{}/api/tables/memberships/columns", base_url))
        .send()
        .await
        .expect("Failed to fetch columns");
    let body: Value = resp.json().await.unwrap();
    let columns = body["columns"].as_array().unwrap();
    assert_eq!(columns[0]["primaryKeyIndex"], 1);
    assert_eq!(columns[1]["primaryKeyIndex"], 2);

    let resp = client
        .post(format!("{}/api/tables/memberships/rows", base_url))
        .json(&json!({ "user_id": 7, "team_id": 3, "role": "member" }))
        .send()
        .await
        .expect("Failed to insert row");
    assert_eq!(resp.status(), StatusCode::CREATED.as_u16());

    // Composite-key update: comma-separated path id plus pk column list
    let resp = client
        .put(format!(
            "{}/api/tables/memberships/rows/7,3?pk=user_id,team_id",
            base_url
        ))
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .expect("Failed to update row");
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/api/tables/memberships/rows", base_url))
        .send()
        .await
        .expect("Failed to fetch rows");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["rows"][0]["role"], "admin");

    // Mismatched value count is rejected
    let resp = client
        .delete(format!(
            "{}/api/tables/memberships/rows/7?pk=user_id,team_id",
            base_url
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());

    let resp = client
        .delete(format!(
            "{}/api/tables/memberships/rows/7,3?pk=user_id,team_id",
            base_url
        ))
        .send()
        .await
        .expect("Failed to delete row");
    assert_eq!(resp.status(), 200);
}

// =============================================================================
// Raw SQL Tests
// =============================================================================

#[tokio::test]
async fn test_query_and_exec() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();
    add_memory_connection(&client, &base_url, "main").await;

    let resp = client
        .post(format!("{}/api/exec", base_url))
        .json(&json!({
            "query": "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, score REAL)"
        }))
        .send()
        .await
        .expect("Failed to exec");
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/api/exec", base_url))
        .json(&json!({
            "query": "INSERT INTO notes (body, score) VALUES (?, ?)",
            "args": ["hello", 0.5],
        }))
        .send()
        .await
        .expect("Failed to exec");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["rowsAffected"], 1);
    assert_eq!(body["lastInsertId"], 1);

    // Typed decode: integers, reals, and nulls survive the trip
    let resp = client
        .post(format!("{}/api/query", base_url))
        .json(&json!({ "query": "SELECT id, body, score, NULL AS missing FROM notes" }))
        .send()
        .await
        .expect("Failed to query");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let row = &body["rows"][0];
    assert_eq!(row["id"], 1);
    assert_eq!(row["body"], "hello");
    assert_eq!(row["score"], 0.5);
    assert_eq!(row["missing"], Value::Null);

    // Parameterized query
    let resp = client
        .post(format!("{}/api/query", base_url))
        .json(&json!({
            "query": "SELECT body FROM notes WHERE id = ?",
            "args": [1],
        }))
        .send()
        .await
        .expect("Failed to query");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["rows"][0]["body"], "hello");

    // Broken SQL is the caller's fault
    let resp = client
        .post(format!("{}/api/query", base_url))
        .json(&json!({ "query": "SELEC nope" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());

    let resp = client
        .post(format!("{}/api/exec", base_url))
        .json(&json!({ "query": "DELET FROM notes" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST.as_u16());
}

// =============================================================================
// Multi-Connection Tests
// =============================================================================

#[tokio::test]
async fn test_connections_are_isolated() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();
    add_memory_connection(&client, &base_url, "main").await;
    add_memory_connection(&client, &base_url, "aux").await;

    // Create a table only on the aux connection
    let resp = client
        .post(format!("{}/api/tables?db=aux", base_url))
        .json(&json!({
            "name": "only_aux",
            "columns": [{ "name": "id", "type": "INTEGER", "primaryKey": true }],
        }))
        .send()
        .await
        .expect("Failed to create table");
    assert_eq!(resp.status(), StatusCode::CREATED.as_u16());

    let resp = client
        .get(format!("{}/api/tables?db=aux", base_url))
        .send()
        .await
        .expect("Failed to list tables");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["tables"], json!(["only_aux"]));

    // The default connection does not see it
    let resp = client
        .get(format!("{}/api/tables", base_url))
        .send()
        .await
        .expect("Failed to list tables");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["tables"], json!([]));
}
