//! Tabula - Lightweight Database Admin API
//!
//! This crate provides the core functionality for the Tabula database admin
//! service. It can be used as a library by other Rust projects, or run as a
//! standalone binary with the `tabula` executable.
//!
//! # Architecture
//!
//! - **Adapters**: A uniform capability set over SQLite and PostgreSQL (sqlx)
//! - **Registry**: Thread-safe directory of named, live connections
//! - **Server**: Axum JSON API for introspection, row CRUD, and raw SQL
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tabula::registry::ConnectionRegistry;
//! use tabula::server::{AppState, create_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ConnectionRegistry::default());
//!     registry.add("main", "sqlite:app.db").await?;
//!
//!     let app = create_router(AppState { registry });
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod registry;
pub mod server;

pub use config::AppConfig;
pub use db::{Column, ColumnDef, Database, DbError, ExecResult, Key, Row, Value};
pub use registry::{ConnectionInfo, ConnectionRegistry};
