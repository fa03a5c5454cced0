//! # Waterworks
//!
//! Backend for a water-delivery business: clients, employees, revenue,
//! expenses, suppliers and vehicles over SQLite, usable both as a standalone
//! binary and as a library.
//!
//! The database schema is declared, not scripted. On startup the
//! [`schema::Reconciler`] compares a [`schema::SchemaDescriptor`] with the
//! live catalog and applies only additive or widening changes, one
//! transaction per operation, and reports what it did.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! waterworks = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use waterworks::server::{AppState, create_router};
//! use waterworks::store::SqliteStore;
//!
//! let store = SqliteStore::new("./data/waterworks.db", Duration::from_secs(5))?;
//! let report = store.initialize()?;
//!
//! let state = Arc::new(AppState::new(Arc::new(store), &report));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `waterworks` binary. Disable with `default-features = false`.

pub mod config;
pub mod error;
pub mod schema;
pub mod server;
pub mod store;
pub mod types;
