//! SQLite backend for the Vigil device-management store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Scope resolution lives in `graph`,
//! deployment-ledger lookups in `ledger`; both are plain synchronous
//! functions so a check-in can run them inside one transaction.

mod encode;
mod graph;
mod ledger;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
