//! SQLite backend for the Moln key-value store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Hashes, sets, lists and counters each
//! live in their own table, keyed by the string key.

mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
