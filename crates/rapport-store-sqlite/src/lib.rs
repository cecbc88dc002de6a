//! SQLite backend for the Rapport account store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each operation that reads before it
//! writes runs inside a single SQLite transaction.

mod confirmations;
mod encode;
mod graph;
mod persons;
mod schema;
mod store;
mod tokens;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
